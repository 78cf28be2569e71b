//! LogNormal conjugate engine: the Normal engine on ln x.

use ab_common::{Family, ModelConfig, Result, StandardData};
use ab_math::{NigParams, SufficientStats};

use super::nig::{nig_capabilities, nig_fit, nig_stats, nig_update, NigFamily, NigPosterior, Scale};
use crate::config::FitOptions;
use crate::inference::engine::{ConjugateEngine, EngineCapabilities, InferenceEngine, InferenceResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormalConjugate;

impl LogNormalConjugate {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for LogNormalConjugate {
    fn name(&self) -> &'static str {
        "lognormal-conjugate"
    }

    fn capabilities(&self) -> EngineCapabilities {
        nig_capabilities(Family::LogNormal)
    }

    fn fit(
        &self,
        data: &StandardData,
        config: &ModelConfig,
        options: &FitOptions,
    ) -> Result<InferenceResult> {
        nig_fit(self, data, config, options)
    }
}

impl ConjugateEngine for LogNormalConjugate {
    type Prior = NigParams;
    type Posterior = NigPosterior;

    /// The prior is placed on the log scale.
    fn prior(&self, options: &FitOptions) -> Result<NigParams> {
        options.nig_prior()
    }

    fn update(&self, prior: &NigParams, stats: &SufficientStats, seed: u64) -> Result<NigPosterior> {
        nig_update(Self::SCALE, prior, stats, seed)
    }

    /// Statistics of ln x; non-positive values carry no weight.
    fn stats(&self, values: &[f64], weights: Option<&[f64]>) -> Result<SufficientStats> {
        nig_stats(Self::SCALE, values, weights)
    }
}

impl NigFamily for LogNormalConjugate {
    const SCALE: Scale = Scale::Log;
}
