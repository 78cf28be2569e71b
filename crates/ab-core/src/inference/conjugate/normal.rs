//! Normal conjugate engine (Normal-Inverse-Gamma prior).

use ab_common::{Family, ModelConfig, Result, StandardData};
use ab_math::{NigParams, SufficientStats};

use super::nig::{nig_capabilities, nig_fit, nig_stats, nig_update, NigFamily, NigPosterior, Scale};
use crate::config::FitOptions;
use crate::inference::engine::{ConjugateEngine, EngineCapabilities, InferenceEngine, InferenceResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalConjugate;

impl NormalConjugate {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for NormalConjugate {
    fn name(&self) -> &'static str {
        "normal-conjugate"
    }

    fn capabilities(&self) -> EngineCapabilities {
        nig_capabilities(Family::Normal)
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

impl ConjugateEngine for NormalConjugate {
    type Prior = NigParams;
    type Posterior = NigPosterior;

    fn prior(&self, options: &FitOptions) -> Result<NigParams> {
        options.nig_prior()
    }

    fn update(&self, prior: &NigParams, stats: &SufficientStats, seed: u64) -> Result<NigPosterior> {
        nig_update(Self::SCALE, prior, stats, seed)
    }

    fn stats(&self, values: &[f64], weights: Option<&[f64]>) -> Result<SufficientStats> {
        nig_stats(Self::SCALE, values, weights)
    }
}

impl NigFamily for NormalConjugate {
    const SCALE: Scale = Scale::Linear;
}
