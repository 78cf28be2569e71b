//! Beta-Binomial conjugate engine.
//!
//! Posterior = Beta(α₀ + successes, β₀ + failures). Exact, one step.

use std::collections::BTreeMap;
use std::sync::Arc;

use ab_common::data::DataKind;
use ab_common::{Error, Family, ModelConfig, Result, StandardData, Structure};
use ab_math::{BetaParams, SufficientStats};
use rand::RngCore;

use crate::config::FitOptions;
use crate::inference::engine::{
    AlgorithmKind, ConjugateEngine, Diagnostics, EngineCapabilities, FitRun, InferenceEngine,
    InferenceResult,
};
use crate::inference::posterior::{ParameterDraw, Posterior, PosteriorCapabilities};
use crate::inference::sampling::sample_beta;

/// Beta posterior over a conversion rate.
///
/// `sample` and `log_pdf` are over the rate p itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaPosterior {
    params: BetaParams,
    prior: BetaParams,
}

impl BetaPosterior {
    pub fn new(params: BetaParams, prior: BetaParams) -> Self {
        Self { params, prior }
    }

    pub fn params(&self) -> &BetaParams {
        &self.params
    }

    pub fn prior(&self) -> &BetaParams {
        &self.prior
    }
}

impl Posterior for BetaPosterior {
    fn family(&self) -> String {
        "beta".to_string()
    }

    fn capabilities(&self) -> PosteriorCapabilities {
        PosteriorCapabilities {
            analytical: true,
            parameter_sampling: true,
            log_pdf: true,
        }
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        (0..n).map(|_| sample_beta(rng, &self.params)).collect()
    }

    fn mean(&self) -> Option<f64> {
        Some(self.params.mean())
    }

    fn variance(&self) -> Option<f64> {
        Some(self.params.variance())
    }

    fn credible_interval(&self, level: f64) -> Option<(f64, f64)> {
        let (lo, hi) = self.params.credible_interval(level);
        (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
    }

    fn log_pdf(&self, x: f64) -> Option<f64> {
        Some(self.params.log_pdf(x))
    }

    /// Bernoulli likelihood of an outcome at the posterior mean rate.
    fn log_likelihood(&self, x: f64) -> Option<f64> {
        Some(ParameterDraw::Bernoulli { p: self.params.mean() }.log_likelihood(x))
    }

    fn sample_parameters(&self, rng: &mut dyn RngCore) -> Option<ParameterDraw> {
        Some(ParameterDraw::Bernoulli {
            p: sample_beta(rng, &self.params),
        })
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("alpha".to_string(), self.params.alpha),
            ("beta".to_string(), self.params.beta),
        ])
    }
}

/// Conjugate engine for conversion data.
#[derive(Debug, Clone, Copy, Default)]
pub struct BetaBinomialConjugate;

impl BetaBinomialConjugate {
    pub fn new() -> Self {
        Self
    }

    /// Posterior from explicit counts.
    pub fn posterior(&self, prior: &BetaParams, successes: f64, failures: f64) -> Result<BetaPosterior> {
        let params = prior.update(successes, failures).ok_or_else(|| {
            Error::InvalidData(format!(
                "counts must be finite and non-negative, got {successes} successes and {failures} failures"
            ))
        })?;
        Ok(BetaPosterior::new(params, *prior))
    }
}

impl InferenceEngine for BetaBinomialConjugate {
    fn name(&self) -> &'static str {
        "beta-binomial"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            structures: vec![Structure::Simple],
            families: vec![Family::Beta],
            data_types: vec![DataKind::Binomial, DataKind::UserLevel],
            min_components: 1,
            max_components: Some(1),
            exact: true,
            fast: true,
            stable: true,
        }
    }

    fn fit(
        &self,
        data: &StandardData,
        config: &ModelConfig,
        options: &FitOptions,
    ) -> Result<InferenceResult> {
        data.validate()?;
        config.validate()?;
        self.capabilities().check(self.name(), config, data.kind())?;
        let prior = self.prior(options)?;

        let run = FitRun::start(self.name(), options);
        let counts = data.to_binomial();
        let posterior = self.posterior(
            &prior,
            counts.successes as f64,
            counts.failures() as f64,
        )?;
        tracing::debug!(
            target: crate::logging::event_names::FIT_UPDATE,
            parent: run.span(),
            successes = counts.successes,
            trials = counts.trials,
            alpha = posterior.params.alpha,
            beta = posterior.params.beta,
            "beta-binomial update"
        );
        let diagnostics = Diagnostics::exact("beta", run.elapsed_ms());
        Ok(run.finish(
            Arc::new(posterior),
            diagnostics,
            AlgorithmKind::Conjugate,
            *config,
            self.capabilities(),
            data.quality(),
        ))
    }
}

impl ConjugateEngine for BetaBinomialConjugate {
    type Prior = BetaParams;
    type Posterior = BetaPosterior;

    fn prior(&self, options: &FitOptions) -> Result<BetaParams> {
        options.beta_prior()
    }

    fn update(&self, prior: &BetaParams, stats: &SufficientStats, _seed: u64) -> Result<BetaPosterior> {
        // sum counts successes because values are 0/1 indicators
        self.posterior(prior, stats.sum, stats.n - stats.sum)
    }

    /// Statistics over success indicators: any non-zero value is a success.
    fn stats(&self, values: &[f64], weights: Option<&[f64]>) -> Result<SufficientStats> {
        let indicators: Vec<f64> = values
            .iter()
            .map(|v| if *v != 0.0 && v.is_finite() { 1.0 } else { 0.0 })
            .collect();
        match weights {
            None => Ok(SufficientStats::from_values(&indicators)),
            Some(w) => SufficientStats::weighted(&indicators, w).ok_or_else(|| {
                Error::InvalidData(format!(
                    "weights must be finite, non-negative and match {} values (got {})",
                    values.len(),
                    w.len()
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriorParams;
    use ab_common::{ErrorKind, UserRecord};

    fn beta_config() -> ModelConfig {
        ModelConfig::simple(Family::Beta, 1)
    }

    fn params_of(result: &InferenceResult) -> (f64, f64) {
        let summary = result.posterior.summary();
        (summary.parameters["alpha"], summary.parameters["beta"])
    }

    #[test]
    fn default_prior_update() {
        let data = StandardData::binomial(8, 10).unwrap();
        let result = BetaBinomialConjugate
            .fit(&data, &beta_config(), &FitOptions::default())
            .unwrap();
        assert_eq!(params_of(&result), (9.0, 3.0));
        assert!((result.posterior.mean().unwrap() - 0.75).abs() < 1e-12);
        assert!(result.diagnostics.converged);
        assert_eq!(result.diagnostics.iterations, 1);
        assert_eq!(result.diagnostics.model_type, "beta");
        assert_eq!(result.metadata.algorithm, AlgorithmKind::Conjugate);
    }

    #[test]
    fn custom_prior() {
        let data = StandardData::binomial(2, 10).unwrap();
        let opts = FitOptions::default().with_prior(PriorParams::beta(2.0, 8.0));
        let result = BetaBinomialConjugate.fit(&data, &beta_config(), &opts).unwrap();
        assert_eq!(params_of(&result), (4.0, 16.0));
    }

    #[test]
    fn wrong_prior_family_rejected() {
        let data = StandardData::binomial(2, 10).unwrap();
        let opts = FitOptions::default().with_prior(PriorParams::nig(0.0, 1.0, 1.0, 1.0));
        let err = BetaBinomialConjugate.fit(&data, &beta_config(), &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPrior);
    }

    #[test]
    fn user_level_uses_converted_counts() {
        let data = StandardData::user_level(vec![
            UserRecord::new(true, 3.0),
            UserRecord::new(false, 0.0),
            UserRecord::new(false, 0.0),
            UserRecord::new(true, 1.0),
        ])
        .unwrap();
        let result = BetaBinomialConjugate
            .fit(&data, &beta_config(), &FitOptions::default())
            .unwrap();
        assert_eq!(params_of(&result), (3.0, 3.0));
    }

    #[test]
    fn rejects_non_beta_config() {
        let data = StandardData::binomial(1, 2).unwrap();
        let err = BetaBinomialConjugate
            .fit(&data, &ModelConfig::simple(Family::Normal, 1), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelMismatch);
    }

    #[test]
    fn stats_and_weighted_paths_agree() {
        let engine = BetaBinomialConjugate;
        let values = [1.0, 0.0, 1.0, 1.0, 0.0];
        let opts = FitOptions::default();
        let direct = engine
            .fit_from_stats(&engine.stats(&values, None).unwrap(), &opts)
            .unwrap();
        let weighted = engine.fit_weighted(&values, &[1.0; 5], &opts).unwrap();
        assert_eq!(direct, weighted);
        assert_eq!(direct.params().alpha, 4.0);
        assert_eq!(direct.params().beta, 3.0);
    }

    #[test]
    fn weight_length_mismatch_is_invalid_data() {
        let err = BetaBinomialConjugate
            .fit_weighted(&[1.0, 0.0], &[1.0], &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn outcome_likelihood_uses_posterior_mean() {
        let post = BetaBinomialConjugate
            .posterior(&BetaParams::uniform(), 8.0, 2.0)
            .unwrap();
        assert!((post.log_likelihood(1.0).unwrap() - 0.75f64.ln()).abs() < 1e-12);
        assert!((post.log_likelihood(0.0).unwrap() - 0.25f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn interval_contains_mean() {
        let post = BetaBinomialConjugate
            .posterior(&BetaParams::uniform(), 45.0, 55.0)
            .unwrap();
        let (lo, hi) = post.credible_interval(0.95).unwrap();
        let mean = post.mean().unwrap();
        assert!(lo < mean && mean < hi);
    }
}
