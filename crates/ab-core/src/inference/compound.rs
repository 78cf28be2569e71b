//! Zero-inflated (compound) models: conversion frequency × value severity.
//!
//! User-level data is split into conversion counts (fitted with
//! Beta-Binomial) and the positive values of converted users (fitted with
//! the configured value engine). The two parts are independent given the
//! split.

use std::collections::BTreeMap;
use std::sync::Arc;

use ab_common::data::DataKind;
use ab_common::{Error, Family, ModelConfig, Result, StandardData, Structure};
use rand::RngCore;

use super::conjugate::BetaBinomialConjugate;
use super::engine::{
    AlgorithmKind, Diagnostics, EngineCapabilities, FitRun, InferenceEngine, InferenceResult,
};
use super::posterior::{Decomposition, ParameterDraw, Posterior, PosteriorCapabilities};
use super::registry::EngineKind;
use super::sampling::{mc_interval, mc_moments, SampleCache};
use crate::logging::event_names;
use crate::config::{FitOptions, PriorFamily};

/// Joint posterior of a conversion rate F and a value S.
///
/// `sample` draws F·S, the value per user. `log_pdf` and parameter draws
/// are zero-inflated densities over individual user values.
#[derive(Debug, Clone)]
pub struct CompoundPosterior {
    frequency: Arc<dyn Posterior>,
    severity: Arc<dyn Posterior>,
    cache: SampleCache,
}

impl CompoundPosterior {
    pub fn new(frequency: Arc<dyn Posterior>, severity: Arc<dyn Posterior>, seed: u64) -> Self {
        Self {
            frequency,
            severity,
            cache: SampleCache::new(seed),
        }
    }

    pub fn frequency(&self) -> &Arc<dyn Posterior> {
        &self.frequency
    }

    pub fn severity(&self) -> &Arc<dyn Posterior> {
        &self.severity
    }

    fn both_analytical(&self) -> bool {
        self.frequency.capabilities().analytical && self.severity.capabilities().analytical
    }

    fn draws(&self) -> &[f64] {
        self.cache.get_or_fill(|rng, n| self.sample(n, rng))
    }
}

impl Posterior for CompoundPosterior {
    fn family(&self) -> String {
        "compound".to_string()
    }

    fn capabilities(&self) -> PosteriorCapabilities {
        let severity = self.severity.capabilities();
        PosteriorCapabilities {
            analytical: self.both_analytical(),
            parameter_sampling: severity.parameter_sampling
                && self.frequency.capabilities().parameter_sampling,
            log_pdf: severity.log_pdf,
        }
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        let f = self.frequency.sample(n, rng);
        let s = self.severity.sample(n, rng);
        f.iter().zip(&s).map(|(a, b)| a * b).collect()
    }

    fn mean(&self) -> Option<f64> {
        if self.both_analytical() {
            return Some(self.frequency.mean()? * self.severity.mean()?);
        }
        mc_moments(self.draws()).map(|m| m.mean)
    }

    /// Var[FS] = E[F]²Var[S] + E[S]²Var[F] + Var[F]Var[S] for independent F, S.
    fn variance(&self) -> Option<f64> {
        if self.both_analytical() {
            let (mf, vf) = (self.frequency.mean()?, self.frequency.variance()?);
            let (ms, vs) = (self.severity.mean()?, self.severity.variance()?);
            return Some(mf * mf * vs + ms * ms * vf + vf * vs);
        }
        mc_moments(self.draws()).map(|m| m.variance)
    }

    fn credible_interval(&self, level: f64) -> Option<(f64, f64)> {
        mc_interval(self.draws(), level)
    }

    /// Plug-in zero-inflated density: (1 - E[F]) at zero, E[F]·p_S(x) elsewhere.
    fn log_pdf(&self, x: f64) -> Option<f64> {
        let p = self.frequency.mean()?;
        if x == 0.0 {
            Some((1.0 - p).ln())
        } else {
            Some(p.ln() + self.severity.log_pdf(x)?)
        }
    }

    fn sample_parameters(&self, rng: &mut dyn RngCore) -> Option<ParameterDraw> {
        let p = match self.frequency.sample_parameters(rng)? {
            ParameterDraw::Bernoulli { p } => p,
            _ => return None,
        };
        let severity = self.severity.sample_parameters(rng)?;
        Some(ParameterDraw::ZeroInflated {
            p,
            severity: Box::new(severity),
        })
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (k, v) in self.frequency.parameters() {
            out.insert(format!("conversion.{k}"), v);
        }
        for (k, v) in self.severity.parameters() {
            out.insert(format!("value.{k}"), v);
        }
        out
    }

    fn components(&self) -> Option<Vec<super::posterior::ComponentSummary>> {
        self.severity.components()
    }

    fn decomposition(&self) -> Option<Decomposition> {
        Some(Decomposition {
            conversion_rate: self.frequency.summary(),
            value: self.severity.summary(),
            value_components: self.severity.components(),
            mean: self.mean(),
            variance: self.variance(),
        })
    }
}

/// Engine for `compound` configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompoundEngine;

impl CompoundEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Options for one part: the prior is kept only if its family fits.
fn part_options(options: &FitOptions, accepts: &[PriorFamily]) -> FitOptions {
    match &options.prior_params {
        Some(p) if !accepts.contains(&p.distribution) => options.without_prior(),
        _ => options.clone(),
    }
}

impl InferenceEngine for CompoundEngine {
    fn name(&self) -> &'static str {
        "compound"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            structures: vec![Structure::Compound],
            families: vec![Family::Normal, Family::LogNormal],
            data_types: vec![DataKind::UserLevel],
            min_components: 1,
            max_components: None,
            exact: false,
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
        if config.value_family() == Family::Gamma {
            return Err(Error::NotImplemented(
                "gamma value models are not available".into(),
            ));
        }
        self.capabilities().check(self.name(), config, data.kind())?;

        let positives = data.positive_values();
        if positives.is_empty() {
            return Err(Error::InsufficientData(
                "no converted user has a positive value".into(),
            ));
        }

        let run = FitRun::start(self.name(), options);
        let excluded = data.non_zero_values().len() - positives.len();
        let mut warnings = Vec::new();
        if excluded > 0 {
            tracing::warn!(
                target: event_names::FIT_VALUES_EXCLUDED,
                parent: run.span(),
                excluded = excluded as u64,
                "severity ignores non-positive values"
            );
            warnings.push(format!(
                "{excluded} negative values excluded from the severity fit"
            ));
        }
        let frequency_data = {
            let counts = data.to_binomial();
            StandardData::binomial(counts.successes, counts.trials)?
        };
        let frequency = BetaBinomialConjugate.fit(
            &frequency_data,
            &ModelConfig::simple(Family::Beta, 1),
            &part_options(options, &[PriorFamily::Beta]),
        )?;

        let value_config = ModelConfig::simple(config.value_family(), config.components());
        let value_engine = EngineKind::for_config(&value_config)?.instantiate();
        let value_options = FitOptions {
            seed: options.seed.map(|s| s.wrapping_add(1)),
            ..part_options(options, &[PriorFamily::NormalInverseGamma, PriorFamily::Dirichlet])
        };
        let severity = value_engine.fit(&StandardData::from_values(&positives)?, &value_config, &value_options)?;

        let posterior = CompoundPosterior::new(
            frequency.posterior.clone(),
            severity.posterior.clone(),
            options.derive_seed(u64::MAX),
        );
        let used_components = severity.metadata.config.components();
        let diagnostics = Diagnostics {
            model_type: "compound".to_string(),
            converged: frequency.diagnostics.converged && severity.diagnostics.converged,
            iterations: frequency
                .diagnostics
                .iterations
                .max(severity.diagnostics.iterations),
            elbo_history: Vec::new(),
            likelihood_history: Vec::new(),
            runtime_ms: run.elapsed_ms(),
            fallback: severity.diagnostics.fallback.clone(),
            warnings: warnings
                .into_iter()
                .chain(severity.diagnostics.warnings.iter().cloned())
                .collect(),
            frequency: Some(Box::new(frequency.diagnostics)),
            severity: Some(Box::new(severity.diagnostics)),
        };
        Ok(run.finish(
            Arc::new(posterior),
            diagnostics,
            AlgorithmKind::Compound,
            ModelConfig::compound(config.value_family(), used_components),
            self.capabilities(),
            data.quality(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriorParams;
    use ab_common::{ErrorKind, UserRecord};

    fn zero_inflated(n: usize) -> StandardData {
        let users = (0..n)
            .map(|i| {
                if i % 4 == 0 {
                    UserRecord::new(true, 10.0 + (i % 13) as f64)
                } else {
                    UserRecord::new(false, 0.0)
                }
            })
            .collect();
        StandardData::user_level(users).unwrap()
    }

    #[test]
    fn splits_frequency_and_value() {
        let data = zero_inflated(400);
        let result = CompoundEngine
            .fit(&data, &ModelConfig::compound(Family::LogNormal, 1), &FitOptions::default().with_seed(3))
            .unwrap();
        assert_eq!(result.diagnostics.model_type, "compound");
        assert_eq!(result.metadata.algorithm, AlgorithmKind::Compound);
        let decomposition = result.posterior.decomposition().unwrap();
        assert_eq!(decomposition.conversion_rate.family, "beta");
        assert_eq!(decomposition.value.family, "lognormal");
        let p = decomposition.conversion_rate.mean.unwrap();
        assert!((p - 0.25).abs() < 0.01);
        let freq_diag = result.diagnostics.frequency.as_ref().unwrap();
        assert_eq!(freq_diag.model_type, "beta");
    }

    #[test]
    fn mean_is_product_of_parts() {
        let data = zero_inflated(2000);
        let result = CompoundEngine
            .fit(&data, &ModelConfig::compound(Family::LogNormal, 1), &FitOptions::default().with_seed(5))
            .unwrap();
        let d = result.posterior.decomposition().unwrap();
        let expected = d.conversion_rate.mean.unwrap() * d.value.mean.unwrap();
        let mean = result.posterior.mean().unwrap();
        assert!((mean / expected - 1.0).abs() < 0.05, "{mean} vs {expected}");
    }

    #[test]
    fn negative_values_are_reported_as_excluded() {
        let mut users: Vec<UserRecord> = (0..40).map(|i| UserRecord::new(true, 5.0 + i as f64)).collect();
        users.extend([UserRecord::new(true, -3.0), UserRecord::new(true, -1.5)]);
        users.extend(vec![UserRecord::new(false, 0.0); 20]);
        let data = StandardData::user_level(users).unwrap();
        let result = CompoundEngine
            .fit(&data, &ModelConfig::compound(Family::Normal, 1), &FitOptions::default().with_seed(1))
            .unwrap();
        assert!(result
            .diagnostics
            .warnings
            .iter()
            .any(|w| w.starts_with("2 negative values excluded")));
    }

    #[test]
    fn no_positive_values_is_insufficient_data() {
        let users = vec![UserRecord::new(false, 0.0), UserRecord::new(true, 0.0)];
        let data = StandardData::user_level(users).unwrap();
        let err = CompoundEngine
            .fit(&data, &ModelConfig::compound(Family::LogNormal, 1), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn gamma_value_is_not_implemented() {
        let err = CompoundEngine
            .fit(&zero_inflated(40), &ModelConfig::compound(Family::Gamma, 1), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn binomial_data_is_model_mismatch() {
        let data = StandardData::binomial(5, 10).unwrap();
        let err = CompoundEngine
            .fit(&data, &ModelConfig::compound(Family::LogNormal, 1), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelMismatch);
    }

    #[test]
    fn beta_prior_goes_to_frequency_only() {
        let opts = FitOptions::default().with_prior(PriorParams::beta(1.0, 9.0));
        let result = CompoundEngine
            .fit(&zero_inflated(100), &ModelConfig::compound(Family::LogNormal, 1), &opts)
            .unwrap();
        let d = result.posterior.decomposition().unwrap();
        // 25 conversions out of 100 on Beta(1, 9)
        assert_eq!(d.conversion_rate.parameters["alpha"], 26.0);
        assert_eq!(d.conversion_rate.parameters["beta"], 84.0);
    }

    #[test]
    fn zero_inflated_log_pdf() {
        let result = CompoundEngine
            .fit(&zero_inflated(400), &ModelConfig::compound(Family::LogNormal, 1), &FitOptions::default())
            .unwrap();
        let p = result.posterior.decomposition().unwrap().conversion_rate.mean.unwrap();
        let at_zero = result.posterior.log_pdf(0.0).unwrap();
        assert!((at_zero - (1.0 - p).ln()).abs() < 1e-12);
        assert!(result.posterior.log_pdf(15.0).unwrap().is_finite());
    }
}
