//! Normal-Inverse-Gamma posteriors shared by the Normal and LogNormal engines.
//!
//! LogNormal is the Normal model applied to ln x, so both engines carry the
//! same parameter posterior and differ only in the [`Scale`] that maps
//! between data and model space.

use std::collections::BTreeMap;
use std::fmt;

use ab_common::data::DataKind;
use ab_common::{Error, Family, ModelConfig, Result, StandardData, Structure};
use ab_math::{lognormal_log_pdf, lognormal_mean, lognormal_var, normal_log_pdf};
use ab_math::{NigParams, SufficientStats};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::FitOptions;
use crate::inference::engine::{
    AlgorithmKind, ConjugateEngine, Diagnostics, EngineCapabilities, FitRun, InferenceResult,
};
use crate::inference::posterior::{ParameterDraw, Posterior, PosteriorCapabilities};
use crate::inference::sampling::{
    mc_interval, mc_moments, sample_nig, sample_nig_predictive, SampleCache,
};
use crate::logging::event_names;

/// Mapping between data values and the scale the Normal model lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    Log,
}

impl Scale {
    pub fn family(self) -> Family {
        match self {
            Scale::Linear => Family::Normal,
            Scale::Log => Family::LogNormal,
        }
    }

    /// Model-scale value, NaN where the data value is outside the support.
    pub fn to_model(self, x: f64) -> f64 {
        match self {
            Scale::Linear => x,
            Scale::Log if x > 0.0 => x.ln(),
            Scale::Log => f64::NAN,
        }
    }

    pub fn from_model(self, y: f64) -> f64 {
        match self {
            Scale::Linear => y,
            Scale::Log => y.exp(),
        }
    }

    /// Values a fit on this scale uses: all finite values, or the positive
    /// values of converted users for the log scale.
    pub fn fit_values(self, data: &StandardData) -> Vec<f64> {
        match self {
            Scale::Linear => data.values(),
            Scale::Log => data.positive_values(),
        }
    }

    /// Data-scale density of `x` under N(μ, σ²) on the model scale.
    pub fn log_density(self, x: f64, mu: f64, sigma2: f64) -> f64 {
        match self {
            Scale::Linear => normal_log_pdf(x, mu, sigma2),
            Scale::Log => lognormal_log_pdf(x, mu, sigma2),
        }
    }

    /// ln |dy/dx| correction from model-scale to data-scale densities.
    pub fn log_jacobian(self, x: f64) -> f64 {
        match self {
            Scale::Linear => 0.0,
            Scale::Log if x > 0.0 => -x.ln(),
            Scale::Log => f64::NEG_INFINITY,
        }
    }

    pub fn draw(self, mu: f64, sigma2: f64) -> ParameterDraw {
        match self {
            Scale::Linear => ParameterDraw::Normal { mu, sigma2 },
            Scale::Log => ParameterDraw::LogNormal { mu, sigma2 },
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.family())
    }
}

/// Posterior of (μ, σ²) plus the predictive distribution it implies.
///
/// Predictive mean, variance and intervals are Monte-Carlo estimates from a
/// cached buffer of draws. `log_pdf` is the plug-in density at the
/// posterior mean parameters.
#[derive(Debug, Clone)]
pub struct NigPosterior {
    params: NigParams,
    prior: NigParams,
    scale: Scale,
    cache: SampleCache,
}

impl PartialEq for NigPosterior {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.prior == other.prior && self.scale == other.scale
    }
}

impl NigPosterior {
    pub fn new(params: NigParams, prior: NigParams, scale: Scale, seed: u64) -> Self {
        Self {
            params,
            prior,
            scale,
            cache: SampleCache::new(seed),
        }
    }

    pub fn params(&self) -> &NigParams {
        &self.params
    }

    pub fn prior(&self) -> &NigParams {
        &self.prior
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Plug-in (μ, σ²) on the model scale.
    pub fn point_estimate(&self) -> (f64, f64) {
        (self.params.mean_mu(), self.params.plug_in_sigma2())
    }

    /// Data-scale mean of the plug-in component density.
    pub fn component_mean(&self) -> f64 {
        let (mu, sigma2) = self.point_estimate();
        match self.scale {
            Scale::Linear => mu,
            Scale::Log => lognormal_mean(mu, sigma2),
        }
    }

    /// Data-scale variance of the plug-in component density.
    pub fn component_variance(&self) -> f64 {
        let (mu, sigma2) = self.point_estimate();
        match self.scale {
            Scale::Linear => sigma2,
            Scale::Log => lognormal_var(mu, sigma2),
        }
    }

    /// E_q[ln p(x | μ, σ²)] for a data-scale `x`.
    pub fn expected_log_likelihood(&self, x: f64) -> f64 {
        let y = self.scale.to_model(x);
        if !y.is_finite() {
            return f64::NEG_INFINITY;
        }
        self.params.expected_log_likelihood(y) + self.scale.log_jacobian(x)
    }

    /// KL(posterior ‖ prior) over (μ, σ²).
    pub fn kl_to_prior(&self) -> f64 {
        self.params.kl_divergence(&self.prior)
    }

    fn draws(&self) -> &[f64] {
        let (params, scale) = (self.params, self.scale);
        self.cache.get_or_fill(|rng, n| {
            (0..n)
                .map(|_| scale.from_model(sample_nig_predictive(rng, &params)))
                .collect()
        })
    }
}

impl Posterior for NigPosterior {
    fn family(&self) -> String {
        self.scale.family().to_string()
    }

    fn capabilities(&self) -> PosteriorCapabilities {
        PosteriorCapabilities {
            analytical: false,
            parameter_sampling: true,
            log_pdf: true,
        }
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        (0..n)
            .map(|_| self.scale.from_model(sample_nig_predictive(rng, &self.params)))
            .collect()
    }

    fn mean(&self) -> Option<f64> {
        mc_moments(self.draws()).map(|m| m.mean)
    }

    fn variance(&self) -> Option<f64> {
        mc_moments(self.draws()).map(|m| m.variance)
    }

    fn credible_interval(&self, level: f64) -> Option<(f64, f64)> {
        mc_interval(self.draws(), level)
    }

    fn log_pdf(&self, x: f64) -> Option<f64> {
        let (mu, sigma2) = self.point_estimate();
        Some(self.scale.log_density(x, mu, sigma2))
    }

    fn sample_parameters(&self, rng: &mut dyn RngCore) -> Option<ParameterDraw> {
        let (mu, sigma2) = sample_nig(rng, &self.params);
        Some(self.scale.draw(mu, sigma2))
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        let p = &self.params;
        let mut out = BTreeMap::from([
            ("mu0".to_string(), p.mu0),
            ("lambda".to_string(), p.lambda),
            ("alpha".to_string(), p.alpha),
            ("beta".to_string(), p.beta),
            ("mean_mu".to_string(), p.mean_mu()),
        ]);
        let sigma2 = p.mean_sigma2();
        if sigma2.is_finite() {
            out.insert("mean_sigma2".to_string(), sigma2);
        }
        out
    }
}

/// Conjugate engines over a Normal-Inverse-Gamma prior.
///
/// The VBEM driver is generic over this trait.
pub trait NigFamily:
    ConjugateEngine<Prior = NigParams, Posterior = NigPosterior> + Default + Clone + 'static
{
    const SCALE: Scale;
}

pub(crate) fn nig_capabilities(family: Family) -> EngineCapabilities {
    EngineCapabilities {
        structures: vec![Structure::Simple],
        families: vec![family],
        data_types: vec![DataKind::UserLevel],
        min_components: 1,
        max_components: Some(1),
        exact: true,
        fast: true,
        stable: true,
    }
}

pub(crate) fn nig_stats(
    scale: Scale,
    values: &[f64],
    weights: Option<&[f64]>,
) -> Result<SufficientStats> {
    let model: Vec<f64> = values.iter().map(|x| scale.to_model(*x)).collect();
    match weights {
        None => Ok(SufficientStats::from_values(&model)),
        Some(w) => SufficientStats::weighted(&model, w).ok_or_else(|| {
            Error::InvalidData(format!(
                "weights must be finite, non-negative and match {} values (got {})",
                values.len(),
                w.len()
            ))
        }),
    }
}

pub(crate) fn nig_update(
    scale: Scale,
    prior: &NigParams,
    stats: &SufficientStats,
    seed: u64,
) -> Result<NigPosterior> {
    let params = prior.update(stats).ok_or_else(|| {
        Error::Internal(format!(
            "normal-inverse-gamma update produced invalid parameters (n = {})",
            stats.n
        ))
    })?;
    Ok(NigPosterior::new(params, *prior, scale, seed))
}

/// Shared `fit` body of the Normal and LogNormal engines.
pub(crate) fn nig_fit<E: NigFamily>(
    engine: &E,
    data: &StandardData,
    config: &ModelConfig,
    options: &FitOptions,
) -> Result<InferenceResult> {
    let scale = E::SCALE;
    data.validate()?;
    config.validate()?;
    engine.capabilities().check(engine.name(), config, data.kind())?;
    let prior = engine.prior(options)?;
    let values = scale.fit_values(data);
    if values.is_empty() {
        return Err(Error::InsufficientData(format!(
            "{} model needs at least one {} value",
            scale.family(),
            if scale == Scale::Log { "positive" } else { "finite" }
        )));
    }

    let run = FitRun::start(engine.name(), options);
    let stats = engine.stats(&values, None)?;
    let posterior = engine.update(&prior, &stats, options.derive_seed(0))?;
    tracing::debug!(
        target: event_names::FIT_UPDATE,
        parent: run.span(),
        n = stats.n,
        mean = stats.mean,
        mu0 = posterior.params.mu0,
        lambda = posterior.params.lambda,
        alpha = posterior.params.alpha,
        beta = posterior.params.beta,
        "normal-inverse-gamma update"
    );
    let diagnostics = Diagnostics::exact(scale.family().to_string(), run.elapsed_ms());
    Ok(run.finish(
        std::sync::Arc::new(posterior),
        diagnostics,
        AlgorithmKind::Conjugate,
        *config,
        engine.capabilities(),
        data.quality(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_scale_maps_non_positive_to_nan() {
        assert!(Scale::Log.to_model(0.0).is_nan());
        assert!((Scale::Log.to_model(std::f64::consts::E) - 1.0).abs() < 1e-12);
        assert_eq!(Scale::Linear.to_model(-3.0), -3.0);
    }

    #[test]
    fn expected_log_likelihood_includes_jacobian() {
        let params = NigParams::new(0.0, 10.0, 5.0, 4.0).unwrap();
        let linear = NigPosterior::new(params, params, Scale::Linear, 1);
        let log = NigPosterior::new(params, params, Scale::Log, 1);
        let x: f64 = 2.0;
        let diff = log.expected_log_likelihood(x) - linear.expected_log_likelihood(x.ln());
        assert!((diff + x.ln()).abs() < 1e-12);
        assert_eq!(log.expected_log_likelihood(-1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn mc_moments_are_cached_and_stable() {
        let params = NigParams::new(5.0, 100.0, 50.0, 49.0).unwrap();
        let post = NigPosterior::new(params, NigParams::weakly_informative(), Scale::Linear, 9);
        let m1 = post.mean().unwrap();
        let m2 = post.mean().unwrap();
        assert_eq!(m1, m2);
        assert!((m1 - 5.0).abs() < 0.05);
        // predictive variance ≈ E[σ²](1 + 1/λ) ≈ 1.01
        assert!((post.variance().unwrap() - 1.01).abs() < 0.1);
        let (lo, hi) = post.credible_interval(0.95).unwrap();
        assert!(lo < m1 && m1 < hi);
    }

    #[test]
    fn parameters_skip_infinite_sigma_mean() {
        let params = NigParams::new(0.0, 1.0, 0.5, 1.0).unwrap();
        let post = NigPosterior::new(params, params, Scale::Linear, 0);
        assert!(!post.parameters().contains_key("mean_sigma2"));
        assert!(post.parameters().contains_key("mu0"));
    }
}
