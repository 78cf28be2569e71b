//! The posterior contract.
//!
//! Every fitted distribution implements [`Posterior`]. Optional analytical
//! forms are declared once through [`PosteriorCapabilities`] instead of being
//! probed method by method.

use std::collections::BTreeMap;
use std::fmt;

use ab_math::{log_sum_exp, lognormal_log_pdf, normal_log_pdf};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// What a posterior can compute without sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosteriorCapabilities {
    /// Closed-form mean, variance and credible interval.
    pub analytical: bool,
    /// `sample_parameters` returns draws with a likelihood.
    pub parameter_sampling: bool,
    /// `log_pdf` is available.
    pub log_pdf: bool,
}

/// One joint draw of a posterior's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ParameterDraw {
    Bernoulli {
        p: f64,
    },
    Normal {
        mu: f64,
        sigma2: f64,
    },
    LogNormal {
        mu: f64,
        sigma2: f64,
    },
    Mixture {
        weights: Vec<f64>,
        components: Vec<ParameterDraw>,
    },
    ZeroInflated {
        p: f64,
        severity: Box<ParameterDraw>,
    },
}

impl ParameterDraw {
    /// ln p(x | parameters).
    ///
    /// Bernoulli treats any non-zero `x` as a success.
    pub fn log_likelihood(&self, x: f64) -> f64 {
        match self {
            ParameterDraw::Bernoulli { p } => {
                if x != 0.0 {
                    p.ln()
                } else {
                    (1.0 - p).ln()
                }
            }
            ParameterDraw::Normal { mu, sigma2 } => normal_log_pdf(x, *mu, *sigma2),
            ParameterDraw::LogNormal { mu, sigma2 } => lognormal_log_pdf(x, *mu, *sigma2),
            ParameterDraw::Mixture {
                weights,
                components,
            } => {
                let terms: Vec<f64> = weights
                    .iter()
                    .zip(components)
                    .map(|(w, c)| w.ln() + c.log_likelihood(x))
                    .collect();
                log_sum_exp(&terms)
            }
            ParameterDraw::ZeroInflated { p, severity } => {
                if x == 0.0 {
                    (1.0 - p).ln()
                } else {
                    p.ln() + severity.log_likelihood(x)
                }
            }
        }
    }
}

/// Serializable snapshot of a posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummary {
    pub family: String,
    pub parameters: BTreeMap<String, f64>,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub credible_level: f64,
    pub credible_interval: Option<(f64, f64)>,
    pub analytical: bool,
}

/// One mixture component as seen by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub index: usize,
    pub family: String,
    pub mean: f64,
    pub variance: f64,
    pub weight: f64,
    pub weight_interval: (f64, f64),
    pub effective_count: f64,
    pub mu0: f64,
    pub lambda: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// Frequency and severity parts of a compound posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub conversion_rate: PosteriorSummary,
    pub value: PosteriorSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_components: Option<Vec<ComponentSummary>>,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
}

/// Credible level used by [`Posterior::summary`].
pub const SUMMARY_CREDIBLE_LEVEL: f64 = 0.95;

/// A fitted, immutable distribution.
pub trait Posterior: Send + Sync + fmt::Debug {
    /// Family label, e.g. `beta`, `lognormal`, `normal-mixture`, `compound`.
    fn family(&self) -> String;

    fn capabilities(&self) -> PosteriorCapabilities;

    /// Exactly `n` posterior predictive draws.
    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64>;

    fn mean(&self) -> Option<f64>;

    fn variance(&self) -> Option<f64>;

    /// Equal-tailed interval with `lower <= upper`.
    fn credible_interval(&self, level: f64) -> Option<(f64, f64)>;

    /// Log density of a value of what `sample` draws.
    fn log_pdf(&self, x: f64) -> Option<f64>;

    /// Plug-in log likelihood of one observation, used by BIC and the
    /// marginal WAIC path. Defaults to `log_pdf`.
    fn log_likelihood(&self, x: f64) -> Option<f64> {
        self.log_pdf(x)
    }

    fn sample_parameters(&self, _rng: &mut dyn RngCore) -> Option<ParameterDraw> {
        None
    }

    /// Named posterior parameters for summaries.
    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    fn components(&self) -> Option<Vec<ComponentSummary>> {
        None
    }

    fn decomposition(&self) -> Option<Decomposition> {
        None
    }

    fn summary(&self) -> PosteriorSummary {
        PosteriorSummary {
            family: self.family(),
            parameters: self.parameters(),
            mean: self.mean(),
            variance: self.variance(),
            credible_level: SUMMARY_CREDIBLE_LEVEL,
            credible_interval: self.credible_interval(SUMMARY_CREDIBLE_LEVEL),
            analytical: self.capabilities().analytical,
        }
    }
}
