//! Widely Applicable Information Criterion with adaptive subsampling.
//!
//! For each retained point and S parameter draws θ_s:
//!
//! ```text
//! lppd_i   = ln( (1/S) Σ_s p(x_i | θ_s) )
//! p_waic_i = Var_s[ ln p(x_i | θ_s) ]
//! WAIC     = -2 (lppd - p_waic) / n
//! ```
//!
//! When points are subsampled only lppd is rescaled to the full sample;
//! p_waic measures model complexity and stays as computed. Binomial data
//! is scored from its counts and never expanded to one point per trial.

use ab_common::{Error, Result, StandardData};
use ab_math::{log_sum_exp, stats};
use rand::seq::index;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::inference::posterior::{ParameterDraw, Posterior};

/// Points retained when the sample is larger than this.
pub const MAX_WAIC_POINTS: usize = 1000;

/// How the pointwise predictive density was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaicMethod {
    /// Parameter draws; p_waic from the per-point variance.
    Sampling,
    /// Plug-in log likelihood only; p_waic is 0.
    Marginal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaicResult {
    /// Per-observation WAIC.
    pub waic: f64,
    /// Log pointwise predictive density, rescaled to `n_original` points.
    pub lppd: f64,
    pub p_waic: f64,
    pub elpd_waic: f64,
    pub n_original: usize,
    pub n_used: usize,
    pub param_draws: usize,
    pub subsampled: bool,
    pub method: WaicMethod,
}

/// Points and parameter draws used for a sample of size `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsamplePlan {
    pub n_used: usize,
    pub param_draws: usize,
}

impl SubsamplePlan {
    pub fn for_size(n: usize) -> Self {
        let (n_used, param_draws) = match n {
            0..=100 => (n, 200),
            101..=500 => (n, 100),
            501..=1000 => (n, 50),
            _ => (MAX_WAIC_POINTS, 50),
        };
        Self {
            n_used,
            param_draws,
        }
    }

    pub fn subsampled(&self, n: usize) -> bool {
        self.n_used < n
    }
}

/// The data a posterior is scored on.
#[derive(Debug, Clone, PartialEq)]
pub enum Observations {
    /// Finite user-level values, zeros included.
    Values(Vec<f64>),
    /// Binomial counts: `successes` ones among `trials` outcomes.
    Counts { successes: u64, trials: u64 },
}

impl Observations {
    pub fn len(&self) -> usize {
        match self {
            Observations::Values(v) => v.len(),
            Observations::Counts { trials, .. } => *trials as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// At most `m` points with the non-zero share of the full sample.
    pub fn points(&self, m: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        match self {
            Observations::Values(v) => stratified_subsample(v, m, rng),
            Observations::Counts { successes, trials } => {
                let m = m.min(*trials as usize);
                let ones = if *trials == 0 {
                    0
                } else {
                    ((m as f64 * *successes as f64 / *trials as f64).round() as usize)
                        .min(*successes as usize)
                };
                let mut out = vec![1.0; ones];
                out.resize(m, 0.0);
                out
            }
        }
    }

    /// Σ f(x) over every observation; counts weight f(1) and f(0).
    pub fn sum_by(&self, f: impl Fn(f64) -> f64) -> f64 {
        match self {
            Observations::Values(v) => v.iter().map(|&x| f(x)).sum(),
            Observations::Counts { successes, trials } => {
                let failures = trials - successes;
                let mut total = 0.0;
                if *successes > 0 {
                    total += *successes as f64 * f(1.0);
                }
                if failures > 0 {
                    total += failures as f64 * f(0.0);
                }
                total
            }
        }
    }
}

impl From<Vec<f64>> for Observations {
    fn from(values: Vec<f64>) -> Self {
        Observations::Values(values)
    }
}

/// Scoring view of the data a model was fitted to.
pub fn observations(data: &StandardData) -> Observations {
    match data.as_binomial() {
        Some(b) => Observations::Counts {
            successes: b.successes,
            trials: b.trials,
        },
        None => Observations::Values(data.values()),
    }
}

/// Stratified subsample of `m` values preserving the share of non-zero
/// values (the conversion rate for user-level data).
pub fn stratified_subsample(values: &[f64], m: usize, rng: &mut dyn RngCore) -> Vec<f64> {
    if m >= values.len() {
        return values.to_vec();
    }
    let (non_zero, zero): (Vec<f64>, Vec<f64>) = values.iter().partition(|v| **v != 0.0);
    let share = non_zero.len() as f64 / values.len() as f64;
    let take_non_zero = ((m as f64 * share).round() as usize).min(non_zero.len());
    let take_zero = (m - take_non_zero).min(zero.len());
    let mut out = choose(&non_zero, take_non_zero, rng);
    out.extend(choose(&zero, take_zero, rng));
    out
}

/// `k` values drawn without replacement.
fn choose(values: &[f64], k: usize, rng: &mut dyn RngCore) -> Vec<f64> {
    index::sample(rng, values.len(), k.min(values.len()))
        .into_iter()
        .map(|i| values[i])
        .collect()
}

/// WAIC of `posterior` on `observations`.
pub fn compute_waic(
    posterior: &dyn Posterior,
    observations: &Observations,
    rng: &mut dyn RngCore,
) -> Result<WaicResult> {
    let n_original = observations.len();
    if n_original == 0 {
        return Err(Error::InsufficientData("WAIC needs at least one observation".into()));
    }
    let plan = SubsamplePlan::for_size(n_original);
    let subsampled = plan.subsampled(n_original);
    let points = observations.points(plan.n_used, rng);
    let n_used = points.len();

    let caps = posterior.capabilities();
    let (lppd_used, p_waic, method, param_draws) = if caps.parameter_sampling {
        let draws: Vec<ParameterDraw> = (0..plan.param_draws)
            .map(|_| posterior.sample_parameters(rng))
            .collect::<Option<_>>()
            .ok_or_else(|| {
                Error::Internal(format!(
                    "{} posterior declared parameter sampling but returned no draw",
                    posterior.family()
                ))
            })?;
        let ln_s = (draws.len() as f64).ln();
        let mut lppd = 0.0;
        let mut p_waic = 0.0;
        let mut ll = vec![0.0; draws.len()];
        for &x in &points {
            for (slot, draw) in ll.iter_mut().zip(&draws) {
                *slot = draw.log_likelihood(x);
            }
            lppd += log_sum_exp(&ll) - ln_s;
            p_waic += stats::variance(&ll);
        }
        (lppd, p_waic, WaicMethod::Sampling, draws.len())
    } else if caps.log_pdf {
        let mut lppd = 0.0;
        for &x in &points {
            lppd += posterior.log_likelihood(x).unwrap_or(f64::NAN);
        }
        (lppd, 0.0, WaicMethod::Marginal, 0)
    } else {
        return Err(Error::ModelMismatch(format!(
            "{} posterior supports neither parameter sampling nor log densities",
            posterior.family()
        )));
    };

    let lppd = if subsampled {
        lppd_used * (n_original as f64 / n_used as f64)
    } else {
        lppd_used
    };
    let elpd_waic = lppd - p_waic;
    let waic = -2.0 * elpd_waic / n_original as f64;
    if !waic.is_finite() {
        return Err(Error::Internal(format!(
            "WAIC is not finite for the {} posterior (lppd {lppd}, p_waic {p_waic})",
            posterior.family()
        )));
    }
    Ok(WaicResult {
        waic,
        lppd,
        p_waic,
        elpd_waic,
        n_original,
        n_used,
        param_draws,
        subsampled,
        method,
    })
}
