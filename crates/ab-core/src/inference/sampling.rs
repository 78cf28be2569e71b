//! Random draws and cached Monte-Carlo buffers.
//!
//! Every sampler takes `&mut dyn RngCore` so posteriors stay object-safe.
//! Distribution objects come from `rand_distr`; parameters reaching these
//! helpers were validated at posterior construction, so a rejected
//! parameter yields NaN rather than an error.

use std::sync::OnceLock;

use ab_math::stats;
use ab_math::{BetaParams, NigParams};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand::distr::weighted::WeightedIndex;
use rand_distr::{Beta, Distribution, Gamma, Normal};

/// Size of the cached Monte-Carlo buffer behind MC moments and intervals.
pub const MC_BUFFER_SIZE: usize = 10_000;

/// Draw p ~ Beta(α, β).
pub fn sample_beta(rng: &mut dyn RngCore, params: &BetaParams) -> f64 {
    Beta::new(params.alpha, params.beta)
        .map(|d| d.sample(rng))
        .unwrap_or(f64::NAN)
}

/// Draw σ² ~ InverseGamma(α, β) as the reciprocal of Gamma(α, rate β).
pub fn sample_inverse_gamma(rng: &mut dyn RngCore, alpha: f64, beta: f64) -> f64 {
    // rand_distr uses shape-scale, so scale = 1/rate
    Gamma::new(alpha, 1.0 / beta)
        .map(|d| 1.0 / d.sample(rng))
        .unwrap_or(f64::NAN)
}

pub fn sample_normal(rng: &mut dyn RngCore, mu: f64, sigma2: f64) -> f64 {
    Normal::new(mu, sigma2.sqrt())
        .map(|d| d.sample(rng))
        .unwrap_or(f64::NAN)
}

/// Draw (μ, σ²) from a Normal-Inverse-Gamma.
pub fn sample_nig(rng: &mut dyn RngCore, params: &NigParams) -> (f64, f64) {
    let sigma2 = sample_inverse_gamma(rng, params.alpha, params.beta);
    let mu = sample_normal(rng, params.mu0, sigma2 / params.lambda);
    (mu, sigma2)
}

/// Posterior predictive draw: (μ, σ²) from the NIG, then x ~ N(μ, σ²).
pub fn sample_nig_predictive(rng: &mut dyn RngCore, params: &NigParams) -> f64 {
    let (mu, sigma2) = sample_nig(rng, params);
    sample_normal(rng, mu, sigma2)
}

/// Draw weights ~ Dirichlet(α) by normalizing independent Gamma(α_k, 1) draws.
pub fn sample_dirichlet(rng: &mut dyn RngCore, alpha: &[f64]) -> Vec<f64> {
    let draws: Vec<f64> = alpha
        .iter()
        .map(|&a| Gamma::new(a, 1.0).map(|d| d.sample(rng)).unwrap_or(f64::NAN))
        .collect();
    let total: f64 = draws.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        let k = alpha.len().max(1) as f64;
        return vec![1.0 / k; alpha.len()];
    }
    draws.into_iter().map(|g| g / total).collect()
}

/// Index drawn with probability proportional to `weights`; the last index
/// when the weights are all zero or invalid.
pub fn sample_categorical(rng: &mut dyn RngCore, weights: &[f64]) -> usize {
    WeightedIndex::<f64>::new(weights.iter().copied())
        .map(|d| d.sample(rng))
        .unwrap_or_else(|_| weights.len().saturating_sub(1))
}

/// Lazily filled, seeded buffer of posterior draws.
///
/// The buffer is filled once on first use and never invalidated; the seed
/// makes repeated moment queries on one posterior return identical values.
#[derive(Debug)]
pub struct SampleCache {
    seed: u64,
    buffer: OnceLock<Vec<f64>>,
}

impl SampleCache {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            buffer: OnceLock::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The cached draws, produced by `draw` on first access.
    pub fn get_or_fill<F>(&self, draw: F) -> &[f64]
    where
        F: FnOnce(&mut dyn RngCore, usize) -> Vec<f64>,
    {
        self.buffer.get_or_init(|| {
            let mut rng = StdRng::seed_from_u64(self.seed);
            draw(&mut rng, MC_BUFFER_SIZE)
        })
    }
}

impl Clone for SampleCache {
    fn clone(&self) -> Self {
        let buffer = OnceLock::new();
        if let Some(v) = self.buffer.get() {
            let _ = buffer.set(v.clone());
        }
        Self {
            seed: self.seed,
            buffer,
        }
    }
}

/// Summary of a Monte-Carlo buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McMoments {
    pub mean: f64,
    pub variance: f64,
}

/// Mean and sample variance of the finite draws; None when fewer than two.
pub fn mc_moments(draws: &[f64]) -> Option<McMoments> {
    let finite = draws.iter().filter(|v| v.is_finite()).count();
    if finite < 2 {
        return None;
    }
    Some(McMoments {
        mean: stats::mean(draws),
        variance: stats::variance(draws),
    })
}

/// Equal-tailed empirical interval at `level`.
pub fn mc_interval(draws: &[f64], level: f64) -> Option<(f64, f64)> {
    if !(level > 0.0 && level < 1.0) {
        return None;
    }
    let sorted = stats::sorted_finite(draws);
    if sorted.is_empty() {
        return None;
    }
    let tail = (1.0 - level) / 2.0;
    let lo = stats::quantile_sorted(&sorted, tail);
    let hi = stats::quantile_sorted(&sorted, 1.0 - tail);
    Some((lo.min(hi), hi.max(lo)))
}
