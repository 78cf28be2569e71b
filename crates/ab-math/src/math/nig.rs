//! Normal-Inverse-Gamma (NIG) conjugate math for a Normal likelihood with
//! unknown mean and variance.
//!
//! Model:
//! - `σ² ~ InverseGamma(α, β)`
//! - `μ | σ² ~ Normal(μ₀, σ²/λ)`
//! - `x | μ, σ² ~ Normal(μ, σ²)`
//!
//! Update from sufficient statistics (n, Σx, Σx², x̄):
//! - `λ' = λ + n`
//! - `μ₀' = (λμ₀ + n x̄) / λ'`
//! - `α' = α + n/2`
//! - `β' = β + ½ Σ(x - x̄)² + ½ (λn/λ') (x̄ - μ₀)²`
//!
//! Weighted statistics (fractional n) go through the same update, which is
//! how soft assignments from a mixture E-step are absorbed.

use serde::{Deserialize, Serialize};

use super::gamma::{inv_gamma_expected_log, inv_gamma_mean, inv_gamma_mode};
use super::stable::{digamma, log_gamma, LOG_SQRT_2PI};

/// Parameters of a Normal-Inverse-Gamma distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NigParams {
    /// Location of μ
    pub mu0: f64,
    /// Pseudo-observations behind μ₀ (> 0)
    pub lambda: f64,
    /// Inverse-Gamma shape (> 0)
    pub alpha: f64,
    /// Inverse-Gamma scale (> 0)
    pub beta: f64,
}

impl NigParams {
    /// Create validated NIG parameters.
    ///
    /// Returns None unless μ₀ is finite and λ, α, β are finite and positive.
    pub fn new(mu0: f64, lambda: f64, alpha: f64, beta: f64) -> Option<Self> {
        if !mu0.is_finite() {
            return None;
        }
        for v in [lambda, alpha, beta] {
            if !v.is_finite() || v <= 0.0 {
                return None;
            }
        }
        Some(Self {
            mu0,
            lambda,
            alpha,
            beta,
        })
    }

    /// NIG(μ₀=0, λ=0.01, α=1, β=1).
    pub fn weakly_informative() -> Self {
        Self {
            mu0: 0.0,
            lambda: 0.01,
            alpha: 1.0,
            beta: 1.0,
        }
    }

    /// Conjugate update with (possibly weighted) sufficient statistics.
    ///
    /// An empty statistic (n == 0) returns the parameters unchanged.
    pub fn update(&self, stats: &SufficientStats) -> Option<Self> {
        if !stats.n.is_finite() || stats.n < 0.0 {
            return None;
        }
        if stats.n == 0.0 {
            return Some(*self);
        }
        let n = stats.n;
        let xbar = stats.mean;
        let lambda_post = self.lambda + n;
        let mu0_post = (self.lambda * self.mu0 + n * xbar) / lambda_post;
        let alpha_post = self.alpha + 0.5 * n;
        let shrink = 0.5 * (self.lambda * n / lambda_post) * (xbar - self.mu0).powi(2);
        let beta_post = self.beta + 0.5 * stats.scatter() + shrink;
        Self::new(mu0_post, lambda_post, alpha_post, beta_post)
    }

    /// Posterior mean of μ.
    pub fn mean_mu(&self) -> f64 {
        self.mu0
    }

    /// Posterior mean of σ²; infinite when α <= 1.
    pub fn mean_sigma2(&self) -> f64 {
        inv_gamma_mean(self.alpha, self.beta)
    }

    /// Point estimate of σ² used for plug-in densities: the mean when it
    /// exists, otherwise the mode.
    pub fn plug_in_sigma2(&self) -> f64 {
        if self.alpha > 1.0 {
            inv_gamma_mean(self.alpha, self.beta)
        } else {
            inv_gamma_mode(self.alpha, self.beta)
        }
    }

    /// Marginal variance of μ: β / ((α - 1) λ), infinite when α <= 1.
    pub fn variance_mu(&self) -> f64 {
        if self.alpha <= 1.0 {
            return f64::INFINITY;
        }
        self.beta / ((self.alpha - 1.0) * self.lambda)
    }

    /// E_q[ln N(x | μ, σ²)] under this NIG.
    ///
    /// `-½ln2π - ½(ln β - ψ(α)) - ½((x - μ₀)² α/β + 1/λ)`
    pub fn expected_log_likelihood(&self, x: f64) -> f64 {
        let d = x - self.mu0;
        -LOG_SQRT_2PI
            - 0.5 * inv_gamma_expected_log(self.alpha, self.beta)
            - 0.5 * (d * d * self.alpha / self.beta + 1.0 / self.lambda)
    }

    /// KL(self ‖ prior).
    ///
    /// Splits into the Inverse-Gamma KL on σ² plus the expected Normal KL on
    /// μ given σ², using E[1/σ²] = α/β.
    pub fn kl_divergence(&self, prior: &NigParams) -> f64 {
        let (a, b) = (self.alpha, self.beta);
        let (a0, b0) = (prior.alpha, prior.beta);
        let kl_sigma = (a - a0) * digamma(a) - log_gamma(a) + log_gamma(a0)
            + a0 * (b.ln() - b0.ln())
            + a * (b0 - b) / b;
        let ratio = prior.lambda / self.lambda;
        let d = self.mu0 - prior.mu0;
        let kl_mu = 0.5 * (ratio - ratio.ln() - 1.0 + prior.lambda * d * d * a / b);
        kl_sigma + kl_mu
    }
}

impl Default for NigParams {
    fn default() -> Self {
        Self::weakly_informative()
    }
}

/// Sufficient statistics of a (possibly weighted) sample.
///
/// `n` is the total weight, so it is fractional for soft assignments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SufficientStats {
    pub n: f64,
    pub sum: f64,
    pub sum_sq: f64,
    pub mean: f64,
}

impl SufficientStats {
    /// Statistics of an empty sample.
    pub fn empty() -> Self {
        Self {
            n: 0.0,
            sum: 0.0,
            sum_sq: 0.0,
            mean: 0.0,
        }
    }

    /// Unweighted statistics. Non-finite values are skipped.
    pub fn from_values(values: &[f64]) -> Self {
        let mut n = 0.0;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for &x in values.iter().filter(|x| x.is_finite()) {
            n += 1.0;
            sum += x;
            sum_sq += x * x;
        }
        Self::from_parts(n, sum, sum_sq)
    }

    /// Statistics over ln x for the strictly positive values.
    pub fn on_log_scale(values: &[f64]) -> Self {
        let logs: Vec<f64> = values
            .iter()
            .filter(|x| x.is_finite() && **x > 0.0)
            .map(|x| x.ln())
            .collect();
        Self::from_values(&logs)
    }

    /// Weighted statistics Σw, Σw·x, Σw·x².
    ///
    /// Returns None on a length mismatch or a negative/non-finite weight.
    pub fn weighted(values: &[f64], weights: &[f64]) -> Option<Self> {
        if values.len() != weights.len() {
            return None;
        }
        let mut n = 0.0;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for (&x, &w) in values.iter().zip(weights.iter()) {
            if !w.is_finite() || w < 0.0 {
                return None;
            }
            if w == 0.0 || !x.is_finite() {
                continue;
            }
            n += w;
            sum += w * x;
            sum_sq += w * x * x;
        }
        Some(Self::from_parts(n, sum, sum_sq))
    }

    /// Assemble statistics from raw totals.
    pub fn from_parts(n: f64, sum: f64, sum_sq: f64) -> Self {
        let mean = if n > 0.0 { sum / n } else { 0.0 };
        Self {
            n,
            sum,
            sum_sq,
            mean,
        }
    }

    /// Σ(x - x̄)², clamped at zero against cancellation.
    pub fn scatter(&self) -> f64 {
        (self.sum_sq - self.sum * self.mean).max(0.0)
    }

    /// Biased (1/n) variance of the sample; 0 when empty.
    pub fn variance(&self) -> f64 {
        if self.n > 0.0 {
            self.scatter() / self.n
        } else {
            0.0
        }
    }
}
