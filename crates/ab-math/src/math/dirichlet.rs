//! Dirichlet distribution over mixture weights.
//!
//! The variational mixture posterior keeps `w = (w_1..w_K) ~ Dirichlet(α_1..α_K)`
//! where each α_k is a prior pseudo-count plus the effective number of points
//! softly assigned to component k:
//! - Prior: `w ~ Dirichlet(α⁰)`
//! - Update: `α_k = α⁰_k + Σ_i r_ik`
//!
//! The marginal of a single weight is `w_k ~ Beta(α_k, α_0 - α_k)`, which is
//! what per-weight credible intervals are computed from.

use serde::{Deserialize, Serialize};

use super::beta::BetaParams;
use super::stable::{digamma, log_gamma};

/// Parameters for a Dirichlet distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletParams {
    /// Concentration parameters (all must be > 0)
    pub alpha: Vec<f64>,
}

impl DirichletParams {
    /// Create new Dirichlet parameters with validation.
    ///
    /// Returns None if any parameter is non-positive, non-finite, or if the vector is empty.
    pub fn new(alpha: Vec<f64>) -> Option<Self> {
        if alpha.is_empty() {
            return None;
        }
        for &a in &alpha {
            if !a.is_finite() || a <= 0.0 {
                return None;
            }
        }
        Some(Self { alpha })
    }

    /// Create a symmetric Dirichlet with all α_i = value.
    pub fn symmetric(k: usize, value: f64) -> Option<Self> {
        if k == 0 || !value.is_finite() || value <= 0.0 {
            return None;
        }
        Some(Self {
            alpha: vec![value; k],
        })
    }

    /// Create a uniform Dirichlet prior with all α_i = 1.
    pub fn uniform(k: usize) -> Option<Self> {
        Self::symmetric(k, 1.0)
    }

    /// Number of components K.
    pub fn k(&self) -> usize {
        self.alpha.len()
    }

    /// Sum of all concentration parameters: α_0 = Σ_i α_i.
    pub fn concentration(&self) -> f64 {
        self.alpha.iter().sum()
    }

    /// E[w_i] = α_i / α_0.
    pub fn mean(&self) -> Vec<f64> {
        let sum = self.concentration();
        self.alpha.iter().map(|a| a / sum).collect()
    }

    /// Var[w_i] = α_i(α_0 - α_i) / (α_0²(α_0+1)).
    pub fn variance(&self, i: usize) -> f64 {
        if i >= self.alpha.len() {
            return f64::NAN;
        }
        let sum = self.concentration();
        let a_i = self.alpha[i];
        (a_i * (sum - a_i)) / (sum * sum * (sum + 1.0))
    }

    /// E[ln w_i] = ψ(α_i) - ψ(α_0).
    pub fn expected_log_weights(&self) -> Vec<f64> {
        let psi_sum = digamma(self.concentration());
        self.alpha.iter().map(|&a| digamma(a) - psi_sum).collect()
    }

    /// Marginal Beta(α_i, α_0 - α_i) of weight i.
    ///
    /// Returns None for an out-of-range index or a single-component Dirichlet
    /// (whose only weight is the constant 1).
    pub fn marginal(&self, i: usize) -> Option<BetaParams> {
        if i >= self.alpha.len() {
            return None;
        }
        let a_i = self.alpha[i];
        BetaParams::new(a_i, self.concentration() - a_i)
    }

    /// Equal-tailed credible interval for weight i from its Beta marginal.
    pub fn marginal_credible_interval(&self, i: usize, level: f64) -> (f64, f64) {
        if self.k() == 1 && i == 0 {
            return (1.0, 1.0);
        }
        match self.marginal(i) {
            Some(m) => m.credible_interval(level),
            None => (f64::NAN, f64::NAN),
        }
    }

    /// KL(self ‖ prior) between two Dirichlets of equal dimension.
    pub fn kl_divergence(&self, prior: &DirichletParams) -> f64 {
        if self.k() != prior.k() {
            return f64::NAN;
        }
        let a0 = self.concentration();
        let psi_a0 = digamma(a0);
        let mut kl = log_gamma(a0) - log_gamma(prior.concentration());
        for (&a, &b) in self.alpha.iter().zip(prior.alpha.iter()) {
            kl += log_gamma(b) - log_gamma(a) + (a - b) * (digamma(a) - psi_a0);
        }
        kl
    }
}

/// Posterior after observing (possibly fractional) effective counts:
/// `α_k = α⁰_k + n_k`.
pub fn posterior_params(prior: &DirichletParams, counts: &[f64]) -> Option<DirichletParams> {
    if counts.len() != prior.k() {
        return None;
    }
    for &c in counts {
        if !c.is_finite() || c < 0.0 {
            return None;
        }
    }
    let new_alpha = prior
        .alpha
        .iter()
        .zip(counts.iter())
        .map(|(&a, &n)| a + n)
        .collect();
    DirichletParams::new(new_alpha)
}

/// log B(α) = Σ_i lgamma(α_i) - lgamma(Σ_i α_i).
pub fn log_multivariate_beta(alpha: &[f64]) -> f64 {
    if alpha.is_empty() {
        return f64::NAN;
    }
    for &a in alpha {
        if a.is_nan() || a <= 0.0 {
            return f64::NAN;
        }
    }
    let sum: f64 = alpha.iter().sum();
    let log_sum_gamma: f64 = alpha.iter().map(|&a| log_gamma(a)).sum();
    log_sum_gamma - log_gamma(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn new_rejects_invalid() {
        assert!(DirichletParams::new(vec![]).is_none());
        assert!(DirichletParams::new(vec![0.0, 1.0]).is_none());
        assert!(DirichletParams::new(vec![-1.0, 1.0]).is_none());
        assert!(DirichletParams::new(vec![f64::NAN, 1.0]).is_none());
        assert!(DirichletParams::symmetric(0, 1.0).is_none());
    }

    #[test]
    fn mean_sums_to_one() {
        let p = DirichletParams::new(vec![2.0, 3.0, 5.0, 7.0]).unwrap();
        let sum: f64 = p.mean().iter().sum();
        assert!(approx_eq(sum, 1.0, 1e-12));
    }

    #[test]
    fn variance_closed_form() {
        let p = DirichletParams::new(vec![2.0, 3.0, 5.0]).unwrap();
        // Var[w_0] = 2 * (10-2) / (100 * 11)
        assert!(approx_eq(p.variance(0), 16.0 / 1100.0, 1e-12));
    }

    #[test]
    fn posterior_adds_effective_counts() {
        let prior = DirichletParams::uniform(3).unwrap();
        let post = posterior_params(&prior, &[5.5, 3.0, 0.25]).unwrap();
        assert_eq!(post.alpha, vec![6.5, 4.0, 1.25]);
        assert!(posterior_params(&prior, &[1.0, 2.0]).is_none());
        assert!(posterior_params(&prior, &[-1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn expected_log_weights_two_components_match_beta() {
        let p = DirichletParams::new(vec![3.0, 4.0]).unwrap();
        let elw = p.expected_log_weights();
        let marginal = p.marginal(0).unwrap();
        assert!(approx_eq(elw[0], marginal.expected_log_p(), 1e-12));
        assert!(approx_eq(elw[1], marginal.expected_log_one_minus_p(), 1e-12));
    }

    #[test]
    fn expected_log_weight_is_below_log_mean() {
        // Jensen: E[ln w] < ln E[w]
        let p = DirichletParams::new(vec![2.0, 6.0]).unwrap();
        let elw = p.expected_log_weights();
        let mean = p.mean();
        for (e, m) in elw.iter().zip(mean.iter()) {
            assert!(*e < m.ln());
        }
    }

    #[test]
    fn marginal_interval_brackets_mean() {
        let p = DirichletParams::new(vec![12.0, 30.0, 8.0]).unwrap();
        let mean = p.mean();
        for (i, &m) in mean.iter().enumerate() {
            let (lo, hi) = p.marginal_credible_interval(i, 0.95);
            assert!(lo <= m && m <= hi, "component {i}: {lo} <= {m} <= {hi}");
        }
    }

    #[test]
    fn single_component_interval_is_degenerate() {
        let p = DirichletParams::new(vec![5.0]).unwrap();
        assert_eq!(p.marginal_credible_interval(0, 0.95), (1.0, 1.0));
    }

    #[test]
    fn kl_zero_for_identical_positive_otherwise() {
        let a = DirichletParams::new(vec![4.0, 9.0, 2.0]).unwrap();
        let b = DirichletParams::uniform(3).unwrap();
        assert!(approx_eq(a.kl_divergence(&a), 0.0, 1e-10));
        assert!(a.kl_divergence(&b) > 0.0);
    }

    #[test]
    fn kl_two_components_matches_beta_kl() {
        let a = DirichletParams::new(vec![3.0, 5.0]).unwrap();
        let b = DirichletParams::new(vec![1.0, 2.0]).unwrap();
        let beta_kl = a.marginal(0).unwrap().kl_divergence(&b.marginal(0).unwrap());
        assert!(approx_eq(a.kl_divergence(&b), beta_kl, 1e-10));
    }

    #[test]
    fn log_multivariate_beta_symmetric() {
        // B([1, 1, 1]) = Γ(1)³/Γ(3) = 1/2
        assert!(approx_eq(log_multivariate_beta(&[1.0, 1.0, 1.0]), 0.5f64.ln(), 1e-10));
        assert!(log_multivariate_beta(&[]).is_nan());
    }
}
