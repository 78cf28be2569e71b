//! Beta distribution utilities for conversion-rate posteriors.
//!
//! Provides the `BetaParams` conjugate parameter type plus PDF, CDF and
//! inverse CDF. The CDF uses the regularized incomplete beta function with
//! a continued-fraction approximation (Numerical Recipes).
//!
//! The Beta-Binomial model used throughout:
//! - Prior: `p ~ Beta(α, β)`
//! - Likelihood: `s | p ~ Binomial(n, p)`
//! - Posterior: `p | s,n ~ Beta(α + s, β + n - s)`

use serde::{Deserialize, Serialize};

use super::stable::{digamma, log_beta, log_binomial};

const BETACF_MAX_ITERS: usize = 300;
const BETACF_EPS: f64 = 1.0e-12;
const BETACF_FPMIN: f64 = 1.0e-30;
const INV_CDF_TOL: f64 = 1e-12;

/// Parameters of a Beta distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaParams {
    /// Shape parameter alpha (successes + prior)
    pub alpha: f64,
    /// Shape parameter beta (failures + prior)
    pub beta: f64,
}

impl BetaParams {
    /// Create new Beta parameters with validation.
    ///
    /// Returns None if parameters are non-positive, NaN or infinite.
    pub fn new(alpha: f64, beta: f64) -> Option<Self> {
        if !alpha.is_finite() || !beta.is_finite() || alpha <= 0.0 || beta <= 0.0 {
            return None;
        }
        Some(Self { alpha, beta })
    }

    /// Beta(1, 1) uniform prior.
    pub fn uniform() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }

    /// Jeffreys prior Beta(0.5, 0.5).
    pub fn jeffreys() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
        }
    }

    /// E[p] = α / (α + β).
    pub fn mean(&self) -> f64 {
        beta_mean(self.alpha, self.beta)
    }

    /// Var[p] = αβ / ((α+β)²(α+β+1)).
    pub fn variance(&self) -> f64 {
        beta_var(self.alpha, self.beta)
    }

    /// Conjugate update with (possibly fractional) success/failure counts.
    pub fn update(&self, successes: f64, failures: f64) -> Option<Self> {
        if !successes.is_finite() || !failures.is_finite() || successes < 0.0 || failures < 0.0 {
            return None;
        }
        Self::new(self.alpha + successes, self.beta + failures)
    }

    /// Equal-tailed credible interval at the given level (e.g. 0.95).
    pub fn credible_interval(&self, level: f64) -> (f64, f64) {
        if !(level > 0.0 && level < 1.0) {
            return (f64::NAN, f64::NAN);
        }
        let tail = (1.0 - level) / 2.0;
        let lower = beta_inv_cdf(tail, self.alpha, self.beta);
        let upper = beta_inv_cdf(1.0 - tail, self.alpha, self.beta);
        (lower.min(upper), upper.max(lower))
    }

    /// Log density at x.
    pub fn log_pdf(&self, x: f64) -> f64 {
        log_beta_pdf(x, self.alpha, self.beta)
    }

    /// E[ln p] under this Beta.
    pub fn expected_log_p(&self) -> f64 {
        digamma(self.alpha) - digamma(self.alpha + self.beta)
    }

    /// E[ln (1 - p)] under this Beta.
    pub fn expected_log_one_minus_p(&self) -> f64 {
        digamma(self.beta) - digamma(self.alpha + self.beta)
    }

    /// KL(self ‖ other).
    pub fn kl_divergence(&self, other: &BetaParams) -> f64 {
        let (a1, b1) = (self.alpha, self.beta);
        let (a2, b2) = (other.alpha, other.beta);
        log_beta(a2, b2) - log_beta(a1, b1)
            + (a1 - a2) * digamma(a1)
            + (b1 - b2) * digamma(b1)
            + (a2 - a1 + b2 - b1) * digamma(a1 + b1)
    }

    /// Log marginal likelihood of `k` successes in `n` trials under this prior:
    /// log C(n, k) + log B(α + k, β + n - k) - log B(α, β).
    pub fn log_marginal_likelihood(&self, k: u64, n: u64) -> f64 {
        if k > n {
            return f64::NAN;
        }
        let kf = k as f64;
        let nf = n as f64;
        log_binomial(n, k) + log_beta(self.alpha + kf, self.beta + nf - kf)
            - log_beta(self.alpha, self.beta)
    }
}

impl Default for BetaParams {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Mean of Beta(alpha, beta) = alpha / (alpha + beta).
pub fn beta_mean(alpha: f64, beta: f64) -> f64 {
    if alpha.is_nan() || beta.is_nan() || alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    alpha / (alpha + beta)
}

/// Variance of Beta(alpha, beta).
pub fn beta_var(alpha: f64, beta: f64) -> f64 {
    if alpha.is_nan() || beta.is_nan() || alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    let sum = alpha + beta;
    (alpha * beta) / (sum * sum * (sum + 1.0))
}

/// Log of the Beta PDF at x.
pub fn log_beta_pdf(x: f64, alpha: f64, beta: f64) -> f64 {
    if x.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if !(0.0..=1.0).contains(&x) {
        return f64::NEG_INFINITY;
    }
    if x == 0.0 {
        if alpha < 1.0 {
            return f64::INFINITY;
        }
        if alpha > 1.0 {
            return f64::NEG_INFINITY;
        }
        return -log_beta(1.0, beta);
    }
    if x == 1.0 {
        if beta < 1.0 {
            return f64::INFINITY;
        }
        if beta > 1.0 {
            return f64::NEG_INFINITY;
        }
        return -log_beta(alpha, 1.0);
    }
    let log_x = x.ln();
    let log_one_minus = (-x).ln_1p();
    (alpha - 1.0) * log_x + (beta - 1.0) * log_one_minus - log_beta(alpha, beta)
}

/// Regularized incomplete beta function I_x(a,b).
pub fn beta_cdf(x: f64, alpha: f64, beta: f64) -> f64 {
    if x.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_beta = log_beta(alpha, beta);
    let bt = (alpha * x.ln() + beta * (-x).ln_1p() - ln_beta).exp();
    let threshold = (alpha + 1.0) / (alpha + beta + 2.0);
    if x < threshold {
        bt * betacf(alpha, beta, x) / alpha
    } else {
        1.0 - bt * betacf(beta, alpha, 1.0 - x) / beta
    }
}

/// Inverse CDF (quantile) for Beta(alpha, beta), by bisection.
pub fn beta_inv_cdf(p: f64, alpha: f64, beta: f64) -> f64 {
    if p.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }

    let mut low = 0.0;
    let mut high = 1.0;
    let mut mid = 0.5;
    for _ in 0..200 {
        mid = 0.5 * (low + high);
        let cdf = beta_cdf(mid, alpha, beta);
        if cdf.is_nan() {
            return f64::NAN;
        }
        let delta = cdf - p;
        if delta.abs() < INV_CDF_TOL || (high - low) < INV_CDF_TOL {
            return mid;
        }
        if delta < 0.0 {
            low = mid;
        } else {
            high = mid;
        }
    }
    mid
}

fn betacf(alpha: f64, beta: f64, x: f64) -> f64 {
    let qab = alpha + beta;
    let qap = alpha + 1.0;
    let qam = alpha - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < BETACF_FPMIN {
        d = BETACF_FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=BETACF_MAX_ITERS {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;
        let aa = m_f * (beta - m_f) * x / ((qam + m2) * (alpha + m2));
        d = 1.0 + aa * d;
        if d.abs() < BETACF_FPMIN {
            d = BETACF_FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < BETACF_FPMIN {
            c = BETACF_FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(alpha + m_f) * (qab + m_f) * x / ((alpha + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < BETACF_FPMIN {
            d = BETACF_FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < BETACF_FPMIN {
            c = BETACF_FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < BETACF_EPS {
            break;
        }
    }

    h
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
    fn params_reject_invalid() {
        assert!(BetaParams::new(0.0, 1.0).is_none());
        assert!(BetaParams::new(1.0, -2.0).is_none());
        assert!(BetaParams::new(f64::NAN, 1.0).is_none());
        assert!(BetaParams::new(f64::INFINITY, 1.0).is_none());
    }

    #[test]
    fn update_is_conjugate() {
        let post = BetaParams::uniform().update(8.0, 2.0).unwrap();
        assert_eq!(post, BetaParams { alpha: 9.0, beta: 3.0 });
        assert!(approx_eq(post.mean(), 0.75, 1e-12));
        assert!(BetaParams::uniform().update(-1.0, 2.0).is_none());
    }

    #[test]
    fn mean_and_var_match_closed_form() {
        assert!(approx_eq(beta_mean(2.0, 5.0), 2.0 / 7.0, 1e-12));
        assert!(approx_eq(beta_var(2.0, 5.0), 10.0 / 392.0, 1e-12));
    }

    #[test]
    fn pdf_known_value_beta_2_5() {
        let pdf = log_beta_pdf(0.2, 2.0, 5.0).exp();
        assert!(approx_eq(pdf, 2.4576, 1e-6));
    }

    #[test]
    fn cdf_uniform_matches_identity() {
        assert!(approx_eq(beta_cdf(0.42, 1.0, 1.0), 0.42, 1e-9));
    }

    #[test]
    fn inv_cdf_inverts_cdf() {
        let x = beta_inv_cdf(0.25, 2.0, 5.0);
        assert!(approx_eq(beta_cdf(x, 2.0, 5.0), 0.25, 1e-8));
    }

    #[test]
    fn credible_interval_brackets_mean() {
        let post = BetaParams::new(9.0, 3.0).unwrap();
        let (lo, hi) = post.credible_interval(0.95);
        assert!(lo < post.mean() && post.mean() < hi);
        assert!(approx_eq(beta_cdf(lo, 9.0, 3.0), 0.025, 1e-8));
        assert!(approx_eq(beta_cdf(hi, 9.0, 3.0), 0.975, 1e-8));
    }

    #[test]
    fn kl_is_zero_for_identical_and_positive_otherwise() {
        let a = BetaParams::new(3.0, 4.0).unwrap();
        let b = BetaParams::new(1.0, 1.0).unwrap();
        assert!(approx_eq(a.kl_divergence(&a), 0.0, 1e-10));
        assert!(a.kl_divergence(&b) > 0.0);
    }

    #[test]
    fn expected_logs_match_uniform() {
        // For Beta(1,1): E[ln p] = psi(1) - psi(2) = -1
        let u = BetaParams::uniform();
        assert!(approx_eq(u.expected_log_p(), -1.0, 1e-10));
        assert!(approx_eq(u.expected_log_one_minus_p(), -1.0, 1e-10));
    }

    #[test]
    fn marginal_likelihood_uniform_prior() {
        // Uniform prior makes every k in 0..=n equally likely: 1/(n+1)
        let u = BetaParams::uniform();
        let lml = u.log_marginal_likelihood(3, 10);
        assert!(approx_eq(lml, (1.0f64 / 11.0).ln(), 1e-9));
    }

    #[test]
    fn log_pdf_edge_behavior_at_zero() {
        let log_pdf = log_beta_pdf(0.0, 0.5, 2.0);
        assert!(log_pdf.is_infinite() && log_pdf.is_sign_positive());
        let log_pdf2 = log_beta_pdf(0.0, 2.0, 2.0);
        assert!(log_pdf2.is_infinite() && log_pdf2.is_sign_negative());
    }
}
