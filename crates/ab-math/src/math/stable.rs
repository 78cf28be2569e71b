//! Numerically stable primitives for log-domain Bayesian math.

use std::f64::consts::PI;

pub const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // These are published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Below this argument digamma is shifted upward with the recurrence
/// psi(x) = psi(x + 1) - 1/x before the asymptotic series is applied.
const DIGAMMA_ASYMPTOTIC_MIN: f64 = 6.0;

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Turn unnormalized log weights into probabilities that sum to one.
///
/// A row whose entries are all -inf (or NaN) carries no information and
/// falls back to the uniform distribution.
pub fn normalize_log_weights(log_weights: &[f64]) -> Vec<f64> {
    let k = log_weights.len();
    if k == 0 {
        return Vec::new();
    }
    let lse = log_sum_exp(log_weights);
    if !lse.is_finite() {
        return vec![1.0 / k as f64; k];
    }
    log_weights.iter().map(|w| (w - lse).exp()).collect()
}

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Uses a Lanczos approximation with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z <= 0.0 {
        let z_round = z.round();
        if (z - z_round).abs() < 1e-15 {
            return f64::NAN;
        }
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// Digamma function psi(x) = d/dx log Gamma(x).
///
/// Recurrence up to x >= 6, then the asymptotic Bernoulli series.
/// Non-positive integers are poles and return NaN.
pub fn digamma(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return f64::INFINITY;
    }
    if x <= 0.0 {
        if (x - x.round()).abs() < 1e-15 {
            return f64::NAN;
        }
        // Reflection: psi(1 - x) - psi(x) = pi * cot(pi * x)
        return digamma(1.0 - x) - PI / (PI * x).tan();
    }

    let mut x = x;
    let mut result = 0.0;
    while x < DIGAMMA_ASYMPTOTIC_MIN {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = inv2
        * (1.0 / 12.0
            - inv2
                * (1.0 / 120.0
                    - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 * (1.0 / 132.0)))));
    result + x.ln() - 0.5 * inv - series
}

/// log Beta(a, b) = log Gamma(a) + log Gamma(b) - log Gamma(a+b).
pub fn log_beta(a: f64, b: f64) -> f64 {
    log_gamma(a) + log_gamma(b) - log_gamma(a + b)
}

/// log(n!) using the Gamma function.
pub fn log_factorial(n: u64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    log_gamma((n as f64) + 1.0)
}

/// log binomial coefficient: log(n choose k).
pub fn log_binomial(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    if k == 0 || k == n {
        return 0.0;
    }
    log_factorial(n) - log_factorial(k) - log_factorial(n - k)
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
    fn log_sum_exp_basic() {
        let v = [0.0, 0.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_dominance() {
        let v = [-1000.0, 0.0];
        let out = log_sum_exp(&v);
        assert!(approx_eq(out, 0.0, 1e-12));
    }

    #[test]
    fn log_sum_exp_all_neg_inf() {
        let v = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        let out = log_sum_exp(&v);
        assert!(out.is_infinite() && out.is_sign_negative());
    }

    #[test]
    fn log_add_exp_matches_lse() {
        let a = 1.234;
        let b = -0.75;
        let out = log_add_exp(a, b);
        let lse = log_sum_exp(&[a, b]);
        assert!(approx_eq(out, lse, 1e-12));
    }

    #[test]
    fn normalize_log_weights_sums_to_one() {
        let probs = normalize_log_weights(&[-1.0, -2.0, -1000.0]);
        let sum: f64 = probs.iter().sum();
        assert!(approx_eq(sum, 1.0, 1e-12));
        assert!(probs[0] > probs[1]);
        assert!(probs[2] < 1e-300);
    }

    #[test]
    fn normalize_log_weights_degenerate_row_is_uniform() {
        let probs = normalize_log_weights(&[f64::NEG_INFINITY; 4]);
        assert_eq!(probs, vec![0.25; 4]);
    }

    #[test]
    fn log_gamma_known_values() {
        assert!(approx_eq(log_gamma(1.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
        assert!(approx_eq(log_gamma(5.0), 24.0f64.ln(), 1e-10));
    }

    #[test]
    fn digamma_known_values() {
        // psi(1) = -gamma (Euler-Mascheroni)
        assert!(approx_eq(digamma(1.0), -0.577_215_664_901_532_9, 1e-10));
        // psi(0.5) = -gamma - 2 ln 2
        let expected = -0.577_215_664_901_532_9 - 2.0 * 2.0f64.ln();
        assert!(approx_eq(digamma(0.5), expected, 1e-10));
        // psi(x + 1) = psi(x) + 1/x
        let x = 3.7;
        assert!(approx_eq(digamma(x + 1.0), digamma(x) + 1.0 / x, 1e-10));
    }

    #[test]
    fn digamma_poles_are_nan() {
        assert!(digamma(0.0).is_nan());
        assert!(digamma(-3.0).is_nan());
    }

    #[test]
    fn log_beta_factorial_binomial() {
        assert!(approx_eq(log_beta(1.0, 1.0), 0.0, 1e-12));
        assert!(approx_eq(log_factorial(5), 120.0f64.ln(), 1e-12));
        assert!(approx_eq(log_binomial(5, 2), 10.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_gamma_negative_integer_is_nan() {
        assert!(log_gamma(-2.0).is_nan());
    }
}
