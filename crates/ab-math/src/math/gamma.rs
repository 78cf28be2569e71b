//! Gamma and Inverse-Gamma utilities for variance posteriors.
//!
//! Uses **rate parameterization** for the Gamma: `Gamma(α, β)` with density
//! `f(t) = β^α / Γ(α) * t^(α-1) * e^(-βt)`.
//!
//! If `τ ~ Gamma(α, β)` then `σ² = 1/τ ~ InverseGamma(α, β)` with density
//! `f(s) = β^α / Γ(α) * s^(-α-1) * e^(-β/s)`. The Normal-Inverse-Gamma
//! posterior places this distribution on the observation variance.

use super::stable::{digamma, log_gamma};

/// Log of the Gamma distribution PDF at t (rate parameterization).
pub fn gamma_log_pdf(t: f64, alpha: f64, beta: f64) -> f64 {
    if t.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if t < 0.0 {
        return f64::NEG_INFINITY;
    }
    if t == 0.0 {
        if alpha < 1.0 {
            return f64::INFINITY;
        } else if alpha == 1.0 {
            return beta.ln();
        } else {
            return f64::NEG_INFINITY;
        }
    }
    alpha * beta.ln() - log_gamma(alpha) + (alpha - 1.0) * t.ln() - beta * t
}

/// Mean of Gamma(α, β) = α/β.
pub fn gamma_mean(alpha: f64, beta: f64) -> f64 {
    if alpha <= 0.0 || beta <= 0.0 || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    alpha / beta
}

/// Log of the Inverse-Gamma PDF at s (shape α, scale β).
pub fn inv_gamma_log_pdf(s: f64, alpha: f64, beta: f64) -> f64 {
    if s.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if s <= 0.0 {
        return f64::NEG_INFINITY;
    }
    alpha * beta.ln() - log_gamma(alpha) - (alpha + 1.0) * s.ln() - beta / s
}

/// Mean of InverseGamma(α, β) = β/(α-1), defined for α > 1.
pub fn inv_gamma_mean(alpha: f64, beta: f64) -> f64 {
    if alpha <= 1.0 || beta <= 0.0 {
        return f64::INFINITY;
    }
    beta / (alpha - 1.0)
}

/// Mode of InverseGamma(α, β) = β/(α+1). Always defined.
pub fn inv_gamma_mode(alpha: f64, beta: f64) -> f64 {
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    beta / (alpha + 1.0)
}

/// E[ln σ²] for σ² ~ InverseGamma(α, β) = ln β - ψ(α).
pub fn inv_gamma_expected_log(alpha: f64, beta: f64) -> f64 {
    beta.ln() - digamma(alpha)
}

/// E[1/σ²] for σ² ~ InverseGamma(α, β) = α/β.
pub fn inv_gamma_expected_precision(alpha: f64, beta: f64) -> f64 {
    alpha / beta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn exponential_special_case() {
        // Gamma(1, 2) is Exponential(2): log f(t) = ln 2 - 2t
        let t = 0.7;
        assert!(approx_eq(gamma_log_pdf(t, 1.0, 2.0), 2.0f64.ln() - 1.4, 1e-12));
        assert!(approx_eq(gamma_mean(1.0, 2.0), 0.5, 1e-12));
    }

    #[test]
    fn inverse_gamma_is_change_of_variables() {
        // f_IG(s) = f_G(1/s) / s^2
        let (a, b, s) = (3.0, 2.0, 0.8);
        let ig = inv_gamma_log_pdf(s, a, b);
        let g = gamma_log_pdf(1.0 / s, a, b) - 2.0 * s.ln();
        assert!(approx_eq(ig, g, 1e-12));
    }

    #[test]
    fn inverse_gamma_moments() {
        assert!(approx_eq(inv_gamma_mean(3.0, 4.0), 2.0, 1e-12));
        assert!(inv_gamma_mean(1.0, 4.0).is_infinite());
        assert!(approx_eq(inv_gamma_mode(3.0, 4.0), 1.0, 1e-12));
        assert!(approx_eq(inv_gamma_expected_precision(3.0, 4.0), 0.75, 1e-12));
    }

    #[test]
    fn inverse_gamma_support() {
        assert!(inv_gamma_log_pdf(0.0, 2.0, 1.0).is_infinite());
        assert!(inv_gamma_log_pdf(-1.0, 2.0, 1.0).is_infinite());
        assert!(inv_gamma_log_pdf(1.0, 0.0, 1.0).is_nan());
    }
}
