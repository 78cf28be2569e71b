//! Normal and LogNormal log densities.

use super::stable::LOG_SQRT_2PI;

/// Log density of Normal(mu, sigma2) at x. `sigma2` is the variance.
pub fn normal_log_pdf(x: f64, mu: f64, sigma2: f64) -> f64 {
    if x.is_nan() || mu.is_nan() || sigma2.is_nan() {
        return f64::NAN;
    }
    if sigma2 <= 0.0 {
        return f64::NAN;
    }
    let z = x - mu;
    -LOG_SQRT_2PI - 0.5 * sigma2.ln() - 0.5 * z * z / sigma2
}

/// Log density of LogNormal(mu, sigma2) at x, i.e. ln X ~ Normal(mu, sigma2).
///
/// Includes the Jacobian term -ln x; returns -inf for x <= 0.
pub fn lognormal_log_pdf(x: f64, mu: f64, sigma2: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let lx = x.ln();
    normal_log_pdf(lx, mu, sigma2) - lx
}

/// Mean of LogNormal(mu, sigma2) = exp(mu + sigma2/2).
pub fn lognormal_mean(mu: f64, sigma2: f64) -> f64 {
    (mu + 0.5 * sigma2).exp()
}

/// Variance of LogNormal(mu, sigma2) = (exp(sigma2) - 1) exp(2mu + sigma2).
pub fn lognormal_var(mu: f64, sigma2: f64) -> f64 {
    sigma2.exp_m1() * (2.0 * mu + sigma2).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn standard_normal_at_zero() {
        let expected = -(2.0 * std::f64::consts::PI).sqrt().ln();
        assert!(approx_eq(normal_log_pdf(0.0, 0.0, 1.0), expected, 1e-12));
    }

    #[test]
    fn normal_is_symmetric() {
        assert!(approx_eq(
            normal_log_pdf(1.3, 0.5, 2.0),
            normal_log_pdf(-0.3, 0.5, 2.0),
            1e-12
        ));
    }

    #[test]
    fn invalid_variance_is_nan() {
        assert!(normal_log_pdf(0.0, 0.0, 0.0).is_nan());
        assert!(normal_log_pdf(0.0, 0.0, -1.0).is_nan());
    }

    #[test]
    fn lognormal_includes_jacobian() {
        let x: f64 = 2.5;
        let expected = normal_log_pdf(x.ln(), 0.3, 0.4) - x.ln();
        assert!(approx_eq(lognormal_log_pdf(x, 0.3, 0.4), expected, 1e-12));
        assert_eq!(lognormal_log_pdf(0.0, 0.0, 1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn lognormal_moments() {
        assert!(approx_eq(lognormal_mean(0.0, 1.0), (0.5f64).exp(), 1e-12));
        let v = lognormal_var(0.0, 1.0);
        assert!(approx_eq(v, (1.0f64.exp() - 1.0) * 1.0f64.exp(), 1e-12));
    }
}
