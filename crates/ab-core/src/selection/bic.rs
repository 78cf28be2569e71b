//! Bayesian Information Criterion.
//!
//! `BIC = (-2 Σ ln p(x_i | θ̂) + k ln n) / n`, with θ̂ the posterior point
//! estimate used by [`Posterior::log_likelihood`] and k the free parameter
//! count of the model configuration.

use ab_common::{Error, ModelConfig, Result};
use serde::{Deserialize, Serialize};

use super::waic::Observations;
use crate::inference::posterior::Posterior;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BicResult {
    /// Per-observation BIC.
    pub bic: f64,
    pub log_likelihood: f64,
    pub k: usize,
    pub n: usize,
}

pub fn compute_bic(
    posterior: &dyn Posterior,
    config: &ModelConfig,
    observations: &Observations,
) -> Result<BicResult> {
    let n = observations.len();
    if n == 0 {
        return Err(Error::InsufficientData("BIC needs at least one observation".into()));
    }
    if !posterior.capabilities().log_pdf {
        return Err(Error::ModelMismatch(format!(
            "{} posterior cannot evaluate log densities",
            posterior.family()
        )));
    }
    let log_likelihood = observations.sum_by(|x| posterior.log_likelihood(x).unwrap_or(f64::NAN));
    let k = config.parameter_count();
    let bic = (-2.0 * log_likelihood + k as f64 * (n as f64).ln()) / n as f64;
    if !bic.is_finite() {
        return Err(Error::Internal(format!(
            "BIC is not finite for the {} posterior (log likelihood {log_likelihood})",
            posterior.family()
        )));
    }
    Ok(BicResult {
        bic,
        log_likelihood,
        k,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::conjugate::BetaBinomialConjugate;
    use ab_common::Family;
    use ab_math::BetaParams;

    #[test]
    fn bernoulli_bic_matches_closed_form() {
        let post = BetaBinomialConjugate
            .posterior(&BetaParams::uniform(), 2.0, 2.0)
            .unwrap();
        let values = Observations::Values(vec![1.0, 1.0, 0.0, 0.0]);
        let result = compute_bic(&post, &ModelConfig::simple(Family::Beta, 1), &values).unwrap();
        // posterior mean is 0.5
        let ll = 4.0 * 0.5f64.ln();
        assert!((result.log_likelihood - ll).abs() < 1e-9);
        assert!((result.bic - (-2.0 * ll + 4f64.ln()) / 4.0).abs() < 1e-9);
        assert_eq!(result.k, 1);
    }

    #[test]
    fn empty_values_are_insufficient() {
        let post = BetaBinomialConjugate
            .posterior(&BetaParams::uniform(), 2.0, 2.0)
            .unwrap();
        let err = compute_bic(&post, &ModelConfig::simple(Family::Beta, 1), &Vec::new().into())
            .unwrap_err();
        assert_eq!(err.kind(), ab_common::ErrorKind::InsufficientData);
    }

    #[test]
    fn binomial_counts_use_closed_form_log_likelihood() {
        let post = BetaBinomialConjugate
            .posterior(&BetaParams::uniform(), 999_999.0, 2_999_000_001.0)
            .unwrap();
        let counts = Observations::Counts {
            successes: 1_000_000,
            trials: 3_000_000_000,
        };
        let result = compute_bic(&post, &ModelConfig::simple(Family::Beta, 1), &counts).unwrap();
        let p = 1_000_000.0 / 3_000_000_002.0;
        let ll = 1e6 * f64::ln(p) + 2_999_000_000.0 * f64::ln(1.0 - p);
        assert!((result.log_likelihood - ll).abs() / ll.abs() < 1e-9);
        assert_eq!(result.n, 3_000_000_000);
    }
}
