//! User-supplied prior specifications.
//!
//! A prior is a family tag plus a flat parameter vector:
//!
//! ```json
//! {"distribution": "beta", "params": [2.0, 8.0]}
//! {"distribution": "normal-inverse-gamma", "params": [0.0, 0.01, 1.0, 1.0]}
//! {"distribution": "dirichlet", "params": [1.0, 1.0]}
//! ```
//!
//! Typed conversions validate count and sign and fail with `INVALID_PRIOR`.

use ab_common::{Error, Result};
use ab_math::{BetaParams, DirichletParams, NigParams};
use serde::{Deserialize, Serialize};

/// Prior distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorFamily {
    Beta,
    NormalInverseGamma,
    Dirichlet,
}

impl std::fmt::Display for PriorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorFamily::Beta => write!(f, "beta"),
            PriorFamily::NormalInverseGamma => write!(f, "normal-inverse-gamma"),
            PriorFamily::Dirichlet => write!(f, "dirichlet"),
        }
    }
}

/// A prior family with its numeric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorParams {
    pub distribution: PriorFamily,
    pub params: Vec<f64>,
}

impl PriorParams {
    pub fn beta(alpha: f64, beta: f64) -> Self {
        Self {
            distribution: PriorFamily::Beta,
            params: vec![alpha, beta],
        }
    }

    pub fn nig(mu0: f64, lambda: f64, alpha: f64, beta: f64) -> Self {
        Self {
            distribution: PriorFamily::NormalInverseGamma,
            params: vec![mu0, lambda, alpha, beta],
        }
    }

    /// Dirichlet weights; a single value is a symmetric concentration.
    pub fn dirichlet(params: Vec<f64>) -> Self {
        Self {
            distribution: PriorFamily::Dirichlet,
            params,
        }
    }

    fn expect_family(&self, family: PriorFamily, count: usize) -> Result<()> {
        if self.distribution != family {
            return Err(Error::InvalidPrior(format!(
                "expected a {family} prior, got {}",
                self.distribution
            )));
        }
        if self.params.len() != count {
            return Err(Error::InvalidPrior(format!(
                "{family} prior needs {count} parameters, got {}",
                self.params.len()
            )));
        }
        Ok(())
    }

    /// Beta(α, β); both must be positive.
    pub fn to_beta(&self) -> Result<BetaParams> {
        self.expect_family(PriorFamily::Beta, 2)?;
        BetaParams::new(self.params[0], self.params[1]).ok_or_else(|| {
            Error::InvalidPrior(format!(
                "beta prior parameters must be positive, got {:?}",
                self.params
            ))
        })
    }

    /// NIG(μ₀, λ, α, β); λ, α, β must be positive.
    pub fn to_nig(&self) -> Result<NigParams> {
        self.expect_family(PriorFamily::NormalInverseGamma, 4)?;
        let p = &self.params;
        NigParams::new(p[0], p[1], p[2], p[3]).ok_or_else(|| {
            Error::InvalidPrior(format!(
                "normal-inverse-gamma prior needs finite mu0 and positive lambda, alpha, beta, got {:?}",
                p
            ))
        })
    }

    /// Dirichlet over `k` weights; a single value is broadcast symmetrically.
    pub fn to_dirichlet(&self, k: usize) -> Result<DirichletParams> {
        if self.distribution != PriorFamily::Dirichlet {
            return Err(Error::InvalidPrior(format!(
                "expected a dirichlet prior, got {}",
                self.distribution
            )));
        }
        let alpha = match self.params.len() {
            1 => vec![self.params[0]; k],
            n if n == k => self.params.clone(),
            n => {
                return Err(Error::InvalidPrior(format!(
                    "dirichlet prior needs 1 or {k} parameters, got {n}"
                )))
            }
        };
        DirichletParams::new(alpha).ok_or_else(|| {
            Error::InvalidPrior("dirichlet prior parameters must be positive".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_common::ErrorKind;

    #[test]
    fn beta_prior_converts() {
        let p = PriorParams::beta(2.0, 8.0).to_beta().unwrap();
        assert_eq!((p.alpha, p.beta), (2.0, 8.0));
    }

    #[test]
    fn wrong_family_or_count_is_invalid_prior() {
        let err = PriorParams::nig(0.0, 1.0, 1.0, 1.0).to_beta().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPrior);

        let bad = PriorParams {
            distribution: PriorFamily::Beta,
            params: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(bad.to_beta().unwrap_err().kind(), ErrorKind::InvalidPrior);
    }

    #[test]
    fn non_positive_parameters_are_invalid_prior() {
        let err = PriorParams::beta(-1.0, 1.0).to_beta().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPrior);
        let err = PriorParams::nig(0.0, 0.0, 1.0, 1.0).to_nig().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPrior);
    }

    #[test]
    fn dirichlet_broadcasts_single_value() {
        let p = PriorParams {
            distribution: PriorFamily::Dirichlet,
            params: vec![0.5],
        };
        assert_eq!(p.to_dirichlet(3).unwrap().alpha, vec![0.5; 3]);
        assert!(p.to_dirichlet(0).is_err());
    }

    #[test]
    fn serde_uses_kebab_family_names() {
        let json = r#"{"distribution":"normal-inverse-gamma","params":[0,0.01,1,1]}"#;
        let p: PriorParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.distribution, PriorFamily::NormalInverseGamma);
        assert!(p.to_nig().is_ok());
    }
}
