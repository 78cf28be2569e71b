//! Semantic validation for fit options.
//!
//! Serde guarantees shape; this module guarantees the numbers make sense.

use thiserror::Error;

use super::FitOptionsFile;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("{field} must be in range [{min}, {max}], got {actual}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        actual: f64,
    },
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate the serializable part of the fit options.
pub fn validate_fit_options(options: &FitOptionsFile) -> Result<(), ValidationError> {
    if let Some(max_iterations) = options.max_iterations {
        if max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
    }
    if let Some(tolerance) = options.tolerance {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(invalid(
                "tolerance",
                format!("must be finite and positive, got {tolerance}"),
            ));
        }
    }
    if let Some(level) = options.credible_level {
        if !(level > 0.0 && level < 1.0) {
            return Err(ValidationError::OutOfRange {
                field: "credible_level".to_string(),
                min: 0.0,
                max: 1.0,
                actual: level,
            });
        }
    }
    if let Some(concentration) = options.dirichlet_concentration {
        if !concentration.is_finite() || concentration <= 0.0 {
            return Err(invalid(
                "dirichlet_concentration",
                format!("must be finite and positive, got {concentration}"),
            ));
        }
    }
    if let Some(min_points) = options.min_points_per_component {
        if min_points == 0 {
            return Err(invalid("min_points_per_component", "must be at least 1"));
        }
    }
    if let Some(prior) = &options.prior_params {
        if prior.params.is_empty() {
            return Err(invalid("prior_params.params", "must not be empty"));
        }
        if prior.params.iter().any(|p| !p.is_finite()) {
            return Err(invalid("prior_params.params", "must all be finite"));
        }
    }
    Ok(())
}
