//! Error types for Bayesian A/B inference.
//!
//! This module provides structured error handling with:
//! - A stable kind taxonomy (`INVALID_DATA`, `MODEL_MISMATCH`, ...)
//! - Stable numeric codes for machine parsing
//! - Recoverability hints and remediation text
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Insufficient Data
//!   Reason: insufficient data: no converted user has a positive value
//!   Fix: Collect more observations or choose a simpler model.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 11,
//!   "kind": "INSUFFICIENT_DATA",
//!   "message": "insufficient data: no converted user has a positive value",
//!   "recoverable": true,
//!   "remediation": "Collect more observations or choose a simpler model."
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for inference operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds, serialized with their stable wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidData,
    InsufficientData,
    InvalidPrior,
    InvalidConfig,
    ModelMismatch,
    NotImplemented,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
    #[serde(rename = "IO_ERROR")]
    Io,
    #[serde(rename = "JSON_ERROR")]
    Json,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidData => "INVALID_DATA",
            ErrorKind::InsufficientData => "INSUFFICIENT_DATA",
            ErrorKind::InvalidPrior => "INVALID_PRIOR",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::ModelMismatch => "MODEL_MISMATCH",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Json => "JSON_ERROR",
        };
        f.write_str(s)
    }
}

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input data problems.
    Data,
    /// Model, prior and configuration problems.
    Model,
    /// Numerical or internal inference failures.
    Inference,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for inference.
#[derive(Error, Debug)]
pub enum Error {
    // Data errors (10-19)
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    // Model and configuration errors (20-29)
    #[error("invalid prior: {0}")]
    InvalidPrior(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model mismatch: {0}")]
    ModelMismatch(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    // Inference errors (30-39)
    #[error("internal error: {0}")]
    Internal(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidData(_) => ErrorKind::InvalidData,
            Error::InsufficientData(_) => ErrorKind::InsufficientData,
            Error::InvalidPrior(_) => ErrorKind::InvalidPrior,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::ModelMismatch(_) => ErrorKind::ModelMismatch,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Data errors
    /// - 20-29: Model and configuration errors
    /// - 30-39: Inference errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidData(_) => 10,
            Error::InsufficientData(_) => 11,
            Error::InvalidPrior(_) => 20,
            Error::InvalidConfig(_) => 21,
            Error::ModelMismatch(_) => 22,
            Error::NotImplemented(_) => 23,
            Error::Internal(_) => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidData(_) | Error::InsufficientData(_) => ErrorCategory::Data,
            Error::InvalidPrior(_)
            | Error::InvalidConfig(_)
            | Error::ModelMismatch(_)
            | Error::NotImplemented(_) => ErrorCategory::Model,
            Error::Internal(_) => ErrorCategory::Inference,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by changing inputs.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::InvalidData(_) => true,
            Error::InsufficientData(_) => true,
            Error::InvalidPrior(_) => true,
            Error::InvalidConfig(_) => true,
            Error::ModelMismatch(_) => true,
            // Requested capability does not exist
            Error::NotImplemented(_) => false,
            Error::Internal(_) => false,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidData(_) => {
                "Check the input: successes must not exceed trials, and non-converted users must have value 0."
            }
            Error::InsufficientData(_) => {
                "Collect more observations or choose a simpler model."
            }
            Error::InvalidPrior(_) => {
                "Use a Beta prior [alpha, beta] or a normal-inverse-gamma prior [mu0, lambda, alpha, beta] with positive scale parameters."
            }
            Error::InvalidConfig(_) => {
                "Use a model spec such as 'simple:lognormal:1' or 'compound:lognormal:2', or omit it to let the router decide."
            }
            Error::ModelMismatch(_) => {
                "Use a Beta model for binomial data, or supply user-level values for Normal/LogNormal models."
            }
            Error::NotImplemented(_) => {
                "Choose a supported family (beta, normal, lognormal) or criterion (waic, bic)."
            }
            Error::Internal(_) => {
                "Internal numerical issue. Re-run with a different seed and report it with the input data if it persists."
            }
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::InvalidData(_) => "Invalid Data",
            Error::InsufficientData(_) => "Insufficient Data",
            Error::InvalidPrior(_) => "Invalid Prior",
            Error::InvalidConfig(_) => "Invalid Model Configuration",
            Error::ModelMismatch(_) => "Model Mismatch",
            Error::NotImplemented(_) => "Not Implemented",
            Error::Internal(_) => "Internal Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }

    /// Structured response for JSON output.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::from(self)
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code.
    pub code: u32,

    /// Error kind.
    pub kind: ErrorKind,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Remediation hint.
    pub remediation: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        ErrorResponse {
            code: err.code(),
            kind: err.kind(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
        }
    }
}

impl ErrorResponse {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
