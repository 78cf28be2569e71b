//! Exit codes for the ab-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/input errors (recoverable by changing arguments or data)
//! - 20-29: Internal and I/O errors

use ab_common::{Error, ErrorKind};

/// Exit codes for ab-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Input data invalid or insufficient
    DataError = 11,

    /// Model, prior or engine error
    ModelError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::ModelError => "ERR_MODEL",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map an inference error onto its exit code.
    pub fn for_error(err: &Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidConfig => ExitCode::ArgsError,
            ErrorKind::InvalidData | ErrorKind::InsufficientData => ExitCode::DataError,
            ErrorKind::InvalidPrior | ErrorKind::ModelMismatch | ErrorKind::NotImplemented => {
                ExitCode::ModelError
            }
            ErrorKind::Internal => ExitCode::InternalError,
            ErrorKind::Io | ErrorKind::Json => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::DataError.as_i32(), 11);
        assert_eq!(ExitCode::ModelError.as_i32(), 12);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn test_exit_code_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::DataError.is_user_error());
        assert!(!ExitCode::DataError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ExitCode::for_error(&Error::InsufficientData("x".into())),
            ExitCode::DataError
        );
        assert_eq!(
            ExitCode::for_error(&Error::NotImplemented("gamma".into())),
            ExitCode::ModelError
        );
        assert_eq!(
            ExitCode::for_error(&Error::InvalidConfig("x".into())),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Internal("x".into())),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::ModelError.to_string(), "ERR_MODEL (12)");
    }
}
