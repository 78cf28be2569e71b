//! Bayesian A/B inference core.
//!
//! This library provides:
//! - Conjugate Beta, Normal and LogNormal engines
//! - VBEM mixture engines with a Dirichlet posterior over weights
//! - The compound (zero-inflated) engine
//! - Data-driven model routing
//! - WAIC/BIC model comparison
//! - Fit options, structured logging, progress events and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod events;
pub mod exit_codes;
pub mod inference;
pub mod logging;
pub mod router;
pub mod selection;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::FitOptions;
pub use inference::{InferenceEngine, InferenceResult, Posterior};
pub use router::{ModelRouter, RouteDecision};
pub use selection::{compare_models, Criterion, ModelComparison};
