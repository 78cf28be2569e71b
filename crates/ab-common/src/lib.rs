//! Shared types for Bayesian A/B inference.
//!
//! This crate provides the types every other layer agrees on:
//! - Normalized input data with a data-quality snapshot
//! - Model configuration (structure, family, component count)
//! - The error taxonomy with stable codes
//! - Output format selection

pub mod data;
pub mod error;
pub mod model;
pub mod output;

pub use data::{BinomialData, DataQuality, StandardData, UserLevelData, UserRecord};
pub use error::{Error, ErrorCategory, ErrorKind, ErrorResponse, Result};
pub use model::{Family, ModelConfig, Structure};
pub use output::OutputFormat;
