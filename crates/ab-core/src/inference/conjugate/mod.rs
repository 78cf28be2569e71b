//! Closed-form conjugate engines.

pub mod beta_binomial;
pub mod lognormal;
pub mod nig;
pub mod normal;

pub use beta_binomial::{BetaBinomialConjugate, BetaPosterior};
pub use lognormal::LogNormalConjugate;
pub use nig::{NigFamily, NigPosterior, Scale};
pub use normal::NormalConjugate;
