//! Distribution math for Bayesian A/B inference.
//!
//! Everything here is deterministic and allocation-light: special functions,
//! closed-form conjugate parameter types and descriptive statistics. Sampling
//! lives in `ab-core`, which owns the RNG.

pub mod math;

pub use math::beta::*;
pub use math::dirichlet;
pub use math::dirichlet::DirichletParams;
pub use math::gamma::*;
pub use math::nig;
pub use math::nig::{NigParams, SufficientStats};
pub use math::normal::*;
pub use math::stable::*;
pub use math::stats;
