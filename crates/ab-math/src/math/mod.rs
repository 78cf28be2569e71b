//! Core math modules.

pub mod stable;
pub mod beta;
pub mod gamma;
pub mod normal;
pub mod dirichlet;
pub mod nig;
pub mod stats;
