//! Finite mixtures fitted by variational Bayes EM.

pub mod kmeans;
pub mod posterior;
pub mod vbem;

pub use posterior::MixturePosterior;
pub use vbem::{LogNormalMixtureVbem, MixtureVbem, NormalMixtureVbem, VbemOutcome};
