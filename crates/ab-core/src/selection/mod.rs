//! Information-criterion model selection.
//!
//! WAIC uses adaptive subsampling for large samples; BIC uses the plug-in
//! log likelihood. Both scores are reported per observation so candidates
//! fitted to samples of different sizes stay comparable.

pub mod bic;
pub mod compare;
pub mod waic;

pub use bic::{compute_bic, BicResult};
pub use compare::{
    compare_configs, compare_models, Candidate, Criterion, CriterionDetails, DroppedCandidate,
    ModelComparison, RankedModel,
};
pub use waic::{
    compute_waic, observations, stratified_subsample, Observations, SubsamplePlan, WaicMethod,
    WaicResult,
};
