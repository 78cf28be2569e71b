//! Inference engines and the posterior contract they produce.

pub mod compound;
pub mod conjugate;
pub mod engine;
pub mod mixture;
pub mod posterior;
pub mod registry;
pub mod sampling;

pub use compound::{CompoundEngine, CompoundPosterior};
pub use conjugate::{
    BetaBinomialConjugate, BetaPosterior, LogNormalConjugate, NigPosterior, NormalConjugate, Scale,
};
pub use engine::{
    AlgorithmKind, ConjugateEngine, Diagnostics, EngineCapabilities, FallbackDecision, FitReport,
    InferenceEngine, InferenceResult, ResultMetadata,
};
pub use mixture::{LogNormalMixtureVbem, MixturePosterior, NormalMixtureVbem};
pub use posterior::{
    ComponentSummary, Decomposition, ParameterDraw, Posterior, PosteriorCapabilities,
    PosteriorSummary,
};
pub use registry::{EngineKind, EngineRegistry};
