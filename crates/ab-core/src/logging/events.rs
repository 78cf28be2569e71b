//! Structured event vocabulary for logging.
//!
//! Every engine logs with `target:` set to one of the [`event_names`]
//! constants, so JSONL consumers can filter on the `event` key.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Processing stages of one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration loading.
    Init,
    /// Model routing.
    Route,
    /// Engine fitting (conjugate, compound).
    Fit,
    /// Variational mixture iterations.
    Vbem,
    /// Information-criterion comparison.
    Compare,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Route => "route",
            Stage::Fit => "fit",
            Stage::Vbem => "vbem",
            Stage::Compare => "compare",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Configuration
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";

    // Routing
    pub const ROUTE_DECIDED: &str = "route.decided";
    pub const ROUTE_FALLBACK: &str = "route.fallback";

    // Fitting
    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_UPDATE: &str = "fit.update";
    pub const FIT_FINISHED: &str = "fit.finished";
    pub const FIT_VALUES_EXCLUDED: &str = "fit.values_excluded";

    // Variational mixture
    pub const VBEM_INITIALIZED: &str = "vbem.initialized";
    pub const VBEM_ITERATION: &str = "vbem.iteration";
    pub const VBEM_ELBO_DECREASE: &str = "vbem.elbo_decrease";
    pub const VBEM_FALLBACK: &str = "vbem.fallback";
    pub const VBEM_CONVERGED: &str = "vbem.converged";
    pub const VBEM_MAX_ITERATIONS: &str = "vbem.max_iterations";

    // Model comparison
    pub const COMPARE_STARTED: &str = "compare.started";
    pub const COMPARE_SUBSAMPLED: &str = "compare.subsampled";
    pub const COMPARE_CANDIDATE_SCORED: &str = "compare.candidate_scored";
    pub const COMPARE_CANDIDATE_FAILED: &str = "compare.candidate_failed";
    pub const COMPARE_FINISHED: &str = "compare.finished";

    // Error events
    pub const INTERNAL_ERROR: &str = "internal_error";
}
