//! Engine traits and the fit result.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ab_common::data::DataKind;
use ab_common::{DataQuality, Error, Family, ModelConfig, Result, StandardData, Structure};
use ab_math::SufficientStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::posterior::{Posterior, PosteriorSummary};
use crate::config::FitOptions;
use crate::events::{event_names as progress_events, ProgressEvent, ProgressStage};
use crate::logging::{event_names, generate_run_id};

/// How a posterior was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Conjugate,
    Vbem,
    Compound,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmKind::Conjugate => write!(f, "conjugate"),
            AlgorithmKind::Vbem => write!(f, "vbem"),
            AlgorithmKind::Compound => write!(f, "compound"),
        }
    }
}

/// What an engine accepts, used for compatibility checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    pub structures: Vec<Structure>,
    pub families: Vec<Family>,
    pub data_types: Vec<DataKind>,
    pub min_components: usize,
    /// `None` means unbounded.
    pub max_components: Option<usize>,
    pub exact: bool,
    pub fast: bool,
    pub stable: bool,
}

impl EngineCapabilities {
    /// Whether a (config, data kind) pair falls inside these capabilities.
    pub fn supports(&self, config: &ModelConfig, data: DataKind) -> bool {
        self.mismatch(config, data).is_none()
    }

    /// Fails with `MODEL_MISMATCH` describing the first unsupported aspect.
    pub fn check(&self, engine: &str, config: &ModelConfig, data: DataKind) -> Result<()> {
        match self.mismatch(config, data) {
            None => Ok(()),
            Some(reason) => Err(Error::ModelMismatch(format!("{engine}: {reason}"))),
        }
    }

    fn mismatch(&self, config: &ModelConfig, data: DataKind) -> Option<String> {
        if !self.data_types.contains(&data) {
            return Some(format!("{data} data is not supported"));
        }
        if !self.structures.contains(&config.structure()) {
            return Some(format!("{} structure is not supported", config.structure()));
        }
        if !self.families.contains(&config.value_family()) {
            return Some(format!("{} family is not supported", config.value_family()));
        }
        let k = config.components();
        if k < self.min_components || self.max_components.is_some_and(|max| k > max) {
            return Some(format!("{k} components are not supported"));
        }
        None
    }
}

/// A mixture fit that ran with fewer components than requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackDecision {
    pub requested_components: usize,
    pub used_components: usize,
    pub reason: String,
}

/// Convergence and bookkeeping for one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Family or engine label of the model actually fitted.
    pub model_type: String,
    pub converged: bool,
    pub iterations: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elbo_history: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub likelihood_history: Vec<f64>,
    pub runtime_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Box<Diagnostics>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Box<Diagnostics>>,
}

impl Diagnostics {
    /// Single-step exact fit.
    pub fn exact(model_type: impl Into<String>, runtime_ms: f64) -> Self {
        Self {
            model_type: model_type.into(),
            converged: true,
            iterations: 1,
            elbo_history: Vec::new(),
            likelihood_history: Vec::new(),
            runtime_ms,
            fallback: None,
            warnings: Vec::new(),
            frequency: None,
            severity: None,
        }
    }
}

/// Provenance of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub run_id: String,
    pub engine: String,
    pub algorithm: AlgorithmKind,
    pub config: ModelConfig,
    pub capabilities: EngineCapabilities,
    pub data_quality: DataQuality,
    pub fitted_at: DateTime<Utc>,
}

/// Output of a fit.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub posterior: Arc<dyn Posterior>,
    pub diagnostics: Diagnostics,
    pub metadata: ResultMetadata,
}

/// Serializable view of an [`InferenceResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub posterior: PosteriorSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<super::posterior::ComponentSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decomposition: Option<super::posterior::Decomposition>,
    pub diagnostics: Diagnostics,
    pub metadata: ResultMetadata,
}

impl InferenceResult {
    pub fn report(&self) -> FitReport {
        FitReport {
            posterior: self.posterior.summary(),
            components: self.posterior.components(),
            decomposition: self.posterior.decomposition(),
            diagnostics: self.diagnostics.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A model-fitting engine.
pub trait InferenceEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> EngineCapabilities;

    fn fit(
        &self,
        data: &StandardData,
        config: &ModelConfig,
        options: &FitOptions,
    ) -> Result<InferenceResult>;
}

/// Closed-form engines reusable as building blocks.
pub trait ConjugateEngine: InferenceEngine {
    type Prior: Clone + fmt::Debug;
    type Posterior: Posterior + Clone + 'static;

    /// Prior from `options.prior_params`, or the engine default.
    fn prior(&self, options: &FitOptions) -> Result<Self::Prior>;

    /// Conjugate update of `prior` by `stats`.
    fn update(
        &self,
        prior: &Self::Prior,
        stats: &SufficientStats,
        seed: u64,
    ) -> Result<Self::Posterior>;

    /// Sufficient statistics of raw `values`, optionally weighted.
    fn stats(&self, values: &[f64], weights: Option<&[f64]>) -> Result<SufficientStats>;

    fn fit_weighted(
        &self,
        values: &[f64],
        weights: &[f64],
        options: &FitOptions,
    ) -> Result<Self::Posterior> {
        let stats = self.stats(values, Some(weights))?;
        self.fit_from_stats(&stats, options)
    }

    fn fit_from_stats(
        &self,
        stats: &SufficientStats,
        options: &FitOptions,
    ) -> Result<Self::Posterior> {
        let prior = self.prior(options)?;
        self.update(&prior, stats, options.derive_seed(0))
    }
}

/// Bookkeeping shared by every engine's `fit`: span, timing, progress
/// events and result assembly.
pub(crate) struct FitRun<'a> {
    engine: &'static str,
    options: &'a FitOptions,
    run_id: String,
    started: Instant,
    span: tracing::Span,
}

impl<'a> FitRun<'a> {
    pub(crate) fn start(engine: &'static str, options: &'a FitOptions) -> Self {
        let run_id = generate_run_id();
        let span = tracing::info_span!("fit", run_id = %run_id, stage = "fit", engine);
        {
            let _guard = span.enter();
            tracing::debug!(target: event_names::FIT_STARTED, engine, "fit started");
        }
        options.emit(
            ProgressEvent::new(progress_events::FIT_STARTED, ProgressStage::Fit)
                .with_run_id(run_id.clone())
                .with_detail("engine", engine),
        );
        Self {
            engine,
            options,
            run_id,
            started: Instant::now(),
            span,
        }
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }

    pub(crate) fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub(crate) fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub(crate) fn finish(
        self,
        posterior: Arc<dyn Posterior>,
        diagnostics: Diagnostics,
        algorithm: AlgorithmKind,
        config: ModelConfig,
        capabilities: EngineCapabilities,
        data_quality: DataQuality,
    ) -> InferenceResult {
        {
            let _guard = self.span.enter();
            tracing::info!(
                target: event_names::FIT_FINISHED,
                engine = self.engine,
                model_type = %diagnostics.model_type,
                converged = diagnostics.converged,
                iterations = diagnostics.iterations as u64,
                runtime_ms = diagnostics.runtime_ms,
                "fit finished"
            );
        }
        self.options.emit(
            ProgressEvent::new(progress_events::FIT_COMPLETE, ProgressStage::Fit)
                .with_run_id(self.run_id.clone())
                .with_detail("engine", self.engine)
                .with_detail("converged", diagnostics.converged),
        );
        InferenceResult {
            posterior,
            diagnostics,
            metadata: ResultMetadata {
                run_id: self.run_id,
                engine: self.engine.to_string(),
                algorithm,
                config,
                capabilities,
                data_quality,
                fitted_at: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> EngineCapabilities {
        EngineCapabilities {
            structures: vec![Structure::Simple],
            families: vec![Family::Normal],
            data_types: vec![DataKind::UserLevel],
            min_components: 1,
            max_components: Some(1),
            exact: true,
            fast: true,
            stable: true,
        }
    }

    #[test]
    fn supports_matching_config() {
        let caps = caps();
        assert!(caps.supports(&ModelConfig::simple(Family::Normal, 1), DataKind::UserLevel));
        assert!(!caps.supports(&ModelConfig::simple(Family::Normal, 2), DataKind::UserLevel));
        assert!(!caps.supports(&ModelConfig::simple(Family::LogNormal, 1), DataKind::UserLevel));
        assert!(!caps.supports(&ModelConfig::simple(Family::Normal, 1), DataKind::Binomial));
    }

    #[test]
    fn check_reports_model_mismatch() {
        let err = caps()
            .check("normal", &ModelConfig::compound(Family::Normal, 1), DataKind::UserLevel)
            .unwrap_err();
        assert_eq!(err.kind(), ab_common::ErrorKind::ModelMismatch);
        assert!(err.to_string().contains("compound"));
    }

    #[test]
    fn diagnostics_skip_empty_fields() {
        let json = serde_json::to_value(Diagnostics::exact("beta", 0.1)).unwrap();
        assert_eq!(json["model_type"], "beta");
        assert!(json.get("elbo_history").is_none());
        assert!(json.get("fallback").is_none());
    }
}
