//! Data-driven model routing.
//!
//! [`ModelRouter::route`] inspects the data and picks a structure, value
//! family and component count. Each step appends a reason to the decision's
//! audit trail; the same decision is logged as `route.decided`.

use ab_common::data::DataKind;
use ab_common::{Error, Family, ModelConfig, Result, StandardData};
use ab_math::stats;
use serde::{Deserialize, Serialize};

use crate::config::FitOptions;
use crate::inference::{EngineKind, EngineRegistry, InferenceResult};
use crate::logging::{event_names, generate_run_id, Stage};

/// Below this many non-zero values a single component is used.
pub const MIN_POINTS_FOR_MIXTURE: usize = 50;
/// Skewness above which positive data is modelled as LogNormal.
pub const SKEWNESS_THRESHOLD: f64 = 2.0;
/// Coefficient of variation above which positive data is modelled as LogNormal.
pub const CV_THRESHOLD: f64 = 1.0;
/// Excess kurtosis above which two components are used.
pub const KURTOSIS_THRESHOLD: f64 = 3.0;
/// Mean quartile-to-median gap, as a share of the range, that suggests two modes.
pub const QUARTILE_GAP_SHARE: f64 = 0.3;

const BASE_CONFIDENCE: f64 = 0.9;
const CONFIDENCE_PENALTY: f64 = 0.1;
const MIN_CONFIDENCE: f64 = 0.5;

/// Statistics the decision was based on.
///
/// Moments are computed on the non-zero values; NaN (serialized as `null`)
/// when there are too few of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub n: usize,
    pub positive_count: usize,
    pub skewness: f64,
    pub kurtosis: f64,
    pub cv: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl DataSummary {
    fn of(data: &StandardData, non_zero: &[f64]) -> Self {
        let quartiles = stats::quartiles(non_zero);
        Self {
            n: data.n(),
            positive_count: data.positive_values().len(),
            skewness: stats::skewness(non_zero),
            kurtosis: stats::excess_kurtosis(non_zero),
            cv: stats::coefficient_of_variation(non_zero),
            q1: quartiles.map_or(f64::NAN, |q| q.q1),
            median: quartiles.map_or(f64::NAN, |q| q.median),
            q3: quartiles.map_or(f64::NAN, |q| q.q3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub config: ModelConfig,
    pub engine: EngineKind,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub data_summary: DataSummary,
}

/// A routed fit: the decision and the result of fitting it.
#[derive(Debug, Clone)]
pub struct RoutedFit {
    pub decision: RouteDecision,
    pub result: InferenceResult,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    registry: EngineRegistry,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Choose a model configuration and engine for `data`.
    pub fn route(&self, data: &StandardData) -> Result<RouteDecision> {
        data.validate()?;
        let run_id = generate_run_id();
        let span = tracing::info_span!("route", run_id = %run_id, stage = %Stage::Route);
        let _guard = span.enter();

        let decision = match data.kind() {
            DataKind::Binomial => route_binomial(data),
            DataKind::UserLevel => route_user_level(data),
        };
        let decision = self.attach_engine(decision);

        tracing::info!(
            target: event_names::ROUTE_DECIDED,
            config = %decision.config,
            engine = %decision.engine,
            confidence = decision.confidence,
            reasons = decision.reasoning.len() as u64,
            "route decided"
        );
        Ok(decision)
    }

    /// Route, then fit the chosen engine.
    pub fn fit(&self, data: &StandardData, options: &FitOptions) -> Result<RoutedFit> {
        let decision = self.route(data)?;
        let engine = self
            .registry
            .get(decision.engine)
            .ok_or_else(|| Error::Internal(format!("engine {} is not registered", decision.engine)))?;
        let result = engine.fit(data, &decision.config, options)?;
        Ok(RoutedFit { decision, result })
    }

    /// Fit an explicitly requested configuration.
    ///
    /// Fails with `INVALID_CONFIG` when no engine declares support for the
    /// configuration on this data, and `NOT_IMPLEMENTED` for Gamma.
    pub fn fit_with_config(
        &self,
        data: &StandardData,
        config: &ModelConfig,
        options: &FitOptions,
    ) -> Result<InferenceResult> {
        data.validate()?;
        let (_, engine) = self.registry.resolve(config, data.kind())?;
        engine.fit(data, config, options)
    }

    fn attach_engine(&self, mut pending: PendingDecision) -> RouteDecision {
        let engine = match EngineKind::for_config(&pending.config) {
            Ok(kind) => kind,
            Err(err) => {
                let fallback = ModelConfig::simple(Family::LogNormal, 1);
                tracing::warn!(
                    target: event_names::ROUTE_FALLBACK,
                    requested = %pending.config,
                    error = %err,
                    "no engine for routed config, using lognormal-conjugate"
                );
                pending.reasoning.push(format!(
                    "No engine is registered for {}; falling back to {fallback}",
                    pending.config
                ));
                pending.config = fallback;
                EngineKind::LogNormalConjugate
            }
        };
        pending.reasoning.push(format!("Engine: {engine}"));
        RouteDecision {
            config: pending.config,
            engine,
            confidence: pending.confidence,
            reasoning: pending.reasoning,
            data_summary: pending.summary,
        }
    }
}

struct PendingDecision {
    config: ModelConfig,
    confidence: f64,
    reasoning: Vec<String>,
    summary: DataSummary,
}

fn route_binomial(data: &StandardData) -> PendingDecision {
    PendingDecision {
        config: ModelConfig::simple(Family::Beta, 1),
        confidence: 1.0,
        reasoning: vec!["Binomial data: Beta-Binomial conjugate model".to_string()],
        summary: DataSummary::of(data, &[]),
    }
}

fn route_user_level(data: &StandardData) -> PendingDecision {
    let quality = data.quality();
    let non_zero = data.non_zero_values();
    let summary = DataSummary::of(data, &non_zero);
    let mut reasoning = Vec::new();
    let mut confidence = BASE_CONFIDENCE;

    let compound = quality.has_zeros;
    if compound {
        let rate = data.conversion_rate();
        reasoning.push(format!(
            "Zero values present ({:.1}% converted): compound model with Beta frequency",
            rate * 100.0
        ));
    } else {
        reasoning.push("No zero values: simple model".to_string());
    }

    let family = if quality.has_negatives {
        reasoning.push("Negative values present: Normal value family".to_string());
        if compound {
            let negatives = non_zero.iter().filter(|v| **v < 0.0).count();
            reasoning.push(format!(
                "Compound value model fits positive values only: {negatives} negative values are excluded"
            ));
        }
        Family::Normal
    } else if summary.skewness > SKEWNESS_THRESHOLD {
        reasoning.push(format!(
            "Skewness {:.2} > {SKEWNESS_THRESHOLD}: LogNormal value family",
            summary.skewness
        ));
        Family::LogNormal
    } else if summary.cv > CV_THRESHOLD {
        reasoning.push(format!(
            "Coefficient of variation {:.2} > {CV_THRESHOLD}: LogNormal value family",
            summary.cv
        ));
        Family::LogNormal
    } else {
        reasoning.push("No strong shape signal: LogNormal value family by default".to_string());
        confidence -= CONFIDENCE_PENALTY;
        Family::LogNormal
    };

    let components = choose_components(&non_zero, family, &mut reasoning);

    if non_zero.len() < MIN_POINTS_FOR_MIXTURE {
        confidence -= CONFIDENCE_PENALTY;
    }
    if quality.has_outliers {
        reasoning.push("Outliers detected beyond the far Tukey fences".to_string());
        confidence -= CONFIDENCE_PENALTY;
    }

    let config = if compound {
        ModelConfig::compound(family, components)
    } else {
        ModelConfig::simple(family, components)
    };
    PendingDecision {
        config,
        confidence: confidence.max(MIN_CONFIDENCE),
        reasoning,
        summary,
    }
}

/// Component count from the shape of the values on the modelling scale.
fn choose_components(non_zero: &[f64], family: Family, reasoning: &mut Vec<String>) -> usize {
    if non_zero.len() < MIN_POINTS_FOR_MIXTURE {
        reasoning.push(format!(
            "{} non-zero values < {MIN_POINTS_FOR_MIXTURE}: single component",
            non_zero.len()
        ));
        return 1;
    }
    let scaled: Vec<f64> = match family {
        Family::LogNormal => non_zero.iter().filter(|v| **v > 0.0).map(|v| v.ln()).collect(),
        _ => non_zero.to_vec(),
    };

    let kurtosis = stats::excess_kurtosis(&scaled);
    if kurtosis > KURTOSIS_THRESHOLD {
        reasoning.push(format!(
            "Excess kurtosis {kurtosis:.2} > {KURTOSIS_THRESHOLD}: two components"
        ));
        return 2;
    }
    if let Some(q) = stats::quartiles(&scaled) {
        let range = stats::range(&scaled);
        let gap = ((q.median - q.q1) + (q.q3 - q.median)) / 2.0;
        if range > 0.0 && gap > QUARTILE_GAP_SHARE * range {
            reasoning.push(format!(
                "Quartile gap {:.0}% of range > {:.0}%: two components",
                gap / range * 100.0,
                QUARTILE_GAP_SHARE * 100.0
            ));
            return 2;
        }
    }
    reasoning.push("Unimodal shape: single component".to_string());
    1
}
