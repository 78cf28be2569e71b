//! Ranking candidate models by an information criterion.

use std::sync::Arc;

use ab_common::{Error, ModelConfig, Result, StandardData};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::bic::{compute_bic, BicResult};
use super::waic::{compute_waic, observations, Observations, WaicResult};
use crate::config::FitOptions;
use crate::events::{event_names as progress_events, ProgressEvent, ProgressStage};
use crate::inference::{EngineRegistry, InferenceResult, Posterior};
use crate::logging::{event_names, generate_run_id, Stage};

/// Salt mixed into the run seed for subsampling and parameter draws.
const COMPARE_SEED_SALT: u64 = 0xC0;

/// Information criterion used for ranking. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    #[default]
    Waic,
    Bic,
    /// Deviance information criterion (not available).
    Dic,
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criterion::Waic => write!(f, "waic"),
            Criterion::Bic => write!(f, "bic"),
            Criterion::Dic => write!(f, "dic"),
        }
    }
}

/// A fitted model entered into a comparison.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub posterior: Arc<dyn Posterior>,
    pub config: ModelConfig,
}

impl Candidate {
    pub fn new(name: impl Into<String>, posterior: Arc<dyn Posterior>, config: ModelConfig) -> Self {
        Self {
            name: name.into(),
            posterior,
            config,
        }
    }

    /// Candidate named after the fitted configuration.
    pub fn from_result(result: &InferenceResult) -> Self {
        Self::new(
            result.metadata.config.to_string(),
            result.posterior.clone(),
            result.metadata.config,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionDetails {
    Waic(WaicResult),
    Bic(BicResult),
}

impl CriterionDetails {
    pub fn score(&self) -> f64 {
        match self {
            CriterionDetails::Waic(w) => w.waic,
            CriterionDetails::Bic(b) => b.bic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedModel {
    pub name: String,
    pub config: ModelConfig,
    pub score: f64,
    /// Score minus the best score; 0 for the best model.
    pub delta: f64,
    /// Akaike-style weight `exp(-delta/2)`, normalized.
    pub weight: f64,
    pub details: CriterionDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedCandidate {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub criterion: Criterion,
    /// Ascending by score.
    pub ranked: Vec<RankedModel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedCandidate>,
    pub best: String,
}

impl ModelComparison {
    pub fn best_model(&self) -> Option<&RankedModel> {
        self.ranked.first()
    }

    pub fn get(&self, name: &str) -> Option<&RankedModel> {
        self.ranked.iter().find(|m| m.name == name)
    }
}

fn score_candidate(
    candidate: &Candidate,
    values: &Observations,
    criterion: Criterion,
    seed: u64,
) -> Result<CriterionDetails> {
    match criterion {
        Criterion::Waic => {
            // Same seed per candidate: every model sees the same subsample.
            let mut rng = StdRng::seed_from_u64(seed);
            compute_waic(candidate.posterior.as_ref(), values, &mut rng).map(CriterionDetails::Waic)
        }
        Criterion::Bic => {
            compute_bic(candidate.posterior.as_ref(), &candidate.config, values).map(CriterionDetails::Bic)
        }
        Criterion::Dic => Err(Error::NotImplemented("DIC is not available".into())),
    }
}

/// Score every candidate on `data` and rank them.
///
/// A candidate whose score cannot be computed is dropped; the comparison
/// fails only when every candidate is dropped.
pub fn compare_models(
    candidates: &[Candidate],
    data: &StandardData,
    criterion: Criterion,
    options: &FitOptions,
) -> Result<ModelComparison> {
    if criterion == Criterion::Dic {
        return Err(Error::NotImplemented("DIC is not available".into()));
    }
    if candidates.is_empty() {
        return Err(Error::InvalidConfig("model comparison needs at least one candidate".into()));
    }
    data.validate()?;
    compare_with_drops(candidates, Vec::new(), data, criterion, options)
}

fn compare_with_drops(
    candidates: &[Candidate],
    mut dropped: Vec<DroppedCandidate>,
    data: &StandardData,
    criterion: Criterion,
    options: &FitOptions,
) -> Result<ModelComparison> {
    let run_id = generate_run_id();
    let span = tracing::info_span!("compare", run_id = %run_id, stage = %Stage::Compare);
    let _guard = span.enter();

    let values = observations(data);
    let total = candidates.len() as u64;
    tracing::info!(
        target: event_names::COMPARE_STARTED,
        criterion = %criterion,
        candidates = total,
        n = values.len() as u64,
        "comparing models"
    );
    options.emit(
        ProgressEvent::new(progress_events::COMPARE_STARTED, ProgressStage::Compare)
            .with_run_id(run_id.clone())
            .with_progress(0, Some(total))
            .with_detail("criterion", criterion),
    );

    let seed = options.derive_seed(COMPARE_SEED_SALT);
    let mut scored: Vec<(&Candidate, CriterionDetails)> = Vec::with_capacity(candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        match score_candidate(candidate, &values, criterion, seed) {
            Ok(details) => {
                if let CriterionDetails::Waic(w) = &details {
                    if w.subsampled {
                        tracing::debug!(
                            target: event_names::COMPARE_SUBSAMPLED,
                            candidate = %candidate.name,
                            n_original = w.n_original as u64,
                            n_used = w.n_used as u64,
                            "subsampled for WAIC"
                        );
                    }
                }
                tracing::info!(
                    target: event_names::COMPARE_CANDIDATE_SCORED,
                    candidate = %candidate.name,
                    score = details.score(),
                    "candidate scored"
                );
                scored.push((candidate, details));
            }
            Err(err) => {
                tracing::warn!(
                    target: event_names::COMPARE_CANDIDATE_FAILED,
                    candidate = %candidate.name,
                    error = %err,
                    "dropping candidate"
                );
                dropped.push(DroppedCandidate {
                    name: candidate.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
        options.emit(
            ProgressEvent::new(progress_events::COMPARE_CANDIDATE, ProgressStage::Compare)
                .with_run_id(run_id.clone())
                .with_progress(i as u64 + 1, Some(total))
                .with_detail("candidate", &candidate.name),
        );
    }

    if scored.is_empty() {
        let reasons: Vec<String> = dropped
            .iter()
            .map(|d| format!("{}: {}", d.name, d.reason))
            .collect();
        return Err(Error::Internal(format!(
            "every candidate failed {criterion} scoring ({})",
            reasons.join("; ")
        )));
    }

    scored.sort_by(|a, b| a.1.score().total_cmp(&b.1.score()));
    let best_score = scored[0].1.score();
    let raw: Vec<f64> = scored
        .iter()
        .map(|(_, d)| (-(d.score() - best_score) / 2.0).exp())
        .collect();
    let total_weight: f64 = raw.iter().sum();

    let ranked: Vec<RankedModel> = scored
        .into_iter()
        .zip(raw)
        .map(|((candidate, details), w)| RankedModel {
            name: candidate.name.clone(),
            config: candidate.config,
            score: details.score(),
            delta: details.score() - best_score,
            weight: w / total_weight,
            details,
        })
        .collect();
    let best = ranked[0].name.clone();

    tracing::info!(
        target: event_names::COMPARE_FINISHED,
        best = %best,
        ranked = ranked.len() as u64,
        dropped = dropped.len() as u64,
        "comparison finished"
    );
    options.emit(
        ProgressEvent::new(progress_events::COMPARE_COMPLETE, ProgressStage::Compare)
            .with_run_id(run_id)
            .with_progress(total, Some(total))
            .with_detail("best", &best),
    );

    Ok(ModelComparison {
        criterion,
        ranked,
        dropped,
        best,
    })
}

/// Fit each configuration on `data` and compare the results.
///
/// Configurations that fail to fit are dropped like candidates that fail
/// to score.
pub fn compare_configs(
    configs: &[ModelConfig],
    data: &StandardData,
    criterion: Criterion,
    options: &FitOptions,
) -> Result<ModelComparison> {
    if criterion == Criterion::Dic {
        return Err(Error::NotImplemented("DIC is not available".into()));
    }
    if configs.is_empty() {
        return Err(Error::InvalidConfig("model comparison needs at least one candidate".into()));
    }
    data.validate()?;
    let registry = EngineRegistry::new();
    let mut candidates = Vec::with_capacity(configs.len());
    let mut dropped = Vec::new();
    for config in configs {
        let fitted = registry
            .resolve(config, data.kind())
            .and_then(|(_, engine)| engine.fit(data, config, options));
        match fitted {
            Ok(result) => candidates.push(Candidate::new(
                config.to_string(),
                result.posterior,
                result.metadata.config,
            )),
            Err(err) => {
                tracing::warn!(
                    target: event_names::COMPARE_CANDIDATE_FAILED,
                    candidate = %config,
                    error = %err,
                    "candidate failed to fit"
                );
                dropped.push(DroppedCandidate {
                    name: config.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
    if candidates.is_empty() {
        let reasons: Vec<String> = dropped
            .iter()
            .map(|d| format!("{}: {}", d.name, d.reason))
            .collect();
        return Err(Error::Internal(format!(
            "every candidate failed to fit ({})",
            reasons.join("; ")
        )));
    }
    compare_with_drops(&candidates, dropped, data, criterion, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEmitter;
    use crate::inference::conjugate::BetaBinomialConjugate;
    use crate::inference::posterior::PosteriorCapabilities;
    use ab_common::{ErrorKind, Family};
    use ab_math::BetaParams;
    use rand::RngCore;

    fn beta_candidate(name: &str, successes: f64, failures: f64) -> Candidate {
        let post = BetaBinomialConjugate
            .posterior(&BetaParams::uniform(), successes, failures)
            .unwrap();
        Candidate::new(name, Arc::new(post), ModelConfig::simple(Family::Beta, 1))
    }

    /// Posterior with no way to evaluate anything.
    #[derive(Debug)]
    struct Opaque;

    impl Posterior for Opaque {
        fn family(&self) -> String {
            "opaque".into()
        }
        fn capabilities(&self) -> PosteriorCapabilities {
            PosteriorCapabilities {
                analytical: false,
                parameter_sampling: false,
                log_pdf: false,
            }
        }
        fn sample(&self, n: usize, _rng: &mut dyn RngCore) -> Vec<f64> {
            vec![0.0; n]
        }
        fn mean(&self) -> Option<f64> {
            None
        }
        fn variance(&self) -> Option<f64> {
            None
        }
        fn credible_interval(&self, _level: f64) -> Option<(f64, f64)> {
            None
        }
        fn log_pdf(&self, _x: f64) -> Option<f64> {
            None
        }
    }

    fn data() -> StandardData {
        StandardData::binomial(30, 100).unwrap()
    }

    #[test]
    fn best_model_has_zero_delta_and_weights_sum_to_one() {
        let candidates = vec![
            beta_candidate("far", 70.0, 30.0),
            beta_candidate("near", 30.0, 70.0),
            beta_candidate("mid", 45.0, 55.0),
        ];
        let options = FitOptions::default().with_seed(4);
        let cmp = compare_models(&candidates, &data(), Criterion::Waic, &options).unwrap();
        assert_eq!(cmp.best, "near");
        assert_eq!(cmp.ranked.iter().filter(|m| m.delta == 0.0).count(), 1);
        let total: f64 = cmp.ranked.iter().map(|m| m.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(cmp.ranked.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[test]
    fn failing_candidate_is_dropped() {
        let candidates = vec![
            beta_candidate("ok", 30.0, 70.0),
            Candidate::new("opaque", Arc::new(Opaque), ModelConfig::simple(Family::Beta, 1)),
        ];
        let cmp = compare_models(&candidates, &data(), Criterion::Waic, &FitOptions::default().with_seed(1))
            .unwrap();
        assert_eq!(cmp.ranked.len(), 1);
        assert_eq!(cmp.dropped.len(), 1);
        assert_eq!(cmp.dropped[0].name, "opaque");
        assert!((cmp.ranked[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn all_failing_is_internal_error() {
        let candidates = vec![Candidate::new(
            "opaque",
            Arc::new(Opaque),
            ModelConfig::simple(Family::Beta, 1),
        )];
        let err = compare_models(&candidates, &data(), Criterion::Bic, &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn empty_candidates_and_dic_are_rejected() {
        let err = compare_models(&[], &data(), Criterion::Waic, &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        let candidates = vec![beta_candidate("a", 1.0, 1.0)];
        let err = compare_models(&candidates, &data(), Criterion::Dic, &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn bic_ranking() {
        let candidates = vec![beta_candidate("near", 30.0, 70.0), beta_candidate("far", 80.0, 20.0)];
        let cmp = compare_models(&candidates, &data(), Criterion::Bic, &FitOptions::default()).unwrap();
        assert_eq!(cmp.best, "near");
        assert!(matches!(cmp.ranked[0].details, CriterionDetails::Bic(_)));
    }

    #[test]
    fn compare_emits_progress() {
        let recorder = Arc::new(RecordingEmitter::new());
        let options = FitOptions::default().with_seed(2).with_progress(recorder.clone());
        let candidates = vec![beta_candidate("a", 30.0, 70.0), beta_candidate("b", 50.0, 50.0)];
        compare_models(&candidates, &data(), Criterion::Waic, &options).unwrap();
        assert_eq!(recorder.named(progress_events::COMPARE_STARTED).len(), 1);
        assert_eq!(recorder.named(progress_events::COMPARE_CANDIDATE).len(), 2);
        assert_eq!(recorder.named(progress_events::COMPARE_COMPLETE).len(), 1);
    }

    #[test]
    fn compare_configs_drops_unfittable_configs() {
        let configs = vec![
            ModelConfig::simple(Family::Beta, 1),
            ModelConfig::simple(Family::Normal, 1),
        ];
        let cmp = compare_configs(&configs, &data(), Criterion::Waic, &FitOptions::default().with_seed(3))
            .unwrap();
        assert_eq!(cmp.best, "simple:beta:1");
        // normal engines reject binomial data
        assert_eq!(cmp.dropped.len(), 1);
    }
}
