//! Variational Bayes EM for finite Normal and LogNormal mixtures.
//!
//! One generic driver serves both families: components are
//! Normal-Inverse-Gamma posteriors on the model scale (ln x for LogNormal)
//! and the weights carry a Dirichlet posterior.
//!
//! ```text
//! Initialize (k-means++) -> { E-step -> M-step -> ELBO check }* -> converged | max iterations
//! ```
//!
//! The E-step uses the Dirichlet expected log weight ψ(α_k) - ψ(Σα), not
//! ln E[w_k]. The M-step is the conjugate update of each component by its
//! responsibility column, always from the component's fixed prior.
//! Components are re-sorted by ascending mean after every M-step.

use std::sync::Arc;

use ab_common::data::DataKind;
use ab_common::{Error, ModelConfig, Result, StandardData, Structure};
use ab_math::{dirichlet, lognormal_mean, normalize_log_weights, stats, DirichletParams, NigParams};

use super::kmeans::kmeans;
use super::posterior::MixturePosterior;
use crate::config::{FitOptions, PriorFamily, PriorParams};
use crate::events::{event_names as progress_events, ProgressEvent, ProgressStage};
use crate::inference::conjugate::{LogNormalConjugate, NigFamily, NigPosterior, NormalConjugate, Scale};
use crate::inference::engine::{
    AlgorithmKind, ConjugateEngine, Diagnostics, EngineCapabilities, FallbackDecision, FitRun,
    InferenceEngine, InferenceResult,
};
use crate::logging::event_names;

/// Convergence tolerance on |ΔELBO| when none is configured.
pub const DEFAULT_VBEM_TOLERANCE: f64 = 1e-6;
/// ELBO decreases larger than this are reported as warnings.
pub const ELBO_DECREASE_TOLERANCE: f64 = 1e-10;
/// Components below this effective count keep their previous posterior.
pub const MIN_EFFECTIVE_COUNT: f64 = 1e-6;

const COMPONENT_PRIOR_LAMBDA: f64 = 0.01;
const COMPONENT_PRIOR_ALPHA: f64 = 1.0;

pub type NormalMixtureVbem = MixtureVbem<NormalConjugate>;
pub type LogNormalMixtureVbem = MixtureVbem<LogNormalConjugate>;

/// VBEM mixture engine over the conjugate family `E`.
///
/// When the data cannot support the requested component count, K is
/// reduced; at K = 1 the fit is delegated to `E` itself. Both cases are
/// recorded in `Diagnostics::fallback`.
#[derive(Debug, Clone, Default)]
pub struct MixtureVbem<E: NigFamily> {
    conjugate: E,
}

/// Variational state; every vector is indexed by component.
#[derive(Debug, Clone)]
struct VbemState {
    priors: Vec<NigParams>,
    posts: Vec<NigParams>,
    weight_prior: DirichletParams,
    weights: DirichletParams,
    counts: Vec<f64>,
}

/// Raw output of the VBEM loop.
#[derive(Debug, Clone)]
pub struct VbemOutcome {
    pub posterior: MixturePosterior,
    pub converged: bool,
    pub iterations: usize,
    pub elbo_history: Vec<f64>,
    pub warnings: Vec<String>,
}

impl<E: NigFamily> MixtureVbem<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn scale(&self) -> Scale {
        E::SCALE
    }

    /// Largest K the data supports, given `min_points_per_component`.
    pub fn supported_components(n: usize, requested: usize, options: &FitOptions) -> usize {
        let per = options.min_points_per_component.max(1);
        requested.min(n / per).max(1)
    }

    /// Component template and weight prior from the options.
    fn priors(&self, k: usize, pooled_variance: f64, options: &FitOptions) -> Result<(NigParams, DirichletParams)> {
        let default_template = NigParams {
            mu0: 0.0,
            lambda: COMPONENT_PRIOR_LAMBDA,
            alpha: COMPONENT_PRIOR_ALPHA,
            beta: 0.5 * pooled_variance,
        };
        let symmetric = || {
            DirichletParams::symmetric(k, options.dirichlet_concentration).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "dirichlet concentration must be positive, got {}",
                    options.dirichlet_concentration
                ))
            })
        };
        match &options.prior_params {
            None => Ok((default_template, symmetric()?)),
            Some(p) => match p.distribution {
                PriorFamily::Dirichlet => Ok((default_template, p.to_dirichlet(k)?)),
                PriorFamily::NormalInverseGamma => Ok((p.to_nig()?, symmetric()?)),
                PriorFamily::Beta => Err(Error::InvalidPrior(
                    "mixture models take a normal-inverse-gamma or dirichlet prior, got beta".into(),
                )),
            },
        }
    }

    /// Run VBEM with exactly `k >= 2` components on data-scale `values`
    /// that lie in the family's support.
    pub fn run(&self, values: &[f64], k: usize, options: &FitOptions) -> Result<VbemOutcome> {
        let scale = self.scale();
        let y: Vec<f64> = values.iter().map(|x| scale.to_model(*x)).collect();
        if y.is_empty() || y.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(format!(
                "{} mixture values must be finite and inside the support",
                scale.family()
            )));
        }
        let jacobian: f64 = values.iter().map(|x| scale.log_jacobian(*x)).sum();
        let tolerance = options.tolerance_or(DEFAULT_VBEM_TOLERANCE);

        let mut rng = options.rng();
        let seeds = kmeans(&y, k, &mut rng);
        if seeds.centers.len() < k {
            return Err(Error::InsufficientData(format!(
                "only {} distinct seed centers for {k} components",
                seeds.centers.len()
            )));
        }
        let pooled = stats::variance(&y);
        let pooled = if pooled.is_finite() && pooled > 0.0 { pooled } else { 1.0 };
        let (template, weight_prior) = self.priors(k, pooled, options)?;
        let priors: Vec<NigParams> = seeds
            .centers
            .iter()
            .map(|c| NigParams { mu0: *c, ..template })
            .collect();

        // hard k-means assignments act as the first responsibilities
        let mut resp = vec![vec![0.0; k]; y.len()];
        for (row, &a) in resp.iter_mut().zip(&seeds.assignments) {
            row[a] = 1.0;
        }
        let mut state = VbemState {
            posts: priors.clone(),
            priors,
            weights: weight_prior.clone(),
            weight_prior,
            counts: vec![0.0; k],
        };
        self.m_step(&mut state, values, &resp)?;
        sort_components(&mut state, scale);
        tracing::debug!(
            target: event_names::VBEM_INITIALIZED,
            components = k as u64,
            n = y.len() as u64,
            pooled_variance = pooled,
            centers = ?seeds.centers,
            "vbem initialized"
        );

        let mut elbo_history = Vec::new();
        let mut warnings = Vec::new();
        let mut converged = false;
        let mut iterations = 0;
        for iteration in 1..=options.max_iterations {
            iterations = iteration;
            resp = e_step(&state, &y);
            self.m_step(&mut state, values, &resp)?;
            let elbo = elbo(&state, &y, &resp) + jacobian;
            sort_components(&mut state, scale);

            tracing::debug!(
                target: event_names::VBEM_ITERATION,
                iteration = iteration as u64,
                elbo,
                "vbem iteration"
            );
            options.emit(
                ProgressEvent::new(progress_events::VBEM_ITERATION, ProgressStage::Vbem)
                    .with_progress(iteration as u64, Some(options.max_iterations as u64))
                    .with_iteration(iteration as u64)
                    .with_detail("elbo", elbo),
            );

            if let Some(&previous) = elbo_history.last() {
                let delta: f64 = elbo - previous;
                if delta < -ELBO_DECREASE_TOLERANCE {
                    tracing::warn!(
                        target: event_names::VBEM_ELBO_DECREASE,
                        iteration = iteration as u64,
                        delta,
                        "elbo decreased"
                    );
                    warnings.push(format!(
                        "ELBO decreased by {:.3e} at iteration {iteration}",
                        -delta
                    ));
                }
                elbo_history.push(elbo);
                if delta.abs() < tolerance {
                    converged = true;
                    break;
                }
            } else {
                elbo_history.push(elbo);
            }
        }

        if converged {
            tracing::info!(
                target: event_names::VBEM_CONVERGED,
                iterations = iterations as u64,
                elbo = elbo_history.last().copied().unwrap_or(f64::NAN),
                "vbem converged"
            );
        } else {
            tracing::warn!(
                target: event_names::VBEM_MAX_ITERATIONS,
                iterations = iterations as u64,
                "vbem hit the iteration cap before converging"
            );
        }

        let components = state
            .posts
            .iter()
            .zip(&state.priors)
            .enumerate()
            .map(|(i, (post, prior))| {
                NigPosterior::new(*post, *prior, scale, options.derive_seed(i as u64 + 1))
            })
            .collect();
        Ok(VbemOutcome {
            posterior: MixturePosterior::new(
                components,
                state.weights,
                state.counts,
                scale,
                options.credible_level,
                options.derive_seed(0),
            ),
            converged,
            iterations,
            elbo_history,
            warnings,
        })
    }

    /// Dirichlet update of the weights, then each component's conjugate
    /// update by its responsibility column from its fixed prior.
    fn m_step(&self, state: &mut VbemState, values: &[f64], resp: &[Vec<f64>]) -> Result<()> {
        let k = state.posts.len();
        let counts: Vec<f64> = (0..k).map(|j| resp.iter().map(|r| r[j]).sum()).collect();
        state.weights = dirichlet::posterior_params(&state.weight_prior, &counts)
            .ok_or_else(|| Error::Internal("dirichlet update produced invalid parameters".into()))?;
        for j in 0..k {
            if counts[j] < MIN_EFFECTIVE_COUNT {
                continue;
            }
            let column: Vec<f64> = resp.iter().map(|r| r[j]).collect();
            let stats = self.conjugate.stats(values, Some(&column))?;
            let post = self.conjugate.update(&state.priors[j], &stats, 0)?;
            state.posts[j] = *post.params();
        }
        state.counts = counts;
        Ok(())
    }

    fn delegate(
        &self,
        data: &StandardData,
        options: &FitOptions,
        fallback: Option<FallbackDecision>,
    ) -> Result<InferenceResult> {
        let sub_options = match &options.prior_params {
            Some(p) if p.distribution == PriorFamily::Dirichlet => options.without_prior(),
            _ => options.clone(),
        };
        let config = ModelConfig::simple(self.scale().family(), 1);
        let mut result = self.conjugate.fit(data, &config, &sub_options)?;
        result.diagnostics.fallback = fallback;
        Ok(result)
    }
}

fn fallback_decision(requested: usize, used: usize, reason: String) -> FallbackDecision {
    tracing::warn!(
        target: event_names::VBEM_FALLBACK,
        requested = requested as u64,
        used = used as u64,
        reason = %reason,
        "reducing mixture components"
    );
    FallbackDecision {
        requested_components: requested,
        used_components: used,
        reason,
    }
}

/// Options whose Dirichlet prior matches `k` fitted components. A
/// per-component prior sized for another K becomes symmetric at its mean
/// concentration; the returned note says so.
fn weight_prior_for(options: &FitOptions, k: usize) -> (FitOptions, Option<String>) {
    match &options.prior_params {
        Some(p) if p.distribution == PriorFamily::Dirichlet && p.params.len() > 1 && p.params.len() != k => {
            let mean = p.params.iter().sum::<f64>() / p.params.len() as f64;
            let note = format!(
                "dirichlet prior over {} weights re-broadcast as symmetric {mean} over {k}",
                p.params.len()
            );
            (options.clone().with_prior(PriorParams::dirichlet(vec![mean])), Some(note))
        }
        _ => (options.clone(), None),
    }
}

/// r_ik ∝ exp(E[ln w_k] + E[ln p(y_i | θ_k)]), normalized per row.
fn e_step(state: &VbemState, y: &[f64]) -> Vec<Vec<f64>> {
    let elog_w = state.weights.expected_log_weights();
    y.iter()
        .map(|&yi| {
            let log_rho: Vec<f64> = state
                .posts
                .iter()
                .zip(&elog_w)
                .map(|(p, lw)| lw + p.expected_log_likelihood(yi))
                .collect();
            normalize_log_weights(&log_rho)
        })
        .collect()
}

/// Expected complete-data log likelihood + entropy of q(z) - KL terms.
fn elbo(state: &VbemState, y: &[f64], resp: &[Vec<f64>]) -> f64 {
    let elog_w = state.weights.expected_log_weights();
    let mut total = 0.0;
    for (&yi, row) in y.iter().zip(resp) {
        for (j, &r) in row.iter().enumerate() {
            if r > 0.0 {
                total += r * (elog_w[j] + state.posts[j].expected_log_likelihood(yi) - r.ln());
            }
        }
    }
    total -= state.weights.kl_divergence(&state.weight_prior);
    for (post, prior) in state.posts.iter().zip(&state.priors) {
        total -= post.kl_divergence(prior);
    }
    total
}

/// Data-scale mean used to order components.
fn component_mean(params: &NigParams, scale: Scale) -> f64 {
    match scale {
        Scale::Linear => params.mean_mu(),
        Scale::Log => lognormal_mean(params.mean_mu(), params.plug_in_sigma2()),
    }
}

fn sort_components(state: &mut VbemState, scale: Scale) {
    let k = state.posts.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|a, b| {
        component_mean(&state.posts[*a], scale).total_cmp(&component_mean(&state.posts[*b], scale))
    });
    if order.iter().enumerate().all(|(i, j)| i == *j) {
        return;
    }
    let permute = |v: &[f64]| order.iter().map(|&i| v[i]).collect::<Vec<f64>>();
    state.posts = order.iter().map(|&i| state.posts[i]).collect();
    state.priors = order.iter().map(|&i| state.priors[i]).collect();
    state.counts = permute(&state.counts);
    state.weights = DirichletParams {
        alpha: permute(&state.weights.alpha),
    };
    state.weight_prior = DirichletParams {
        alpha: permute(&state.weight_prior.alpha),
    };
}

impl<E: NigFamily> InferenceEngine for MixtureVbem<E> {
    fn name(&self) -> &'static str {
        match E::SCALE {
            Scale::Linear => "normal-mixture-vbem",
            Scale::Log => "lognormal-mixture-vbem",
        }
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            structures: vec![Structure::Simple],
            families: vec![E::SCALE.family()],
            data_types: vec![DataKind::UserLevel],
            min_components: 1,
            max_components: None,
            exact: false,
            fast: false,
            stable: true,
        }
    }

    fn fit(
        &self,
        data: &StandardData,
        config: &ModelConfig,
        options: &FitOptions,
    ) -> Result<InferenceResult> {
        data.validate()?;
        config.validate()?;
        options.validate()?;
        self.capabilities().check(self.name(), config, data.kind())?;

        let scale = self.scale();
        let requested = config.components();
        let values = scale.fit_values(data);
        if values.is_empty() {
            return Err(Error::InsufficientData(format!(
                "{} mixture needs at least one value in its support",
                scale.family()
            )));
        }
        // catch a bad prior before any fallback
        self.priors(requested, 1.0, options)?;

        let supported = Self::supported_components(values.len(), requested, options);
        let mut fallback = (supported < requested).then(|| {
            fallback_decision(
                requested,
                supported,
                format!(
                    "{} points cannot support {requested} components at {} points per component",
                    values.len(),
                    options.min_points_per_component
                ),
            )
        });
        let mut k = supported;
        if k > 1 {
            let distinct = {
                let mut sorted = stats::sorted_finite(&values);
                sorted.dedup();
                sorted.len()
            };
            if distinct < k {
                fallback = Some(fallback_decision(
                    requested,
                    distinct.max(1),
                    format!("only {distinct} distinct values for {k} components"),
                ));
                k = distinct.max(1);
            }
        }
        if k <= 1 {
            return self.delegate(data, options, fallback);
        }
        let (options, prior_note) = weight_prior_for(options, k);
        let options = &options;
        if let (Some(decision), Some(note)) = (fallback.as_mut(), prior_note) {
            decision.reason = format!("{}; {note}", decision.reason);
        }

        let run = FitRun::start(self.name(), options);
        let outcome = {
            let _guard = run.span().enter();
            self.run(&values, k, options)?
        };
        let diagnostics = Diagnostics {
            model_type: self.name().to_string(),
            converged: outcome.converged,
            iterations: outcome.iterations,
            elbo_history: outcome.elbo_history,
            likelihood_history: Vec::new(),
            runtime_ms: run.elapsed_ms(),
            fallback,
            warnings: outcome.warnings,
            frequency: None,
            severity: None,
        };
        Ok(run.finish(
            Arc::new(outcome.posterior),
            diagnostics,
            AlgorithmKind::Vbem,
            ModelConfig::simple(scale.family(), k),
            self.capabilities(),
            data.quality(),
        ))
    }
}
