//! Posterior of a finite Normal or LogNormal mixture.

use std::collections::BTreeMap;

use ab_math::{log_sum_exp, normalize_log_weights, DirichletParams};
use rand::RngCore;

use crate::inference::conjugate::{NigPosterior, Scale};
use crate::inference::posterior::{ComponentSummary, ParameterDraw, Posterior, PosteriorCapabilities};
use crate::inference::sampling::{
    mc_interval, mc_moments, sample_categorical, sample_dirichlet, sample_nig,
    sample_nig_predictive, SampleCache,
};

/// Components sorted by ascending mean, a Dirichlet posterior over their
/// weights, and the effective count each component absorbed.
///
/// Responsibilities are not retained; use [`MixturePosterior::assign`] for
/// the membership of a new point.
#[derive(Debug, Clone)]
pub struct MixturePosterior {
    components: Vec<NigPosterior>,
    weights: DirichletParams,
    effective_counts: Vec<f64>,
    scale: Scale,
    credible_level: f64,
    cache: SampleCache,
}

impl MixturePosterior {
    pub(crate) fn new(
        components: Vec<NigPosterior>,
        weights: DirichletParams,
        effective_counts: Vec<f64>,
        scale: Scale,
        credible_level: f64,
        seed: u64,
    ) -> Self {
        Self {
            components,
            weights,
            effective_counts,
            scale,
            credible_level,
            cache: SampleCache::new(seed),
        }
    }

    pub fn k(&self) -> usize {
        self.components.len()
    }

    pub fn component_posteriors(&self) -> &[NigPosterior] {
        &self.components
    }

    pub fn weight_posterior(&self) -> &DirichletParams {
        &self.weights
    }

    /// E[w_k] = α_k / Σα.
    pub fn expected_weights(&self) -> Vec<f64> {
        self.weights.mean()
    }

    pub fn effective_counts(&self) -> &[f64] {
        &self.effective_counts
    }

    /// Posterior membership probabilities of a data-scale point.
    pub fn assign(&self, x: f64) -> Vec<f64> {
        let elog_w = self.weights.expected_log_weights();
        let log_rho: Vec<f64> = self
            .components
            .iter()
            .zip(&elog_w)
            .map(|(c, lw)| lw + c.expected_log_likelihood(x))
            .collect();
        normalize_log_weights(&log_rho)
    }

    fn draws(&self) -> &[f64] {
        let weights = self.expected_weights();
        let params: Vec<_> = self.components.iter().map(|c| *c.params()).collect();
        let scale = self.scale;
        self.cache.get_or_fill(move |rng, n| {
            (0..n)
                .map(|_| {
                    let k = sample_categorical(rng, &weights);
                    scale.from_model(sample_nig_predictive(rng, &params[k]))
                })
                .collect()
        })
    }
}

impl Posterior for MixturePosterior {
    fn family(&self) -> String {
        format!("{}-mixture", self.scale.family())
    }

    fn capabilities(&self) -> PosteriorCapabilities {
        PosteriorCapabilities {
            analytical: false,
            parameter_sampling: true,
            log_pdf: true,
        }
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Vec<f64> {
        let weights = self.expected_weights();
        (0..n)
            .map(|_| {
                let k = sample_categorical(rng, &weights);
                self.scale
                    .from_model(sample_nig_predictive(rng, self.components[k].params()))
            })
            .collect()
    }

    fn mean(&self) -> Option<f64> {
        mc_moments(self.draws()).map(|m| m.mean)
    }

    fn variance(&self) -> Option<f64> {
        mc_moments(self.draws()).map(|m| m.variance)
    }

    fn credible_interval(&self, level: f64) -> Option<(f64, f64)> {
        mc_interval(self.draws(), level)
    }

    /// Plug-in mixture density: Σ E[w_k] p(x | point estimate of θ_k).
    fn log_pdf(&self, x: f64) -> Option<f64> {
        let terms: Vec<f64> = self
            .expected_weights()
            .iter()
            .zip(&self.components)
            .map(|(w, c)| {
                let (mu, sigma2) = c.point_estimate();
                w.ln() + self.scale.log_density(x, mu, sigma2)
            })
            .collect();
        Some(log_sum_exp(&terms))
    }

    fn sample_parameters(&self, rng: &mut dyn RngCore) -> Option<ParameterDraw> {
        let weights = sample_dirichlet(rng, &self.weights.alpha);
        let components = self
            .components
            .iter()
            .map(|c| {
                let (mu, sigma2) = sample_nig(rng, c.params());
                self.scale.draw(mu, sigma2)
            })
            .collect();
        Some(ParameterDraw::Mixture {
            weights,
            components,
        })
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::from([("components".to_string(), self.k() as f64)]);
        for (k, (c, w)) in self.components.iter().zip(self.expected_weights()).enumerate() {
            out.insert(format!("weight_{k}"), w);
            out.insert(format!("mu0_{k}"), c.params().mu0);
        }
        out
    }

    fn components(&self) -> Option<Vec<ComponentSummary>> {
        let weights = self.expected_weights();
        Some(
            self.components
                .iter()
                .enumerate()
                .map(|(k, c)| {
                    let p = c.params();
                    ComponentSummary {
                        index: k,
                        family: self.scale.family().to_string(),
                        mean: c.component_mean(),
                        variance: c.component_variance(),
                        weight: weights[k],
                        weight_interval: self
                            .weights
                            .marginal_credible_interval(k, self.credible_level),
                        effective_count: self.effective_counts[k],
                        mu0: p.mu0,
                        lambda: p.lambda,
                        alpha: p.alpha,
                        beta: p.beta,
                    }
                })
                .collect(),
        )
    }
}
