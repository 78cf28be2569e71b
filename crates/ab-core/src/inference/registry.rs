//! Static engine registry keyed by model configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ab_common::data::DataKind;
use ab_common::{Error, Family, ModelConfig, Result};
use serde::{Deserialize, Serialize};

use super::compound::CompoundEngine;
use super::conjugate::{BetaBinomialConjugate, LogNormalConjugate, NormalConjugate};
use super::engine::InferenceEngine;
use super::mixture::{LogNormalMixtureVbem, NormalMixtureVbem};

/// Every engine this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    BetaBinomial,
    NormalConjugate,
    LogNormalConjugate,
    NormalMixtureVbem,
    LogNormalMixtureVbem,
    Compound,
}

impl EngineKind {
    pub const ALL: [EngineKind; 6] = [
        EngineKind::BetaBinomial,
        EngineKind::NormalConjugate,
        EngineKind::LogNormalConjugate,
        EngineKind::NormalMixtureVbem,
        EngineKind::LogNormalMixtureVbem,
        EngineKind::Compound,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::BetaBinomial => "beta-binomial",
            EngineKind::NormalConjugate => "normal-conjugate",
            EngineKind::LogNormalConjugate => "lognormal-conjugate",
            EngineKind::NormalMixtureVbem => "normal-mixture-vbem",
            EngineKind::LogNormalMixtureVbem => "lognormal-mixture-vbem",
            EngineKind::Compound => "compound",
        }
    }

    /// Engine for a configuration, by (structure, family, components).
    ///
    /// Gamma raises `NOT_IMPLEMENTED`; other unmapped combinations raise
    /// `INVALID_CONFIG`.
    pub fn for_config(config: &ModelConfig) -> Result<EngineKind> {
        if config.value_family() == Family::Gamma {
            return Err(Error::NotImplemented(
                "gamma value models are not available".into(),
            ));
        }
        let kind = match config {
            ModelConfig::Compound { .. } => EngineKind::Compound,
            ModelConfig::Simple { family, components } => match (family, components) {
                (Family::Beta, 1) => EngineKind::BetaBinomial,
                (Family::Normal, 1) => EngineKind::NormalConjugate,
                (Family::LogNormal, 1) => EngineKind::LogNormalConjugate,
                (Family::Normal, k) if *k > 1 => EngineKind::NormalMixtureVbem,
                (Family::LogNormal, k) if *k > 1 => EngineKind::LogNormalMixtureVbem,
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "no engine is registered for {config}"
                    )))
                }
            },
        };
        Ok(kind)
    }

    pub fn instantiate(self) -> Arc<dyn InferenceEngine> {
        match self {
            EngineKind::BetaBinomial => Arc::new(BetaBinomialConjugate),
            EngineKind::NormalConjugate => Arc::new(NormalConjugate),
            EngineKind::LogNormalConjugate => Arc::new(LogNormalConjugate),
            EngineKind::NormalMixtureVbem => Arc::new(NormalMixtureVbem::new()),
            EngineKind::LogNormalMixtureVbem => Arc::new(LogNormalMixtureVbem::new()),
            EngineKind::Compound => Arc::new(CompoundEngine),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Engines built once and looked up by kind.
#[derive(Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<EngineKind, Arc<dyn InferenceEngine>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.engines.keys()).finish()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        let engines = EngineKind::ALL
            .iter()
            .map(|kind| (*kind, kind.instantiate()))
            .collect();
        Self { engines }
    }

    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn InferenceEngine>> {
        self.engines.get(&kind).cloned()
    }

    /// Engine for `config`, checked against its declared capabilities.
    pub fn resolve(&self, config: &ModelConfig, data: DataKind) -> Result<(EngineKind, Arc<dyn InferenceEngine>)> {
        config.validate()?;
        let kind = EngineKind::for_config(config)?;
        let engine = self
            .get(kind)
            .ok_or_else(|| Error::Internal(format!("engine {kind} is not registered")))?;
        if !engine.capabilities().supports(config, data) {
            return Err(Error::InvalidConfig(format!(
                "no engine supports {config} on {data} data"
            )));
        }
        Ok((kind, engine))
    }

    /// Kinds whose capabilities accept `config` on `data`.
    pub fn compatible(&self, config: &ModelConfig, data: DataKind) -> Vec<EngineKind> {
        self.engines
            .iter()
            .filter(|(_, e)| e.capabilities().supports(config, data))
            .map(|(k, _)| *k)
            .collect()
    }
}
