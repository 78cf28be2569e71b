//! Model configuration: which structure, family and component count to fit.
//!
//! A configuration can be written compactly as `structure:family[:components]`:
//! - `simple:beta`
//! - `simple:lognormal:2`
//! - `compound:normal:1` (frequency is always Beta)

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level model structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Structure {
    Simple,
    Compound,
}

impl std::fmt::Display for Structure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Structure::Simple => write!(f, "simple"),
            Structure::Compound => write!(f, "compound"),
        }
    }
}

/// Distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Beta,
    Normal,
    LogNormal,
    Gamma,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Beta => write!(f, "beta"),
            Family::Normal => write!(f, "normal"),
            Family::LogNormal => write!(f, "lognormal"),
            Family::Gamma => write!(f, "gamma"),
        }
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "beta" => Ok(Family::Beta),
            "normal" => Ok(Family::Normal),
            "lognormal" | "log-normal" => Ok(Family::LogNormal),
            "gamma" => Ok(Family::Gamma),
            other => Err(Error::InvalidConfig(format!("unknown family '{other}'"))),
        }
    }
}

/// A model choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "structure", rename_all = "lowercase")]
pub enum ModelConfig {
    Simple {
        #[serde(rename = "type")]
        family: Family,
        components: usize,
    },
    Compound {
        frequency_type: Family,
        value_type: Family,
        value_components: usize,
    },
}

impl ModelConfig {
    pub fn simple(family: Family, components: usize) -> Self {
        ModelConfig::Simple { family, components }
    }

    /// Zero-inflated model with a Beta frequency part.
    pub fn compound(value_type: Family, value_components: usize) -> Self {
        ModelConfig::Compound {
            frequency_type: Family::Beta,
            value_type,
            value_components,
        }
    }

    pub fn structure(&self) -> Structure {
        match self {
            ModelConfig::Simple { .. } => Structure::Simple,
            ModelConfig::Compound { .. } => Structure::Compound,
        }
    }

    /// Family of the (severity) value model.
    pub fn value_family(&self) -> Family {
        match self {
            ModelConfig::Simple { family, .. } => *family,
            ModelConfig::Compound { value_type, .. } => *value_type,
        }
    }

    /// Component count of the (severity) value model.
    pub fn components(&self) -> usize {
        match self {
            ModelConfig::Simple { components, .. } => *components,
            ModelConfig::Compound {
                value_components, ..
            } => *value_components,
        }
    }

    /// Structural checks independent of any engine.
    pub fn validate(&self) -> Result<()> {
        if self.components() == 0 {
            return Err(Error::InvalidConfig("component count must be at least 1".into()));
        }
        match self {
            ModelConfig::Simple { family, components } => {
                if *family == Family::Beta && *components != 1 {
                    return Err(Error::InvalidConfig(
                        "beta models have exactly one component".into(),
                    ));
                }
            }
            ModelConfig::Compound {
                frequency_type,
                value_type,
                ..
            } => {
                if *frequency_type != Family::Beta {
                    return Err(Error::InvalidConfig(format!(
                        "compound frequency type must be beta, got {frequency_type}"
                    )));
                }
                if *value_type == Family::Beta {
                    return Err(Error::InvalidConfig(
                        "compound value type must be a continuous family".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Number of free parameters, used by BIC.
    ///
    /// Beta: 1. Normal/LogNormal: 2 per component plus K-1 mixture weights.
    /// Compound adds 1 for the conversion rate.
    pub fn parameter_count(&self) -> usize {
        let value_params = |family: Family, k: usize| match family {
            Family::Beta => 1,
            Family::Normal | Family::LogNormal | Family::Gamma => 2 * k + (k - 1),
        };
        match self {
            ModelConfig::Simple { family, components } => value_params(*family, (*components).max(1)),
            ModelConfig::Compound {
                value_type,
                value_components,
                ..
            } => 1 + value_params(*value_type, (*value_components).max(1)),
        }
    }
}

impl std::fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.structure(),
            self.value_family(),
            self.components()
        )
    }
}

impl FromStr for ModelConfig {
    type Err = Error;

    /// Parse `structure:family[:components]`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(Error::InvalidConfig(format!(
                "model spec '{s}' must look like structure:family[:components]"
            )));
        }
        let family: Family = parts[1].parse()?;
        let components = match parts.get(2) {
            Some(k) => k.parse::<usize>().map_err(|_| {
                Error::InvalidConfig(format!("component count '{k}' is not a positive integer"))
            })?,
            None => 1,
        };
        let config = match parts[0].to_ascii_lowercase().as_str() {
            "simple" => ModelConfig::simple(family, components),
            "compound" => ModelConfig::compound(family, components),
            other => {
                return Err(Error::InvalidConfig(format!(
                    "unknown structure '{other}' (expected simple or compound)"
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }
}
