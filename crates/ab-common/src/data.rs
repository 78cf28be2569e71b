//! Normalized input data.
//!
//! Ingestion hands the inference layer one of two shapes:
//! - `binomial`: aggregate successes out of trials
//! - `user-level`: one record per user with a conversion flag and a value
//!
//! ```json
//! {"type": "binomial", "successes": 45, "trials": 100}
//! {"type": "user-level", "users": [{"converted": true, "value": 12.5}, {"converted": false, "value": 0}]}
//! ```
//!
//! Non-finite values are representable (JSON `null` reads as NaN) so that the
//! `missing_data` quality flag can report them; they are skipped by every
//! value accessor.

use ab_math::stats;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Tukey fence multiplier used for the outlier flag ("far out" values).
pub const OUTLIER_FENCE_K: f64 = 3.0;

/// Aggregate binomial counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinomialData {
    pub successes: u64,
    pub trials: u64,
}

impl BinomialData {
    pub fn failures(&self) -> u64 {
        self.trials.saturating_sub(self.successes)
    }

    fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(Error::InsufficientData("binomial data has zero trials".into()));
        }
        if self.successes > self.trials {
            return Err(Error::InvalidData(format!(
                "successes ({}) exceed trials ({})",
                self.successes, self.trials
            )));
        }
        Ok(())
    }
}

/// One user's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub converted: bool,
    #[serde(deserialize_with = "nullable_f64")]
    pub value: f64,
}

impl UserRecord {
    pub fn new(converted: bool, value: f64) -> Self {
        Self {
            user_id: None,
            converted,
            value,
        }
    }
}

fn nullable_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Per-user records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLevelData {
    pub users: Vec<UserRecord>,
}

impl UserLevelData {
    fn validate(&self) -> Result<()> {
        if self.users.is_empty() {
            return Err(Error::InsufficientData("user-level data has no users".into()));
        }
        for (i, user) in self.users.iter().enumerate() {
            if !user.converted && user.value.is_finite() && user.value != 0.0 {
                return Err(Error::InvalidData(format!(
                    "user {} is not converted but has value {}",
                    user.user_id.clone().unwrap_or_else(|| i.to_string()),
                    user.value
                )));
            }
        }
        Ok(())
    }
}

/// Which data shape a value carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    Binomial,
    UserLevel,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Binomial => write!(f, "binomial"),
            DataKind::UserLevel => write!(f, "user-level"),
        }
    }
}

/// Data-quality snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataQuality {
    pub has_zeros: bool,
    pub has_negatives: bool,
    pub has_outliers: bool,
    pub missing_data: bool,
}

/// Normalized input data for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StandardData {
    Binomial(BinomialData),
    UserLevel(UserLevelData),
}

impl StandardData {
    /// Validated binomial data.
    pub fn binomial(successes: u64, trials: u64) -> Result<Self> {
        let data = BinomialData { successes, trials };
        data.validate()?;
        Ok(StandardData::Binomial(data))
    }

    /// Validated user-level data.
    pub fn user_level(users: Vec<UserRecord>) -> Result<Self> {
        let data = UserLevelData { users };
        data.validate()?;
        Ok(StandardData::UserLevel(data))
    }

    /// Convenience constructor: value > 0 means converted.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let users = values
            .iter()
            .map(|&v| UserRecord::new(v != 0.0 && !v.is_nan(), v))
            .collect();
        Self::user_level(users)
    }

    /// Re-check invariants, e.g. after deserialization.
    pub fn validate(&self) -> Result<()> {
        match self {
            StandardData::Binomial(b) => b.validate(),
            StandardData::UserLevel(u) => u.validate(),
        }
    }

    pub fn kind(&self) -> DataKind {
        match self {
            StandardData::Binomial(_) => DataKind::Binomial,
            StandardData::UserLevel(_) => DataKind::UserLevel,
        }
    }

    /// Number of observations (trials or users).
    pub fn n(&self) -> usize {
        match self {
            StandardData::Binomial(b) => b.trials as usize,
            StandardData::UserLevel(u) => u.users.len(),
        }
    }

    pub fn as_binomial(&self) -> Option<&BinomialData> {
        match self {
            StandardData::Binomial(b) => Some(b),
            StandardData::UserLevel(_) => None,
        }
    }

    pub fn as_user_level(&self) -> Option<&UserLevelData> {
        match self {
            StandardData::Binomial(_) => None,
            StandardData::UserLevel(u) => Some(u),
        }
    }

    /// Conversion counts: the binomial payload itself, or (converted users, users).
    pub fn to_binomial(&self) -> BinomialData {
        match self {
            StandardData::Binomial(b) => *b,
            StandardData::UserLevel(u) => BinomialData {
                successes: self.converted_count(),
                trials: u.users.len() as u64,
            },
        }
    }

    pub fn converted_count(&self) -> u64 {
        match self {
            StandardData::Binomial(b) => b.successes,
            StandardData::UserLevel(u) => u.users.iter().filter(|r| r.converted).count() as u64,
        }
    }

    pub fn conversion_rate(&self) -> f64 {
        let n = self.n();
        if n == 0 {
            return 0.0;
        }
        self.converted_count() as f64 / n as f64
    }

    /// Flat numeric view: binomial expands to 0/1 outcomes, user-level yields
    /// every finite value (zeros included).
    pub fn values(&self) -> Vec<f64> {
        match self {
            StandardData::Binomial(b) => {
                let mut out = vec![1.0; b.successes as usize];
                out.resize(b.trials as usize, 0.0);
                out
            }
            StandardData::UserLevel(u) => u
                .users
                .iter()
                .map(|r| r.value)
                .filter(|v| v.is_finite())
                .collect(),
        }
    }

    /// Finite, strictly positive values of converted users.
    pub fn positive_values(&self) -> Vec<f64> {
        match self {
            StandardData::Binomial(_) => Vec::new(),
            StandardData::UserLevel(u) => u
                .users
                .iter()
                .filter(|r| r.converted && r.value.is_finite() && r.value > 0.0)
                .map(|r| r.value)
                .collect(),
        }
    }

    /// Finite values that are not zero (the severity side of a zero-inflated model).
    pub fn non_zero_values(&self) -> Vec<f64> {
        self.values().into_iter().filter(|v| *v != 0.0).collect()
    }

    /// Compute the data-quality snapshot.
    pub fn quality(&self) -> DataQuality {
        let users = match self {
            StandardData::Binomial(_) => return DataQuality::default(),
            StandardData::UserLevel(u) => &u.users,
        };
        let missing_data = users.iter().any(|r| !r.value.is_finite());
        let values = self.values();
        let has_zeros = values.iter().any(|v| *v == 0.0);
        let has_negatives = values.iter().any(|v| *v < 0.0);
        let non_zero: Vec<f64> = values.into_iter().filter(|v| *v != 0.0).collect();
        let has_outliers = non_zero.len() >= 4
            && stats::tukey_fences(&non_zero, OUTLIER_FENCE_K)
                .map(|(lo, hi)| non_zero.iter().any(|v| *v < lo || *v > hi))
                .unwrap_or(false);
        DataQuality {
            has_zeros,
            has_negatives,
            has_outliers,
            missing_data,
        }
    }
}
