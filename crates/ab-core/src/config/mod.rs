//! Fit options and their on-disk form.
//!
//! `FitOptions` is what engines consume. Its serializable subset,
//! `FitOptionsFile`, can be loaded from JSON or TOML:
//!
//! ```toml
//! max_iterations = 200
//! tolerance = 1e-8
//! seed = 42
//!
//! [prior_params]
//! distribution = "beta"
//! params = [2.0, 8.0]
//! ```

pub mod priors;
pub mod validation;

pub use priors::{PriorFamily, PriorParams};
pub use validation::{validate_fit_options, ValidationError};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_common::Error;
use ab_math::{BetaParams, NigParams};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::events::{ProgressEmitter, ProgressEvent};

/// Default iteration cap for iterative engines.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
/// Default credible level for summaries.
pub const DEFAULT_CREDIBLE_LEVEL: f64 = 0.95;
/// Default symmetric Dirichlet pseudo-count per mixture component.
pub const DEFAULT_DIRICHLET_CONCENTRATION: f64 = 1.0;
/// Minimum points a mixture component needs before K is reduced.
pub const DEFAULT_MIN_POINTS_PER_COMPONENT: usize = 10;

/// Errors that can occur while loading fit options.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("options file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("options file not found: {}", path.display()),
            )),
            ConfigError::Io { source, .. } => Error::Io(source),
            other @ (ConfigError::Parse { .. } | ConfigError::Validation(_)) => {
                Error::InvalidConfig(other.to_string())
            }
        }
    }
}

/// Serializable subset of [`FitOptions`]; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitOptionsFile {
    pub prior_params: Option<PriorParams>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
    pub seed: Option<u64>,
    pub credible_level: Option<f64>,
    pub dirichlet_concentration: Option<f64>,
    pub min_points_per_component: Option<usize>,
}

impl FitOptionsFile {
    /// Overlay the values present in this file onto `base`.
    pub fn apply(self, mut base: FitOptions) -> FitOptions {
        if self.prior_params.is_some() {
            base.prior_params = self.prior_params;
        }
        if let Some(v) = self.max_iterations {
            base.max_iterations = v;
        }
        if self.tolerance.is_some() {
            base.tolerance = self.tolerance;
        }
        if self.seed.is_some() {
            base.seed = self.seed;
        }
        if let Some(v) = self.credible_level {
            base.credible_level = v;
        }
        if let Some(v) = self.dirichlet_concentration {
            base.dirichlet_concentration = v;
        }
        if let Some(v) = self.min_points_per_component {
            base.min_points_per_component = v;
        }
        base
    }
}

/// Load and validate fit options from a `.json` or `.toml` file.
///
/// Files with any other extension are parsed as JSON.
pub fn load_fit_options(path: &Path) -> Result<FitOptionsFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let options = parse_fit_options(&content, is_toml).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    validate_fit_options(&options)?;
    tracing::debug!(
        target: crate::logging::event_names::CONFIG_LOADED,
        path = %path.display(),
        format = if is_toml { "toml" } else { "json" },
        "loaded fit options"
    );
    Ok(options)
}

fn parse_fit_options(content: &str, is_toml: bool) -> Result<FitOptionsFile, String> {
    if is_toml {
        toml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }
}

/// Options accepted by every engine's `fit`.
#[derive(Clone)]
pub struct FitOptions {
    pub prior_params: Option<PriorParams>,
    pub max_iterations: usize,
    /// Convergence tolerance; `None` means the engine default.
    pub tolerance: Option<f64>,
    pub seed: Option<u64>,
    pub credible_level: f64,
    pub dirichlet_concentration: f64,
    pub min_points_per_component: usize,
    pub progress: Option<Arc<dyn ProgressEmitter>>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            prior_params: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: None,
            seed: None,
            credible_level: DEFAULT_CREDIBLE_LEVEL,
            dirichlet_concentration: DEFAULT_DIRICHLET_CONCENTRATION,
            min_points_per_component: DEFAULT_MIN_POINTS_PER_COMPONENT,
            progress: None,
        }
    }
}

impl fmt::Debug for FitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitOptions")
            .field("prior_params", &self.prior_params)
            .field("max_iterations", &self.max_iterations)
            .field("tolerance", &self.tolerance)
            .field("seed", &self.seed)
            .field("credible_level", &self.credible_level)
            .field("dirichlet_concentration", &self.dirichlet_concentration)
            .field("min_points_per_component", &self.min_points_per_component)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl FitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_prior(mut self, prior: PriorParams) -> Self {
        self.prior_params = Some(prior);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressEmitter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Same options without a prior, for sub-fits whose family differs.
    pub fn without_prior(&self) -> Self {
        Self {
            prior_params: None,
            ..self.clone()
        }
    }

    /// Validate the numeric fields.
    pub fn validate(&self) -> ab_common::Result<()> {
        validate_fit_options(&self.to_file()).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Serializable view.
    pub fn to_file(&self) -> FitOptionsFile {
        FitOptionsFile {
            prior_params: self.prior_params.clone(),
            max_iterations: Some(self.max_iterations),
            tolerance: self.tolerance,
            seed: self.seed,
            credible_level: Some(self.credible_level),
            dirichlet_concentration: Some(self.dirichlet_concentration),
            min_points_per_component: Some(self.min_points_per_component),
        }
    }

    pub fn tolerance_or(&self, default: f64) -> f64 {
        self.tolerance.unwrap_or(default)
    }

    /// Seed for a posterior's cached draws; `salt` separates sub-fits.
    pub fn derive_seed(&self, salt: u64) -> u64 {
        match self.seed {
            Some(seed) => seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15),
            None => rand::random(),
        }
    }

    /// RNG for the fit itself.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Beta prior from `prior_params`, Beta(1,1) when absent.
    pub fn beta_prior(&self) -> ab_common::Result<BetaParams> {
        match &self.prior_params {
            Some(p) => p.to_beta(),
            None => Ok(BetaParams::uniform()),
        }
    }

    /// NIG prior from `prior_params`, the weakly informative default when absent.
    pub fn nig_prior(&self) -> ab_common::Result<NigParams> {
        match &self.prior_params {
            Some(p) => p.to_nig(),
            None => Ok(NigParams::weakly_informative()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            progress.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_common::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(ext: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(ext).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let opts = FitOptions::default();
        assert_eq!(opts.max_iterations, 100);
        assert_eq!(opts.credible_level, 0.95);
        assert_eq!(opts.tolerance_or(1e-6), 1e-6);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn load_json_options() {
        let file = temp_with(
            ".json",
            r#"{"max_iterations": 50, "seed": 7, "prior_params": {"distribution": "beta", "params": [2, 3]}}"#,
        );
        let loaded = load_fit_options(file.path()).unwrap();
        assert_eq!(loaded.max_iterations, Some(50));
        let opts = loaded.apply(FitOptions::default());
        assert_eq!(opts.seed, Some(7));
        assert_eq!(opts.beta_prior().unwrap().alpha, 2.0);
    }

    #[test]
    fn load_toml_options() {
        let file = temp_with(
            ".toml",
            "tolerance = 1e-8\n[prior_params]\ndistribution = \"normal-inverse-gamma\"\nparams = [0.0, 1.0, 2.0, 2.0]\n",
        );
        let opts = load_fit_options(file.path())
            .unwrap()
            .apply(FitOptions::default());
        assert_eq!(opts.tolerance, Some(1e-8));
        assert_eq!(opts.nig_prior().unwrap().lambda, 1.0);
    }

    #[test]
    fn load_errors_map_to_error_kinds() {
        let err = load_fit_options(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert_eq!(Error::from(err).kind(), ErrorKind::Io);

        let file = temp_with(".json", "{not json");
        let err = load_fit_options(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(Error::from(err).kind(), ErrorKind::InvalidConfig);

        let file = temp_with(".json", r#"{"credible_level": 2.0}"#);
        let err = load_fit_options(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let file = temp_with(".json", r#"{"max_iter": 5}"#);
        assert!(matches!(
            load_fit_options(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn derived_seeds_are_stable_and_distinct() {
        let opts = FitOptions::default().with_seed(42);
        assert_eq!(opts.derive_seed(1), opts.derive_seed(1));
        assert_ne!(opts.derive_seed(1), opts.derive_seed(2));
    }

    #[test]
    fn wrong_prior_family_is_invalid_prior() {
        let opts = FitOptions::default().with_prior(PriorParams::beta(1.0, 1.0));
        assert_eq!(opts.nig_prior().unwrap_err().kind(), ErrorKind::InvalidPrior);
    }
}
