//! Configuration for a training run.
//!
//! [`PipelineConfig`] is immutable once built and is passed by reference to
//! every stage. Build it with [`PipelineConfig::builder()`], deserialize it
//! from JSON, or load it from a file with [`PipelineConfig::from_json_file`].

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Impurity measure used when growing trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gini,
    #[default]
    Entropy,
}

/// Number of candidate features examined at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least one.
    #[default]
    Sqrt,
    /// `floor(log2(n_features))`, at least one.
    Log2,
    /// Every feature.
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` columns.
    pub fn resolve(&self, n_features: usize) -> usize {
        let count = match self {
            Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
            Self::Log2 => (n_features as f64).log2().floor() as usize,
            Self::All => n_features,
        };
        count.clamp(1, n_features.max(1))
    }
}

/// Random-forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_depth: usize,
    pub criterion: Criterion,
    pub max_features: MaxFeatures,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            max_depth: DEFAULT_MAX_DEPTH,
            criterion: Criterion::default(),
            max_features: MaxFeatures::default(),
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

/// Configuration for the training pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use claim_processing::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .train_ratio(0.75)
///     .n_estimators(50)
///     .artifacts_dir("/tmp/claims")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of rows placed in the training split.
    /// Default: 0.8
    pub train_ratio: f64,

    /// Seed of the split shuffle.
    /// Default: 42
    pub split_seed: u64,

    /// KS p-value below which a numeric column counts as drifted.
    /// Default: 0.05
    pub drift_p_value_threshold: f64,

    /// Total variation distance above which a categorical column counts as drifted.
    /// Default: 0.1
    pub categorical_drift_threshold: f64,

    /// Dataset is invalid once this share of columns (or more) drifted.
    /// Default: 0.5
    pub max_drift_share: f64,

    /// Minimum training accuracy a fitted model must reach.
    /// Default: 0.6
    pub expected_accuracy: f64,

    /// Minimum F1 gain over the deployed model for a candidate to be accepted.
    /// Default: 0.02
    pub min_improvement: f64,

    /// Classifier hyperparameters.
    pub forest: ForestParams,

    /// Root directory of the filesystem artifact store.
    /// Default: "artifacts"
    pub artifacts_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_ratio: DEFAULT_TRAIN_RATIO,
            split_seed: DEFAULT_SPLIT_SEED,
            drift_p_value_threshold: DEFAULT_DRIFT_P_VALUE,
            categorical_drift_threshold: DEFAULT_CATEGORICAL_DRIFT,
            max_drift_share: DEFAULT_MAX_DRIFT_SHARE,
            expected_accuracy: DEFAULT_EXPECTED_ACCURACY,
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
            forest: ForestParams::default(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read and validate a JSON configuration file.
    ///
    /// Fields absent from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigValidationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PipelineConfig =
            serde_json::from_str(&text).map_err(|source| ConfigValidationError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(ConfigValidationError::InvalidRatio {
                field: "train_ratio",
                value: self.train_ratio,
            });
        }

        for (field, value) in [
            ("drift_p_value_threshold", self.drift_p_value_threshold),
            ("categorical_drift_threshold", self.categorical_drift_threshold),
            ("max_drift_share", self.max_drift_share),
            ("expected_accuracy", self.expected_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold { field, value });
            }
        }

        if !self.min_improvement.is_finite() {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "min_improvement",
                value: self.min_improvement,
            });
        }

        let forest = &self.forest;
        for (field, value) in [
            ("n_estimators", forest.n_estimators),
            ("max_depth", forest.max_depth),
            ("min_samples_leaf", forest.min_samples_leaf),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::InvalidHyperparameter {
                    field,
                    value,
                    min: 1,
                });
            }
        }
        if forest.min_samples_split < 2 {
            return Err(ConfigValidationError::InvalidHyperparameter {
                field: "min_samples_split",
                value: forest.min_samples_split,
                min: 2,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid ratio for '{field}': {value} (must be strictly between 0.0 and 1.0)")]
    InvalidRatio { field: &'static str, value: f64 },

    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: &'static str, value: f64 },

    #[error("Invalid hyperparameter '{field}': {value} (must be at least {min})")]
    InvalidHyperparameter {
        field: &'static str,
        value: usize,
        min: usize,
    },

    #[error("Cannot read config file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {} is not valid JSON: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRatio { .. } | Self::InvalidThreshold { .. } => "INVALID_CONFIG",
            Self::InvalidHyperparameter { .. } => "INVALID_HYPERPARAMETER",
            Self::Unreadable { .. } => "CONFIG_UNREADABLE",
            Self::Malformed { .. } => "CONFIG_MALFORMED",
        }
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
///
/// Starts from an existing configuration when created through
/// [`PipelineConfigBuilder::from_config`], so file values can be overridden
/// field by field.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    base: Option<PipelineConfig>,
    train_ratio: Option<f64>,
    split_seed: Option<u64>,
    drift_p_value_threshold: Option<f64>,
    categorical_drift_threshold: Option<f64>,
    max_drift_share: Option<f64>,
    expected_accuracy: Option<f64>,
    min_improvement: Option<f64>,
    n_estimators: Option<usize>,
    min_samples_split: Option<usize>,
    min_samples_leaf: Option<usize>,
    max_depth: Option<usize>,
    criterion: Option<Criterion>,
    max_features: Option<MaxFeatures>,
    random_state: Option<u64>,
    artifacts_dir: Option<PathBuf>,
}

impl PipelineConfigBuilder {
    /// Start from `config` instead of the defaults.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            base: Some(config),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn train_ratio(mut self, ratio: f64) -> Self {
        self.train_ratio = Some(ratio);
        self
    }

    #[must_use]
    pub fn split_seed(mut self, seed: u64) -> Self {
        self.split_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn drift_p_value_threshold(mut self, threshold: f64) -> Self {
        self.drift_p_value_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn categorical_drift_threshold(mut self, threshold: f64) -> Self {
        self.categorical_drift_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn max_drift_share(mut self, share: f64) -> Self {
        self.max_drift_share = Some(share);
        self
    }

    #[must_use]
    pub fn expected_accuracy(mut self, accuracy: f64) -> Self {
        self.expected_accuracy = Some(accuracy);
        self
    }

    /// Set the F1 gain a candidate needs over the deployed model.
    #[must_use]
    pub fn min_improvement(mut self, threshold: f64) -> Self {
        self.min_improvement = Some(threshold);
        self
    }

    #[must_use]
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = Some(n);
        self
    }

    #[must_use]
    pub fn min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = Some(n);
        self
    }

    #[must_use]
    pub fn min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = Some(n);
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = Some(criterion);
        self
    }

    #[must_use]
    pub fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = Some(max_features);
        self
    }

    #[must_use]
    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    #[must_use]
    pub fn artifacts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let base = self.base.unwrap_or_default();
        let forest = ForestParams {
            n_estimators: self.n_estimators.unwrap_or(base.forest.n_estimators),
            min_samples_split: self.min_samples_split.unwrap_or(base.forest.min_samples_split),
            min_samples_leaf: self.min_samples_leaf.unwrap_or(base.forest.min_samples_leaf),
            max_depth: self.max_depth.unwrap_or(base.forest.max_depth),
            criterion: self.criterion.unwrap_or(base.forest.criterion),
            max_features: self.max_features.unwrap_or(base.forest.max_features),
            random_state: self.random_state.unwrap_or(base.forest.random_state),
        };

        let config = PipelineConfig {
            train_ratio: self.train_ratio.unwrap_or(base.train_ratio),
            split_seed: self.split_seed.unwrap_or(base.split_seed),
            drift_p_value_threshold: self
                .drift_p_value_threshold
                .unwrap_or(base.drift_p_value_threshold),
            categorical_drift_threshold: self
                .categorical_drift_threshold
                .unwrap_or(base.categorical_drift_threshold),
            max_drift_share: self.max_drift_share.unwrap_or(base.max_drift_share),
            expected_accuracy: self.expected_accuracy.unwrap_or(base.expected_accuracy),
            min_improvement: self.min_improvement.unwrap_or(base.min_improvement),
            forest,
            artifacts_dir: self.artifacts_dir.unwrap_or(base.artifacts_dir),
        };

        config.validate()?;
        Ok(config)
    }
}
