//! Configuration for the [`Trainer`](crate::Trainer).
//!
//! # Example
//!
//! ```
//! use oneclick_learning::TrainerConfig;
//!
//! let config = TrainerConfig::builder()
//!     .test_size(0.25)
//!     .random_seed(7)
//!     .experiment_name("churn")
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.random_seed, 7);
//! ```

use crate::error::LearningError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default experiment runs are recorded under.
pub const DEFAULT_EXPERIMENT: &str = "one_click_ml";

/// Settings shared by every training run.
///
/// Use [`TrainerConfig::builder()`] to construct one. The defaults reproduce
/// the fixed 80/20 split with seed 42.
#[derive(Clone)]
pub struct TrainerConfig {
    /// Fraction of rows held out for scoring (default: 0.2).
    ///
    /// The test partition gets `ceil(rows * test_size)` rows.
    pub test_size: f64,

    /// Seed for the split shuffle and for seeded estimators (default: 42).
    pub random_seed: u64,

    /// Experiment name runs are recorded under (default: `one_click_ml`).
    pub experiment_name: String,

    /// Optional progress callback, called from the training thread.
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for TrainerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainerConfig")
            .field("test_size", &self.test_size)
            .field("random_seed", &self.random_seed)
            .field("experiment_name", &self.experiment_name)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_seed: 42,
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
            progress: None,
        }
    }
}

impl TrainerConfig {
    /// Create a new builder for `TrainerConfig`.
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Clone, Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    /// Set the held-out fraction (default: 0.2).
    ///
    /// [`build()`](Self::build) rejects values outside `(0.0, 1.0)`.
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the random seed (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the experiment name (default: `one_click_ml`).
    #[must_use]
    pub fn experiment_name(mut self, name: impl Into<String>) -> Self {
        self.config.experiment_name = name.into();
        self
    }

    /// Receive [`ProgressUpdate`](crate::ProgressUpdate)s while training.
    #[must_use]
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.config.progress = Some(callback);
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if:
    /// - `test_size` is not in range `(0.0, 1.0)`
    /// - `experiment_name` is blank
    pub fn build(self) -> Result<TrainerConfig, LearningError> {
        if !(self.config.test_size > 0.0 && self.config.test_size < 1.0) {
            return Err(LearningError::InvalidConfig(
                "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }

        if self.config.experiment_name.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "experiment_name must not be empty".to_string(),
            ));
        }

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressUpdate;
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.experiment_name, "one_click_ml");
        assert!(config.progress.is_none());
    }

    #[test]
    fn test_builder() {
        let config = TrainerConfig::builder()
            .test_size(0.3)
            .experiment_name("housing")
            .on_progress(Arc::new(|_: ProgressUpdate| {}))
            .build()
            .unwrap();

        assert_eq!(config.test_size, 0.3);
        assert_eq!(config.experiment_name, "housing");
        assert!(config.progress.is_some());
    }

    #[test]
    fn test_invalid_test_size() {
        for size in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let result = TrainerConfig::builder().test_size(size).build();
            assert!(result.is_err(), "test_size {size} should be rejected");
            assert!(result.unwrap_err().to_string().contains("test_size"));
        }
    }

    #[test]
    fn test_blank_experiment_name() {
        let result = TrainerConfig::builder().experiment_name("  ").build();
        assert!(result.unwrap_err().to_string().contains("experiment_name"));
    }

    #[test]
    fn test_debug_hides_callback() {
        let config = TrainerConfig::builder()
            .on_progress(Arc::new(|_: ProgressUpdate| {}))
            .build()
            .unwrap();
        assert!(format!("{config:?}").contains("<callback>"));
    }
}
