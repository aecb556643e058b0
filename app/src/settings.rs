//! Runtime settings from the environment, overridable from the command line.

use oneclick_learning::{DEFAULT_EXPERIMENT, LearningError, ProgressUpdate, TrainerConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const STORAGE_DIR_VAR: &str = "ONECLICK_STORAGE_DIR";
pub const TRACKING_DIR_VAR: &str = "ONECLICK_TRACKING_DIR";
pub const EXPERIMENT_VAR: &str = "ONECLICK_EXPERIMENT";

pub const DEFAULT_STORAGE_DIR: &str = "storage";

/// Tracking lives under the storage root unless configured separately.
const DEFAULT_TRACKING_SUBDIR: &str = "mlruns";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    storage_dir: PathBuf,
    tracking_dir: Option<PathBuf>,
    experiment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            tracking_dir: None,
            experiment: DEFAULT_EXPERIMENT.to_string(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment after loading `.env`.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            storage_dir: get(STORAGE_DIR_VAR).map_or(defaults.storage_dir, PathBuf::from),
            tracking_dir: get(TRACKING_DIR_VAR).map(PathBuf::from),
            experiment: get(EXPERIMENT_VAR).unwrap_or(defaults.experiment),
        }
    }

    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment = name.into();
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Explicit tracking directory, otherwise `<storage>/mlruns`.
    pub fn tracking_dir(&self) -> PathBuf {
        self.tracking_dir
            .clone()
            .unwrap_or_else(|| self.storage_dir.join(DEFAULT_TRACKING_SUBDIR))
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Trainer settings: fixed 80/20 split with seed 42 under this
    /// experiment, with progress sent to the log.
    pub fn trainer_config(&self) -> Result<TrainerConfig, LearningError> {
        TrainerConfig::builder()
            .experiment_name(self.experiment.clone())
            .on_progress(Arc::new(log_progress))
            .build()
    }
}

/// Intermediate stages log at debug; the final stage of a request at info.
pub(crate) fn log_progress(update: ProgressUpdate) {
    if update.stage.is_terminal() {
        info!(stage = %update.stage, "{}", update.message);
        return;
    }
    debug!(
        stage = %update.stage,
        progress = update.progress,
        model = update.current_model.as_deref(),
        "{}",
        update.message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings.storage_dir(), Path::new("storage"));
        assert_eq!(settings.tracking_dir(), PathBuf::from("storage/mlruns"));
        assert_eq!(settings.experiment(), "one_click_ml");
    }

    #[test]
    fn test_environment_values() {
        let settings = Settings::from_lookup(lookup(&[
            (STORAGE_DIR_VAR, "/data/oneclick"),
            (TRACKING_DIR_VAR, "/data/tracking"),
            (EXPERIMENT_VAR, "churn"),
        ]));
        assert_eq!(settings.storage_dir(), Path::new("/data/oneclick"));
        assert_eq!(settings.tracking_dir(), PathBuf::from("/data/tracking"));
        assert_eq!(settings.experiment(), "churn");
    }

    #[test]
    fn test_blank_values_ignored() {
        let settings = Settings::from_lookup(lookup(&[(STORAGE_DIR_VAR, "  "), (EXPERIMENT_VAR, "")]));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_storage_override_moves_default_tracking() {
        let settings = Settings::default().with_storage_dir("/tmp/work");
        assert_eq!(settings.tracking_dir(), PathBuf::from("/tmp/work/mlruns"));

        let settings = settings.with_tracking_dir("/tmp/runs");
        assert_eq!(settings.tracking_dir(), PathBuf::from("/tmp/runs"));
    }

    #[test]
    fn test_trainer_config_uses_experiment() {
        let config = Settings::default().with_experiment("housing").trainer_config().unwrap();
        assert_eq!(config.experiment_name, "housing");
        assert_eq!(config.random_seed, 42);
        assert!(config.progress.is_some());
    }

    #[test]
    fn test_log_progress_accepts_every_stage() {
        use oneclick_learning::TrainingStage;

        for stage in [TrainingStage::Evaluation, TrainingStage::Complete, TrainingStage::Failed] {
            log_progress(ProgressUpdate {
                stage,
                message: stage.to_string(),
                ..Default::default()
            });
        }
    }
}
