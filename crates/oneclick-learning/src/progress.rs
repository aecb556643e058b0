//! Progress reporting types for the trainer.
//!
//! A best-of-N sweep fits every candidate in turn, which can take a while on
//! larger tables. [`ProgressUpdate`]s let a caller show which stage is running
//! and how many candidates are done.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use oneclick_learning::{ProgressCallback, ProgressUpdate};
//!
//! let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
//!     println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!     if let Some((done, total)) = update.models_completed {
//!         println!("  Models: {}/{}", done, total);
//!     }
//! });
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The current stage of a training run.
///
/// Stages run in this order:
///
/// 1. [`Initializing`](Self::Initializing) - resolving the model and checking the target
/// 2. [`Splitting`](Self::Splitting) - shuffling rows into train and test partitions
/// 3. [`Preprocessing`](Self::Preprocessing) - fitting imputers, scalers and encoders
/// 4. [`Training`](Self::Training) - fitting the estimator(s)
/// 5. [`Evaluation`](Self::Evaluation) - scoring on the held-out rows
/// 6. [`Registering`](Self::Registering) - recording the run and registering the model
/// 7. [`Complete`](Self::Complete)
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TrainingStage {
    #[default]
    Initializing,
    Splitting,
    Preprocessing,
    Training,
    Evaluation,
    Registering,
    Complete,
    Failed,
}

impl TrainingStage {
    /// Returns the snake_case name of the stage.
    ///
    /// ```
    /// use oneclick_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::Training.as_str(), "training");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Initializing => "initializing",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Preprocessing => "preprocessing",
            TrainingStage::Training => "training",
            TrainingStage::Evaluation => "evaluation",
            TrainingStage::Registering => "registering",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete | TrainingStage::Failed)
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress update from the trainer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProgressUpdate {
    /// The current training stage.
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0. Never decreases within one call.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Model id currently being fitted, during [`Training`](TrainingStage::Training).
    pub current_model: Option<String>,

    /// `(completed, total)` candidates during a best-of-N sweep.
    pub models_completed: Option<(u32, u32)>,
}

/// Callback receiving [`ProgressUpdate`]s.
///
/// Called synchronously from the training thread; keep it quick.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Sends updates to an optional callback.
#[derive(Clone, Default)]
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn report(&self, stage: TrainingStage, progress: f64, message: impl Into<String>) {
        self.send(ProgressUpdate {
            stage,
            progress,
            message: message.into(),
            ..Default::default()
        });
    }

    pub(crate) fn send(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.callback {
            callback(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_stage_names_match_serde() {
        for stage in [
            TrainingStage::Initializing,
            TrainingStage::Preprocessing,
            TrainingStage::Registering,
            TrainingStage::Failed,
        ] {
            assert_eq!(
                serde_json::to_value(stage).unwrap(),
                serde_json::Value::from(stage.as_str())
            );
        }
    }

    #[test]
    fn test_update_serializes_candidate_counts() {
        let update = ProgressUpdate {
            stage: TrainingStage::Training,
            progress: 0.5,
            message: "Training xgboost_regressor".to_string(),
            current_model: Some("xgboost_regressor".to_string()),
            models_completed: Some((2, 3)),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["stage"], "training");
        assert_eq!(json["models_completed"], serde_json::json!([2, 3]));
    }

    #[test]
    fn test_training_stage_is_terminal() {
        assert!(!TrainingStage::Training.is_terminal());
        assert!(!TrainingStage::Registering.is_terminal());
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Failed.is_terminal());
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, TrainingStage::Initializing);
        assert_eq!(update.progress, 0.0);
        assert!(update.message.is_empty());
        assert!(update.current_model.is_none());
        assert!(update.models_completed.is_none());
    }

    #[test]
    fn test_reporter_forwards_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Some(Arc::new(move |u: ProgressUpdate| {
            sink.lock().push(u.stage);
        })));

        reporter.report(TrainingStage::Splitting, 0.1, "splitting");
        reporter.report(TrainingStage::Complete, 1.0, "done");

        assert_eq!(
            *seen.lock(),
            vec![TrainingStage::Splitting, TrainingStage::Complete]
        );
    }

    #[test]
    fn test_reporter_without_callback_is_silent() {
        ProgressReporter::default().report(TrainingStage::Training, 0.5, "x");
    }
}
