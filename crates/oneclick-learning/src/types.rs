//! Result types returned by the trainer.
//!
//! - [`Metrics`]: held-out scores for one fit
//! - [`TrainingResult`]: what [`Trainer::train`](crate::Trainer::train) returns
//! - [`BestOfResult`]: the winner of a best-of-N sweep plus the full leaderboard

use crate::catalog::ModelKind;
use oneclick_data::TaskType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Held-out evaluation metrics.
///
/// Classification fills `accuracy` and `f1`; regression fills `mse` and `r2`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    /// Support-weighted F1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f1: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mse: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
}

impl Metrics {
    #[must_use]
    pub fn classification(accuracy: f64, f1: f64) -> Self {
        Self {
            accuracy: Some(accuracy),
            f1: Some(f1),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn regression(mse: f64, r2: f64) -> Self {
        Self {
            mse: Some(mse),
            r2: Some(r2),
            ..Default::default()
        }
    }

    /// The score best-of-N compares on: accuracy or R².
    #[must_use]
    pub fn primary(&self, task: TaskType) -> Option<f64> {
        match task {
            TaskType::Classification => self.accuracy,
            TaskType::Regression => self.r2,
        }
    }

    /// Present metrics keyed by name.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("accuracy", self.accuracy),
            ("f1", self.f1),
            ("mse", self.mse),
            ("r2", self.r2),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect()
    }
}

/// Outcome of one successful training request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Tracking run id.
    pub run_id: String,

    pub model_id: ModelKind,

    pub task_type: TaskType,

    pub metrics: Metrics,

    /// Wall-clock fit-and-score time in seconds.
    pub duration: f64,

    /// Registry name, `Model_<model_id>`.
    pub model_name: String,

    /// Registry version created for this run.
    pub model_version: u32,

    /// `models:/<model_name>/<model_version>`.
    pub model_uri: String,
}

/// One candidate's line in a best-of-N leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model_id: ModelKind,
    pub metrics: Metrics,
    pub duration: f64,
}

/// Result of [`Trainer::train_best`](crate::Trainer::train_best).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestOfResult {
    /// The registered winner.
    pub best: TrainingResult,

    /// Every candidate, in catalog order.
    pub leaderboard: Vec<ModelScore>,
}
