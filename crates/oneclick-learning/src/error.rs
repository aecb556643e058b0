//! Error types for the oneclick-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! Two variants deserve special attention from callers:
//!
//! - [`TaskMismatch`](LearningError::TaskMismatch) means the user picked a
//!   model that cannot work with this target. It carries a `hint` telling
//!   them what to pick instead, and should be shown as a client error.
//! - [`NoProductionModel`](LearningError::NoProductionModel) means nothing
//!   has been promoted yet. Prediction never falls back to another version.
//!
//! # Example
//!
//! ```no_run
//! use oneclick_learning::{LearningError, catalog};
//!
//! match catalog::get_model("svm") {
//!     Err(LearningError::UnsupportedModel { model_id }) => eprintln!("no such model: {model_id}"),
//!     Err(other) => eprintln!("{other}"),
//!     Ok(estimator) => println!("{}", estimator.kind()),
//! }
//! ```

use oneclick_data::DataError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for oneclick-learning operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The data cannot be used for training or prediction.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Target column was not found in the frame.
    #[error("Target column '{0}' not found")]
    TargetNotFound(String),

    /// The model id is not in the catalog.
    #[error("Unsupported model id '{model_id}'")]
    UnsupportedModel { model_id: String },

    /// The chosen model cannot be fitted to this target.
    #[error("Task mismatch: {message}. {hint}")]
    TaskMismatch { message: String, hint: String },

    /// Fitting failed inside the estimator.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Prediction failed.
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// A registered model or version does not exist.
    #[error("Model '{name}' version {version} not found")]
    ModelNotFound { name: String, version: u32 },

    /// Nothing has been promoted to production for this model.
    #[error("No model available: '{model_name}' has no production version")]
    NoProductionModel { model_name: String },

    /// A tracked run does not exist.
    #[error("Run '{0}' not found")]
    RunNotFound(String),

    /// Error from the data layer.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tracking or registry database error.
    #[error("Tracking database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    /// Get error code for programmatic handling.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::UnsupportedModel { .. } => "UNSUPPORTED_MODEL",
            Self::TaskMismatch { .. } => "TASK_MISMATCH",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::InferenceError(_) => "INFERENCE_ERROR",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::NoProductionModel { .. } => "NO_MODEL_AVAILABLE",
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::Data(e) => e.error_code(),
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the caller can fix this by changing their request.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidConfig(_)
            | Self::InvalidData(_)
            | Self::TargetNotFound(_)
            | Self::UnsupportedModel { .. }
            | Self::TaskMismatch { .. }
            | Self::ModelNotFound { .. }
            | Self::NoProductionModel { .. }
            | Self::RunNotFound(_) => true,
            Self::Data(e) => e.is_recoverable(),
            _ => false,
        }
    }

    pub(crate) fn task_mismatch(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::TaskMismatch {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

impl From<smartcore::error::Failed> for LearningError {
    fn from(e: smartcore::error::Failed) -> Self {
        Self::TrainingFailed(e.to_string())
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;
