//! Error taxonomy for the workspace service.
//!
//! Library errors are folded into five classes, each with an HTTP-equivalent
//! status so the CLI reports client mistakes (400/404) separately from
//! failures on our side (500).

use oneclick_data::DataError;
use oneclick_learning::LearningError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// The request or the uploaded data is unusable. Every problem found is listed.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The chosen model cannot learn this target.
    #[error("Task mismatch: {message}. {hint}")]
    TaskMismatch { message: String, hint: String },

    #[error("{0}")]
    NotFound(String),

    /// Prediction was requested before any version was promoted.
    #[error("{0}")]
    NoModelAvailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// HTTP-equivalent status class.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::TaskMismatch { .. } => 400,
            Self::NotFound(_) | Self::NoModelAvailable(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TaskMismatch { .. } => "TASK_MISMATCH",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NoModelAvailable(_) => "NO_MODEL_AVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix this by changing their request.
    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

impl From<DataError> for AppError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Validation(errors) => Self::Validation(errors),
            e if e.is_not_found() => Self::NotFound(e.to_string()),
            e if e.is_recoverable() => Self::validation(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<LearningError> for AppError {
    fn from(e: LearningError) -> Self {
        match e {
            LearningError::TaskMismatch { message, hint } => Self::TaskMismatch { message, hint },
            LearningError::NoProductionModel { .. } => Self::NoModelAvailable(e.to_string()),
            LearningError::ModelNotFound { .. } | LearningError::RunNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            LearningError::Data(inner) => inner.into(),
            e if e.is_recoverable() => Self::validation(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {e}"))
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let extra = matches!(self, Self::Validation(_) | Self::TaskMismatch { .. });
        let mut state = serializer.serialize_struct("AppError", if extra { 4 } else { 3 })?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("status", &self.status())?;
        match self {
            Self::Validation(errors) => state.serialize_field("errors", errors)?,
            Self::TaskMismatch { hint, .. } => state.serialize_field("hint", hint)?,
            _ => {}
        }
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
