//! Error types for dataset handling, validation and project storage.
//!
//! Errors serialize as `{ code, message }` so callers can surface them
//! without string matching.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the data layer.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DataError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The uploaded file is not a supported tabular format.
    #[error("Unsupported file type '{0}': only .csv files are accepted")]
    UnsupportedFileType(String),

    /// The dataset failed one or more validation checks.
    #[error("Dataset validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A project identifier is malformed.
    #[error("Invalid project id '{0}'")]
    InvalidProjectId(String),

    /// An artifact name would escape the project directory.
    #[error("Invalid artifact name '{0}'")]
    InvalidArtifactName(String),

    /// The project does not exist on disk.
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Project index database error.
    #[error("Index database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DataError>,
    },
}

impl DataError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DataError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::InvalidProjectId(_) => "INVALID_PROJECT_ID",
            Self::InvalidArtifactName(_) => "INVALID_ARTIFACT_NAME",
            Self::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the caller can fix this by changing their input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ColumnNotFound(_)
            | Self::UnsupportedFileType(_)
            | Self::Validation(_)
            | Self::InvalidProjectId(_)
            | Self::InvalidArtifactName(_)
            | Self::ProjectNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Whether the error means the requested thing does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ProjectNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl Serialize for DataError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("DataError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DataError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DataError::Io(e).with_context(context))
    }
}
