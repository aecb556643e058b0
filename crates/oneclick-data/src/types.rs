//! Shared data types for the data layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Task Type
// ============================================================================

/// The prediction task a dataset is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Discrete target: predict a class label.
    Classification,
    /// Continuous target: predict a number.
    Regression,
}

impl TaskType {
    /// String form used in storage, CLI arguments and tracking params.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }

    /// Name of the metric used to rank models for this task.
    #[must_use]
    pub fn primary_metric(&self) -> &'static str {
        match self {
            TaskType::Classification => "accuracy",
            TaskType::Regression => "r2",
        }
    }

    /// The other task type.
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            TaskType::Classification => TaskType::Regression,
            TaskType::Regression => TaskType::Classification,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known task type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskTypeError {
    invalid_value: String,
}

impl ParseTaskTypeError {
    /// Returns the rejected input.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl fmt::Display for ParseTaskTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid task type: '{}'. Valid values are: classification, regression",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseTaskTypeError {}

impl FromStr for TaskType {
    type Err = ParseTaskTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(TaskType::Classification),
            "regression" => Ok(TaskType::Regression),
            _ => Err(ParseTaskTypeError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Validation Results
// ============================================================================

/// Outcome of dataset validation. All checks run; every failure is listed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// A report with no errors.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// Build a report from collected errors.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Append another report's errors.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.is_valid = self.errors.is_empty();
    }

    /// Record a single failure.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }
}

/// Outcome of checking a declared task against the target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentCheck {
    pub is_aligned: bool,
    /// Explanation when rejected; empty when accepted.
    pub message: String,
}

impl AlignmentCheck {
    pub fn accept() -> Self {
        Self {
            is_aligned: true,
            message: String::new(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            is_aligned: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_as_str() {
        assert_eq!(TaskType::Classification.as_str(), "classification");
        assert_eq!(TaskType::Regression.as_str(), "regression");
    }

    #[test]
    fn test_task_type_from_str_is_case_insensitive() {
        assert_eq!(
            "Classification".parse::<TaskType>(),
            Ok(TaskType::Classification)
        );
        assert_eq!(" regression ".parse::<TaskType>(), Ok(TaskType::Regression));

        let err = "clustering".parse::<TaskType>().unwrap_err();
        assert_eq!(err.invalid_value(), "clustering");
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn test_task_type_serde() {
        let json = serde_json::to_string(&TaskType::Regression).unwrap();
        assert_eq!(json, "\"regression\"");
        let parsed: TaskType = serde_json::from_str("\"classification\"").unwrap();
        assert_eq!(parsed, TaskType::Classification);
    }

    #[test]
    fn test_primary_metric() {
        assert_eq!(TaskType::Classification.primary_metric(), "accuracy");
        assert_eq!(TaskType::Regression.primary_metric(), "r2");
    }

    #[test]
    fn test_validation_report_merge() {
        let mut report = ValidationReport::valid();
        report.merge(ValidationReport::from_errors(vec!["empty".to_string()]));
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["empty".to_string()]);
    }
}
