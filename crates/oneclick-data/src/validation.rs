//! Go/no-go checks run on an uploaded dataset before any training happens.
//!
//! Everything here is a pure function of the [`Dataset`]: no IO, no state.
//! Checks aggregate their failures instead of stopping at the first one, so
//! a caller can show the user every problem at once.
//!
//! # Example
//!
//! ```rust,ignore
//! use oneclick_data::{Dataset, TaskType, validation};
//!
//! let dataset = Dataset::from_csv_path("churn.csv")?;
//! let report = validation::validate_dataset(&dataset);
//! if report.is_valid {
//!     let target = validation::infer_target(&dataset).unwrap();
//!     let task = validation::infer_task(dataset.series(&target)?)?;
//! }
//! ```

use crate::dataset::Dataset;
use crate::error::Result;
use crate::types::{AlignmentCheck, TaskType, ValidationReport};
use crate::utils::{DtypeCategory, distinct_count, series_dtype_category};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Column names recognised as the target, in priority order.
pub const TARGET_NAME_CANDIDATES: [&str; 4] = ["target", "label", "class", "outcome"];

/// Below this many distinct values a numeric target is treated as classes.
pub const CLASSIFICATION_DISTINCT_THRESHOLD: usize = 20;

/// Distinct-value ratio above which a numeric target looks continuous.
pub const CONTINUOUS_UNIQUE_RATIO: f64 = 0.2;

/// Distinct-value count above which a numeric target looks continuous.
pub const CONTINUOUS_UNIQUE_COUNT: usize = 50;

/// Regression targets with fewer distinct values than this are suspicious.
pub const FEW_DISTINCT_REGRESSION_VALUES: usize = 10;

// =============================================================================
// Dataset Checks
// =============================================================================

/// Check that the dataset has rows and pairwise-distinct column names.
///
/// Every check runs; the report lists all failures.
pub fn validate_dataset(dataset: &Dataset) -> ValidationReport {
    let mut report = ValidationReport::valid();

    if dataset.width() == 0 {
        report.push_error("Dataset has no columns");
    }
    if dataset.height() == 0 {
        report.push_error("Dataset is empty");
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for name in dataset.column_names() {
        *seen.entry(name.as_str()).or_insert(0) += 1;
    }
    // Report in header order so messages are stable.
    let mut reported = Vec::new();
    for name in dataset.column_names() {
        let count = seen.get(name.as_str()).copied().unwrap_or(0);
        if count > 1 && !reported.contains(name) {
            report.push_error(format!(
                "Duplicate column name '{}' appears {} times",
                name, count
            ));
            reported.push(name.clone());
        }
    }

    report
}

/// Whether `target` is one of the dataset's columns.
pub fn check_target_exists(dataset: &Dataset, target: &str) -> bool {
    dataset.has_column(target)
}

/// Guess the target column.
///
/// Scans columns left to right and returns the first whose lower-cased name is
/// one of [`TARGET_NAME_CANDIDATES`]; falls back to the last column. Returns
/// `None` only for a dataset without columns.
pub fn infer_target(dataset: &Dataset) -> Option<String> {
    let columns = dataset.column_names();
    columns
        .iter()
        .find(|name| TARGET_NAME_CANDIDATES.contains(&name.to_lowercase().as_str()))
        .or_else(|| columns.last())
        .cloned()
}

/// Guess the task type from the target's values.
///
/// This is a heuristic, not a guarantee: non-numeric targets and numeric
/// targets with fewer than [`CLASSIFICATION_DISTINCT_THRESHOLD`] distinct values
/// are called classification, everything else regression. A numeric target
/// holding 25 integer class codes will be called regression.
pub fn infer_task(target: &Series) -> Result<TaskType> {
    if !is_numeric_target(target) {
        return Ok(TaskType::Classification);
    }
    let distinct = distinct_count(target)?;
    Ok(if distinct < CLASSIFICATION_DISTINCT_THRESHOLD {
        TaskType::Classification
    } else {
        TaskType::Regression
    })
}

/// Check a declared task against the target column's value distribution.
///
/// - classification over a numeric target whose distinct values exceed both
///   [`CONTINUOUS_UNIQUE_RATIO`] of the rows and [`CONTINUOUS_UNIQUE_COUNT`]
///   is rejected with a suggestion to use regression
/// - regression over a non-numeric target is rejected
/// - regression over fewer than [`FEW_DISTINCT_REGRESSION_VALUES`] distinct
///   values is accepted; the condition is only logged
pub fn validate_task_alignment(
    dataset: &Dataset,
    target: &str,
    declared: TaskType,
) -> Result<AlignmentCheck> {
    if !check_target_exists(dataset, target) {
        return Ok(AlignmentCheck::reject(format!(
            "Target column '{}' not found in dataset",
            target
        )));
    }
    let series = dataset.series(target)?;
    let numeric = is_numeric_target(series);
    let distinct = distinct_count(series)?;
    let rows = dataset.height();

    match declared {
        TaskType::Classification => {
            let ratio = if rows == 0 {
                0.0
            } else {
                distinct as f64 / rows as f64
            };
            if numeric && ratio > CONTINUOUS_UNIQUE_RATIO && distinct > CONTINUOUS_UNIQUE_COUNT {
                return Ok(AlignmentCheck::reject(format!(
                    "Target '{}' is numeric with {} distinct values ({:.0}% of rows); \
                     it looks continuous. Try regression instead.",
                    target,
                    distinct,
                    ratio * 100.0
                )));
            }
        }
        TaskType::Regression => {
            if !numeric {
                return Ok(AlignmentCheck::reject(format!(
                    "Target '{}' is not numeric; regression needs a numeric target. \
                     Try classification instead.",
                    target
                )));
            }
            if distinct < FEW_DISTINCT_REGRESSION_VALUES {
                // Accepted as-is. Only logged.
                debug!(
                    column = target,
                    distinct, "regression target has very few distinct values"
                );
            }
        }
    }

    Ok(AlignmentCheck::accept())
}

/// Run every upload-time check and aggregate the failures.
///
/// Combines [`validate_dataset`], [`check_target_exists`] and
/// [`validate_task_alignment`]. Alignment is skipped when the target is
/// missing or the table is empty, since neither check can say anything useful.
pub fn validate_upload(
    dataset: &Dataset,
    target: &str,
    declared: TaskType,
) -> Result<ValidationReport> {
    let mut report = validate_dataset(dataset);

    if !check_target_exists(dataset, target) {
        report.push_error(format!("Target column '{}' not found in dataset", target));
        return Ok(report);
    }
    if dataset.height() == 0 {
        return Ok(report);
    }

    let alignment = validate_task_alignment(dataset, target, declared)?;
    if !alignment.is_aligned {
        report.push_error(alignment.message);
    }
    Ok(report)
}

fn is_numeric_target(series: &Series) -> bool {
    matches!(
        series_dtype_category(series),
        DtypeCategory::Numeric | DtypeCategory::Boolean
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame_dataset(frame: DataFrame) -> Dataset {
        Dataset::new(frame)
    }

    #[test]
    fn test_validate_dataset_ok() {
        let dataset = frame_dataset(df!("a" => [1, 2], "b" => ["x", "y"]).unwrap());
        let report = validate_dataset(&dataset);
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_validate_dataset_duplicate_columns() {
        let frame = df!("a" => [1], "b" => [2], "a_duplicated_0" => [3]).unwrap();
        let dataset = Dataset::with_source_columns(
            frame,
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
        );

        let report = validate_dataset(&dataset);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Duplicate column name 'a'"));
    }

    #[test]
    fn test_validate_dataset_aggregates_errors() {
        let frame = df!("a" => Vec::<i64>::new(), "a_duplicated_0" => Vec::<i64>::new()).unwrap();
        let dataset =
            Dataset::with_source_columns(frame, vec!["a".to_string(), "a".to_string()]);

        let report = validate_dataset(&dataset);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.contains("empty")));
        assert!(report.errors.iter().any(|e| e.contains("Duplicate")));
    }

    #[test]
    fn test_validate_dataset_empty() {
        let dataset = frame_dataset(df!("a" => Vec::<f64>::new()).unwrap());
        let report = validate_dataset(&dataset);
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["Dataset is empty".to_string()]);
    }

    #[test]
    fn test_check_target_exists() {
        let dataset = frame_dataset(df!("a" => [1], "label" => [0]).unwrap());
        assert!(check_target_exists(&dataset, "label"));
        assert!(!check_target_exists(&dataset, "Label"));
    }

    #[test]
    fn test_infer_target_finds_known_name_anywhere() {
        let dataset = frame_dataset(
            df!("target" => [1], "x" => [2], "y" => [3]).unwrap(),
        );
        assert_eq!(infer_target(&dataset), Some("target".to_string()));

        let dataset = frame_dataset(
            df!("x" => [1], "target" => [2], "y" => [3]).unwrap(),
        );
        assert_eq!(infer_target(&dataset), Some("target".to_string()));
    }

    #[test]
    fn test_infer_target_is_case_insensitive_and_ordered() {
        let dataset = frame_dataset(
            df!("Outcome" => [1], "LABEL" => [2], "z" => [3]).unwrap(),
        );
        assert_eq!(infer_target(&dataset), Some("Outcome".to_string()));
    }

    #[test]
    fn test_infer_target_falls_back_to_last_column() {
        let dataset = frame_dataset(df!("a" => [1], "b" => [2], "price" => [3]).unwrap());
        assert_eq!(infer_target(&dataset), Some("price".to_string()));

        assert_eq!(infer_target(&Dataset::new(DataFrame::empty())), None);
    }

    #[test]
    fn test_infer_task_two_strings_is_classification() {
        let target = Series::new("label".into(), &["yes", "no", "yes", "no"]);
        assert_eq!(infer_task(&target).unwrap(), TaskType::Classification);
    }

    #[test]
    fn test_infer_task_many_floats_is_regression() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64 * 0.37).collect();
        let target = Series::new("price".into(), values);
        assert_eq!(infer_task(&target).unwrap(), TaskType::Regression);
    }

    #[test]
    fn test_infer_task_threshold() {
        let nineteen: Vec<i64> = (0..19).collect();
        let twenty: Vec<i64> = (0..20).collect();
        assert_eq!(
            infer_task(&Series::new("t".into(), nineteen)).unwrap(),
            TaskType::Classification
        );
        assert_eq!(
            infer_task(&Series::new("t".into(), twenty)).unwrap(),
            TaskType::Regression
        );
    }

    fn two_hundred_distinct_of_500() -> Dataset {
        let target: Vec<f64> = (0..500).map(|i| (i % 200) as f64 + 0.5).collect();
        let feature: Vec<i64> = (0..500).collect();
        frame_dataset(df!("x" => feature, "y" => target).unwrap())
    }

    #[test]
    fn test_alignment_rejects_classification_on_continuous_target() {
        let dataset = two_hundred_distinct_of_500();

        let check = validate_task_alignment(&dataset, "y", TaskType::Classification).unwrap();
        assert!(!check.is_aligned);
        assert!(check.message.contains("regression"));

        let check = validate_task_alignment(&dataset, "y", TaskType::Regression).unwrap();
        assert!(check.is_aligned);
    }

    #[test]
    fn test_alignment_needs_both_ratio_and_count() {
        // 60 distinct of 1000 rows: count > 50 but ratio only 6%.
        let target: Vec<i64> = (0..1000).map(|i| i % 60).collect();
        let dataset = frame_dataset(df!("y" => target).unwrap());
        let check = validate_task_alignment(&dataset, "y", TaskType::Classification).unwrap();
        assert!(check.is_aligned);

        // 40 distinct of 50 rows: ratio 80% but count <= 50.
        let target: Vec<i64> = (0..50).map(|i| i % 40).collect();
        let dataset = frame_dataset(df!("y" => target).unwrap());
        let check = validate_task_alignment(&dataset, "y", TaskType::Classification).unwrap();
        assert!(check.is_aligned);
    }

    #[test]
    fn test_alignment_rejects_regression_on_strings() {
        let dataset = frame_dataset(df!("y" => ["a", "b", "c"]).unwrap());
        let check = validate_task_alignment(&dataset, "y", TaskType::Regression).unwrap();
        assert!(!check.is_aligned);
        assert!(check.message.contains("not numeric"));
    }

    #[test]
    fn test_alignment_few_distinct_regression_is_accepted() {
        let dataset = frame_dataset(df!("y" => [1.0, 2.0, 1.0, 2.0]).unwrap());
        let check = validate_task_alignment(&dataset, "y", TaskType::Regression).unwrap();
        assert!(check.is_aligned);
        assert!(check.message.is_empty());
    }

    #[test]
    fn test_alignment_missing_target() {
        let dataset = frame_dataset(df!("y" => [1.0]).unwrap());
        let check = validate_task_alignment(&dataset, "nope", TaskType::Regression).unwrap();
        assert!(!check.is_aligned);
        assert!(check.message.contains("nope"));
    }

    #[test]
    fn test_validate_upload_collects_everything() {
        let frame = df!("a" => [1], "a_duplicated_0" => [2]).unwrap();
        let dataset =
            Dataset::with_source_columns(frame, vec!["a".to_string(), "a".to_string()]);

        let report = validate_upload(&dataset, "label", TaskType::Classification).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[1].contains("'label' not found"));
    }

    #[test]
    fn test_validate_upload_misaligned_task() {
        let dataset = two_hundred_distinct_of_500();
        let report = validate_upload(&dataset, "y", TaskType::Classification).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
    }
}
