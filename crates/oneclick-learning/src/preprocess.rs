//! Feature preprocessing.
//!
//! The preprocessor turns a frame of raw feature columns into a dense
//! numeric matrix:
//!
//! - **Numeric** columns (ints, floats, booleans as 0/1): missing values are
//!   replaced by the training median, then standardized with the training
//!   mean and population standard deviation.
//! - **Categorical** columns (strings, categoricals): missing values become
//!   [`MISSING_CATEGORY`], then each training category gets one indicator
//!   column. A category never seen in training encodes as all zeros.
//! - Anything else (dates, lists, ...) is dropped.
//!
//! All statistics come from the frame passed to [`Preprocessor::fit`]; the
//! resulting [`FittedPreprocessor`] is serialized alongside the estimator so
//! prediction applies exactly the same transformation.
//!
//! # Example
//!
//! ```
//! use oneclick_learning::preprocess::Preprocessor;
//! use polars::prelude::*;
//!
//! let train = df! {
//!     "age" => [Some(20.0), None, Some(40.0)],
//!     "plan" => ["basic", "pro", "basic"],
//! }
//! .unwrap();
//!
//! let fitted = Preprocessor::new().fit(&train).unwrap();
//! assert_eq!(fitted.feature_names(), ["age", "plan=basic", "plan=pro"]);
//!
//! let unseen = df! { "age" => [30.0], "plan" => ["enterprise"] }.unwrap();
//! let rows = fitted.transform(&unseen).unwrap();
//! assert_eq!(&rows[0][1..], &[0.0, 0.0]);
//! ```

use crate::error::{LearningError, Result};
use oneclick_data::DtypeCategory;
use oneclick_data::utils::{get_dtype_category, present_f64, to_f64_chunked, to_string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Fill value for missing categorical entries.
pub const MISSING_CATEGORY: &str = "missing";

/// How a fitted input column is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericColumn {
    name: String,
    median: f64,
    mean: f64,
    scale: f64,
}

impl NumericColumn {
    fn fit(name: &str, series: &Series) -> Result<Self> {
        let fill = present_f64(series)?.median().unwrap_or(0.0);

        // Scaling statistics are taken after imputation, population std.
        let imputed = to_f64_chunked(series)?.fill_null_with_values(fill)?;
        let mean = imputed.mean().unwrap_or(0.0);
        let scale = imputed.std(0).filter(|std| *std > 0.0).unwrap_or(1.0);

        Ok(Self {
            name: name.to_string(),
            median: fill,
            mean,
            scale,
        })
    }

    fn encode(&self, series: &Series, out: &mut [Vec<f64>]) -> Result<()> {
        let values = to_f64_chunked(series)?.fill_null_with_values(self.median)?;
        for (row, value) in out.iter_mut().zip(values.into_no_null_iter()) {
            row.push((value - self.mean) / self.scale);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalColumn {
    name: String,
    /// Sorted training categories, including [`MISSING_CATEGORY`] when the
    /// training column had nulls.
    categories: Vec<String>,
}

impl CategoricalColumn {
    fn fit(name: &str, series: &Series) -> Result<Self> {
        let categories: BTreeSet<String> = fill_missing(to_string_values(series)?)
            .into_iter()
            .collect();
        Ok(Self {
            name: name.to_string(),
            categories: categories.into_iter().collect(),
        })
    }

    fn encode(&self, series: &Series, out: &mut [Vec<f64>]) -> Result<()> {
        let values = fill_missing(to_string_values(series)?);
        for (row, value) in out.iter_mut().zip(values) {
            let hit = self.categories.binary_search(&value).ok();
            row.extend((0..self.categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
        }
        Ok(())
    }
}

fn fill_missing(values: Vec<Option<String>>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| MISSING_CATEGORY.to_string()))
        .collect()
}

// ============================================================================
// Preprocessor
// ============================================================================

/// Unfitted preprocessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor;

impl Preprocessor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Learn imputation, scaling and encoding state from `features`.
    ///
    /// `features` must not contain the target column.
    ///
    /// # Errors
    ///
    /// Returns an error if a column cannot be converted.
    pub fn fit(&self, features: &DataFrame) -> Result<FittedPreprocessor> {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        let mut dropped = Vec::new();

        for column in features.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().as_str();
            match get_dtype_category(series.dtype()) {
                DtypeCategory::Numeric | DtypeCategory::Boolean => {
                    numeric.push(NumericColumn::fit(name, series)?);
                }
                DtypeCategory::Categorical => {
                    categorical.push(CategoricalColumn::fit(name, series)?);
                }
                DtypeCategory::Datetime | DtypeCategory::Other => {
                    dropped.push(name.to_string());
                }
            }
        }

        debug!(
            numeric = numeric.len(),
            categorical = categorical.len(),
            dropped = dropped.len(),
            "Fitted preprocessor"
        );

        Ok(FittedPreprocessor {
            numeric,
            categorical,
            dropped,
        })
    }
}

/// Preprocessing state learned from training features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    dropped: Vec<String>,
}

impl FittedPreprocessor {
    /// Transform `frame` into row-major feature rows.
    ///
    /// Extra columns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if a fitted input column is
    /// missing from `frame`.
    pub fn transform(&self, frame: &DataFrame) -> Result<Vec<Vec<f64>>> {
        let width = self.n_features_out();
        let mut rows = vec![Vec::with_capacity(width); frame.height()];

        for column in &self.numeric {
            column.encode(self.input(frame, &column.name)?, &mut rows)?;
        }
        for column in &self.categorical {
            column.encode(self.input(frame, &column.name)?, &mut rows)?;
        }

        Ok(rows)
    }

    fn input<'a>(&self, frame: &'a DataFrame, name: &str) -> Result<&'a Series> {
        frame
            .column(name)
            .map(Column::as_materialized_series)
            .map_err(|_| LearningError::InvalidData(format!("missing feature column '{name}'")))
    }

    /// Number of output columns.
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Output column names: `<column>` for numeric inputs and
    /// `<column>=<category>` for indicator columns.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        let numeric = self.numeric.iter().map(|c| c.name.clone());
        let indicators = self.categorical.iter().flat_map(|c| {
            c.categories
                .iter()
                .map(move |category| format!("{}={}", c.name, category))
        });
        numeric.chain(indicators).collect()
    }

    /// Input columns the transform reads, with their role.
    pub fn input_columns(&self) -> impl Iterator<Item = (&str, ColumnRole)> {
        let numeric = self
            .numeric
            .iter()
            .map(|c| (c.name.as_str(), ColumnRole::Numeric));
        let categorical = self
            .categorical
            .iter()
            .map(|c| (c.name.as_str(), ColumnRole::Categorical));
        numeric.chain(categorical)
    }

    /// Columns ignored because their type cannot be encoded.
    #[must_use]
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }
}
