//! Exploratory data analysis: chart data for the project dashboard.
//!
//! [`EdaReport`] holds plain numbers rather than rendered figures. A front
//! end can draw any of these charts from the JSON alone:
//!
//! | Field | Chart |
//! |-------|-------|
//! | `missing_values` | bar chart of null counts per column |
//! | `correlation_matrix` | Pearson heatmap over numeric columns |
//! | `target_distribution` | histogram (few distinct values) or box plot |
//! | `feature_distributions` | histograms of the first five numeric features |

use crate::dataset::Dataset;
use crate::error::Result;
use crate::utils::{distinct_count, is_numeric_dtype, present_f64, to_f64_chunked, to_string_values};
use crate::validation::CLASSIFICATION_DISTINCT_THRESHOLD;
use polars::prelude::cov::pearson_corr;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of numeric features that get a histogram.
pub const MAX_FEATURE_HISTOGRAMS: usize = 5;

/// Bins per numeric histogram.
pub const HISTOGRAM_BINS: usize = 10;

/// Chart-data bundle for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdaReport {
    pub rows: usize,
    pub columns: usize,
    /// Null count per column, in column order.
    pub missing_values: Vec<MissingValues>,
    /// `None` when the dataset has no numeric columns.
    pub correlation_matrix: Option<CorrelationMatrix>,
    /// `None` when the target column is absent.
    pub target_distribution: Option<TargetDistribution>,
    /// Keyed by feature name.
    pub feature_distributions: BTreeMap<String, Histogram>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    pub column: String,
    pub count: usize,
}

/// Pearson correlation over numeric columns. Undefined cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// How the target is distributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetDistribution {
    /// Count per distinct value, used when there are few distinct values.
    Counts {
        column: String,
        counts: Vec<ValueCount>,
    },
    /// Five-number summary, used for continuous targets.
    Box { column: String, summary: BoxSummary },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Equal-width histogram. `edges` has one more entry than `counts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl EdaReport {
    /// Build the report for `dataset`, treating `target` as the label column.
    pub fn generate(dataset: &Dataset, target: &str) -> Result<Self> {
        let frame = dataset.frame();

        let missing_values = frame
            .get_columns()
            .iter()
            .map(|c| MissingValues {
                column: c.name().to_string(),
                count: c.null_count(),
            })
            .collect();

        let numeric = dataset.numeric_columns();
        let correlation_matrix = if numeric.is_empty() {
            None
        } else {
            Some(correlation_matrix(frame, &numeric)?)
        };

        let target_distribution = match frame.column(target) {
            Ok(column) => Some(target_distribution(column.as_materialized_series())?),
            Err(_) => None,
        };

        let mut feature_distributions = BTreeMap::new();
        for name in numeric
            .iter()
            .filter(|name| name.as_str() != target)
            .take(MAX_FEATURE_HISTOGRAMS)
        {
            let values = present_f64(frame.column(name)?.as_materialized_series())?;
            if let Some(histogram) = histogram(&values, HISTOGRAM_BINS) {
                feature_distributions.insert(name.clone(), histogram);
            }
        }

        Ok(Self {
            rows: dataset.height(),
            columns: dataset.width(),
            missing_values,
            correlation_matrix,
            target_distribution,
            feature_distributions,
        })
    }
}

fn correlation_matrix(frame: &DataFrame, columns: &[String]) -> Result<CorrelationMatrix> {
    let mut data = Vec::with_capacity(columns.len());
    for name in columns {
        data.push(to_f64_chunked(frame.column(name)?.as_materialized_series())?);
    }

    // Nulls (and NaN, already nulled) drop the pair; constant columns give None.
    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson_corr(&data[i], &data[j]).filter(|r| r.is_finite());
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

fn target_distribution(series: &Series) -> Result<TargetDistribution> {
    let column = series.name().to_string();

    if !is_numeric_dtype(series.dtype()) || distinct_count(series)? < CLASSIFICATION_DISTINCT_THRESHOLD {
        return Ok(TargetDistribution::Counts {
            column,
            counts: value_counts(series)?,
        });
    }

    let values = present_f64(series)?;
    let q = |p: f64| -> Result<f64> {
        Ok(values
            .quantile(p, QuantileMethod::Linear)?
            .unwrap_or(f64::NAN))
    };
    Ok(TargetDistribution::Box {
        column,
        summary: BoxSummary {
            min: q(0.0)?,
            q1: q(0.25)?,
            median: q(0.5)?,
            q3: q(0.75)?,
            max: q(1.0)?,
        },
    })
}

/// Non-null value counts, most frequent first. Ties order by value.
fn value_counts(series: &Series) -> Result<Vec<ValueCount>> {
    let present = series.drop_nulls();
    let table = present.value_counts(false, false, "count".into(), false)?;

    let values = to_string_values(table.column(present.name())?.as_materialized_series())?;
    let counts = table
        .column("count")?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;

    let mut out: Vec<ValueCount> = values
        .into_iter()
        .zip(counts.u64()?.into_iter())
        .filter_map(|(value, count)| {
            Some(ValueCount {
                value: value?,
                count: usize::try_from(count?).ok()?,
            })
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    Ok(out)
}

/// Equal-width histogram over present `values`. `None` when there are none.
pub fn histogram(values: &Float64Chunked, bins: usize) -> Option<Histogram> {
    if bins == 0 {
        return None;
    }
    let (min, max) = (values.min()?, values.max()?);

    if min == max {
        return Some(Histogram {
            edges: vec![min, max],
            counts: vec![values.len() - values.null_count()],
        });
    }

    let width = (max - min) / bins as f64;
    let edges = (0..=bins).map(|i| min + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for v in values.into_iter().flatten() {
        // The maximum lands in the last bin.
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some(Histogram { edges, counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_values_per_column() {
        let frame = df!(
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some("x"), Some("y"), None],
        )
        .unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "b").unwrap();

        assert_eq!(
            report.missing_values,
            vec![
                MissingValues { column: "a".to_string(), count: 1 },
                MissingValues { column: "b".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_correlation_matrix() {
        let frame = df!(
            "x" => [1.0, 2.0, 3.0, 4.0],
            "y" => [2.0, 4.0, 6.0, 8.0],
            "z" => [4.0, 3.0, 2.0, 1.0],
        )
        .unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "y").unwrap();
        let matrix = report.correlation_matrix.unwrap();

        assert_eq!(matrix.columns, vec!["x", "y", "z"]);
        let xy = matrix.values[0][1].unwrap();
        let xz = matrix.values[0][2].unwrap();
        assert!((xy - 1.0).abs() < 1e-9);
        assert!((xz + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_numeric_columns_means_no_correlation() {
        let frame = df!("a" => ["x", "y"], "label" => ["p", "q"]).unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "label").unwrap();
        assert!(report.correlation_matrix.is_none());
        assert!(report.feature_distributions.is_empty());
    }

    #[test]
    fn test_target_distribution_counts_for_few_values() {
        let frame = df!("f" => [1, 2, 3, 4], "label" => [0, 1, 1, 1]).unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "label").unwrap();

        match report.target_distribution.unwrap() {
            TargetDistribution::Counts { column, counts } => {
                assert_eq!(column, "label");
                assert_eq!(
                    counts,
                    vec![
                        ValueCount { value: "1".to_string(), count: 3 },
                        ValueCount { value: "0".to_string(), count: 1 },
                    ]
                );
            }
            other => panic!("expected counts, got {other:?}"),
        }
    }

    #[test]
    fn test_target_distribution_box_for_continuous() {
        let values: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let frame = df!("price" => values).unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "price").unwrap();

        match report.target_distribution.unwrap() {
            TargetDistribution::Box { summary, .. } => {
                assert_eq!(summary.min, 0.0);
                assert_eq!(summary.median, 50.0);
                assert_eq!(summary.max, 100.0);
                assert_eq!(summary.q1, 25.0);
            }
            other => panic!("expected box, got {other:?}"),
        }
    }

    #[test]
    fn test_feature_histograms_limited_and_exclude_target() {
        let frame = df!(
            "a" => [1.0, 2.0], "b" => [1.0, 2.0], "c" => [1.0, 2.0],
            "d" => [1.0, 2.0], "e" => [1.0, 2.0], "f" => [1.0, 2.0],
            "target" => [0.0, 1.0],
        )
        .unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "target").unwrap();

        let names: Vec<&str> = report.feature_distributions.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    fn chunked(values: &[Option<f64>]) -> Float64Chunked {
        values.iter().copied().collect()
    }

    #[test]
    fn test_histogram() {
        let h = histogram(&chunked(&[Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0)]), 2).unwrap();
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0]);
        assert_eq!(h.counts, vec![2, 3]);

        let flat = histogram(&chunked(&[Some(5.0), None, Some(5.0)]), 10).unwrap();
        assert_eq!(flat.counts, vec![2]);

        assert!(histogram(&chunked(&[]), 10).is_none());
        assert!(histogram(&chunked(&[None, None]), 10).is_none());
    }

    #[test]
    fn test_correlation_skips_missing_and_constant() {
        let frame = df!(
            "x" => [Some(1.0), Some(2.0), None, Some(3.0), Some(f64::NAN)],
            "y" => [Some(2.0), Some(4.0), Some(100.0), Some(6.0), Some(-50.0)],
            "flat" => [Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)],
        )
        .unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "label").unwrap();
        let matrix = report.correlation_matrix.unwrap();

        assert!((matrix.values[0][1].unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(matrix.values[0][2], None);
        assert_eq!(matrix.values[2][2], None);
    }

    #[test]
    fn test_target_counts_ignore_nulls_and_break_ties_by_value() {
        let frame = df!("label" => [Some("b"), Some("a"), None, Some("c"), Some("c")]).unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "label").unwrap();

        let Some(TargetDistribution::Counts { counts, .. }) = report.target_distribution else {
            panic!("expected counts");
        };
        let pairs: Vec<(&str, usize)> = counts.iter().map(|c| (c.value.as_str(), c.count)).collect();
        assert_eq!(pairs, vec![("c", 2), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_missing_target_has_no_distribution() {
        let frame = df!("a" => [1.0, 2.0]).unwrap();
        let report = EdaReport::generate(&Dataset::new(frame), "label").unwrap();
        assert!(report.target_distribution.is_none());
    }
}
