//! Dense class-index encoding of classification targets.

use crate::error::{LearningError, Result};
use oneclick_data::DtypeCategory;
use oneclick_data::utils::{f64_to_json, get_dtype_category, is_float_dtype, to_f64_values, to_string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Maps target values to class indices `0..n_classes` and back.
///
/// Classes are sorted in the target's natural order: `false < true`,
/// numeric order for numbers, lexicographic for strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Original value of each class, by index.
    classes: Vec<Value>,
}

impl LabelEncoder {
    /// Learn the classes of `target` and encode every row.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if `target` contains nulls.
    pub fn fit_transform(target: &Series) -> Result<(Self, Vec<u32>)> {
        let missing = || {
            LearningError::InvalidData(format!(
                "target '{}' contains missing values",
                target.name()
            ))
        };

        match get_dtype_category(target.dtype()) {
            DtypeCategory::Boolean => {
                let keys = target
                    .bool()?
                    .into_iter()
                    .collect::<Option<Vec<bool>>>()
                    .ok_or_else(missing)?;
                let (classes, codes) = encode(keys);
                Ok((Self::new(classes.into_iter().map(Value::Bool)), codes))
            }
            DtypeCategory::Numeric => {
                let keys = to_f64_values(target)?
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()).map(|x| x.round() as i64))
                    .collect::<Option<Vec<i64>>>()
                    .ok_or_else(missing)?;
                let float = is_float_dtype(target.dtype());
                let (classes, codes) = encode(keys);
                let values = classes.into_iter().map(|k| {
                    if float {
                        f64_to_json(k as f64)
                    } else {
                        Value::from(k)
                    }
                });
                Ok((Self::new(values), codes))
            }
            _ => {
                let keys = to_string_values(target)?
                    .into_iter()
                    .collect::<Option<Vec<String>>>()
                    .ok_or_else(missing)?;
                let (classes, codes) = encode(keys);
                Ok((Self::new(classes.into_iter().map(Value::String)), codes))
            }
        }
    }

    fn new(classes: impl Iterator<Item = Value>) -> Self {
        Self {
            classes: classes.collect(),
        }
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn classes(&self) -> &[Value] {
        &self.classes
    }

    /// Original value for a class index.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InferenceError`] for an index outside the
    /// fitted classes.
    pub fn decode(&self, code: u32) -> Result<Value> {
        self.classes
            .get(code as usize)
            .cloned()
            .ok_or_else(|| LearningError::InferenceError(format!("unknown class index {code}")))
    }
}

fn encode<K: Ord + Clone>(keys: Vec<K>) -> (Vec<K>, Vec<u32>) {
    let classes: Vec<K> = keys.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
    let codes = keys
        .iter()
        .map(|k| classes.binary_search(k).map_or(0, |i| i as u32))
        .collect();
    (classes, codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_string_labels_sorted() {
        let target = Series::new("y".into(), ["dog", "cat", "dog", "bird"]);
        let (encoder, codes) = LabelEncoder::fit_transform(&target).unwrap();
        assert_eq!(encoder.classes(), &[json!("bird"), json!("cat"), json!("dog")]);
        assert_eq!(codes, vec![2, 1, 2, 0]);
        assert_eq!(encoder.decode(1).unwrap(), json!("cat"));
    }

    #[test]
    fn test_integer_labels_keep_numeric_json() {
        let target = Series::new("y".into(), [10i64, 2, 10]);
        let (encoder, codes) = LabelEncoder::fit_transform(&target).unwrap();
        assert_eq!(encoder.classes(), &[json!(2), json!(10)]);
        assert_eq!(codes, vec![1, 0, 1]);
    }

    #[test]
    fn test_boolean_labels() {
        let target = Series::new("y".into(), [true, false, true]);
        let (encoder, codes) = LabelEncoder::fit_transform(&target).unwrap();
        assert_eq!(encoder.classes(), &[json!(false), json!(true)]);
        assert_eq!(codes, vec![1, 0, 1]);
    }

    #[test]
    fn test_nulls_rejected() {
        let target = Series::new("y".into(), [Some("a"), None]);
        assert!(LabelEncoder::fit_transform(&target).is_err());
    }

    #[test]
    fn test_decode_out_of_range() {
        let target = Series::new("y".into(), ["a", "b"]);
        let (encoder, _) = LabelEncoder::fit_transform(&target).unwrap();
        assert!(encoder.decode(5).is_err());
    }
}
