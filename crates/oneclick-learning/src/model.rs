//! The unit that gets registered: preprocessing, estimator and label mapping.
//!
//! A [`TrainedModel`] is everything needed to turn raw feature values into a
//! prediction. It is serialized to JSON as the registry artifact, so a model
//! loaded later applies exactly the imputation, scaling and encoding it was
//! trained with.

use crate::catalog::ModelKind;
use crate::error::{LearningError, Result};
use crate::estimator::{Estimator, FeatureMatrix, Predictions};
use crate::labels::LabelEncoder;
use crate::preprocess::{ColumnRole, FittedPreprocessor};
use chrono::{DateTime, Utc};
use oneclick_data::TaskType;
use oneclick_data::utils::f64_to_json;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A fitted model ready for inference.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    model_id: ModelKind,
    task_type: TaskType,
    target: String,
    preprocessor: FittedPreprocessor,
    estimator: Estimator,
    /// Present for classification.
    labels: Option<LabelEncoder>,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub(crate) fn new(
        task_type: TaskType,
        target: &str,
        preprocessor: FittedPreprocessor,
        estimator: Estimator,
        labels: Option<LabelEncoder>,
    ) -> Self {
        Self {
            model_id: estimator.kind(),
            task_type,
            target: target.to_string(),
            preprocessor,
            estimator,
            labels,
            trained_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn model_id(&self) -> ModelKind {
        self.model_id
    }

    #[must_use]
    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Name of the column the model predicts.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    #[must_use]
    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    /// Predict every row of `frame`.
    ///
    /// Classification returns the original label values, regression returns
    /// numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if a feature column is missing or the estimator fails.
    pub fn predict_frame(&self, frame: &DataFrame) -> Result<Vec<Value>> {
        if frame.height() == 0 {
            return Ok(Vec::new());
        }
        let rows = self.preprocessor.transform(frame)?;
        let x = FeatureMatrix::from_rows(&rows)?;

        match (self.estimator.predict(&x)?, &self.labels) {
            (Predictions::Classes(codes), Some(labels)) => {
                codes.into_iter().map(|c| labels.decode(c)).collect()
            }
            (Predictions::Values(values), None) => {
                Ok(values.into_iter().map(f64_to_json).collect())
            }
            _ => Err(LearningError::InferenceError(
                "model output does not match its task".to_string(),
            )),
        }
    }

    /// Predict a single record given as a JSON object of column values.
    ///
    /// Missing keys and nulls are treated as missing values; keys the model
    /// does not use are ignored.
    pub fn predict_record(&self, record: &Map<String, Value>) -> Result<Value> {
        let frame = self.record_frame(record)?;
        self.predict_frame(&frame)?
            .into_iter()
            .next()
            .ok_or_else(|| LearningError::InferenceError("no prediction produced".to_string()))
    }

    fn record_frame(&self, record: &Map<String, Value>) -> Result<DataFrame> {
        let columns = self
            .preprocessor
            .input_columns()
            .map(|(name, role)| {
                let value = record.get(name).unwrap_or(&Value::Null);
                match role {
                    ColumnRole::Numeric => {
                        Series::new(name.into(), [json_to_f64(value)]).into_column()
                    }
                    ColumnRole::Categorical => {
                        Series::new(name.into(), [json_to_category(value)]).into_column()
                    }
                }
            })
            .collect::<Vec<_>>();

        if columns.is_empty() {
            return Err(LearningError::InferenceError(
                "model has no input columns".to_string(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Serialize for the registry.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a registry artifact.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn json_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_to_category(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
