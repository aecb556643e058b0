//! Inference against the production version of a registered model.

use crate::catalog::ModelKind;
use crate::error::{LearningError, Result};
use crate::model::TrainedModel;
use crate::tracking::{ModelRegistry, ModelVersion};
use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use tracing::debug;

/// A production model loaded from the registry.
///
/// Only the version currently in [`Stage::Production`](crate::tracking::Stage::Production)
/// is ever loaded. If nothing has been promoted, loading fails instead of
/// falling back to the latest version.
#[derive(Debug)]
pub struct Predictor {
    version: ModelVersion,
    model: TrainedModel,
}

impl Predictor {
    /// Load the production version of `model_name` (e.g. `Model_logistic_regression`).
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::NoProductionModel`] when no version of
    /// `model_name` is in production.
    pub fn load(registry: &ModelRegistry, model_name: &str) -> Result<Self> {
        let version = registry
            .production_version(model_name)?
            .ok_or_else(|| LearningError::NoProductionModel {
                model_name: model_name.to_string(),
            })?;
        let model = TrainedModel::from_bytes(&registry.load_artifact(&version)?)?;
        debug!(model = model_name, version = version.version, "loaded production model");
        Ok(Self { version, model })
    }

    /// Load the production model registered for a catalog id.
    pub fn for_model(registry: &ModelRegistry, model_id: &str) -> Result<Self> {
        let kind: ModelKind = model_id.parse()?;
        Self::load(registry, &kind.registry_name())
    }

    #[must_use]
    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    #[must_use]
    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Predict one JSON record.
    pub fn predict_record(&self, record: &Map<String, Value>) -> Result<Value> {
        self.model.predict_record(record)
    }

    /// Predict every row of a frame.
    pub fn predict_frame(&self, frame: &DataFrame) -> Result<Vec<Value>> {
        self.model.predict_frame(frame)
    }
}
