//! The closed catalog of trainable models.
//!
//! Every model the system can fit is a [`ModelKind`]. Each kind knows its
//! public id, display name, the rationale shown to users, which
//! [`TaskType`] it solves and its default [`Hyperparameters`].
//!
//! | id | task | default hyperparameters |
//! |----|------|-------------------------|
//! | `logistic_regression` | classification | L2 penalty `alpha = 1.0` |
//! | `random_forest_classifier` | classification | 100 trees, unbounded depth |
//! | `xgboost_classifier` | classification | 100 rounds, learning rate 0.3, depth 6 |
//! | `linear_regression` | regression | SVD least squares |
//! | `random_forest_regressor` | regression | 100 trees, unbounded depth |
//! | `gradient_boosting_regressor` | regression | 100 rounds, learning rate 0.1, depth 3 |
//!
//! # Example
//!
//! ```
//! use oneclick_data::TaskType;
//! use oneclick_learning::catalog::{self, ModelKind};
//!
//! let ids: Vec<&str> = catalog::suggest(TaskType::Regression)
//!     .iter()
//!     .map(|s| s.id)
//!     .collect();
//! assert_eq!(ids, ["linear_regression", "random_forest_regressor", "gradient_boosting_regressor"]);
//!
//! let estimator = catalog::get_model("random_forest_classifier").unwrap();
//! assert_eq!(estimator.kind(), ModelKind::RandomForestClassifier);
//! assert!(!estimator.is_fitted());
//! ```

use crate::error::{LearningError, Result};
use crate::estimator::Estimator;
use oneclick_data::TaskType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ModelKind
// ============================================================================

/// A model the catalog can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForestClassifier,
    XgboostClassifier,
    LinearRegression,
    RandomForestRegressor,
    GradientBoostingRegressor,
}

impl ModelKind {
    /// Every kind, in catalog order.
    pub const ALL: [ModelKind; 6] = [
        ModelKind::LogisticRegression,
        ModelKind::RandomForestClassifier,
        ModelKind::XgboostClassifier,
        ModelKind::LinearRegression,
        ModelKind::RandomForestRegressor,
        ModelKind::GradientBoostingRegressor,
    ];

    /// The public identifier, e.g. `"logistic_regression"`.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForestClassifier => "random_forest_classifier",
            ModelKind::XgboostClassifier => "xgboost_classifier",
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::RandomForestRegressor => "random_forest_regressor",
            ModelKind::GradientBoostingRegressor => "gradient_boosting_regressor",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::RandomForestClassifier => "Random Forest",
            ModelKind::XgboostClassifier => "XGBoost",
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::RandomForestRegressor => "Random Forest Regressor",
            ModelKind::GradientBoostingRegressor => "Gradient Boosting",
        }
    }

    /// One-line rationale shown next to the suggestion.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Good baseline for classification.",
            ModelKind::RandomForestClassifier => "Handles non-linear patterns well.",
            ModelKind::XgboostClassifier => "High performance for structured data.",
            ModelKind::LinearRegression => "Simple baseline for regression.",
            ModelKind::RandomForestRegressor => "Robust for regression tasks.",
            ModelKind::GradientBoostingRegressor => "Effective for complex regression.",
        }
    }

    /// The task this model solves.
    #[must_use]
    pub fn task(&self) -> TaskType {
        match self {
            ModelKind::LogisticRegression
            | ModelKind::RandomForestClassifier
            | ModelKind::XgboostClassifier => TaskType::Classification,
            ModelKind::LinearRegression
            | ModelKind::RandomForestRegressor
            | ModelKind::GradientBoostingRegressor => TaskType::Regression,
        }
    }

    /// Registry name models of this kind are registered under.
    #[must_use]
    pub fn registry_name(&self) -> String {
        format!("Model_{}", self.id())
    }

    /// Default hyperparameters for this kind.
    #[must_use]
    pub fn default_hyperparameters(&self) -> Hyperparameters {
        match self {
            ModelKind::LogisticRegression => Hyperparameters::LogisticRegression(LinearParams {
                alpha: 1.0,
            }),
            ModelKind::RandomForestClassifier => {
                Hyperparameters::RandomForestClassifier(ForestParams::default())
            }
            ModelKind::XgboostClassifier => Hyperparameters::XgboostClassifier(BoostingParams {
                n_estimators: 100,
                learning_rate: 0.3,
                max_depth: 6,
            }),
            ModelKind::LinearRegression => Hyperparameters::LinearRegression,
            ModelKind::RandomForestRegressor => {
                Hyperparameters::RandomForestRegressor(ForestParams::default())
            }
            ModelKind::GradientBoostingRegressor => {
                Hyperparameters::GradientBoostingRegressor(BoostingParams {
                    n_estimators: 100,
                    learning_rate: 0.1,
                    max_depth: 3,
                })
            }
        }
    }

    /// Candidates for `task`, in catalog order.
    pub fn for_task(task: TaskType) -> impl Iterator<Item = ModelKind> {
        Self::ALL.into_iter().filter(move |kind| kind.task() == task)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelKind {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| LearningError::UnsupportedModel {
                model_id: s.to_string(),
            })
    }
}

// ============================================================================
// Hyperparameters
// ============================================================================

/// Hyperparameters for linear models with an L2 penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// Regularization strength.
    pub alpha: f64,
}

/// Hyperparameters for bagged tree ensembles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows trees until leaves are pure.
    pub max_depth: Option<u16>,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }
}

/// Hyperparameters for gradient-boosted regression trees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage applied to each round's trees.
    pub learning_rate: f64,
    pub max_depth: u16,
}

/// Hyperparameters, one variant per [`ModelKind`].
///
/// The variant always matches the estimator's kind, so a forest can never be
/// configured with boosting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Hyperparameters {
    LogisticRegression(LinearParams),
    RandomForestClassifier(ForestParams),
    XgboostClassifier(BoostingParams),
    LinearRegression,
    RandomForestRegressor(ForestParams),
    GradientBoostingRegressor(BoostingParams),
}

impl Hyperparameters {
    /// The kind these hyperparameters configure.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            Hyperparameters::LogisticRegression(_) => ModelKind::LogisticRegression,
            Hyperparameters::RandomForestClassifier(_) => ModelKind::RandomForestClassifier,
            Hyperparameters::XgboostClassifier(_) => ModelKind::XgboostClassifier,
            Hyperparameters::LinearRegression => ModelKind::LinearRegression,
            Hyperparameters::RandomForestRegressor(_) => ModelKind::RandomForestRegressor,
            Hyperparameters::GradientBoostingRegressor(_) => ModelKind::GradientBoostingRegressor,
        }
    }

    /// Flatten into `(name, value)` pairs for run tracking.
    ///
    /// Unset optional values are recorded as `"None"`.
    #[must_use]
    pub fn as_params(&self) -> Vec<(String, String)> {
        let Ok(serde_json::Value::Object(map)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        map.into_iter()
            .filter(|(key, _)| key != "model")
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::Null => "None".to_string(),
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect()
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// A catalog entry as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSuggestion {
    pub id: &'static str,
    pub name: &'static str,
    pub reason: &'static str,
}

impl From<ModelKind> for ModelSuggestion {
    fn from(kind: ModelKind) -> Self {
        Self {
            id: kind.id(),
            name: kind.display_name(),
            reason: kind.reason(),
        }
    }
}

/// Suggested models for `task`. Static, always three entries.
#[must_use]
pub fn suggest(task: TaskType) -> Vec<ModelSuggestion> {
    ModelKind::for_task(task).map(ModelSuggestion::from).collect()
}

/// Build a fresh, unfitted estimator for `model_id` with default
/// hyperparameters.
///
/// # Errors
///
/// Returns [`LearningError::UnsupportedModel`] for ids not in the catalog.
pub fn get_model(model_id: &str) -> Result<Estimator> {
    let kind: ModelKind = model_id.parse()?;
    Ok(Estimator::new(kind.default_hyperparameters()))
}
