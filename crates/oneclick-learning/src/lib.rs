//! oneclick-learning: model catalog, training, tracking and inference.
//!
//! This crate fits tabular models on frames prepared by `oneclick-data`,
//! records each run and versions the fitted artifacts.
//!
//! # Features
//!
//! - **Catalog**: three models per task, built fresh on every request
//!   ([`catalog`])
//! - **Preprocessing**: median imputation and standardization for numbers,
//!   `"missing"` fill and one-hot encoding for categories ([`preprocess`])
//! - **Training**: seeded 80/20 split, held-out metrics and a best-of-N
//!   sweep ([`Trainer`])
//! - **Tracking**: runs, params, metrics and a versioned model registry on
//!   embedded SQLite ([`tracking`])
//! - **Inference**: predictions from the production version only
//!   ([`Predictor`])
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oneclick_data::TaskType;
//! use oneclick_learning::{Predictor, Trainer, TrainerConfig};
//!
//! let trainer = Trainer::open("storage/mlruns", TrainerConfig::default())?;
//!
//! let result = trainer.train(&frame, "label", TaskType::Classification, "random_forest_classifier")?;
//! println!("accuracy = {:?}", result.metrics.accuracy);
//!
//! trainer.registry().promote(&result.model_name, result.model_version)?;
//!
//! let predictor = Predictor::for_model(trainer.registry(), "random_forest_classifier")?;
//! let record = serde_json::json!({ "age": 41, "plan": "pro" });
//! let prediction = predictor.predict_record(record.as_object().unwrap())?;
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]. Callers
//! usually care about:
//!
//! - [`LearningError::UnsupportedModel`] - the id is not in the catalog
//! - [`LearningError::TaskMismatch`] - the model cannot learn this target;
//!   carries a hint
//! - [`LearningError::NoProductionModel`] - nothing promoted yet
//! - [`LearningError::TrainingFailed`] - the estimator itself failed
//!
//! # Thread Safety
//!
//! [`Trainer`], [`ExperimentTracker`] and [`ModelRegistry`] are `Send + Sync`.
//! Each guards its SQLite connection with a mutex, and multi-statement
//! updates run in transactions.

mod boosting;
pub mod catalog;
pub mod config;
pub mod error;
pub mod estimator;
mod labels;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod preprocess;
pub mod progress;
pub mod tracking;
pub mod types;

pub use catalog::{Hyperparameters, ModelKind, ModelSuggestion};
pub use config::{DEFAULT_EXPERIMENT, TrainerConfig, TrainerConfigBuilder};
pub use error::{LearningError, Result};
pub use estimator::Estimator;
pub use labels::LabelEncoder;
pub use model::TrainedModel;
pub use pipeline::Trainer;
pub use predict::Predictor;
pub use preprocess::{FittedPreprocessor, Preprocessor};
pub use progress::{ProgressCallback, ProgressUpdate, TrainingStage};
pub use tracking::{ExperimentTracker, ModelRegistry, ModelVersion, RunRecord, RunStatus, Stage};
pub use types::{BestOfResult, Metrics, ModelScore, TrainingResult};
