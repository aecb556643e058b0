//! Dataset handling for one-click tabular ML.
//!
//! # Overview
//!
//! This crate covers everything that happens to a dataset before a model is
//! fitted:
//!
//! - **Loading**: CSV files into a [`Dataset`], keeping the raw header so
//!   duplicate column names can be reported
//! - **Validation**: go/no-go checks on rows, column names, target presence
//!   and task/target alignment, with all failures aggregated
//! - **Inference**: target column and task type guesses for when the user
//!   does not say
//! - **EDA**: chart data (missing values, correlations, distributions)
//! - **Storage**: per-project artifact directories and a transactional
//!   most-recent-first project index
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oneclick_data::{Dataset, EdaReport, ProjectIndex, ProjectStore, TaskType, validation};
//!
//! let dataset = Dataset::from_csv_path("churn.csv")?;
//! let report = validation::validate_upload(&dataset, "label", TaskType::Classification)?;
//! if !report.is_valid {
//!     for error in &report.errors {
//!         eprintln!("{error}");
//!     }
//!     return Ok(());
//! }
//!
//! let store = ProjectStore::new("storage")?;
//! let index = ProjectIndex::open_in(&store)?;
//! let project_id = store.create_project()?;
//! store.save_dataset(&project_id, &mut dataset.clone().into_frame(), oneclick_data::RAW_DATA_FILE)?;
//! store.save_json(&project_id, &EdaReport::generate(&dataset, "label")?, oneclick_data::EDA_FILE)?;
//! ```

pub mod dataset;
pub mod eda;
pub mod error;
pub mod storage;
pub mod types;
pub mod utils;
pub mod validation;

pub use dataset::Dataset;
pub use eda::EdaReport;
pub use error::{DataError, Result, ResultExt};
pub use storage::{
    EDA_FILE, INDEX_FILE, ProjectId, ProjectIndex, ProjectMetadata, ProjectStore, ProjectSummary,
    RAW_DATA_FILE, RESULTS_FILE,
};
pub use types::{AlignmentCheck, ParseTaskTypeError, TaskType, ValidationReport};
pub use utils::DtypeCategory;
