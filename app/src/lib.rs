//! oneclick: upload a CSV, pick a model, get a tracked and versioned model.
//!
//! The [`Workspace`] ties the data and learning crates together behind the
//! operations the command line exposes:
//!
//! | Operation | What it does |
//! |-----------|--------------|
//! | `upload` | validate, store raw data and EDA, index the project |
//! | `list_projects` / `get_project` / `delete_project` | project history |
//! | `eda` / `suggestions` | chart data and candidate models |
//! | `train` / `train_best` | fit, track, register `Model_<id>` |
//! | `promote` | move a version to production |
//! | `predict` | score a record with the production version |
//!
//! Every failure is an [`AppError`] with an HTTP-equivalent status.

pub mod error;
pub mod session;
pub mod settings;
pub mod workspace;

pub use error::{AppError, Result};
pub use session::{Session, SessionStore};
pub use settings::Settings;
pub use workspace::{
    DeleteOutcome, PredictionOutcome, ProjectDetails, ProjectResults, SuggestionsOutcome,
    TrainBestOutcome, TrainOutcome, UploadOutcome, Workspace,
};
