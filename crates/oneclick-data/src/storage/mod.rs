//! Durable project bookkeeping.
//!
//! Two halves with separate responsibilities:
//!
//! - [`ProjectStore`] owns the per-project directories and the artifacts in
//!   them (`raw_data.csv`, `eda.json`, `results.json`).
//! - [`ProjectIndex`] is the most-recent-first list of project summaries,
//!   kept in an embedded SQLite database so upserts and pruning are
//!   transactional.
//!
//! ```text
//! <storage>/
//! ├── index.db
//! └── projects/
//!     └── proj_1a2b3c4d/
//!         ├── raw_data.csv
//!         ├── eda.json
//!         └── results.json
//! ```

mod index;
mod project_store;

pub use index::{INDEX_FILE, ProjectIndex, ProjectMetadata, ProjectSummary};
pub use project_store::{EDA_FILE, ProjectId, ProjectStore, RAW_DATA_FILE, RESULTS_FILE};
