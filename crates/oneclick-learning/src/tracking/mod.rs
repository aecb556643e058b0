//! Experiment tracking and model registry.
//!
//! Both live in one embedded SQLite database under a tracking directory:
//!
//! ```text
//! <tracking>/
//! ├── tracking.db                 runs, params, metrics, model versions
//! └── artifacts/<run_id>/model.json
//! ```
//!
//! [`ExperimentTracker`] records runs; [`ModelRegistry`] versions the
//! artifacts those runs produce and tracks which version is in production.
//! Each opens its own connection, and every multi-statement update runs in a
//! transaction, so a tracker and a registry on the same directory can be
//! used side by side.

mod registry;
mod tracker;

pub use registry::{ModelRegistry, ModelVersion, Stage};
pub use tracker::{ExperimentTracker, RunRecord, RunStatus};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Database file name under the tracking directory.
pub const TRACKING_DB: &str = "tracking.db";

/// Directory holding per-run artifacts.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// File name of a serialized model inside a run's artifact directory.
pub const MODEL_ARTIFACT: &str = "model.json";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS experiments (
        experiment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name          TEXT NOT NULL UNIQUE,
        created_at    TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS runs (
        run_id        TEXT PRIMARY KEY,
        experiment_id INTEGER NOT NULL REFERENCES experiments (experiment_id),
        status        TEXT NOT NULL,
        start_time    TEXT NOT NULL,
        end_time      TEXT
    );
    CREATE TABLE IF NOT EXISTS params (
        run_id TEXT NOT NULL REFERENCES runs (run_id),
        key    TEXT NOT NULL,
        value  TEXT NOT NULL,
        PRIMARY KEY (run_id, key)
    );
    CREATE TABLE IF NOT EXISTS metrics (
        run_id TEXT NOT NULL REFERENCES runs (run_id),
        key    TEXT NOT NULL,
        value  REAL NOT NULL,
        PRIMARY KEY (run_id, key)
    );
    CREATE TABLE IF NOT EXISTS model_versions (
        name       TEXT NOT NULL,
        version    INTEGER NOT NULL,
        run_id     TEXT NOT NULL,
        stage      TEXT NOT NULL,
        artifact   TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (name, version)
    );
";

/// Open (and if needed create) the tracking database under `dir`.
pub(crate) fn open_database(dir: &Path) -> crate::Result<Connection> {
    fs::create_dir_all(dir.join(ARTIFACTS_DIR))?;
    let conn = Connection::open(dir.join(TRACKING_DB))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Read an RFC 3339 timestamp column.
pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
