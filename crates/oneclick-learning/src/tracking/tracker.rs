use super::{open_database, timestamp_column};
use crate::error::{LearningError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RUNNING" => Some(RunStatus::Running),
            "FINISHED" => Some(RunStatus::Finished),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything recorded about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Records runs of one named experiment.
pub struct ExperimentTracker {
    conn: Mutex<Connection>,
    root: PathBuf,
    experiment: String,
    experiment_id: i64,
}

impl fmt::Debug for ExperimentTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentTracker")
            .field("root", &self.root)
            .field("experiment", &self.experiment)
            .finish_non_exhaustive()
    }
}

impl ExperimentTracker {
    /// Open the tracking store at `dir` and select `experiment`, creating
    /// either if missing.
    pub fn open(dir: impl AsRef<Path>, experiment: &str) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let conn = open_database(&root)?;

        conn.execute(
            "INSERT OR IGNORE INTO experiments (name, created_at) VALUES (?1, ?2)",
            params![experiment, Utc::now().to_rfc3339()],
        )?;
        let experiment_id: i64 = conn.query_row(
            "SELECT experiment_id FROM experiments WHERE name = ?1",
            params![experiment],
            |row| row.get(0),
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            root,
            experiment: experiment.to_string(),
            experiment_id,
        })
    }

    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new run and return its id.
    pub fn start_run(&self) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        self.conn.lock().execute(
            "INSERT INTO runs (run_id, experiment_id, status, start_time) VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                self.experiment_id,
                RunStatus::Running.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        debug!(run_id = %run_id, experiment = %self.experiment, "run started");
        Ok(run_id)
    }

    /// Record parameters; a repeated key overwrites the earlier value.
    pub fn log_params<I, K, V>(&self, run_id: &str, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_run(&tx, run_id)?;
        for (key, value) in params {
            tx.execute(
                "INSERT OR REPLACE INTO params (run_id, key, value) VALUES (?1, ?2, ?3)",
                params![run_id, key.as_ref(), value.as_ref()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Record metrics; a repeated key overwrites the earlier value.
    ///
    /// Non-finite values (NaN, infinities) are not stored; the run keeps
    /// its other metrics.
    pub fn log_metrics<'a, I>(&self, run_id: &str, metrics: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_run(&tx, run_id)?;
        for (key, value) in metrics {
            if !value.is_finite() {
                warn!(run_id, metric = key, value, "skipping non-finite metric");
                continue;
            }
            tx.execute(
                "INSERT OR REPLACE INTO metrics (run_id, key, value) VALUES (?1, ?2, ?3)",
                params![run_id, key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Mark a run finished or failed.
    pub fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let changed = self.conn.lock().execute(
            "UPDATE runs SET status = ?2, end_time = ?3 WHERE run_id = ?1",
            params![run_id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(LearningError::RunNotFound(run_id.to_string()));
        }
        debug!(run_id, status = %status, "run finished");
        Ok(())
    }

    /// Load a run with its params and metrics.
    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        let conn = self.conn.lock();
        let head = conn
            .query_row(
                "SELECT e.name, r.status, r.start_time, r.end_time
                 FROM runs r JOIN experiments e ON e.experiment_id = r.experiment_id
                 WHERE r.run_id = ?1",
                params![run_id],
                |row| {
                    let end_time = match row.get::<_, Option<String>>(3)? {
                        Some(_) => Some(timestamp_column(row, 3)?),
                        None => None,
                    };
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        timestamp_column(row, 2)?,
                        end_time,
                    ))
                },
            )
            .optional()?;
        let Some((experiment, status, start_time, end_time)) = head else {
            return Err(LearningError::RunNotFound(run_id.to_string()));
        };

        let params = conn
            .prepare("SELECT key, value FROM params WHERE run_id = ?1")?
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;
        let metrics = conn
            .prepare("SELECT key, value FROM metrics WHERE run_id = ?1")?
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, f64>>>()?;

        Ok(RunRecord {
            run_id: run_id.to_string(),
            experiment,
            status: RunStatus::parse(&status).unwrap_or(RunStatus::Failed),
            start_time,
            end_time,
            params,
            metrics,
        })
    }

    /// Run ids of this experiment, oldest first.
    pub fn list_run_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let ids = conn
            .prepare("SELECT run_id FROM runs WHERE experiment_id = ?1 ORDER BY start_time, rowid")?
            .query_map(params![self.experiment_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

fn ensure_run(conn: &Connection, run_id: &str) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM runs WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .optional()?;
    exists
        .map(|_| ())
        .ok_or_else(|| LearningError::RunNotFound(run_id.to_string()))
}

static_assertions::assert_impl_all!(ExperimentTracker: Send, Sync);
