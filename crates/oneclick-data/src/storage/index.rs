//! Most-recent-first project index on an embedded SQLite database.
//!
//! Each upsert runs in a transaction and bumps a monotonically increasing
//! `touched` counter, so ordering never depends on clock resolution and
//! two writers cannot lose each other's entries.

use super::project_store::{ProjectId, ProjectStore};
use crate::error::{Result, ResultExt};
use crate::types::TaskType;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default file name of the index database under the storage root.
pub const INDEX_FILE: &str = "index.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        project_id TEXT PRIMARY KEY,
        touched    INTEGER NOT NULL,
        timestamp  TEXT NOT NULL,
        metadata   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS projects_touched ON projects (touched DESC);
";

/// What the index records about a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Name of the uploaded file.
    pub filename: String,
    pub target: String,
    pub task_type: TaskType,
    pub rows: usize,
    pub columns: usize,
    /// Primary metric of the most recent training run.
    #[serde(default)]
    pub last_score: Option<f64>,
    /// Model id of the most recent training run.
    #[serde(default)]
    pub last_model: Option<String>,
}

/// One index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: ProjectMetadata,
}

/// Transactional project index.
pub struct ProjectIndex {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for ProjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ProjectIndex {
    /// Open the index at `path`, creating it if missing.
    ///
    /// A file that is not a readable SQLite database is moved aside to
    /// `<path>.corrupt` and replaced by an empty index. The same happens if
    /// the file turns unreadable later, on the next read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = match open_connection(&path) {
            Ok(conn) => conn,
            Err(e) if is_corruption(&e) => {
                move_aside(&path, &e)?;
                open_connection(&path)?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open the index under a store's root.
    pub fn open_in(store: &ProjectStore) -> Result<Self> {
        Self::open(store.root().join(INDEX_FILE))
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the entry for `id`, stamp it now and move it to the front.
    pub fn add_or_update(&self, id: &ProjectId, metadata: &ProjectMetadata) -> Result<ProjectSummary> {
        let timestamp = Utc::now();
        let json = serde_json::to_string(metadata)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let touched: i64 = tx.query_row(
            "SELECT COALESCE(MAX(touched), 0) + 1 FROM projects",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO projects (project_id, touched, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id) DO UPDATE SET
                touched = excluded.touched,
                timestamp = excluded.timestamp,
                metadata = excluded.metadata",
            params![id.as_str(), touched, timestamp.to_rfc3339(), json],
        )?;
        tx.commit()?;

        debug!(project_id = %id, touched, "index entry updated");
        Ok(ProjectSummary {
            project_id: id.clone(),
            timestamp,
            metadata: metadata.clone(),
        })
    }

    /// All entries, most recently touched first.
    ///
    /// Entries whose project directory no longer exists are deleted from the
    /// index in the same transaction and left out of the result.
    pub fn list_all(&self, store: &ProjectStore) -> Result<Vec<ProjectSummary>> {
        let mut conn = self.conn.lock();
        let (survivors, pruned) = match prune_and_list(&mut conn, store) {
            Ok(listed) => listed,
            Err(e) if is_corruption(&e) => {
                self.reset(&mut conn, &e)?;
                (Vec::new(), 0)
            }
            Err(e) => return Err(e.into()),
        };

        if pruned > 0 {
            info!(pruned, "pruned stale index entries");
        }
        Ok(survivors)
    }

    /// Entry for one project, if indexed.
    pub fn get(&self, id: &ProjectId) -> Result<Option<ProjectSummary>> {
        let mut conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT timestamp, metadata FROM projects WHERE project_id = ?1",
                params![id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional();
        let row = match row {
            Ok(row) => row,
            Err(e) if is_corruption(&e) => {
                self.reset(&mut conn, &e)?;
                None
            }
            Err(e) => return Err(e.into()),
        };
        Ok(row.and_then(|(timestamp, metadata)| decode_summary(id.as_str(), &timestamp, &metadata)))
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn remove(&self, id: &ProjectId) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM projects WHERE project_id = ?1",
            params![id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Swap an unreadable database for an empty one.
    fn reset(&self, conn: &mut Connection, error: &rusqlite::Error) -> Result<()> {
        // Release the file before it moves.
        *conn = Connection::open_in_memory()?;
        move_aside(&self.path, error)?;
        *conn = open_connection(&self.path)?;
        Ok(())
    }
}

/// Read every row, deleting the ones whose project directory is gone.
/// Returns the survivors and the number of deleted rows.
fn prune_and_list(
    conn: &mut Connection,
    store: &ProjectStore,
) -> rusqlite::Result<(Vec<ProjectSummary>, usize)> {
    let tx = conn.transaction()?;

    let rows = {
        let mut stmt =
            tx.prepare("SELECT project_id, timestamp, metadata FROM projects ORDER BY touched DESC")?;
        stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut survivors = Vec::with_capacity(rows.len());
    let mut pruned = 0usize;
    for (raw_id, timestamp, metadata) in rows {
        let summary = decode_summary(&raw_id, &timestamp, &metadata);
        let keep = summary
            .as_ref()
            .is_some_and(|s| store.project_exists(&s.project_id));
        if keep {
            survivors.extend(summary);
        } else {
            tx.execute("DELETE FROM projects WHERE project_id = ?1", params![raw_id])?;
            pruned += 1;
        }
    }
    tx.commit()?;
    Ok((survivors, pruned))
}

fn move_aside(path: &Path, error: &rusqlite::Error) -> Result<()> {
    let aside = corrupt_path(path);
    warn!(
        path = %path.display(),
        moved_to = %aside.display(),
        error = %error,
        "project index unreadable, starting empty"
    );
    fs::rename(path, &aside).context("Moving corrupt index aside")?;
    Ok(())
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn is_corruption(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}

/// Undecodable rows are treated as absent.
fn decode_summary(raw_id: &str, timestamp: &str, metadata: &str) -> Option<ProjectSummary> {
    let project_id = ProjectId::parse(raw_id).ok()?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    match serde_json::from_str(metadata) {
        Ok(metadata) => Some(ProjectSummary {
            project_id,
            timestamp,
            metadata,
        }),
        Err(e) => {
            warn!(project_id = raw_id, error = %e, "skipping undecodable index entry");
            None
        }
    }
}

static_assertions::assert_impl_all!(ProjectIndex: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata(filename: &str) -> ProjectMetadata {
        ProjectMetadata {
            filename: filename.to_string(),
            target: "label".to_string(),
            task_type: TaskType::Classification,
            rows: 100,
            columns: 4,
            last_score: None,
            last_model: None,
        }
    }

    fn setup() -> (tempfile::TempDir, ProjectStore, ProjectIndex) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path()).unwrap();
        let index = ProjectIndex::open_in(&store).unwrap();
        (dir, store, index)
    }

    #[test]
    fn test_add_or_update_moves_entry_to_front() {
        let (_dir, store, index) = setup();
        let a = store.create_project().unwrap();
        let b = store.create_project().unwrap();

        index.add_or_update(&a, &metadata("a.csv")).unwrap();
        index.add_or_update(&b, &metadata("b.csv")).unwrap();
        let ids: Vec<_> = index.list_all(&store).unwrap().into_iter().map(|s| s.project_id).collect();
        assert_eq!(ids, vec![b.clone(), a.clone()]);

        let mut updated = metadata("a.csv");
        updated.last_score = Some(0.9);
        index.add_or_update(&a, &updated).unwrap();

        let all = index.list_all(&store).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].project_id, a);
        assert_eq!(all[0].metadata.last_score, Some(0.9));
    }

    #[test]
    fn test_list_all_prunes_missing_directories() {
        let (_dir, store, index) = setup();
        let kept = store.create_project().unwrap();
        let gone = store.create_project().unwrap();
        index.add_or_update(&kept, &metadata("kept.csv")).unwrap();
        index.add_or_update(&gone, &metadata("gone.csv")).unwrap();

        store.delete_project(&gone).unwrap();
        let all = index.list_all(&store).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].project_id, kept);
        assert!(index.get(&gone).unwrap().is_none());
    }

    #[test]
    fn test_missing_index_is_empty() {
        let (_dir, store, index) = setup();
        assert!(index.list_all(&store).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_index_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path()).unwrap();
        let path = dir.path().join(INDEX_FILE);
        fs::write(&path, b"[{\"project_id\": this is not sqlite").unwrap();

        let index = ProjectIndex::open(&path).unwrap();
        assert!(index.list_all(&store).unwrap().is_empty());
        assert!(dir.path().join("index.db.corrupt").exists());

        let id = store.create_project().unwrap();
        index.add_or_update(&id, &metadata("x.csv")).unwrap();
        assert_eq!(index.list_all(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_index_corrupted_while_open_reads_as_empty() {
        let (dir, store, index) = setup();
        let id = store.create_project().unwrap();
        index.add_or_update(&id, &metadata("data.csv")).unwrap();

        fs::write(index.path(), b"this is not an sqlite database at all".repeat(8)).unwrap();

        assert!(index.list_all(&store).unwrap().is_empty());
        assert!(dir.path().join("index.db.corrupt").exists());
        assert!(index.get(&id).unwrap().is_none());

        index.add_or_update(&id, &metadata("data.csv")).unwrap();
        assert_eq!(index.list_all(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_get_recovers_from_corruption() {
        let (dir, store, index) = setup();
        let id = store.create_project().unwrap();
        index.add_or_update(&id, &metadata("data.csv")).unwrap();

        fs::write(index.path(), b"garbage".repeat(64)).unwrap();

        assert!(index.get(&id).unwrap().is_none());
        assert!(dir.path().join("index.db.corrupt").exists());
        assert!(index.list_all(&store).unwrap().is_empty());
    }

    #[test]
    fn test_entries_survive_reopen() {
        let (dir, store, index) = setup();
        let id = store.create_project().unwrap();
        index.add_or_update(&id, &metadata("data.csv")).unwrap();
        drop(index);

        let reopened = ProjectIndex::open(dir.path().join(INDEX_FILE)).unwrap();
        let summary = reopened.get(&id).unwrap().unwrap();
        assert_eq!(summary.metadata, metadata("data.csv"));
    }

    #[test]
    fn test_remove() {
        let (_dir, store, index) = setup();
        let id = store.create_project().unwrap();
        index.add_or_update(&id, &metadata("data.csv")).unwrap();

        assert!(index.remove(&id).unwrap());
        assert!(!index.remove(&id).unwrap());
        assert!(index.list_all(&store).unwrap().is_empty());
    }

    #[test]
    fn test_summary_serializes_flat() {
        let summary = ProjectSummary {
            project_id: ProjectId::parse("proj_0123abcd").unwrap(),
            timestamp: Utc::now(),
            metadata: metadata("data.csv"),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["project_id"], "proj_0123abcd");
        assert_eq!(json["task_type"], "classification");
        assert_eq!(json["filename"], "data.csv");
    }
}
