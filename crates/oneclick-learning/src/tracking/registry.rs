use super::{ARTIFACTS_DIR, MODEL_ARTIFACT, open_database, timestamp_column};
use crate::error::{LearningError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Deployment stage of a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Registered but never promoted.
    None,
    Production,
    /// Formerly in production.
    Archived,
}

impl Stage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::None => "None",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "None" => Ok(Stage::None),
            "Production" => Ok(Stage::Production),
            "Archived" => Ok(Stage::Archived),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// One registered version of a named model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    /// Starts at 1 and increases by one per registration.
    pub version: u32,
    pub run_id: String,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    /// Artifact path relative to the tracking directory.
    pub artifact: PathBuf,
}

impl ModelVersion {
    /// `models:/<name>/<version>`.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("models:/{}/{}", self.name, self.version)
    }
}

/// Versioned store of model artifacts with a single production version per
/// name.
pub struct ModelRegistry {
    conn: Mutex<Connection>,
    root: PathBuf,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

const VERSION_COLUMNS: &str = "name, version, run_id, stage, artifact, created_at";

impl ModelRegistry {
    /// Open the registry stored under the tracking directory `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let conn = open_database(&root)?;
        Ok(Self {
            conn: Mutex::new(conn),
            root,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `artifact` for `run_id` and register it as the next version of
    /// `name`, in stage [`Stage::None`].
    pub fn register(&self, name: &str, run_id: &str, artifact: &[u8]) -> Result<ModelVersion> {
        let relative = Path::new(ARTIFACTS_DIR).join(run_id).join(MODEL_ARTIFACT);
        let absolute = self.root.join(&relative);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = absolute.with_extension("json.tmp");
        fs::write(&tmp, artifact)?;
        fs::rename(&tmp, &absolute)?;

        let created_at = Utc::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let version: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM model_versions WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO model_versions (name, version, run_id, stage, artifact, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                version,
                run_id,
                Stage::None.as_str(),
                relative.to_string_lossy().into_owned(),
                created_at.to_rfc3339()
            ],
        )?;
        tx.commit()?;

        info!(model = name, version, run_id, "registered model version");
        Ok(ModelVersion {
            name: name.to_string(),
            version,
            run_id: run_id.to_string(),
            stage: Stage::None,
            created_at,
            artifact: relative,
        })
    }

    /// Move `version` of `name` to production. The previous production
    /// version, if any, is archived in the same transaction.
    pub fn promote(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let target = fetch_version(&tx, name, version)?.ok_or_else(|| {
            LearningError::ModelNotFound {
                name: name.to_string(),
                version,
            }
        })?;

        let archived = tx.execute(
            "UPDATE model_versions SET stage = ?3
             WHERE name = ?1 AND stage = ?2 AND version != ?4",
            params![
                name,
                Stage::Production.as_str(),
                Stage::Archived.as_str(),
                version
            ],
        )?;
        tx.execute(
            "UPDATE model_versions SET stage = ?3 WHERE name = ?1 AND version = ?2",
            params![name, version, Stage::Production.as_str()],
        )?;
        tx.commit()?;

        info!(model = name, version, archived, "promoted model version to production");
        Ok(ModelVersion {
            stage: Stage::Production,
            ..target
        })
    }

    /// The production version of `name`, if one has been promoted.
    pub fn production_version(&self, name: &str) -> Result<Option<ModelVersion>> {
        let conn = self.conn.lock();
        let version = conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM model_versions
                     WHERE name = ?1 AND stage = ?2 ORDER BY version DESC LIMIT 1"
                ),
                params![name, Stage::Production.as_str()],
                version_from_row,
            )
            .optional()?;
        Ok(version)
    }

    /// The highest registered version of `name`.
    pub fn latest_version(&self, name: &str) -> Result<Option<ModelVersion>> {
        let conn = self.conn.lock();
        let version = conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM model_versions
                     WHERE name = ?1 ORDER BY version DESC LIMIT 1"
                ),
                params![name],
                version_from_row,
            )
            .optional()?;
        Ok(version)
    }

    /// One specific version.
    pub fn get_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let conn = self.conn.lock();
        fetch_version(&conn, name, version)?.ok_or_else(|| LearningError::ModelNotFound {
            name: name.to_string(),
            version,
        })
    }

    /// Every version of `name`, oldest first.
    pub fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let conn = self.conn.lock();
        let versions = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 ORDER BY version"
            ))?
            .query_map(params![name], version_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    /// Read the stored artifact of `version`.
    pub fn load_artifact(&self, version: &ModelVersion) -> Result<Vec<u8>> {
        let path = self.root.join(&version.artifact);
        debug!(path = %path.display(), "loading model artifact");
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LearningError::ModelNotFound {
                    name: version.name.clone(),
                    version: version.version,
                }
            } else {
                e.into()
            }
        })
    }
}

fn fetch_version(conn: &Connection, name: &str, version: u32) -> Result<Option<ModelVersion>> {
    let found = conn
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 AND version = ?2"),
            params![name, version],
            version_from_row,
        )
        .optional()?;
    Ok(found)
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ModelVersion> {
    let stage: String = row.get(3)?;
    let stage = stage.parse::<Stage>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
    })?;
    Ok(ModelVersion {
        name: row.get(0)?,
        version: row.get(1)?,
        run_id: row.get(2)?,
        stage,
        artifact: PathBuf::from(row.get::<_, String>(4)?),
        created_at: timestamp_column(row, 5)?,
    })
}

static_assertions::assert_impl_all!(ModelRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> (tempfile::TempDir, ModelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::open(dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_register_increments_versions() {
        let (_dir, registry) = registry();

        let v1 = registry.register("Model_a", "run1", b"{}").unwrap();
        let v2 = registry.register("Model_a", "run2", b"{}").unwrap();
        let other = registry.register("Model_b", "run3", b"{}").unwrap();

        assert_eq!((v1.version, v2.version, other.version), (1, 2, 1));
        assert_eq!(v2.stage, Stage::None);
        assert_eq!(v2.uri(), "models:/Model_a/2");
        assert_eq!(registry.latest_version("Model_a").unwrap().unwrap().version, 2);
        assert_eq!(registry.list_versions("Model_a").unwrap().len(), 2);
    }

    #[test]
    fn test_promote_archives_previous_production() {
        let (_dir, registry) = registry();
        registry.register("Model_a", "run1", b"one").unwrap();
        registry.register("Model_a", "run2", b"two").unwrap();

        registry.promote("Model_a", 1).unwrap();
        assert_eq!(
            registry.production_version("Model_a").unwrap().unwrap().version,
            1
        );

        let promoted = registry.promote("Model_a", 2).unwrap();
        assert_eq!(promoted.stage, Stage::Production);

        let stages: Vec<(u32, Stage)> = registry
            .list_versions("Model_a")
            .unwrap()
            .into_iter()
            .map(|v| (v.version, v.stage))
            .collect();
        assert_eq!(stages, vec![(1, Stage::Archived), (2, Stage::Production)]);
    }

    #[test]
    fn test_promote_same_version_twice_keeps_it_in_production() {
        let (_dir, registry) = registry();
        registry.register("Model_a", "run1", b"one").unwrap();
        registry.promote("Model_a", 1).unwrap();
        registry.promote("Model_a", 1).unwrap();
        assert_eq!(
            registry.production_version("Model_a").unwrap().unwrap().stage,
            Stage::Production
        );
    }

    #[test]
    fn test_promote_unknown_version() {
        let (_dir, registry) = registry();
        registry.register("Model_a", "run1", b"one").unwrap();
        let err = registry.promote("Model_a", 7).unwrap_err();
        assert!(matches!(err, LearningError::ModelNotFound { version: 7, .. }));
    }

    #[test]
    fn test_no_production_version_before_promotion() {
        let (_dir, registry) = registry();
        registry.register("Model_a", "run1", b"one").unwrap();
        assert!(registry.production_version("Model_a").unwrap().is_none());
        assert!(registry.production_version("Model_missing").unwrap().is_none());
    }

    #[test]
    fn test_artifact_roundtrip() {
        let (dir, registry) = registry();
        let version = registry.register("Model_a", "run1", b"payload").unwrap();

        assert_eq!(registry.load_artifact(&version).unwrap(), b"payload");
        assert!(dir.path().join("artifacts/run1/model.json").exists());

        let reopened = ModelRegistry::open(dir.path()).unwrap();
        let fetched = reopened.get_version("Model_a", 1).unwrap();
        assert_eq!(fetched, version);
    }
}
