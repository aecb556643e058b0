//! Per-project directories and the artifacts inside them.

use crate::dataset::{Dataset, write_csv};
use crate::error::{DataError, Result, ResultExt};
use polars::prelude::DataFrame;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Uploaded dataset snapshot.
pub const RAW_DATA_FILE: &str = "raw_data.csv";
/// EDA chart-data bundle.
pub const EDA_FILE: &str = "eda.json";
/// Most recent training result.
pub const RESULTS_FILE: &str = "results.json";

const PROJECTS_DIR: &str = "projects";
const ID_PREFIX: &str = "proj_";
const ID_HEX_LEN: usize = 8;

// =============================================================================
// Project Id
// =============================================================================

/// Project identifier: `proj_` followed by 8 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// A fresh random identifier.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", ID_PREFIX, &hex[..ID_HEX_LEN]))
    }

    /// Validate an identifier coming from outside.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidProjectId`] unless the id is `proj_` plus
    /// exactly 8 lowercase hex digits.
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw
            .strip_prefix(ID_PREFIX)
            .is_some_and(|hex| {
                hex.len() == ID_HEX_LEN
                    && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            });
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(DataError::InvalidProjectId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Project Store
// =============================================================================

/// Filesystem storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    /// Open (creating if needed) the storage root.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(PROJECTS_DIR))
            .context(format!("Creating storage root {}", root.display()))?;
        Ok(Self { root })
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a project, whether or not it exists.
    pub fn project_path(&self, id: &ProjectId) -> PathBuf {
        self.root.join(PROJECTS_DIR).join(id.as_str())
    }

    /// Whether the project's directory exists.
    pub fn project_exists(&self, id: &ProjectId) -> bool {
        self.project_path(id).is_dir()
    }

    /// Allocate a new identifier and create its empty directory.
    pub fn create_project(&self) -> Result<ProjectId> {
        loop {
            let id = ProjectId::generate();
            let path = self.project_path(&id);
            match fs::create_dir(&path) {
                Ok(()) => {
                    info!(project_id = %id, "created project");
                    return Ok(id);
                }
                // Collision on 32 random bits: draw again.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(DataError::Io(e).with_context("Creating project directory"));
                }
            }
        }
    }

    /// Write a frame as CSV into the project directory.
    pub fn save_dataset(
        &self,
        id: &ProjectId,
        frame: &mut DataFrame,
        filename: &str,
    ) -> Result<PathBuf> {
        let path = self.artifact_path(id, filename)?;
        let tmp = tmp_path(&path);
        write_csv(frame, &tmp)?;
        fs::rename(&tmp, &path).context(format!("Saving {}", path.display()))?;
        debug!(project_id = %id, filename, rows = frame.height(), "saved dataset");
        Ok(path)
    }

    /// Load a CSV artifact. `Ok(None)` when it does not exist.
    pub fn load_dataset(&self, id: &ProjectId, filename: &str) -> Result<Option<Dataset>> {
        let path = self.artifact_path_unchecked(id, filename)?;
        if !path.is_file() {
            return Ok(None);
        }
        Dataset::from_csv_path(&path).map(Some)
    }

    /// Serialize a value as pretty JSON (4-space indent).
    pub fn save_json<T: Serialize + ?Sized>(
        &self,
        id: &ProjectId,
        value: &T,
        filename: &str,
    ) -> Result<PathBuf> {
        let path = self.artifact_path(id, filename)?;
        let bytes = to_pretty_json(value)?;
        let tmp = tmp_path(&path);
        fs::write(&tmp, &bytes).context(format!("Writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).context(format!("Saving {}", path.display()))?;
        debug!(project_id = %id, filename, bytes = bytes.len(), "saved json");
        Ok(path)
    }

    /// Deserialize a JSON artifact. `Ok(None)` when it does not exist.
    pub fn load_json<T: DeserializeOwned>(&self, id: &ProjectId, filename: &str) -> Result<Option<T>> {
        match self.load_bytes(id, filename)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Raw bytes of an artifact. `Ok(None)` when it does not exist.
    pub fn load_bytes(&self, id: &ProjectId, filename: &str) -> Result<Option<Vec<u8>>> {
        let path = self.artifact_path_unchecked(id, filename)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DataError::Io(e).with_context(format!("Reading {}", path.display()))),
        }
    }

    /// Remove the project directory and everything in it.
    ///
    /// Returns `false` when there was nothing to delete.
    pub fn delete_project(&self, id: &ProjectId) -> Result<bool> {
        let path = self.project_path(id);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(project_id = %id, "deleted project");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DataError::Io(e).with_context(format!("Deleting {}", path.display()))),
        }
    }

    /// Path of an artifact in an existing project.
    fn artifact_path(&self, id: &ProjectId, filename: &str) -> Result<PathBuf> {
        let path = self.artifact_path_unchecked(id, filename)?;
        if !self.project_exists(id) {
            return Err(DataError::ProjectNotFound(id.to_string()));
        }
        Ok(path)
    }

    fn artifact_path_unchecked(&self, id: &ProjectId, filename: &str) -> Result<PathBuf> {
        let plain = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        if !plain {
            return Err(DataError::InvalidArtifactName(filename.to_string()));
        }
        Ok(self.project_path(id).join(filename))
    }
}

/// Pretty JSON with a 4-space indent.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, ProjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_project_id_format() {
        let id = ProjectId::generate();
        assert!(id.as_str().starts_with("proj_"));
        assert_eq!(id.as_str().len(), 13);
        assert_eq!(ProjectId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_project_id_rejects_traversal() {
        assert!(ProjectId::parse("../../etc").is_err());
        assert!(ProjectId::parse("proj_1234567").is_err());
        assert!(ProjectId::parse("proj_ABCDEF12").is_err());
        assert!(ProjectId::parse("proj_abcdef12").is_ok());
    }

    #[test]
    fn test_create_project_makes_empty_dir() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        let path = store.project_path(&id);
        assert!(path.is_dir());
        assert_eq!(fs::read_dir(path).unwrap().count(), 0);
    }

    #[test]
    fn test_dataset_round_trip() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        let mut frame = df!(
            "age" => [Some(31i64), None, Some(58)],
            "income" => [52000.5, 61000.25, 0.1],
            "city" => ["Oslo", "Rome, IT", "Lima"],
            "label" => [0i64, 1, 0],
        )
        .unwrap();

        store.save_dataset(&id, &mut frame, RAW_DATA_FILE).unwrap();
        let loaded = store.load_dataset(&id, RAW_DATA_FILE).unwrap().unwrap();

        assert!(loaded.frame().equals_missing(&frame));
        assert_eq!(loaded.column_names(), &["age", "income", "city", "label"]);
    }

    #[test]
    fn test_json_round_trip_is_byte_identical() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        let value = json!({"metrics": {"accuracy": 0.95, "f1": 0.9}, "model_id": "logistic_regression"});

        let path = store.save_json(&id, &value, RESULTS_FILE).unwrap();
        let written = fs::read(path).unwrap();
        let loaded: serde_json::Value = store.load_json(&id, RESULTS_FILE).unwrap().unwrap();

        assert_eq!(loaded, value);
        assert_eq!(to_pretty_json(&loaded).unwrap(), written);
        assert_eq!(store.load_bytes(&id, RESULTS_FILE).unwrap().unwrap(), written);
    }

    #[test]
    fn test_json_uses_four_space_indent() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        store.save_json(&id, &json!({"a": 1}), EDA_FILE).unwrap();
        let text = String::from_utf8(store.load_bytes(&id, EDA_FILE).unwrap().unwrap()).unwrap();
        assert_eq!(text, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn test_missing_artifacts_are_none() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        assert!(store.load_json::<serde_json::Value>(&id, EDA_FILE).unwrap().is_none());
        assert!(store.load_dataset(&id, RAW_DATA_FILE).unwrap().is_none());

        let ghost = ProjectId::parse("proj_00000000").unwrap();
        assert!(store.load_bytes(&ghost, RESULTS_FILE).unwrap().is_none());
    }

    #[test]
    fn test_save_into_missing_project_fails() {
        let (_dir, store) = store();
        let ghost = ProjectId::parse("proj_00000000").unwrap();
        let err = store.save_json(&ghost, &json!({}), EDA_FILE).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_artifact_name_cannot_escape() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        let err = store.save_json(&id, &json!({}), "../index.db").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARTIFACT_NAME");
    }

    #[test]
    fn test_delete_project_is_idempotent() {
        let (_dir, store) = store();
        let id = store.create_project().unwrap();
        store.save_json(&id, &json!({"a": 1}), EDA_FILE).unwrap();

        assert!(store.delete_project(&id).unwrap());
        assert!(!store.project_exists(&id));
        assert!(!store.delete_project(&id).unwrap());
    }
}
