//! The workspace service: one object per storage root that runs every
//! user-facing operation.
//!
//! ```text
//! upload ──► validate ──► store raw data + EDA ──► index ──► session
//!                                                                │
//! train / train_best ◄───────────────────────────────────────────┘
//!     │
//!     ├──► tracking run + registry version (Model_<id>)
//!     └──► results.json + index score
//!
//! promote ──► registry stage          predict ──► production version only
//! ```
//!
//! Sessions are rebuilt from the stored raw data when a project is touched
//! for the first time in this process, so a fresh CLI invocation can train
//! on a project uploaded by an earlier one.

use crate::error::{AppError, Result};
use crate::session::{Session, SessionStore};
use crate::settings::Settings;
use oneclick_data::{
    Dataset, EDA_FILE, EdaReport, ProjectId, ProjectIndex, ProjectMetadata, ProjectStore,
    ProjectSummary, RAW_DATA_FILE, RESULTS_FILE, TaskType, ValidationReport, validation,
};
use oneclick_learning::{
    ModelKind, ModelScore, ModelSuggestion, ModelVersion, Predictor, Trainer, TrainingResult,
    catalog,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// Responses
// ============================================================================

/// What a successful upload returns.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub project: ProjectSummary,
    pub eda: EdaReport,
    pub suggestions: Vec<ModelSuggestion>,
    /// Whether the target and task were given or guessed.
    pub inferred_target: bool,
    pub inferred_task: bool,
}

/// Everything stored for one project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    pub eda: Option<EdaReport>,
    pub results: Option<ProjectResults>,
}

/// Contents of `results.json`: every training run of the project, oldest
/// first, plus the leaderboard of the latest best-of sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectResults {
    pub runs: Vec<TrainingResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<ModelScore>>,
}

impl ProjectResults {
    pub fn latest(&self) -> Option<&TrainingResult> {
        self.runs.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub project_id: ProjectId,
    /// `false` when there was nothing left to delete.
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionsOutcome {
    pub project_id: ProjectId,
    pub task_type: TaskType,
    pub models: Vec<ModelSuggestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub project_id: ProjectId,
    #[serde(flatten)]
    pub result: TrainingResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainBestOutcome {
    pub project_id: ProjectId,
    pub best: TrainingResult,
    pub leaderboard: Vec<ModelScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    pub model_id: ModelKind,
    pub model_name: String,
    pub version: u32,
    pub prediction: Value,
}

// ============================================================================
// Workspace
// ============================================================================

#[derive(Debug)]
pub struct Workspace {
    settings: Settings,
    store: ProjectStore,
    index: ProjectIndex,
    trainer: Trainer,
    sessions: SessionStore,
}

static_assertions::assert_impl_all!(Workspace: Send, Sync);

impl Workspace {
    /// Open (creating if needed) the storage and tracking directories.
    pub fn open(settings: Settings) -> Result<Self> {
        let store = ProjectStore::new(settings.storage_dir())?;
        let index = ProjectIndex::open_in(&store)?;
        let trainer = Trainer::open(settings.tracking_dir(), settings.trainer_config()?)?;
        info!(
            storage = %settings.storage_dir().display(),
            tracking = %settings.tracking_dir().display(),
            "workspace opened"
        );
        Ok(Self {
            settings,
            store,
            index,
            trainer,
            sessions: SessionStore::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn trainer(&self) -> &Trainer {
        &self.trainer
    }

    /// Validate a CSV and turn it into a project.
    ///
    /// A missing `target` is guessed with [`validation::infer_target`] and a
    /// missing `task` with [`validation::infer_task`]. Every validation
    /// failure is reported at once; nothing is stored unless all pass.
    pub fn upload(
        &self,
        path: &Path,
        task: Option<TaskType>,
        target: Option<&str>,
    ) -> Result<UploadOutcome> {
        let dataset = Dataset::from_csv_path(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let inferred_target = target.is_none();
        let target = match target {
            Some(target) => target.to_string(),
            None => validation::infer_target(&dataset).ok_or_else(|| {
                AppError::Validation(no_target_errors(validation::validate_dataset(&dataset)))
            })?,
        };

        let inferred_task = task.is_none();
        let task = match task {
            Some(task) => task,
            None => match dataset.series(&target) {
                Ok(series) if dataset.height() > 0 => validation::infer_task(series)?,
                _ => TaskType::Classification,
            },
        };

        let report = validation::validate_upload(&dataset, &target, task)?;
        if !report.is_valid {
            info!(file = %filename, errors = report.errors.len(), "upload rejected");
            return Err(AppError::Validation(report.errors));
        }

        let project_id = self.store.create_project()?;
        let stored = self.store_upload(&project_id, &dataset, &filename, &target, task);
        let (project, eda) = match stored {
            Ok(stored) => stored,
            Err(e) => {
                if let Err(cleanup) = self.store.delete_project(&project_id) {
                    warn!(project_id = %project_id, error = %cleanup, "failed to remove partial project");
                }
                return Err(e);
            }
        };

        self.sessions
            .insert(Session::new(project_id.clone(), dataset, target, task));
        info!(project_id = %project_id, task = %task, "project created");

        Ok(UploadOutcome {
            project,
            eda,
            suggestions: catalog::suggest(task),
            inferred_target,
            inferred_task,
        })
    }

    fn store_upload(
        &self,
        id: &ProjectId,
        dataset: &Dataset,
        filename: &str,
        target: &str,
        task: TaskType,
    ) -> Result<(ProjectSummary, EdaReport)> {
        let mut frame = dataset.frame().clone();
        self.store.save_dataset(id, &mut frame, RAW_DATA_FILE)?;

        let eda = EdaReport::generate(dataset, target)?;
        self.store.save_json(id, &eda, EDA_FILE)?;

        let metadata = ProjectMetadata {
            filename: filename.to_string(),
            target: target.to_string(),
            task_type: task,
            rows: dataset.height(),
            columns: dataset.width(),
            last_score: None,
            last_model: None,
        };
        let summary = self.index.add_or_update(id, &metadata)?;
        Ok((summary, eda))
    }

    /// Project summaries, most recently touched first.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        Ok(self.index.list_all(&self.store)?)
    }

    pub fn get_project(&self, project_id: &str) -> Result<ProjectDetails> {
        let id = ProjectId::parse(project_id)?;
        let summary = self.summary(&id)?;
        Ok(ProjectDetails {
            summary,
            eda: self.store.load_json(&id, EDA_FILE)?,
            results: self.store.load_json(&id, RESULTS_FILE)?,
        })
    }

    /// Remove a project's files, index entry and session.
    ///
    /// Deleting a project that does not exist succeeds with `deleted: false`.
    pub fn delete_project(&self, project_id: &str) -> Result<DeleteOutcome> {
        let id = ProjectId::parse(project_id)?;
        let removed_files = self.store.delete_project(&id)?;
        let removed_entry = self.index.remove(&id)?;
        let removed_session = self.sessions.remove(&id);
        debug!(
            project_id = %id,
            removed_files,
            removed_entry,
            removed_session,
            "delete project"
        );
        Ok(DeleteOutcome {
            project_id: id,
            deleted: removed_files || removed_entry,
        })
    }

    /// The project's EDA report, regenerated and stored again if the file
    /// is gone.
    pub fn eda(&self, project_id: &str) -> Result<EdaReport> {
        let id = ProjectId::parse(project_id)?;
        if let Some(eda) = self.store.load_json(&id, EDA_FILE)? {
            return Ok(eda);
        }
        let session = self.session(&id)?;
        let eda = EdaReport::generate(&session.dataset, &session.target)?;
        self.store.save_json(&id, &eda, EDA_FILE)?;
        Ok(eda)
    }

    pub fn suggestions(&self, project_id: &str) -> Result<SuggestionsOutcome> {
        let id = ProjectId::parse(project_id)?;
        let task = self.summary(&id)?.metadata.task_type;
        Ok(SuggestionsOutcome {
            project_id: id,
            task_type: task,
            models: catalog::suggest(task),
        })
    }

    /// Train one catalog model on the project's data.
    pub fn train(&self, project_id: &str, model_id: &str) -> Result<TrainOutcome> {
        let id = ProjectId::parse(project_id)?;
        let session = self.session(&id)?;
        let result = self.trainer.train(
            session.dataset.frame(),
            &session.target,
            session.task,
            model_id,
        )?;

        self.record_results(&session, |results| results.runs.push(result.clone()))?;
        self.touch_index(&session, &result)?;
        Ok(TrainOutcome {
            project_id: id,
            result,
        })
    }

    /// Train every candidate for the project's task and keep the best.
    pub fn train_best(&self, project_id: &str) -> Result<TrainBestOutcome> {
        let id = ProjectId::parse(project_id)?;
        let session = self.session(&id)?;
        let outcome = self
            .trainer
            .train_best(session.dataset.frame(), &session.target, session.task)?;

        self.record_results(&session, |results| {
            results.runs.push(outcome.best.clone());
            results.leaderboard = Some(outcome.leaderboard.clone());
        })?;
        self.touch_index(&session, &outcome.best)?;
        Ok(TrainBestOutcome {
            project_id: id,
            best: outcome.best,
            leaderboard: outcome.leaderboard,
        })
    }

    /// Move `version` of `Model_<model_id>` to production, archiving the
    /// version it replaces.
    pub fn promote(&self, model_id: &str, version: u32) -> Result<ModelVersion> {
        let kind: ModelKind = model_id.parse()?;
        let promoted = self
            .trainer
            .registry()
            .promote(&kind.registry_name(), version)?;
        Ok(promoted)
    }

    /// Every registered version of `Model_<model_id>`, oldest first.
    pub fn versions(&self, model_id: &str) -> Result<Vec<ModelVersion>> {
        let kind: ModelKind = model_id.parse()?;
        Ok(self.trainer.registry().list_versions(&kind.registry_name())?)
    }

    /// Predict one record with the production version of `model_id`.
    pub fn predict(&self, model_id: &str, record: &Map<String, Value>) -> Result<PredictionOutcome> {
        let predictor = Predictor::for_model(self.trainer.registry(), model_id)?;
        let prediction = predictor.predict_record(record)?;
        let version = predictor.version();
        Ok(PredictionOutcome {
            model_id: predictor.model().model_id(),
            model_name: version.name.clone(),
            version: version.version,
            prediction,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn summary(&self, id: &ProjectId) -> Result<ProjectSummary> {
        match self.index.get(id)? {
            Some(summary) if self.store.project_exists(id) => Ok(summary),
            _ => Err(AppError::NotFound(format!("Project '{id}' not found"))),
        }
    }

    /// The live session for `id`, rebuilt from stored data when absent.
    fn session(&self, id: &ProjectId) -> Result<Session> {
        if let Some(session) = self.sessions.get(id) {
            return Ok(session);
        }
        let summary = self.summary(id)?;
        let dataset = self
            .store
            .load_dataset(id, RAW_DATA_FILE)?
            .ok_or_else(|| AppError::NotFound(format!("Project '{id}' has no stored data")))?;

        debug!(project_id = %id, "session restored from storage");
        let session = Session::new(
            id.clone(),
            dataset,
            summary.metadata.target,
            summary.metadata.task_type,
        );
        self.sessions.insert(session.clone());
        Ok(session)
    }

    fn record_results(&self, session: &Session, update: impl FnOnce(&mut ProjectResults)) -> Result<()> {
        let mut results: ProjectResults = self
            .store
            .load_json(&session.project_id, RESULTS_FILE)?
            .unwrap_or_default();
        update(&mut results);
        self.store
            .save_json(&session.project_id, &results, RESULTS_FILE)?;
        Ok(())
    }

    fn touch_index(&self, session: &Session, result: &TrainingResult) -> Result<()> {
        let mut metadata = self.summary(&session.project_id)?.metadata;
        metadata.last_score = result.metrics.primary(session.task);
        metadata.last_model = Some(result.model_id.id().to_string());
        self.index.add_or_update(&session.project_id, &metadata)?;
        Ok(())
    }
}

fn no_target_errors(mut report: ValidationReport) -> Vec<String> {
    report.push_error("No target column given and none could be inferred");
    report.errors
}
