//! Per-project working sessions.
//!
//! A [`Session`] is the dataset, target and task a project was uploaded
//! with. Sessions are keyed by project id; there is no notion of a
//! "current" project, so concurrent requests against different projects
//! never see each other's data.

use oneclick_data::{Dataset, ProjectId, TaskType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Session {
    pub project_id: ProjectId,
    pub dataset: Arc<Dataset>,
    pub target: String,
    pub task: TaskType,
}

impl Session {
    pub fn new(project_id: ProjectId, dataset: Dataset, target: impl Into<String>, task: TaskType) -> Self {
        Self {
            project_id,
            dataset: Arc::new(dataset),
            target: target.into(),
            task,
        }
    }
}

/// Sessions by project id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ProjectId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for its project.
    pub fn insert(&self, session: Session) {
        self.sessions
            .write()
            .insert(session.project_id.clone(), session);
    }

    pub fn get(&self, id: &ProjectId) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    /// Drop the session for `id`. Returns whether one existed.
    pub fn remove(&self, id: &ProjectId) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.sessions.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

static_assertions::assert_impl_all!(SessionStore: Send, Sync);
