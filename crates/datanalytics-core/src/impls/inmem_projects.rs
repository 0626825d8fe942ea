//! In-memory project store, optionally loaded from / saved to a JSON file.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Project, ProjectRef, ProjectUpdate};
use crate::ports::{ProjectStore, StoreError};

/// Projects keyed by owner + name.
///
/// The file format is a JSON array of [`Project`] objects.
#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<ProjectRef, Project>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let map = projects
            .into_iter()
            .map(|p| (p.reference(), p))
            .collect();
        Self {
            projects: RwLock::new(map),
        }
    }

    pub async fn insert(&self, project: Project) {
        self.projects.write().await.insert(project.reference(), project);
    }

    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        let projects: Vec<Project> = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Backend(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), count = projects.len(), "projects loaded");
        Ok(Self::with_projects(projects))
    }

    /// Write all projects back, sorted by owner then name.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| (&a.owner, &a.name).cmp(&(&b.owner, &b.name)));

        let bytes = serde_json::to_vec_pretty(&projects)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn find(&self, project: &ProjectRef) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.read().await.get(project).cloned())
    }

    async fn update(&self, project: &ProjectRef, update: ProjectUpdate) -> Result<(), StoreError> {
        let mut projects = self.projects.write().await;
        let entry = projects
            .get_mut(project)
            .ok_or_else(|| StoreError::NotFound(project.clone()))?;
        entry.apply(update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn update_unknown_project_is_not_found() {
        let store = InMemoryProjectStore::new();
        let err = store
            .update(
                &ProjectRef::new("alice", "proj1"),
                ProjectUpdate::Report("/r.html".into()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_then_load_keeps_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.json");

        let store = InMemoryProjectStore::with_projects([
            Project::new("bob", "p").with_dataset("/data/b.csv"),
            Project::new("alice", "proj1"),
        ]);
        let alice = ProjectRef::new("alice", "proj1");
        store
            .update(&alice, ProjectUpdate::PrepOutput("/out/alice_proj1".into()))
            .await
            .unwrap();
        store.save(&path).await.unwrap();

        let reloaded = InMemoryProjectStore::load(&path).await.unwrap();
        let project = reloaded.find(&alice).await.unwrap().unwrap();
        assert_eq!(project.prep_output, Some(PathBuf::from("/out/alice_proj1")));
        assert!(reloaded.find(&ProjectRef::new("carol", "x")).await.unwrap().is_none());
    }
}
