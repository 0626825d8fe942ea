//! ProjectStore port - lookup and field updates on project records.

use async_trait::async_trait;

use crate::domain::{Project, ProjectRef, ProjectUpdate};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("project not found: {0}")]
    NotFound(ProjectRef),

    #[error("project store backend error: {0}")]
    Backend(String),

    #[error("project store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// `Ok(None)` when no project matches owner + name.
    async fn find(&self, project: &ProjectRef) -> Result<Option<Project>, StoreError>;

    async fn update(&self, project: &ProjectRef, update: ProjectUpdate) -> Result<(), StoreError>;
}
