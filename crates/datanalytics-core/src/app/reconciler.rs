//! Status reconciler: projects a handle's backend state and stored result
//! into the client-facing [`StatusDocument`].
//!
//! Nothing queue-specific leaks through: decoding problems, odd states and
//! backend errors all come out as documents.

use std::path::PathBuf;
use std::sync::Arc;

use super::sessions::{SessionKind, SessionResolver};
use crate::config::ArtifactCheck;
use crate::domain::{JobDetail, ResultRecord, StatusDocument, TaskHandle};
use crate::queue::{ResultBackend, TaskSnapshot};

pub const INVALID_RESULT_FORMAT: &str = "Invalid task result format";
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";
pub const INVALID_TASK_ID: &str = "Invalid task id";

pub struct StatusReconciler {
    backend: Arc<dyn ResultBackend>,
    sessions: SessionResolver,
    artifact_check: ArtifactCheck,
}

impl StatusReconciler {
    pub fn new(
        backend: Arc<dyn ResultBackend>,
        sessions: SessionResolver,
        artifact_check: ArtifactCheck,
    ) -> Self {
        Self {
            backend,
            sessions,
            artifact_check,
        }
    }

    pub async fn reconcile(&self, handle: &TaskHandle) -> StatusDocument {
        let task_id = handle.to_string();
        match self.backend.fetch(handle).await {
            Ok(snapshot) => self.project(task_id, snapshot).await,
            Err(e) => {
                tracing::error!(handle = %handle, error = %e, "failed to query task status");
                StatusDocument::error(task_id, e.to_string(), "QueueError")
            }
        }
    }

    /// Like [`reconcile`](Self::reconcile) for a raw id from a client.
    pub async fn reconcile_task_id(&self, task_id: &str) -> StatusDocument {
        match task_id.parse::<TaskHandle>() {
            Ok(handle) => self.reconcile(&handle).await,
            Err(_) => {
                tracing::warn!(task_id, "unparseable task id");
                StatusDocument::failure(task_id, INVALID_TASK_ID)
            }
        }
    }

    async fn project(&self, task_id: String, snapshot: TaskSnapshot) -> StatusDocument {
        let state = snapshot.state.to_lowercase();
        tracing::debug!(task_id = %task_id, state = %state, "reconciling");

        match state.as_str() {
            "pending" | "started" | "retry" => {
                StatusDocument::running(task_id, format!("Task is currently in {state} state"))
            }
            "success" | "failure" | "done" => {
                let record = match decode(snapshot.result) {
                    Some(record) => record,
                    None => return StatusDocument::failure(task_id, INVALID_RESULT_FORMAT),
                };
                if state == "failure" || !record.is_success() {
                    // The record's own error, or the generic fallback.
                    return StatusDocument::failed_record(task_id, record);
                }
                self.finished(task_id, record).await
            }
            other => {
                tracing::warn!(task_id = %task_id, state = other, "unexpected task state");
                StatusDocument::failure(task_id, format!("Unexpected task state: {other}"))
            }
        }
    }

    async fn finished(&self, task_id: String, record: ResultRecord) -> StatusDocument {
        let output_path = self.artifact_path(&record).await;

        if let Some(path) = &output_path {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                tracing::warn!(task_id = %task_id, path = %path.display(), "output path does not exist");
                if self.artifact_check == ArtifactCheck::Strict {
                    return StatusDocument::running(
                        task_id,
                        format!("artifact not yet visible: {}", path.display()),
                    );
                }
            }
        }
        StatusDocument::done(task_id, record, output_path)
    }

    /// Train/eval output is re-resolved: the newest EVAL session only exists
    /// after the job has finished writing.
    async fn artifact_path(&self, record: &ResultRecord) -> Option<PathBuf> {
        match &record.detail {
            JobDetail::TrainAndEval { .. } => {
                let session = self.sessions.latest(SessionKind::Eval, &record.project_name).await;
                Some(crate::executors::absolute(self.sessions.session_path(&session)))
            }
            JobDetail::Prep { output_path, .. } => output_path.clone(),
            JobDetail::Report { report_path } => report_path.clone(),
        }
    }
}

fn decode(result: Option<serde_json::Value>) -> Option<ResultRecord> {
    let value = result?;
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::error!(error = %e, "invalid result format");
            None
        }
    }
}
