//! Status document: the client-facing projection of a handle's current state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{JobKind, ResultRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Running,
    Done,
    Failure,
    Error,
}

impl PollStatus {
    /// Clients keep polling until this returns true.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub status: PollStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ResultRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<JobKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl StatusDocument {
    fn bare(status: PollStatus, task_id: impl Into<String>) -> Self {
        Self {
            status,
            task_id: Some(task_id.into()),
            message: None,
            output: None,
            output_path: None,
            task_type: None,
            error: None,
            error_type: None,
        }
    }

    pub fn running(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut doc = Self::bare(PollStatus::Running, task_id);
        doc.message = Some(message.into());
        doc
    }

    pub fn done(task_id: impl Into<String>, record: ResultRecord, output_path: Option<PathBuf>) -> Self {
        let mut doc = Self::bare(PollStatus::Done, task_id);
        doc.task_type = Some(record.kind());
        doc.output = Some(record);
        doc.output_path = output_path;
        doc
    }

    pub fn failure(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut doc = Self::bare(PollStatus::Failure, task_id);
        doc.error = Some(error.into());
        doc
    }

    /// Failure carrying the executor's own failure record.
    pub fn failed_record(task_id: impl Into<String>, record: ResultRecord) -> Self {
        let error = record
            .error
            .clone()
            .unwrap_or_else(|| "Unknown error occurred".to_string());
        let mut doc = Self::failure(task_id, error);
        doc.task_type = Some(record.kind());
        doc.output = Some(record);
        doc
    }

    pub fn error(
        task_id: impl Into<String>,
        error: impl Into<String>,
        error_type: impl Into<String>,
    ) -> Self {
        let mut doc = Self::bare(PollStatus::Error, task_id);
        doc.error = Some(error.into());
        doc.error_type = Some(error_type.into());
        doc
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
