//! TaskEnvelope - everything a worker needs to execute one enqueued job.

use serde::{Deserialize, Serialize};

use super::{JobKind, TaskHandle};

/// Kind + JSON payload (+ handle) as carried through the queue.
///
/// `project_name` is duplicated out of the payload so the queue can build a
/// failure record on its own once retries are exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    handle: TaskHandle,
    kind: JobKind,
    project_name: String,
    payload: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(
        handle: TaskHandle,
        kind: JobKind,
        project_name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            handle,
            kind,
            project_name: project_name.into(),
            payload,
        }
    }

    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

/// What a producer hands to the broker; the broker assigns the handle.
#[derive(Debug, Clone)]
pub struct JobMessage {
    pub kind: JobKind,
    pub project_name: String,
    pub payload: serde_json::Value,
}
