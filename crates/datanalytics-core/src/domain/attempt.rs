//! Attempt history: one entry per execution try of a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AttemptId, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The executor returned a record (success or business failure).
    Completed,
    /// The executor raised; `error` says why.
    Raised,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    pub handle: TaskHandle,

    /// 1-indexed attempt number.
    pub attempt: u32,

    pub outcome: AttemptOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// What the queue decided after this attempt (`retry`, `give_up`, `abort`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
