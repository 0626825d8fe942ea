//! Task record: state + envelope + stored result.

use std::time::Instant;

use chrono::{DateTime, Utc};

use super::TaskState;
use crate::domain::TaskEnvelope;

/// Single source of truth for one task inside the broker. Queue structures
/// (ready/scheduled) hold handles only; every transition happens here.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub envelope: TaskEnvelope,
    pub state: TaskState,

    /// Attempts made so far, including the current one while Started.
    pub attempts: u32,

    pub last_error: Option<String>,

    /// When a Retry-state task becomes runnable again.
    pub next_run_at: Option<Instant>,

    /// Stored result (JSON) once terminal.
    pub result: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(envelope: TaskEnvelope, now: DateTime<Utc>) -> Self {
        Self {
            envelope,
            state: TaskState::Pending,
            attempts: 0,
            last_error: None,
            next_run_at: None,
            result: None,
            created_at: now,
            finished_at: None,
        }
    }

    pub fn start_attempt(&mut self) {
        self.state = TaskState::Started;
        self.attempts += 1;
    }

    pub fn mark_succeeded(&mut self, result: serde_json::Value, now: DateTime<Utc>) {
        self.state = TaskState::Success;
        self.result = Some(result);
        self.finished_at = Some(now);
    }

    pub fn mark_failed(&mut self, error: String, result: serde_json::Value, now: DateTime<Utc>) {
        self.state = TaskState::Failure;
        self.last_error = Some(error);
        self.result = Some(result);
        self.finished_at = Some(now);
    }

    pub fn schedule_retry(&mut self, next_run_at: Instant, error: String) {
        self.state = TaskState::Retry;
        self.next_run_at = Some(next_run_at);
        self.last_error = Some(error);
    }

    /// Retry -> Pending once the backoff has elapsed.
    pub fn requeue(&mut self) {
        self.state = TaskState::Pending;
        self.next_run_at = None;
    }
}
