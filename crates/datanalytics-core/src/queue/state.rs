//! Task state machine for the queue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Backend-side task state.
///
/// Transitions:
/// - Pending -> Started -> Success
/// - Pending -> Started -> Retry -> Pending (until the attempt budget is spent)
/// - Pending -> Started -> Failure (non-retryable fault)
///
/// A task whose retries ran out ends in Success carrying a failure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
}

impl TaskState {
    /// Wire name reported by the result backend.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Started => "STARTED",
            TaskState::Retry => "RETRY",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state: {0}")]
pub struct UnknownTaskState(pub String);

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TaskState::Pending),
            "STARTED" => Ok(TaskState::Started),
            "RETRY" => Ok(TaskState::Retry),
            "SUCCESS" => Ok(TaskState::Success),
            "FAILURE" => Ok(TaskState::Failure),
            _ => Err(UnknownTaskState(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_upper_case() {
        assert_eq!(TaskState::Retry.to_string(), "RETRY");
        assert_eq!(serde_json::to_string(&TaskState::Started).unwrap(), "\"STARTED\"");
    }

    #[test]
    fn parse_ignores_case() {
        assert_eq!("retry".parse::<TaskState>(), Ok(TaskState::Retry));
        assert!("revoked".parse::<TaskState>().is_err());
    }
}
