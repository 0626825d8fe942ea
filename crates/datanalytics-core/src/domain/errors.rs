//! Errors - job execution errors and their operational classification.

use crate::ports::{DatasetError, RunnerError, StoreError};

/// Classification that drives the retry decision.
///
/// - Transient: worth another attempt (spawn failure, flaky I/O).
/// - Permanent: another attempt cannot help (undecodable payload, no handler).
/// - Infrastructure: a collaborator (store, filesystem) failed; retried like
///   transient errors but reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Error raised out of an executor. Business failures are not errors: they are
/// returned as failure records.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct JobError {
    kind: ErrorKind,
    message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind != ErrorKind::Permanent
    }
}

impl From<RunnerError> for JobError {
    fn from(e: RunnerError) -> Self {
        JobError::transient(e.to_string())
    }
}

impl From<StoreError> for JobError {
    fn from(e: StoreError) -> Self {
        JobError::infrastructure(e.to_string())
    }
}

impl From<DatasetError> for JobError {
    fn from(e: DatasetError) -> Self {
        JobError::infrastructure(e.to_string())
    }
}

impl From<std::io::Error> for JobError {
    fn from(e: std::io::Error) -> Self {
        JobError::infrastructure(e.to_string())
    }
}
