//! Task queue: broker (publish/lease), result backend (fetch), retry policy and
//! the in-memory implementation.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryBroker;
pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use state::{TaskState, UnknownTaskState};

use async_trait::async_trait;

use crate::domain::{Decision, JobError, JobMessage, ResultRecord, TaskEnvelope, TaskHandle};
use crate::observability::QueueCounts;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("unknown task: {0}")]
    UnknownTask(TaskHandle),

    #[error("result serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    OperationFailed(String),
}

/// A leased task. The worker owns the lease and must `complete` or `fail` it.
///
/// The queue owns state transitions; the worker only runs side effects and
/// reports what happened.
#[async_trait]
pub trait TaskLease: Send {
    fn envelope(&self) -> &TaskEnvelope;

    /// 1-indexed attempt number of this lease.
    fn attempt(&self) -> u32;

    /// The executor returned a record (success or business failure).
    async fn complete(self: Box<Self>, record: ResultRecord) -> Result<(), QueueError>;

    /// The executor raised; the queue decides between retry, give-up and abort.
    async fn fail(self: Box<Self>, error: JobError) -> Result<Decision, QueueError>;
}

/// Producer/consumer side of the queue.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Enqueue a job and return its handle without waiting for execution.
    async fn publish(&self, message: JobMessage) -> Result<TaskHandle, QueueError>;

    /// Lease one runnable task, waiting until one is available.
    async fn lease(&self) -> Option<Box<dyn TaskLease>>;

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError>;

    /// True while the task is pending, started or waiting for a retry.
    /// Finished, expired and unknown handles are not in flight.
    async fn is_in_flight(&self, handle: &TaskHandle) -> Result<bool, QueueError>;

    /// Drop results past their TTL along with everything else kept for
    /// those tasks. Returns how many tasks were dropped.
    async fn purge_expired(&self) -> Result<usize, QueueError>;
}

/// Raw view of a task as the backend stores it.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub handle: TaskHandle,

    /// Backend state name, e.g. `PENDING`. Kept as a string: backends may
    /// report states this crate does not model.
    pub state: String,

    /// Stored result, if any. Not guaranteed to be a [`ResultRecord`].
    pub result: Option<serde_json::Value>,
}

/// Read side of the queue, queried by the status reconciler.
#[async_trait]
pub trait ResultBackend: Send + Sync {
    /// Unknown and expired handles are reported as `PENDING`.
    async fn fetch(&self, handle: &TaskHandle) -> Result<TaskSnapshot, QueueError>;
}
