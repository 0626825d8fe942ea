use serde::{Deserialize, Serialize};

/// Per-state task counts, as reported by the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub started: usize,
    pub retry: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl QueueCounts {
    /// Tasks that still have work ahead of them.
    pub fn in_flight(&self) -> usize {
        self.pending + self.started + self.retry
    }
}
