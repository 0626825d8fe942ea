//! Decision model: what the queue does after an executor raised.
//!
//! The Decider is pure: given the attempt count and the error it returns the
//! next action. Applying it (rescheduling, storing a record) is the queue's job.

use std::time::Duration;

use super::JobError;
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run the task again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Retry budget spent; store a failure record (retries_exhausted).
    GiveUp { reason: String },

    /// Non-retryable fault; store the raw exception and mark the task FAILURE.
    Abort { reason: String },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Retry { .. } => "retry",
            Decision::GiveUp { .. } => "give_up",
            Decision::Abort { .. } => "abort",
        }
    }
}

pub trait Decider: Send + Sync {
    /// `attempts` counts the attempt that just failed (1-indexed).
    fn decide(&self, attempts: u32, error: &JobError) -> Decision;
}

/// Attempt-budget decider driven by a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, attempts: u32, error: &JobError) -> Decision {
        if !error.is_retryable() {
            return Decision::Abort {
                reason: error.to_string(),
            };
        }
        if attempts >= self.retry_policy.max_attempts {
            Decision::GiveUp {
                reason: format!(
                    "Max attempts reached: {}/{}: {}",
                    attempts, self.retry_policy.max_attempts, error
                ),
            }
        } else {
            let delay = self.retry_policy.next_delay(attempts);
            Decision::Retry {
                delay,
                reason: format!(
                    "Retry attempt {}/{} after {:?}",
                    attempts + 1,
                    self.retry_policy.max_attempts,
                    delay
                ),
            }
        }
    }
}
