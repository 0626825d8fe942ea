//! IdGenerator port - handle and attempt id generation

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::{AttemptId, TaskHandle};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_handle(&self) -> TaskHandle;

    fn generate_attempt_id(&self) -> AttemptId;
}

/// ULID generator whose timestamp part comes from the injected clock.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_handle(&self) -> TaskHandle {
        TaskHandle::from(self.next())
    }

    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn handles_are_unique() {
        let ids = UlidGenerator::new(Arc::new(SystemClock));
        let a = ids.generate_handle();
        let b = ids.generate_handle();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("task-"));
    }

    #[test]
    fn timestamp_part_follows_clock() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let ids = UlidGenerator::new(Arc::new(FixedClock::new(fixed_time)));

        let a = ids.generate_handle();
        let b = ids.generate_attempt_id();

        // same timestamp, different random part
        assert_eq!(a.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(b.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert!(b.to_string().starts_with("attempt-"));
    }
}
