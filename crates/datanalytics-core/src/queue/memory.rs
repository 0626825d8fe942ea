//! In-memory broker + result backend.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{
    Broker, QueueError, ResultBackend, RetryPolicy, TaskLease, TaskRecord, TaskSnapshot,
    TaskState,
};
use crate::domain::{
    AttemptOutcome, AttemptRecord, Decider, Decision, DefaultDecider, JobError, JobMessage,
    ResultRecord, TaskEnvelope, TaskHandle,
};
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

/// Retry entry; reverse ordering turns the BinaryHeap into a min-heap.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    next_run_at: Instant,
    handle: TaskHandle,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

#[derive(Default)]
struct BrokerState {
    records: HashMap<TaskHandle, TaskRecord>,
    ready: VecDeque<TaskHandle>,
    scheduled: BinaryHeap<ScheduledTask>,
    attempts: HashMap<TaskHandle, Vec<AttemptRecord>>,
}

impl BrokerState {
    /// Move retries whose backoff has elapsed back to the ready queue.
    fn promote_scheduled_tasks(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.handle) {
                if record.state == TaskState::Retry {
                    record.requeue();
                    self.ready.push_back(entry.handle);
                }
            }
        }
    }

    /// Forget a task: its record and its attempt history go together.
    fn forget(&mut self, handle: &TaskHandle) {
        self.records.remove(handle);
        self.attempts.remove(handle);
    }

    fn push_attempt(&mut self, attempt: AttemptRecord) {
        self.attempts.entry(attempt.handle).or_default().push(attempt);
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Pending => counts.pending += 1,
                TaskState::Started => counts.started += 1,
                TaskState::Retry => counts.retry += 1,
                TaskState::Success => counts.succeeded += 1,
                TaskState::Failure => counts.failed += 1,
            }
        }
        counts
    }
}

/// Broker and result backend in one process.
///
/// Stored results expire `result_ttl` after completion; expired and unknown
/// handles both read back as `PENDING`.
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    decider: Arc<dyn Decider>,
    result_ttl: Option<chrono::Duration>,
}

impl InMemoryBroker {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            notify: Arc::new(Notify::new()),
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            decider: Arc::new(DefaultDecider::new(retry_policy)),
            result_ttl: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = chrono::Duration::from_std(ttl).ok();
        self
    }

    /// Attempt history of one task, oldest first. Empty once the task has
    /// been forgotten.
    pub async fn attempts(&self, handle: &TaskHandle) -> Vec<AttemptRecord> {
        let state = self.state.lock().await;
        state.attempts.get(handle).cloned().unwrap_or_default()
    }

    fn is_expired(&self, record: &TaskRecord) -> bool {
        match (self.result_ttl, record.finished_at) {
            (Some(ttl), Some(finished_at)) => self.clock.now() - finished_at > ttl,
            _ => false,
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, message: JobMessage) -> Result<TaskHandle, QueueError> {
        let handle = self.ids.generate_handle();
        let envelope = TaskEnvelope::new(
            handle,
            message.kind,
            message.project_name,
            message.payload,
        );
        {
            let mut state = self.state.lock().await;
            state
                .records
                .insert(handle, TaskRecord::new(envelope, self.clock.now()));
            state.ready.push_back(handle);
        }
        self.notify.notify_one();

        tracing::debug!(handle = %handle, kind = %message.kind, "task published");
        Ok(handle)
    }

    async fn lease(&self) -> Option<Box<dyn TaskLease>> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled_tasks();

                while let Some(handle) = state.ready.pop_front() {
                    // Handles whose result already expired are skipped.
                    let Some(record) = state.records.get_mut(&handle) else {
                        continue;
                    };
                    record.start_attempt();
                    let lease = InMemoryLease {
                        handle,
                        envelope: record.envelope.clone(),
                        attempt: record.attempts,
                        started_at: self.clock.now(),
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                        ids: Arc::clone(&self.ids),
                        clock: Arc::clone(&self.clock),
                        decider: Arc::clone(&self.decider),
                    };
                    return Some(Box::new(lease));
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            // Wait for a publish or for the next retry to come due.
            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {},
                    _ = tokio::time::sleep_until(wake_time.into()) => {},
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError> {
        let state = self.state.lock().await;
        Ok(state.counts_by_state())
    }

    async fn is_in_flight(&self, handle: &TaskHandle) -> Result<bool, QueueError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .get(handle)
            .is_some_and(|record| !record.state.is_terminal()))
    }

    async fn purge_expired(&self) -> Result<usize, QueueError> {
        if self.result_ttl.is_none() {
            return Ok(0);
        }
        let mut state = self.state.lock().await;
        let expired: Vec<TaskHandle> = state
            .records
            .iter()
            .filter(|(_, record)| self.is_expired(record))
            .map(|(handle, _)| *handle)
            .collect();
        for handle in &expired {
            state.forget(handle);
        }
        if !expired.is_empty() {
            tracing::debug!(purged = expired.len(), "expired results purged");
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl ResultBackend for InMemoryBroker {
    async fn fetch(&self, handle: &TaskHandle) -> Result<TaskSnapshot, QueueError> {
        let mut state = self.state.lock().await;

        let expired = match state.records.get(handle) {
            Some(record) => self.is_expired(record),
            None => false,
        };
        if expired {
            state.forget(handle);
            tracing::debug!(handle = %handle, "stored result expired");
        }

        Ok(match state.records.get(handle) {
            Some(record) => TaskSnapshot {
                handle: *handle,
                state: record.state.as_str().to_string(),
                result: record.result.clone(),
            },
            None => TaskSnapshot {
                handle: *handle,
                state: TaskState::Pending.as_str().to_string(),
                result: None,
            },
        })
    }
}

struct InMemoryLease {
    handle: TaskHandle,
    envelope: TaskEnvelope,
    attempt: u32,
    started_at: chrono::DateTime<chrono::Utc>,
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    decider: Arc<dyn Decider>,
}

impl InMemoryLease {
    fn attempt_record(
        &self,
        outcome: AttemptOutcome,
        error: Option<String>,
        decision: Option<&Decision>,
    ) -> AttemptRecord {
        AttemptRecord {
            attempt_id: self.ids.generate_attempt_id(),
            handle: self.handle,
            attempt: self.attempt,
            outcome,
            error,
            decision: decision.map(|d| d.label().to_string()),
            started_at: self.started_at,
            finished_at: self.clock.now(),
        }
    }
}

#[async_trait]
impl TaskLease for InMemoryLease {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn complete(self: Box<Self>, record: ResultRecord) -> Result<(), QueueError> {
        let result = serde_json::to_value(&record)?;
        let error = record.error.clone();
        let attempt = self.attempt_record(AttemptOutcome::Completed, error, None);

        let mut state = self.state.lock().await;
        let task = state
            .records
            .get_mut(&self.handle)
            .ok_or(QueueError::UnknownTask(self.handle))?;
        task.mark_succeeded(result, self.clock.now());
        state.push_attempt(attempt);
        Ok(())
    }

    async fn fail(self: Box<Self>, error: JobError) -> Result<Decision, QueueError> {
        let decision = self.decider.decide(self.attempt, &error);
        let attempt =
            self.attempt_record(AttemptOutcome::Raised, Some(error.to_string()), Some(&decision));
        let now = self.clock.now();

        let should_notify = {
            let mut state = self.state.lock().await;
            state.push_attempt(attempt);
            let task = state
                .records
                .get_mut(&self.handle)
                .ok_or(QueueError::UnknownTask(self.handle))?;

            match &decision {
                Decision::Retry { delay, .. } => {
                    let next_run_at = Instant::now() + *delay;
                    task.schedule_retry(next_run_at, error.to_string());
                    state.scheduled.push(ScheduledTask {
                        next_run_at,
                        handle: self.handle,
                    });
                    true
                }
                Decision::GiveUp { reason } => {
                    let record = ResultRecord::exhausted(
                        self.envelope.kind(),
                        self.envelope.project_name(),
                        reason.clone(),
                        now,
                    );
                    task.last_error = Some(error.to_string());
                    task.mark_succeeded(serde_json::to_value(&record)?, now);
                    false
                }
                Decision::Abort { reason } => {
                    let exception = serde_json::json!({
                        "exc_type": "JobError",
                        "exc_message": reason,
                    });
                    task.mark_failed(reason.clone(), exception, now);
                    false
                }
            }
        };

        // Wake a worker so it re-arms its timer for the new retry.
        if should_notify {
            self.notify.notify_one();
        }

        tracing::warn!(
            handle = %self.handle,
            attempt = self.attempt,
            decision = decision.label(),
            error = %error,
            "task attempt failed"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobDetail, JobKind, RecordStatus};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn message() -> JobMessage {
        JobMessage {
            kind: JobKind::Prep,
            project_name: "alice_proj1".to_string(),
            payload: serde_json::json!({ "project_name": "alice_proj1" }),
        }
    }

    fn fast_broker() -> InMemoryBroker {
        InMemoryBroker::new(RetryPolicy::fixed(3, Duration::from_millis(10)))
    }

    async fn lease_now(broker: &InMemoryBroker) -> Box<dyn TaskLease> {
        tokio::time::timeout(Duration::from_secs(2), broker.lease())
            .await
            .expect("lease timed out")
            .expect("lease returned none")
    }

    #[tokio::test]
    async fn publish_and_counts() {
        let broker = fast_broker();
        broker.publish(message()).await.unwrap();

        let counts = broker.counts_by_state().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.started, 0);
    }

    #[tokio::test]
    async fn publish_returns_distinct_handles() {
        let broker = fast_broker();
        let a = broker.publish(message()).await.unwrap();
        let b = broker.publish(message()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn lease_transitions_to_started() {
        let broker = fast_broker();
        let handle = broker.publish(message()).await.unwrap();

        let lease = lease_now(&broker).await;
        assert_eq!(lease.envelope().handle(), handle);
        assert_eq!(lease.attempt(), 1);

        let snapshot = broker.fetch(&handle).await.unwrap();
        assert_eq!(snapshot.state, "STARTED");
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn complete_stores_record() {
        let broker = fast_broker();
        let handle = broker.publish(message()).await.unwrap();
        let lease = lease_now(&broker).await;

        let record = ResultRecord::success("alice_proj1", JobDetail::empty(JobKind::Prep), Utc::now());
        lease.complete(record.clone()).await.unwrap();

        let snapshot = broker.fetch(&handle).await.unwrap();
        assert_eq!(snapshot.state, "SUCCESS");
        let stored: ResultRecord = serde_json::from_value(snapshot.result.unwrap()).unwrap();
        assert_eq!(stored, record);

        let attempts = broker.attempts(&handle).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].outcome, AttemptOutcome::Completed);
    }

    #[tokio::test]
    async fn fail_schedules_retry_then_requeues() {
        let broker = fast_broker();
        let handle = broker.publish(message()).await.unwrap();

        let lease = lease_now(&broker).await;
        let decision = lease.fail(JobError::transient("spawn failed")).await.unwrap();
        assert_eq!(decision.label(), "retry");
        assert_eq!(broker.fetch(&handle).await.unwrap().state, "RETRY");

        let lease = lease_now(&broker).await;
        assert_eq!(lease.envelope().handle(), handle);
        assert_eq!(lease.attempt(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_store_failure_record() {
        let broker = fast_broker();
        let handle = broker.publish(message()).await.unwrap();

        for _ in 0..3 {
            let lease = lease_now(&broker).await;
            lease.fail(JobError::transient("spawn failed")).await.unwrap();
        }

        let snapshot = broker.fetch(&handle).await.unwrap();
        assert_eq!(snapshot.state, "SUCCESS");
        let record: ResultRecord = serde_json::from_value(snapshot.result.unwrap()).unwrap();
        assert_eq!(record.status, RecordStatus::Failure);
        assert!(record.retries_exhausted);
        assert_eq!(record.kind(), JobKind::Prep);
        assert_eq!(record.project_name, "alice_proj1");

        let decisions: Vec<_> = broker
            .attempts(&handle)
            .await
            .into_iter()
            .filter_map(|a| a.decision)
            .collect();
        assert_eq!(decisions, vec!["retry", "retry", "give_up"]);
    }

    #[tokio::test]
    async fn permanent_error_aborts_without_retry() {
        let broker = fast_broker();
        let handle = broker.publish(message()).await.unwrap();

        let lease = lease_now(&broker).await;
        let decision = lease.fail(JobError::permanent("payload decode")).await.unwrap();
        assert_eq!(decision.label(), "abort");

        let snapshot = broker.fetch(&handle).await.unwrap();
        assert_eq!(snapshot.state, "FAILURE");
        let result = snapshot.result.unwrap();
        assert_eq!(result["exc_type"], "JobError");
        assert!(serde_json::from_value::<ResultRecord>(result).is_err());

        let counts = broker.counts_by_state().await.unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.retry, 0);
    }

    #[tokio::test]
    async fn unknown_handle_reads_as_pending() {
        let broker = fast_broker();
        let handle = TaskHandle::from_ulid(ulid::Ulid::new());

        let snapshot = broker.fetch(&handle).await.unwrap();
        assert_eq!(snapshot.state, "PENDING");
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn results_expire_after_ttl() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = fast_broker()
            .with_clock(clock.clone())
            .with_result_ttl(Duration::from_secs(3600));
        let handle = broker.publish(message()).await.unwrap();
        let lease = lease_now(&broker).await;
        lease
            .complete(ResultRecord::success(
                "alice_proj1",
                JobDetail::empty(JobKind::Prep),
                clock.now(),
            ))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(broker.fetch(&handle).await.unwrap().state, "SUCCESS");

        clock.advance(chrono::Duration::minutes(31));
        assert_eq!(broker.fetch(&handle).await.unwrap().state, "PENDING");
    }

    #[tokio::test]
    async fn purge_drops_only_expired_results() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = fast_broker()
            .with_clock(clock.clone())
            .with_result_ttl(Duration::from_secs(60));

        broker.publish(message()).await.unwrap();
        let lease = lease_now(&broker).await;
        lease
            .complete(ResultRecord::success(
                "alice_proj1",
                JobDetail::empty(JobKind::Prep),
                clock.now(),
            ))
            .await
            .unwrap();
        broker.publish(message()).await.unwrap();

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(broker.purge_expired().await.unwrap(), 1);

        let counts = broker.counts_by_state().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.succeeded, 0);
    }

    #[tokio::test]
    async fn purge_forgets_attempt_history_with_the_result() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = fast_broker()
            .with_clock(clock.clone())
            .with_result_ttl(Duration::from_secs(60));

        let handle = broker.publish(message()).await.unwrap();
        let lease = lease_now(&broker).await;
        lease.fail(JobError::permanent("payload decode")).await.unwrap();
        assert_eq!(broker.attempts(&handle).await.len(), 1);

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(broker.purge_expired().await.unwrap(), 1);
        assert!(broker.attempts(&handle).await.is_empty());
        assert_eq!(broker.fetch(&handle).await.unwrap().state, "PENDING");
    }

    #[tokio::test]
    async fn expiry_on_fetch_also_drops_attempts() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = fast_broker()
            .with_clock(clock.clone())
            .with_result_ttl(Duration::from_secs(60));

        let handle = broker.publish(message()).await.unwrap();
        lease_now(&broker)
            .await
            .complete(ResultRecord::success(
                "alice_proj1",
                JobDetail::empty(JobKind::Prep),
                clock.now(),
            ))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(5));
        broker.fetch(&handle).await.unwrap();
        assert!(broker.attempts(&handle).await.is_empty());
    }

    #[tokio::test]
    async fn in_flight_until_terminal() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = fast_broker()
            .with_clock(clock.clone())
            .with_result_ttl(Duration::from_secs(60));

        let handle = broker.publish(message()).await.unwrap();
        assert!(broker.is_in_flight(&handle).await.unwrap());

        let lease = lease_now(&broker).await;
        assert!(broker.is_in_flight(&handle).await.unwrap());
        lease.fail(JobError::transient("spawn failed")).await.unwrap();
        assert!(broker.is_in_flight(&handle).await.unwrap());

        lease_now(&broker)
            .await
            .complete(ResultRecord::success(
                "alice_proj1",
                JobDetail::empty(JobKind::Prep),
                clock.now(),
            ))
            .await
            .unwrap();
        assert!(!broker.is_in_flight(&handle).await.unwrap());

        // expired and never-seen handles are not in flight either
        clock.advance(chrono::Duration::minutes(5));
        broker.purge_expired().await.unwrap();
        assert!(!broker.is_in_flight(&handle).await.unwrap());
        let unknown = TaskHandle::from_ulid(ulid::Ulid::new());
        assert!(!broker.is_in_flight(&unknown).await.unwrap());
    }
}
