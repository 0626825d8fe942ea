//! Job dispatcher: turns job requests into queue messages.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::SameProjectPolicy;
use crate::domain::{JobKind, JobMessage, TaskHandle};
use crate::queue::{Broker, QueueError};
use crate::typed::{DataPrepJob, Job, ReportJob, TrainAndEvalJob};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("project name is required")]
    EmptyProjectName,

    #[error("{kind} job for {project} is still running as {handle}")]
    ProjectBusy {
        kind: JobKind,
        project: String,
        handle: TaskHandle,
    },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("failed to encode job payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Publishes jobs and hands back their handles without waiting for them to
/// run.
///
/// Under [`SameProjectPolicy::Reject`] the dispatcher remembers the last
/// handle per `(kind, project)` and refuses a new job while the broker still
/// has that handle pending, started or retrying. Finished, expired and
/// unknown handles free the project.
pub struct Dispatcher {
    broker: Arc<dyn Broker>,
    policy: SameProjectPolicy,
    in_flight: Mutex<HashMap<(JobKind, String), TaskHandle>>,
}

impl Dispatcher {
    pub fn new(broker: Arc<dyn Broker>, policy: SameProjectPolicy) -> Self {
        Self {
            broker,
            policy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> SameProjectPolicy {
        self.policy
    }

    pub async fn enqueue_data_prep(&self, full_project_name: &str) -> Result<TaskHandle, DispatchError> {
        require(full_project_name)?;
        self.enqueue(DataPrepJob {
            project_name: full_project_name.to_string(),
        })
        .await
    }

    pub async fn enqueue_train_and_eval(
        &self,
        full_project_name: &str,
    ) -> Result<TaskHandle, DispatchError> {
        require(full_project_name)?;
        self.enqueue(TrainAndEvalJob {
            project_name: full_project_name.to_string(),
        })
        .await
    }

    pub async fn enqueue_report(
        &self,
        username: &str,
        project_name: &str,
    ) -> Result<TaskHandle, DispatchError> {
        require(username)?;
        require(project_name)?;
        self.enqueue(ReportJob {
            username: username.to_string(),
            project_name: project_name.to_string(),
        })
        .await
    }

    /// Publish any typed job.
    pub async fn enqueue<J: Job>(&self, job: J) -> Result<TaskHandle, DispatchError> {
        let message = JobMessage {
            kind: J::KIND,
            project_name: job.project_name(),
            payload: serde_json::to_value(&job)?,
        };

        let handle = match self.policy {
            SameProjectPolicy::Allow => self.broker.publish(message).await?,
            SameProjectPolicy::Reject => self.publish_exclusive(message).await?,
        };

        tracing::info!(handle = %handle, kind = %J::KIND, project = %job.project_name(), "job enqueued");
        Ok(handle)
    }

    async fn publish_exclusive(&self, message: JobMessage) -> Result<TaskHandle, DispatchError> {
        let key = (message.kind, message.project_name.clone());
        // Held across check and publish so two callers cannot both pass.
        let mut in_flight = self.in_flight.lock().await;
        self.prune(&mut in_flight).await?;

        if let Some(previous) = in_flight.get(&key).copied() {
            tracing::warn!(handle = %previous, kind = %key.0, project = %key.1, "job rejected, previous run in flight");
            return Err(DispatchError::ProjectBusy {
                kind: key.0,
                project: key.1,
                handle: previous,
            });
        }

        let handle = self.broker.publish(message).await?;
        in_flight.insert(key, handle);
        Ok(handle)
    }

    /// Drop entries whose task finished, expired or is no longer known to
    /// the broker. What remains is exactly the set of busy projects.
    async fn prune(
        &self,
        in_flight: &mut HashMap<(JobKind, String), TaskHandle>,
    ) -> Result<(), QueueError> {
        let mut finished = Vec::new();
        for (key, handle) in in_flight.iter() {
            if !self.broker.is_in_flight(handle).await? {
                finished.push(key.clone());
            }
        }
        for key in finished {
            in_flight.remove(&key);
        }
        Ok(())
    }

    /// Number of `(kind, project)` pairs currently held busy.
    pub async fn busy_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

fn require(name: &str) -> Result<(), DispatchError> {
    if name.trim().is_empty() {
        return Err(DispatchError::EmptyProjectName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobDetail, JobError, ResultRecord};
    use crate::ports::{Clock, FixedClock};
    use crate::queue::{InMemoryBroker, RetryPolicy};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::time::Duration;

    fn dispatcher(policy: SameProjectPolicy) -> (Arc<InMemoryBroker>, Dispatcher) {
        let broker = Arc::new(InMemoryBroker::new(RetryPolicy::fixed(3, Duration::from_millis(10))));
        let dispatcher = Dispatcher::new(broker.clone(), policy);
        (broker, dispatcher)
    }

    #[tokio::test]
    async fn payload_carries_job_arguments() {
        let (broker, dispatcher) = dispatcher(SameProjectPolicy::Allow);
        let handle = dispatcher.enqueue_report("alice", "proj1").await.unwrap();

        let lease = broker.lease().await.unwrap();
        let envelope = lease.envelope();
        assert_eq!(envelope.handle(), handle);
        assert_eq!(envelope.kind(), JobKind::Report);
        assert_eq!(envelope.project_name(), "alice_proj1");
        assert_eq!(
            envelope.payload(),
            &serde_json::json!({ "username": "alice", "project_name": "proj1" })
        );
    }

    #[rstest]
    #[case::blank_user("", "proj1")]
    #[case::whitespace_user("  ", "proj1")]
    #[case::blank_project("alice", "")]
    #[tokio::test]
    async fn empty_report_names_are_rejected(#[case] username: &str, #[case] project: &str) {
        let (broker, dispatcher) = dispatcher(SameProjectPolicy::Allow);
        assert!(matches!(
            dispatcher.enqueue_report(username, project).await,
            Err(DispatchError::EmptyProjectName)
        ));
        assert_eq!(broker.counts_by_state().await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn empty_full_names_are_rejected() {
        let (_, dispatcher) = dispatcher(SameProjectPolicy::Allow);
        assert!(matches!(
            dispatcher.enqueue_data_prep("").await,
            Err(DispatchError::EmptyProjectName)
        ));
        assert!(matches!(
            dispatcher.enqueue_train_and_eval(" ").await,
            Err(DispatchError::EmptyProjectName)
        ));
    }

    #[tokio::test]
    async fn allow_policy_never_dedups() {
        let (broker, dispatcher) = dispatcher(SameProjectPolicy::Allow);
        let a = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();
        let b = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();

        assert_ne!(a, b);
        assert_eq!(broker.counts_by_state().await.unwrap().pending, 2);
    }

    #[tokio::test]
    async fn reject_policy_refuses_while_previous_run_is_in_flight() {
        let (broker, dispatcher) = dispatcher(SameProjectPolicy::Reject);
        let first = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();

        let err = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap_err();
        assert!(matches!(err, DispatchError::ProjectBusy { handle, .. } if handle == first));

        // Other kinds and other projects are unaffected.
        dispatcher.enqueue_train_and_eval("alice_proj1").await.unwrap();
        dispatcher.enqueue_data_prep("alice_proj2").await.unwrap();

        // Once the first run finishes the project is free again.
        let lease = broker.lease().await.unwrap();
        assert_eq!(lease.envelope().handle(), first);
        lease
            .complete(ResultRecord::success("alice_proj1", JobDetail::empty(JobKind::Prep), Utc::now()))
            .await
            .unwrap();
        let second = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();
        assert_ne!(second, first);
    }

    #[tokio::test]
    async fn reject_policy_frees_project_once_result_expires() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = Arc::new(
            InMemoryBroker::new(RetryPolicy::fixed(3, Duration::from_millis(10)))
                .with_clock(clock.clone())
                .with_result_ttl(Duration::from_secs(60)),
        );
        let dispatcher = Dispatcher::new(broker.clone(), SameProjectPolicy::Reject);

        let first = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();
        let lease = broker.lease().await.unwrap();
        lease
            .complete(ResultRecord::success("alice_proj1", JobDetail::empty(JobKind::Prep), clock.now()))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(5));
        let second = dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();
        assert_ne!(second, first);
    }

    #[tokio::test]
    async fn reject_policy_frees_project_after_purge() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let broker = Arc::new(
            InMemoryBroker::new(RetryPolicy::fixed(3, Duration::from_millis(10)))
                .with_clock(clock.clone())
                .with_result_ttl(Duration::from_secs(60)),
        );
        let dispatcher = Dispatcher::new(broker.clone(), SameProjectPolicy::Reject);

        dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();
        broker
            .lease()
            .await
            .unwrap()
            .fail(JobError::permanent("payload decode"))
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(broker.purge_expired().await.unwrap(), 1);

        dispatcher.enqueue_data_prep("alice_proj1").await.unwrap();
    }

    #[tokio::test]
    async fn finished_entries_are_pruned() {
        let (broker, dispatcher) = dispatcher(SameProjectPolicy::Reject);
        for project in ["alice_proj1", "alice_proj2", "alice_proj3"] {
            dispatcher.enqueue_data_prep(project).await.unwrap();
        }
        assert_eq!(dispatcher.busy_count().await, 3);

        for _ in 0..3 {
            let lease = broker.lease().await.unwrap();
            let name = lease.envelope().project_name().to_string();
            lease
                .complete(ResultRecord::success(name, JobDetail::empty(JobKind::Prep), Utc::now()))
                .await
                .unwrap();
        }

        dispatcher.enqueue_train_and_eval("alice_proj1").await.unwrap();
        assert_eq!(dispatcher.busy_count().await, 1);
    }
}
