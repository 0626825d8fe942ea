//! OrchestratorBuilder - construction and wiring
//!
//! Fail-fast: `build()` returns an error when an expected job kind has no
//! registered handler.

use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::reconciler::StatusReconciler;
use super::runtime::Runtime;
use super::sessions::SessionResolver;
use super::worker_loop::WorkerGroup;
use crate::config::OrchestratorConfig;
use crate::domain::JobKind;
use crate::executors::{
    DataPrepExecutor, RenderError, ReportExecutor, RunnerInvocation, TrainAndEvalExecutor,
};
use crate::ports::{Clock, DatasetReader, ProcessRunner, ProjectStore, SystemClock};
use crate::queue::InMemoryBroker;
use crate::typed::{DataPrepJob, Handler, Job, RegistryError, ReportJob, TrainAndEvalJob, TypedRegistry};

/// # Example
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config)
///     .with_standard_executors(runner, projects, datasets)?
///     .build()?;
/// let workers = orchestrator.spawn_workers();
/// let handle = orchestrator.dispatcher().enqueue_data_prep("alice_proj1").await?;
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    registry: TypedRegistry,
    expected_kinds: Option<Vec<JobKind>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing job kinds: {0:?}. These kinds were expected but not registered.")]
    MissingJobKinds(Vec<JobKind>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            registry: TypedRegistry::new(),
            expected_kinds: None,
        }
    }

    /// Clock used for result timestamps, handle ids and result expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn register<J: Job, H: Handler<J> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<J, H>(handler)?;
        Ok(self)
    }

    pub fn expect_kinds(mut self, kinds: &[JobKind]) -> Self {
        self.expected_kinds = Some(kinds.to_vec());
        self
    }

    /// Register the prep, train+eval and report executors, wired from the
    /// config, and expect all three kinds.
    pub fn with_standard_executors(
        self,
        runner: Arc<dyn ProcessRunner>,
        projects: Arc<dyn ProjectStore>,
        datasets: Arc<dyn DatasetReader>,
    ) -> Result<Self, BuildError> {
        let invocation = RunnerInvocation::from_config(&self.config);
        let clock = Arc::clone(&self.clock);

        let prep = DataPrepExecutor::new(
            Arc::clone(&runner),
            Arc::clone(&projects),
            Arc::clone(&clock),
            invocation.clone(),
            self.config.output_root.clone(),
        );
        let train_eval = TrainAndEvalExecutor::new(
            runner,
            Arc::clone(&projects),
            Arc::clone(&clock),
            invocation,
            SessionResolver::new(self.config.sessions_root()),
        );
        let report = ReportExecutor::new(
            projects,
            datasets,
            clock,
            self.config.report_root.clone(),
        )?;

        Ok(self
            .register::<DataPrepJob, _>(prep)?
            .register::<TrainAndEvalJob, _>(train_eval)?
            .register::<ReportJob, _>(report)?
            .expect_kinds(&JobKind::ALL))
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        if let Some(expected) = &self.expected_kinds {
            let registered = self.registry.registered_kinds();
            let missing: Vec<JobKind> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobKinds(missing));
            }
        }

        let mut broker = InMemoryBroker::new(self.config.retry.clone()).with_clock(Arc::clone(&self.clock));
        if let Some(ttl) = self.config.result_ttl {
            broker = broker.with_result_ttl(ttl);
        }
        let broker = Arc::new(broker);

        let dispatcher = Dispatcher::new(broker.clone(), self.config.same_project);
        let reconciler = StatusReconciler::new(
            broker.clone(),
            SessionResolver::new(self.config.sessions_root()),
            self.config.artifact_check,
        );

        Ok(Orchestrator {
            runtime: Arc::new(Runtime::new(Arc::new(self.registry))),
            config: self.config,
            broker,
            dispatcher,
            reconciler,
        })
    }
}

/// Wired orchestration core: dispatcher for producers, reconciler for
/// pollers, and workers on demand.
pub struct Orchestrator {
    config: OrchestratorConfig,
    broker: Arc<InMemoryBroker>,
    runtime: Arc<Runtime>,
    dispatcher: Dispatcher,
    reconciler: StatusReconciler,
}

impl Orchestrator {
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    /// Spawn `config.workers` workers.
    pub fn spawn_workers(&self) -> WorkerGroup {
        self.spawn_worker_count(self.config.workers)
    }

    /// Spawn `n` workers. With a result TTL configured the group also runs
    /// the expired-result sweep every `config.gc_interval`.
    pub fn spawn_worker_count(&self, n: usize) -> WorkerGroup {
        let group = WorkerGroup::spawn(n, self.broker.clone(), Arc::clone(&self.runtime));
        match self.config.result_ttl {
            Some(_) => group.with_result_gc(self.broker.clone(), self.config.gc_interval),
            None => group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobDetail, JobError, ResultRecord};
    use crate::impls::{CsvDatasetReader, InMemoryProjectStore, ShellRunner};
    use async_trait::async_trait;
    use chrono::Utc;

    struct PrepStub;

    #[async_trait]
    impl Handler<DataPrepJob> for PrepStub {
        async fn handle(&self, job: DataPrepJob) -> Result<ResultRecord, JobError> {
            Ok(ResultRecord::success(job.project_name, JobDetail::empty(JobKind::Prep), Utc::now()))
        }
    }

    #[test]
    fn build_with_standard_executors() {
        let orchestrator = OrchestratorBuilder::new(OrchestratorConfig::default())
            .with_standard_executors(
                Arc::new(ShellRunner::new()),
                Arc::new(InMemoryProjectStore::new()),
                Arc::new(CsvDatasetReader),
            )
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            orchestrator.runtime().registry().registered_kinds(),
            vec![JobKind::Prep, JobKind::Report, JobKind::TrainAndEval]
        );
    }

    #[test]
    fn build_fails_on_missing_kinds() {
        let result = OrchestratorBuilder::new(OrchestratorConfig::default())
            .register::<DataPrepJob, _>(PrepStub)
            .unwrap()
            .expect_kinds(&JobKind::ALL)
            .build();

        assert!(matches!(
            result,
            Err(BuildError::MissingJobKinds(missing))
                if missing == vec![JobKind::TrainAndEval, JobKind::Report]
        ));
    }

    #[test]
    fn build_without_expectations_accepts_partial_registry() {
        let result = OrchestratorBuilder::new(OrchestratorConfig::default())
            .register::<DataPrepJob, _>(PrepStub)
            .unwrap()
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let result = OrchestratorBuilder::new(OrchestratorConfig::default())
            .register::<DataPrepJob, _>(PrepStub)
            .unwrap()
            .register::<DataPrepJob, _>(PrepStub);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(JobKind::Prep))));
    }
}
