//! Per-client task sessions: which handle a client last got for each
//! `(kind, project)` pair.

use std::collections::HashMap;

use crate::domain::{JobKind, TaskHandle};
use crate::queue::{QueueError, ResultBackend, TaskState};

/// Handles remembered under `{kind prefix}_{project}` keys, e.g.
/// `prep_task_proj1`.
#[derive(Debug, Clone, Default)]
pub struct TaskSessions {
    entries: HashMap<String, TaskHandle>,
}

/// Per-kind handles of a project that are still running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningOverview {
    pub prep: Option<TaskHandle>,
    pub train_and_eval: Option<TaskHandle>,
    pub report: Option<TaskHandle>,
}

impl RunningOverview {
    pub fn get(&self, kind: JobKind) -> Option<TaskHandle> {
        match kind {
            JobKind::Prep => self.prep,
            JobKind::TrainAndEval => self.train_and_eval,
            JobKind::Report => self.report,
        }
    }

    fn set(&mut self, kind: JobKind, handle: TaskHandle) {
        match kind {
            JobKind::Prep => self.prep = Some(handle),
            JobKind::TrainAndEval => self.train_and_eval = Some(handle),
            JobKind::Report => self.report = Some(handle),
        }
    }

    pub fn any_running(&self) -> bool {
        self.prep.is_some() || self.train_and_eval.is_some() || self.report.is_some()
    }
}

impl TaskSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(kind: JobKind, project: &str) -> String {
        format!("{}_{}", kind.session_key_prefix(), project)
    }

    /// Overwrites whatever handle was stored for the pair.
    pub fn remember(&mut self, kind: JobKind, project: &str, handle: TaskHandle) {
        self.entries.insert(Self::key(kind, project), handle);
    }

    pub fn handle_for(&self, kind: JobKind, project: &str) -> Option<TaskHandle> {
        self.entries.get(&Self::key(kind, project)).copied()
    }

    pub fn forget(&mut self, kind: JobKind, project: &str) -> Option<TaskHandle> {
        self.entries.remove(&Self::key(kind, project))
    }

    /// Stored handles of `project` whose backend state is PENDING, STARTED or
    /// RETRY. Finished handles are left out but stay remembered.
    pub async fn running_overview(
        &self,
        project: &str,
        backend: &dyn ResultBackend,
    ) -> Result<RunningOverview, QueueError> {
        let mut overview = RunningOverview::default();
        for kind in JobKind::ALL {
            let Some(handle) = self.handle_for(kind, project) else {
                continue;
            };
            let snapshot = backend.fetch(&handle).await?;
            let running = matches!(
                snapshot.state.parse::<TaskState>(),
                Ok(TaskState::Pending | TaskState::Started | TaskState::Retry)
            );
            if running {
                overview.set(kind, handle);
            }
        }
        Ok(overview)
    }
}
