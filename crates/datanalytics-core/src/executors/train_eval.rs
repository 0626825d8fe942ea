//! Train + evaluate executor.
//!
//! Two runner invocations in sequence. Evaluation is pointed at the newest
//! TRAIN session, which only exists once training has finished.

use std::sync::Arc;

use async_trait::async_trait;

use super::{log_record, lookup_full_name, ProjectLookup, RunnerInvocation};
use crate::app::sessions::{SessionKind, SessionResolver};
use crate::domain::{JobDetail, JobError, JobKind, ProjectUpdate, ResultRecord};
use crate::ports::{Clock, ProcessRunner, ProjectStore};
use crate::typed::{Handler, TrainAndEvalJob};

pub struct TrainAndEvalExecutor {
    runner: Arc<dyn ProcessRunner>,
    projects: Arc<dyn ProjectStore>,
    clock: Arc<dyn Clock>,
    invocation: RunnerInvocation,
    sessions: SessionResolver,
}

impl TrainAndEvalExecutor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        projects: Arc<dyn ProjectStore>,
        clock: Arc<dyn Clock>,
        invocation: RunnerInvocation,
        sessions: SessionResolver,
    ) -> Self {
        Self {
            runner,
            projects,
            clock,
            invocation,
            sessions,
        }
    }
}

#[async_trait]
impl Handler<TrainAndEvalJob> for TrainAndEvalExecutor {
    async fn handle(&self, job: TrainAndEvalJob) -> Result<ResultRecord, JobError> {
        let name = job.project_name;
        let reference = match lookup_full_name(self.projects.as_ref(), &name).await? {
            ProjectLookup::Found(reference, _) => reference,
            ProjectLookup::Missing(error) => {
                return Ok(ResultRecord::failure(
                    name,
                    JobDetail::empty(JobKind::TrainAndEval),
                    error,
                    self.clock.now(),
                ));
            }
        };
        let dir = self.invocation.dir();

        tracing::info!(project = %name, "starting train and evaluate");
        let train = self.runner.run(&self.invocation.train(&name), dir).await?;
        tracing::info!(project = %name, return_code = train.return_code, "train command completed");

        if !train.succeeded() {
            let error = format!("training exited with code {}", train.return_code);
            let detail = JobDetail::TrainAndEval {
                train: Some(train),
                eval: None,
                train_session: None,
                output_path: None,
            };
            let record = ResultRecord::failure(&name, detail, error, self.clock.now());
            log_record(&record);
            return Ok(record);
        }

        let train_session = self.sessions.latest(SessionKind::Train, &name).await;
        if !train_session.is_available() {
            tracing::warn!(project = %name, "no TRAIN session found after training");
        }
        let eval = self
            .runner
            .run(&self.invocation.eval(&name, &train_session), dir)
            .await?;
        tracing::info!(project = %name, return_code = eval.return_code, "eval command completed");

        let record = if eval.succeeded() {
            let eval_session = self.sessions.latest(SessionKind::Eval, &name).await;
            let output_path = super::absolute(self.sessions.session_path(&eval_session));
            self.projects
                .update(&reference, ProjectUpdate::TrainEvalOutput(output_path.clone()))
                .await?;
            let detail = JobDetail::TrainAndEval {
                train: Some(train),
                eval: Some(eval),
                train_session: Some(train_session.to_string()),
                output_path: Some(output_path),
            };
            ResultRecord::success(&name, detail, self.clock.now())
        } else {
            let error = format!("evaluation exited with code {}", eval.return_code);
            let detail = JobDetail::TrainAndEval {
                train: Some(train),
                eval: Some(eval),
                train_session: Some(train_session.to_string()),
                output_path: None,
            };
            ResultRecord::failure(&name, detail, error, self.clock.now())
        };
        log_record(&record);
        Ok(record)
    }
}
