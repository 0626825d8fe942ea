//! Data preparation executor.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{absolute, log_record, lookup_full_name, ProjectLookup, RunnerInvocation, STANDARD_MODULE};
use crate::domain::{JobDetail, JobError, ProjectUpdate, ResultRecord};
use crate::ports::{Clock, ProcessRunner, ProjectStore};
use crate::typed::{DataPrepJob, Handler};

pub struct DataPrepExecutor {
    runner: Arc<dyn ProcessRunner>,
    projects: Arc<dyn ProjectStore>,
    clock: Arc<dyn Clock>,
    invocation: RunnerInvocation,
    output_root: PathBuf,
}

impl DataPrepExecutor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        projects: Arc<dyn ProjectStore>,
        clock: Arc<dyn Clock>,
        invocation: RunnerInvocation,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            projects,
            clock,
            invocation,
            output_root: output_root.into(),
        }
    }

    fn detail(run: Option<crate::domain::ProcessOutput>, output_path: Option<PathBuf>) -> JobDetail {
        JobDetail::Prep {
            data_prep_module: STANDARD_MODULE.to_string(),
            run,
            output_path,
        }
    }
}

#[async_trait]
impl Handler<DataPrepJob> for DataPrepExecutor {
    async fn handle(&self, job: DataPrepJob) -> Result<ResultRecord, JobError> {
        let name = job.project_name;
        let reference = match lookup_full_name(self.projects.as_ref(), &name).await? {
            ProjectLookup::Found(reference, _) => reference,
            ProjectLookup::Missing(error) => {
                return Ok(ResultRecord::failure(
                    name,
                    Self::detail(None, None),
                    error,
                    self.clock.now(),
                ));
            }
        };

        tracing::info!(project = %name, "starting data preparation");
        let command = self.invocation.data_prep(&name);
        let run = self.runner.run(&command, self.invocation.dir()).await?;
        tracing::info!(project = %name, return_code = run.return_code, "data prep command completed");

        let record = if run.succeeded() {
            let output_path = absolute(self.output_root.join(&name));
            self.projects
                .update(&reference, ProjectUpdate::PrepOutput(output_path.clone()))
                .await?;
            ResultRecord::success(&name, Self::detail(Some(run), Some(output_path)), self.clock.now())
        } else {
            let error = format!("data preparation exited with code {}", run.return_code);
            ResultRecord::failure(&name, Self::detail(Some(run), None), error, self.clock.now())
        };
        log_record(&record);
        Ok(record)
    }
}
