//! Exploratory report executor: profile the project's dataset and write an
//! HTML report under `report_root/{user}/{user}_{project}.html`.

pub mod html;
pub mod profile;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use self::html::{RenderError, ReportRenderer};
pub use self::profile::{profile_table, ColumnProfile, ColumnSummary, DatasetProfile};

use super::{absolute, log_record, lookup, ProjectLookup};
use crate::domain::{JobDetail, JobError, JobKind, ProjectRef, ProjectUpdate, ResultRecord};
use crate::ports::{Clock, DatasetReader, ProjectStore};
use crate::typed::{Handler, Job, ReportJob};

impl From<RenderError> for JobError {
    fn from(e: RenderError) -> Self {
        JobError::infrastructure(e.to_string())
    }
}

pub struct ReportExecutor {
    projects: Arc<dyn ProjectStore>,
    datasets: Arc<dyn DatasetReader>,
    clock: Arc<dyn Clock>,
    renderer: ReportRenderer,
    report_root: PathBuf,
}

impl ReportExecutor {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        datasets: Arc<dyn DatasetReader>,
        clock: Arc<dyn Clock>,
        report_root: impl Into<PathBuf>,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            projects,
            datasets,
            clock,
            renderer: ReportRenderer::new()?,
            report_root: report_root.into(),
        })
    }

    pub fn report_path(&self, username: &str, project_name: &str) -> PathBuf {
        self.report_root
            .join(username)
            .join(format!("{username}_{project_name}.html"))
    }

    fn failure(&self, job: &ReportJob, error: String) -> ResultRecord {
        let record = ResultRecord::failure(
            job.project_name(),
            JobDetail::empty(JobKind::Report),
            error,
            self.clock.now(),
        );
        log_record(&record);
        record
    }
}

#[async_trait]
impl Handler<ReportJob> for ReportExecutor {
    async fn handle(&self, job: ReportJob) -> Result<ResultRecord, JobError> {
        if job.username.is_empty() || job.project_name.is_empty() {
            return Ok(self.failure(&job, "username and project name are required".to_string()));
        }
        let reference = ProjectRef::new(&job.username, &job.project_name);
        let project = match lookup(self.projects.as_ref(), reference.clone()).await? {
            ProjectLookup::Found(_, project) => project,
            ProjectLookup::Missing(error) => return Ok(self.failure(&job, error)),
        };
        let Some(dataset) = project.input_dataset else {
            return Ok(self.failure(&job, format!("Project {reference} has no input dataset")));
        };

        tracing::info!(project = %reference, dataset = %dataset.display(), "reading dataset");
        let table = self.datasets.read(&dataset).await?;
        let profile = profile_table(&table);

        tracing::info!(project = %reference, columns = profile.columns.len(), "generating report");
        let html = self
            .renderer
            .render(&job.project_name, &profile, self.clock.now())?;

        let report_path = absolute(self.report_path(&job.username, &job.project_name));
        if let Some(dir) = report_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tracing::info!(path = %report_path.display(), "saving report");
        tokio::fs::write(&report_path, html).await?;

        self.projects
            .update(&reference, ProjectUpdate::Report(report_path.clone()))
            .await?;

        let record = ResultRecord::success(
            job.project_name(),
            JobDetail::Report {
                report_path: Some(report_path),
            },
            self.clock.now(),
        );
        log_record(&record);
        Ok(record)
    }
}
