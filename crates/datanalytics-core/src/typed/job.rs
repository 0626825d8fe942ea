//! Job trait - typed job payloads
//!
//! Each payload struct is bound to exactly one [`JobKind`] through an
//! associated constant, so a handler for `DataPrepJob` can never be wired to
//! the report queue by a typo.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::JobKind;

/// # Trait Bounds
/// - `Serialize + DeserializeOwned`: carried as the envelope's JSON payload
/// - `Send + Sync + 'static`: moved across worker tasks
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: JobKind;

    /// Full `{owner}_{project}` name the queue files this job under.
    fn project_name(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPrepJob {
    pub project_name: String,
}

impl Job for DataPrepJob {
    const KIND: JobKind = JobKind::Prep;

    fn project_name(&self) -> String {
        self.project_name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainAndEvalJob {
    pub project_name: String,
}

impl Job for TrainAndEvalJob {
    const KIND: JobKind = JobKind::TrainAndEval;

    fn project_name(&self) -> String {
        self.project_name.clone()
    }
}

/// Report for one project; `project_name` is the plain name, not the full one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportJob {
    pub username: String,
    pub project_name: String,
}

impl Job for ReportJob {
    const KIND: JobKind = JobKind::Report;

    fn project_name(&self) -> String {
        format!("{}_{}", self.username, self.project_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_job_files_under_full_name() {
        let job = ReportJob {
            username: "alice".into(),
            project_name: "proj1".into(),
        };
        assert_eq!(job.project_name(), "alice_proj1");
        assert_eq!(ReportJob::KIND, JobKind::Report);
    }
}
