//! Task result records: the normalized payload every executor returns, success
//! or failure.
//!
//! The record is a tagged union. `kind` is set by the executor that built it,
//! so consumers never have to guess the job kind from which keys are present.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Failure,
}

/// Captured output of one external process run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.return_code == 0
    }
}

/// Kind-specific part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobDetail {
    Prep {
        data_prep_module: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run: Option<ProcessOutput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<PathBuf>,
    },
    TrainAndEval {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        train: Option<ProcessOutput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eval: Option<ProcessOutput>,
        /// TRAIN session the evaluation was pointed at.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        train_session: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<PathBuf>,
    },
    #[serde(rename = "sweetviz")]
    Report {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_path: Option<PathBuf>,
    },
}

impl JobDetail {
    /// Detail with nothing filled in, used when a job never got far enough to
    /// produce output.
    pub fn empty(kind: JobKind) -> Self {
        match kind {
            JobKind::Prep => JobDetail::Prep {
                data_prep_module: "standard".to_string(),
                run: None,
                output_path: None,
            },
            JobKind::TrainAndEval => JobDetail::TrainAndEval {
                train: None,
                eval: None,
                train_session: None,
                output_path: None,
            },
            JobKind::Report => JobDetail::Report { report_path: None },
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobDetail::Prep { .. } => JobKind::Prep,
            JobDetail::TrainAndEval { .. } => JobKind::TrainAndEval,
            JobDetail::Report { .. } => JobKind::Report,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub status: RecordStatus,
    pub project_name: String,

    #[serde(flatten)]
    pub detail: JobDetail,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set when the queue gave up after the last allowed attempt, as opposed to
    /// a business failure reported by the executor itself.
    #[serde(default)]
    pub retries_exhausted: bool,

    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    pub fn success(project_name: impl Into<String>, detail: JobDetail, at: DateTime<Utc>) -> Self {
        Self {
            status: RecordStatus::Success,
            project_name: project_name.into(),
            detail,
            error: None,
            retries_exhausted: false,
            timestamp: at,
        }
    }

    pub fn failure(
        project_name: impl Into<String>,
        detail: JobDetail,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: RecordStatus::Failure,
            project_name: project_name.into(),
            detail,
            error: Some(error.into()),
            retries_exhausted: false,
            timestamp: at,
        }
    }

    /// Failure record stored by the queue once the retry budget is spent.
    pub fn exhausted(
        kind: JobKind,
        project_name: impl Into<String>,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::failure(project_name, JobDetail::empty(kind), error, at);
        record.retries_exhausted = true;
        record
    }

    pub fn kind(&self) -> JobKind {
        self.detail.kind()
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}
