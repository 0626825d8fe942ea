//! Task executors: the background units of work behind each job kind.
//!
//! Executors implement [`Handler`](crate::typed::Handler) for their job
//! payload. They return a [`ResultRecord`] for every outcome they can
//! describe (including business failures such as an unknown project) and
//! raise [`JobError`] only for faults worth retrying.

pub mod prep;
pub mod report;
pub mod train_eval;

use std::path::{Path, PathBuf};

pub use self::prep::DataPrepExecutor;
pub use self::report::{RenderError, ReportExecutor};
pub use self::train_eval::TrainAndEvalExecutor;

use crate::app::sessions::Session;
use crate::config::OrchestratorConfig;
use crate::domain::{JobError, Project, ProjectRef, ResultRecord};
use crate::ports::ProjectStore;

/// Module name passed to every runner stage.
pub const STANDARD_MODULE: &str = "standard";

/// Command lines for the external runner.
#[derive(Debug, Clone)]
pub struct RunnerInvocation {
    command: String,
    dir: PathBuf,
}

impl RunnerInvocation {
    pub fn new(command: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            dir: dir.into(),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(&config.runner_command, &config.runner_dir)
    }

    /// Working directory of every invocation.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_prep(&self, project: &str) -> String {
        format!(
            "{} --project {project} --data_prep_module {STANDARD_MODULE}",
            self.command
        )
    }

    pub fn train(&self, project: &str) -> String {
        format!(
            "{} --project {project} --train_module {STANDARD_MODULE}",
            self.command
        )
    }

    pub fn eval(&self, project: &str, session: &Session) -> String {
        format!(
            "{} --project {project} --eval_module {STANDARD_MODULE} --session \"{session}\"",
            self.command
        )
    }
}

pub(crate) enum ProjectLookup {
    Found(ProjectRef, Project),
    /// Carries the error text for the failure record.
    Missing(String),
}

/// Parse a full `{owner}_{project}` name and load the project.
pub(crate) async fn lookup_full_name(
    projects: &dyn ProjectStore,
    full_name: &str,
) -> Result<ProjectLookup, JobError> {
    let reference = match ProjectRef::parse_full_name(full_name) {
        Ok(reference) => reference,
        Err(e) => return Ok(ProjectLookup::Missing(e.to_string())),
    };
    lookup(projects, reference).await
}

pub(crate) async fn lookup(
    projects: &dyn ProjectStore,
    reference: ProjectRef,
) -> Result<ProjectLookup, JobError> {
    match projects.find(&reference).await? {
        Some(project) => Ok(ProjectLookup::Found(reference, project)),
        None => {
            tracing::error!(project = %reference, "project not found");
            Ok(ProjectLookup::Missing(format!("Project not found: {reference}")))
        }
    }
}

/// `path` made absolute against the current directory, unchanged on error.
pub(crate) fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

pub(crate) fn log_record(record: &ResultRecord) {
    if record.is_success() {
        tracing::info!(project = %record.project_name, kind = %record.kind(), "job finished");
    } else {
        tracing::warn!(
            project = %record.project_name,
            kind = %record.kind(),
            error = record.error.as_deref().unwrap_or(""),
            "job finished with failure"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators shared by executor tests.

    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::ProcessOutput;
    use crate::ports::{ProcessRunner, RunnerError};

    type SideEffect = Box<dyn Fn(&str, &Path) + Send + Sync>;

    pub(crate) enum Step {
        Exit(i32),
        SpawnError,
    }

    /// Runner that plays back scripted exits and records every command.
    /// Once the script runs out every call exits 0.
    pub(crate) struct ScriptedRunner {
        steps: Mutex<VecDeque<Step>>,
        commands: Mutex<Vec<String>>,
        side_effect: Option<SideEffect>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
                commands: Mutex::new(Vec::new()),
                side_effect: None,
            }
        }

        pub(crate) fn always_ok() -> Self {
            Self::new([])
        }

        /// Called with each command before it "exits 0".
        pub(crate) fn on_success(mut self, f: impl Fn(&str, &Path) + Send + Sync + 'static) -> Self {
            self.side_effect = Some(Box::new(f));
            self
        }

        pub(crate) fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(&self, command: &str, working_dir: &Path) -> Result<ProcessOutput, RunnerError> {
            self.commands.lock().unwrap().push(command.to_string());
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Exit(0));
            match step {
                Step::SpawnError => Err(RunnerError::Spawn {
                    command: command.to_string(),
                    dir: working_dir.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "conda: not found"),
                }),
                Step::Exit(code) => {
                    if code == 0 {
                        if let Some(f) = &self.side_effect {
                            f(command, working_dir);
                        }
                    }
                    Ok(ProcessOutput {
                        stdout: format!("ran: {command}"),
                        stderr: if code == 0 { String::new() } else { "boom".to_string() },
                        return_code: code,
                    })
                }
            }
        }
    }
}
