//! ProcessRunner port - external command execution.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::ProcessOutput;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn `{command}` in {}: {source}", .dir.display())]
    Spawn {
        command: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs one command string to completion.
///
/// A non-zero exit code is not an error: it comes back in
/// [`ProcessOutput::return_code`] for the caller to inspect.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &str, working_dir: &Path) -> Result<ProcessOutput, RunnerError>;
}
