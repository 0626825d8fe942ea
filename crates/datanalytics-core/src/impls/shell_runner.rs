//! Shell-backed process runner.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::domain::ProcessOutput;
use crate::ports::{ProcessRunner, RunnerError};

/// Runs command strings through `sh -c`, inheriting the environment.
///
/// stdin is closed; stdout and stderr are captured in full. There is no
/// timeout: the calling task waits for however long the child runs.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str, working_dir: &Path) -> Result<ProcessOutput, RunnerError> {
        tracing::info!(command, dir = %working_dir.display(), "running command");
        let start = Instant::now();

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                command: command.to_string(),
                dir: working_dir.to_path_buf(),
                source,
            })?;

        // Drain both pipes concurrently with wait() so a chatty child cannot
        // block on a full pipe.
        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let status = child.wait().await.map_err(|source| RunnerError::Wait {
            command: command.to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
        let output = ProcessOutput {
            stdout,
            stderr,
            return_code: status.code().unwrap_or(-1),
        };

        if output.succeeded() {
            tracing::debug!(
                command,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "command finished"
            );
        } else {
            tracing::error!(
                command,
                return_code = output.return_code,
                stderr = %output.stderr,
                "command exited with non-zero status"
            );
        }
        Ok(output)
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}
