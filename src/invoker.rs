//! Running the diagnostic tool under a deadline.
//!
//! `CommandSource` spawns the configured program and captures its standard
//! output. `run_diagnostic_tool` bounds any `StatsSource` with a deadline and
//! splits the captured text into lines. A missed deadline is reported as
//! `InvokeError::Timeout`, which callers treat as recoverable; every other
//! variant means the tool or its environment is broken.

use crate::core::StatsSource;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

/// The deadline applied to a single tool invocation unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("command did not finish within {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("'{program}' wrote non UTF-8 output")]
    InvalidOutput { program: String },
}

impl InvokeError {
    /// Whether the error is the expected, recoverable deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::Timeout(_))
    }
}

/// A `StatsSource` backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl StatsSource for CommandSource {
    fn name(&self) -> &str {
        &self.program
    }

    async fn fetch(&self) -> Result<String, InvokeError> {
        trace!(program = %self.program, args = ?self.args, "Spawning stats command");
        // The child is killed if this future is dropped at the deadline.
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| InvokeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(InvokeError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| InvokeError::InvalidOutput {
            program: self.program.clone(),
        })
    }
}

/// Fetches one dump from `source`, giving up after `deadline`.
///
/// # Returns
/// * `Ok(lines)` with the output split on `\n` or `\r\n`; empty output gives
///   an empty vector
/// * `Err(InvokeError::Timeout)` if the deadline elapsed first
/// * any other `Err` the source produced
pub async fn run_diagnostic_tool(
    source: &dyn StatsSource,
    deadline: Duration,
) -> Result<Vec<String>, InvokeError> {
    let output = tokio::time::timeout(deadline, source.fetch())
        .await
        .map_err(|_| InvokeError::Timeout(deadline))??;

    let lines: Vec<String> = output.lines().map(str::to_string).collect();
    debug!(source = source.name(), lines = lines.len(), "Stats command finished");
    Ok(lines)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandSource {
        CommandSource::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_captures_lines_in_order() {
        let source = shell("printf 'cpu=0 found=1\\ncpu=1 found=2\\r\\n'");
        let lines = run_diagnostic_tool(&source, DEFAULT_TIMEOUT).await.unwrap();
        assert_eq!(lines, vec!["cpu=0 found=1", "cpu=1 found=2"]);
    }

    #[tokio::test]
    async fn test_empty_output_is_not_an_error() {
        let source = shell("true");
        let lines = run_diagnostic_tool(&source, DEFAULT_TIMEOUT).await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let source = shell("sleep 5");
        let deadline = Duration::from_millis(100);
        let err = run_diagnostic_tool(&source, deadline).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, InvokeError::Timeout(d) if d == deadline));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported_with_stderr() {
        let source = shell("echo 'table missing' >&2; exit 3");
        let err = run_diagnostic_tool(&source, DEFAULT_TIMEOUT).await.unwrap_err();
        match err {
            InvokeError::Exit { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "table missing");
            }
            other => panic!("expected exit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let source = CommandSource::new("/nonexistent/conntrack", vec![]);
        let err = run_diagnostic_tool(&source, DEFAULT_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_rejected() {
        let source = shell("printf '\\377\\376'");
        let err = run_diagnostic_tool(&source, DEFAULT_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidOutput { .. }));
    }
}
