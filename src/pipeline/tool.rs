//! External program execution.
//!
//! Every converter, compiler and bibliography pass goes through a
//! [`ToolRunner`]. The default [`ProcessRunner`] spawns a real child process;
//! tests and embedders can supply their own implementation through
//! [`crate::config::BuildConfigBuilder::runner`].
//!
//! ## Bounded waits
//!
//! TeX engines stop and wait for terminal input on some errors, and a wedged
//! converter would otherwise block the build forever. Each invocation carries
//! a timeout; when it expires the child is killed (`kill_on_drop`) and the
//! call fails with [`BuildError::TimedOut`].

use crate::error::{BuildError, Tool};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// A fully described external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory. `None` inherits the caller's.
    pub cwd: Option<PathBuf>,
    /// Text fed on standard input. `None` closes stdin immediately.
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(tool: Tool, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            timeout,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external programs on behalf of the pipeline.
///
/// Implementations return `Ok` for any program that ran to completion,
/// whatever its exit status; judging the status is the caller's job. `Err` is
/// reserved for programs that could not be started or did not finish in time.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, BuildError>;
}

/// Spawns real child processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, BuildError> {
        let start = Instant::now();
        debug!(
            "Running {} {} (timeout {}s)",
            invocation.program,
            invocation.args.join(" "),
            invocation.timeout.as_secs()
        );

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = invocation.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| unavailable(invocation, e))?;

        // Feed stdin from its own task so a child that fills its stdout pipe
        // before draining stdin cannot deadlock us.
        let writer = match (child.stdin.take(), invocation.stdin.clone()) {
            (Some(mut pipe), Some(text)) => Some(tokio::spawn(async move {
                let result = pipe.write_all(text.as_bytes()).await;
                drop(pipe);
                result
            })),
            _ => None,
        };

        let output = tokio::time::timeout(invocation.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(
                    "{} '{}' exceeded {}s, killed",
                    invocation.tool,
                    invocation.program,
                    invocation.timeout.as_secs()
                );
                BuildError::TimedOut {
                    tool: invocation.tool,
                    secs: invocation.timeout.as_secs(),
                }
            })?
            .map_err(|e| unavailable(invocation, e))?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The child may legitimately exit without reading all input.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => warn!("Writing stdin of {} failed: {e}", invocation.program),
                Err(e) => warn!("Stdin writer task for {} panicked: {e}", invocation.program),
            }
        }

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(
            "{} exited with {:?} after {}ms",
            invocation.program, result.exit_code, result.duration_ms
        );
        Ok(result)
    }
}

fn unavailable(invocation: &Invocation, source: std::io::Error) -> BuildError {
    BuildError::ToolUnavailable {
        tool: invocation.tool,
        program: invocation.program.clone(),
        source,
    }
}
