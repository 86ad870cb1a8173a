//! Bounded, cancellable subprocess execution

use super::ToolBinary;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Captured result of a finished tool run
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Whether the tool exited with status zero
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, if the process exited normally
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Standard error as trimmed text
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// One run of an external tool
///
/// The child is spawned with `kill_on_drop`, so whenever the run stops waiting
/// (time budget exceeded, token cancelled, or the future itself dropped because
/// the caller went away) the process is terminated.
#[derive(Debug)]
pub struct ToolInvocation {
    binary: ToolBinary,
    args: Vec<OsString>,
    timeout: Duration,
    cancel_token: CancellationToken,
}

impl ToolInvocation {
    /// Prepare a run of `binary`
    pub fn new(binary: ToolBinary, timeout: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            binary,
            args: Vec::new(),
            timeout,
            cancel_token,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments collected so far
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion
    pub async fn run(self) -> Result<ToolOutput> {
        self.run_with(|| {}).await
    }

    /// Run to completion, calling `on_spawn` once the child has started
    ///
    /// # Errors
    ///
    /// - [`Error::ToolUnavailable`] if the executable vanished since resolution
    /// - [`Error::TimedOut`] if the time budget ran out (child killed)
    /// - [`Error::Cancelled`] if the token fired first (child killed)
    /// - [`Error::Io`] for other spawn or wait failures
    ///
    /// A non-zero exit is not an error here; callers inspect [`ToolOutput`].
    pub async fn run_with(self, on_spawn: impl FnOnce()) -> Result<ToolOutput> {
        let tool = self.binary.name();

        tracing::debug!(tool, path = ?self.binary.path(), args = ?self.args, "spawning tool");

        let child = Command::new(self.binary.path())
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ToolUnavailable {
                    tool: tool.to_string(),
                },
                _ => Error::Io(e),
            })?;

        on_spawn();

        tokio::select! {
            output = child.wait_with_output() => {
                let output = ToolOutput::from(output?);
                tracing::debug!(tool, code = ?output.exit_code(), "tool exited");
                Ok(output)
            }
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!(tool, timeout = ?self.timeout, "tool timed out, killing");
                Err(Error::TimedOut {
                    tool: tool.to_string(),
                    timeout: self.timeout,
                })
            }
            _ = self.cancel_token.cancelled() => {
                tracing::info!(tool, "tool run cancelled, killing");
                Err(Error::Cancelled)
            }
        }
    }
}
