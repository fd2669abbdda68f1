//! Script runner for `script` tasks.
//!
//! Runs the script body as `<runtime> -c <script>` in a fresh child process:
//! - Arguments are passed as a vector, never through a shell
//! - stdin is closed; stdout and stderr are captured as text
//! - A wall-clock timeout kills and reaps the child
//!
//! This is a time bound, not a security boundary. The child inherits the
//! worker's user, environment, filesystem and network access.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::SandboxConfig;
use crate::error::ExecutionError;
use crate::executors::decode_params;
use crate::task::{Params, TaskResult};

/// Default cap on captured bytes per stream (64KB).
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Timeout used when the task does not specify one.
const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// Result message for a script killed on timeout.
pub const TIMEOUT_MESSAGE: &str = "script execution timed out";

const KIND: &str = "script";

#[derive(Debug, Deserialize)]
struct ScriptParams {
    #[serde(default)]
    script: String,
    #[serde(default = "default_timeout")]
    timeout: f64,
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

/// What happened to a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Completed {
        stdout: String,
        stderr: String,
        returncode: i32,
    },
    TimedOut,
}

impl From<ScriptOutcome> for TaskResult {
    fn from(outcome: ScriptOutcome) -> Self {
        match outcome {
            ScriptOutcome::Completed {
                stdout,
                stderr,
                returncode,
            } => TaskResult::new()
                .with("stdout", stdout)
                .with("stderr", stderr)
                .with("returncode", returncode),
            ScriptOutcome::TimedOut => TaskResult::error(TIMEOUT_MESSAGE),
        }
    }
}

/// Runs scripts under a fixed interpreter.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// Interpreter binary.
    program: String,
    /// Arguments placed before the script body.
    args: Vec<String>,
    /// Ceiling for any requested timeout.
    max_timeout: Duration,
    /// Bytes kept per stream; the rest is read and counted, not stored.
    max_output_bytes: usize,
}

impl ScriptRunner {
    /// Runner invoking `<runtime> -c <script>`.
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            program: config.runtime.clone(),
            args: vec!["-c".to_string()],
            max_timeout: config.max_timeout,
            max_output_bytes: MAX_OUTPUT_SIZE,
        }
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Override the interpreter and its leading arguments.
    pub fn with_program(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    /// Run a `script` task from its raw params.
    pub async fn run_task(&self, params: &Params) -> Result<TaskResult, ExecutionError> {
        let p: ScriptParams = decode_params(KIND, params)?;
        let timeout = self.effective_timeout(p.timeout)?;
        Ok(self.run(&p.script, timeout).await?.into())
    }

    /// Clamp a requested timeout (seconds) to the configured ceiling.
    fn effective_timeout(&self, secs: f64) -> Result<Duration, ExecutionError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ExecutionError::InvalidParams {
                kind: KIND,
                reason: format!("timeout must be a non-negative number of seconds, got {secs}"),
            });
        }
        let requested = Duration::try_from_secs_f64(secs).unwrap_or(self.max_timeout);
        if requested > self.max_timeout {
            tracing::warn!(
                requested_secs = secs,
                max_secs = self.max_timeout.as_secs_f64(),
                "Script timeout clamped"
            );
            return Ok(self.max_timeout);
        }
        Ok(requested)
    }

    /// Execute a script body, capturing output, bounded by `timeout`.
    pub async fn run(&self, script: &str, timeout: Duration) -> Result<ScriptOutcome, ExecutionError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            ExecutionError::Spawn(format!("{}: {}", self.program, e))
        })?;

        // Drain both pipes concurrently so a chatty child can't block on a full pipe.
        let limit = self.max_output_bytes;
        let stdout_reader = child.stdout.take().map(|out| spawn_reader(out, limit));
        let stderr_reader = child.stderr.take().map(|err| spawn_reader(err, limit));
        let readers: Vec<AbortHandle> = stdout_reader
            .iter()
            .chain(stderr_reader.iter())
            .map(JoinHandle::abort_handle)
            .collect();

        // Output collection counts against the timeout too: a backgrounded
        // grandchild can hold the pipes open after the child exits.
        let run = async {
            let status = child.wait().await?;
            let stdout = collect(stdout_reader).await;
            let stderr = collect(stderr_reader).await;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        };
        let waited = tokio::time::timeout(timeout, run).await;

        match waited {
            Ok(finished) => {
                let (status, stdout, stderr) = finished?;
                Ok(ScriptOutcome::Completed {
                    stdout,
                    stderr,
                    returncode: returncode(status),
                })
            }
            Err(_) => {
                // kill() also waits, so the child is reaped here.
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out script");
                }
                readers.iter().for_each(AbortHandle::abort);
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Script timed out");
                Ok(ScriptOutcome::TimedOut)
            }
        }
    }
}

/// Exit code, or the negated signal number for a child killed by a signal.
fn returncode(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

/// Read a stream to EOF, keeping at most `limit` bytes of it.
fn spawn_reader<R>(mut stream: R, limit: usize) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let take = limit.saturating_sub(kept.len()).min(n);
            kept.extend_from_slice(&chunk[..take]);
            dropped += n - take;
        }
        decode_captured(kept, dropped)
    })
}

/// Decode captured bytes, marking how much was cut off.
fn decode_captured(mut bytes: Vec<u8>, mut dropped: usize) -> String {
    if dropped == 0 {
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    // The cut can land inside a multi-byte character.
    let partial = incomplete_tail(&bytes);
    bytes.truncate(bytes.len() - partial);
    dropped += partial;
    format!(
        "{}\n... [truncated {dropped} bytes]",
        String::from_utf8_lossy(&bytes)
    )
}

/// Length of an unfinished UTF-8 sequence at the end of `bytes`, if any.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(4);
    let Some(lead) = bytes[start..].iter().rposition(|b| b & 0xC0 != 0x80) else {
        return 0;
    };
    match std::str::from_utf8(&bytes[start + lead..]) {
        Err(e) if e.error_len().is_none() => bytes.len() - (start + lead),
        _ => 0,
    }
}

async fn collect(reader: Option<JoinHandle<String>>) -> String {
    match reader {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}
