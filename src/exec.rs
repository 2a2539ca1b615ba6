//! External command execution and retry policy.
use std::process::{Command, Output};
use std::time::Duration;

use crate::error::ProcessLaunchError;
use crate::logging::Log;

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code; `-signal` when the process was killed on Unix.
    pub code: i32,
}

impl ExecResult {
    /// Whether the command exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: exit_code(output.status),
        }
    }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt as _;
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Executes external command lines.
///
/// The engine only talks to this trait, so tests can script command output
/// without spawning processes.
pub trait Executor: Send + Sync {
    /// Run `command_line` to completion and capture its output.
    ///
    /// A non-zero exit is returned as data, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessLaunchError`] if the executable cannot be spawned.
    fn run(&self, command_line: &str) -> Result<ExecResult, ProcessLaunchError>;
}

/// [`Executor`] backed by real processes.
///
/// The command line is split on whitespace only; there is no shell, quoting
/// or escaping.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, command_line: &str) -> Result<ExecResult, ProcessLaunchError> {
        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(ProcessLaunchError::new(
                command_line,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line"),
            ));
        };

        let output = Command::new(program)
            .args(parts)
            .output()
            .map_err(|e| ProcessLaunchError::new(command_line, e))?;

        Ok(ExecResult::from(output))
    }
}

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub count: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from a retry count and a delay in (possibly fractional)
    /// milliseconds. Negative or non-finite delays become zero.
    #[must_use]
    pub fn from_millis(count: u32, delay_ms: f64) -> Self {
        Self {
            count,
            delay: Duration::try_from_secs_f64(delay_ms / 1000.0).unwrap_or_default(),
        }
    }

    /// The delay expressed in milliseconds.
    #[must_use]
    pub fn delay_ms(&self) -> f64 {
        self.delay.as_secs_f64() * 1000.0
    }
}

/// Run `command_line`, retrying non-zero exits according to `policy`.
///
/// Performs at most `policy.count + 1` executions and returns the result of
/// the last one. Output of intermediate attempts is only logged.
///
/// # Errors
///
/// Returns [`ProcessLaunchError`] as soon as any attempt fails to launch.
pub fn run_with_retry(
    executor: &dyn Executor,
    command_line: &str,
    policy: RetryPolicy,
    log: &dyn Log,
) -> Result<ExecResult, ProcessLaunchError> {
    let mut result = executor.run(command_line)?;
    let mut retries_left = policy.count;

    while !result.success() && retries_left > 0 {
        log.debug(&format!(
            "attempt failed (exit {}): {}",
            result.code,
            result.stderr.trim()
        ));
        log.warn(&format!(
            "retrying sweep action in {}ms, {retries_left} retries left",
            policy.delay.as_millis()
        ));
        if !policy.delay.is_zero() {
            std::thread::sleep(policy.delay);
        }
        result = executor.run(command_line)?;
        retries_left -= 1;
    }

    Ok(result)
}
