//! Command Executor
//!
//! This module runs an authorized command in a fresh subprocess and reports
//! its real exit status. It implements optional output capture, timeout
//! handling, interrupt handling and cleanup of every transient resource.

use super::capture::CaptureSpool;
use super::process_group;
use super::timeout::ExecutionTimeout;
use crate::error::{GuardError, Result, EXIT_INTERNAL};
use crate::policy::AllowedCommand;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Instant;
use tokio::process::{Child, Command as TokioCommand};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Default shell used to interpret the command string
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Maximum captured output size per stream in bytes (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Exit code reported when the timeout kills the command (as `timeout(1)` does)
pub const EXIT_TIMEOUT: i32 = 124;

/// Exit code reported when an interrupt kills the command (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Result of a single execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code to propagate
    pub exit_code: i32,

    /// Whether stdout was captured instead of inherited
    pub stdout_captured: bool,

    /// Whether stderr was captured instead of inherited
    pub stderr_captured: bool,

    /// Captured standard output (truncated if too large)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Captured standard error (truncated if too large)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Execution duration in milliseconds
    pub duration_ms: f64,

    /// Whether the timeout killed the command
    pub timed_out: bool,

    /// Whether an interrupt killed the command
    pub interrupted: bool,

    /// When the subprocess was started
    pub started_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.timed_out {
            format!("Timeout after {:.0}ms", self.duration_ms)
        } else if self.interrupted {
            format!("Interrupted after {:.0}ms", self.duration_ms)
        } else if self.success() {
            format!("Success (exit code: 0, {:.0}ms)", self.duration_ms)
        } else {
            format!(
                "Failed (exit code: {}, {:.0}ms)",
                self.exit_code, self.duration_ms
            )
        }
    }
}

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock limit (default: none)
    pub timeout: Option<ExecutionTimeout>,

    /// Capture stdout/stderr instead of inheriting them (default: false)
    pub capture: bool,

    /// Maximum captured size per stream in bytes (default: 1MB)
    pub max_output_size: usize,

    /// Working directory for the command (default: current directory)
    pub working_dir: Option<PathBuf>,

    /// Shell that interprets the command string (default: /bin/sh)
    pub shell: String,

    /// Kill the command when this process receives Ctrl-C (default: true)
    pub handle_interrupt: bool,

    /// Directory for capture spool files (default: system temp dir)
    pub spool_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            capture: false,
            max_output_size: MAX_OUTPUT_SIZE,
            working_dir: None,
            shell: DEFAULT_SHELL.to_string(),
            handle_interrupt: true,
            spool_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Set a timeout in seconds; zero disables it
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = ExecutionTimeout::from_secs(timeout_secs);
        self
    }

    /// Capture output into spool files
    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    /// Whether the child gets its own process group
    ///
    /// A separate group lets timeout and interrupt kill every descendant, but
    /// takes the child out of the terminal's foreground group. With a terminal
    /// on stdin and no timeout the child stays in ours, so Ctrl-C typed at
    /// the terminal reaches it directly and it can still read input.
    fn isolate_group(&self) -> bool {
        self.timeout.is_some() || !std::io::stdin().is_terminal()
    }
}

/// How the wait on the child ended
enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Interrupted,
}

/// Runs authorized commands
///
/// The executor never re-checks the command: classification already happened
/// when the [`AllowedCommand`] was issued. The command string is handed to
/// `<shell> -c` unchanged.
///
/// # Example
///
/// ```no_run
/// use shell_guard::policy::{Mode, PatternLibrary, PolicyEngine};
/// use shell_guard::tools::{CommandExecutor, ExecutorConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let engine = PolicyEngine::new(PatternLibrary::default())?;
///     let allowed = engine.authorize("ls -la", Mode::Safe)?;
///
///     let executor = CommandExecutor::new(ExecutorConfig::default().with_capture(true));
///     let result = executor.execute(&allowed).await?;
///     println!("{}", result.summary());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute an authorized command and wait for it to finish
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Spawn`] if the shell cannot be started, and
    /// [`GuardError::Io`] if supervising the child or its capture spool fails.
    /// A command that runs and exits non-zero is not an error.
    pub async fn execute(&self, command: &AllowedCommand) -> Result<ExecutionResult> {
        let span = info_span!(
            "execute",
            invocation = %Uuid::new_v4(),
            mode = %command.mode(),
        );
        self.execute_inner(command).instrument(span).await
    }

    async fn execute_inner(&self, command: &AllowedCommand) -> Result<ExecutionResult> {
        // Dropped on every return path below, removing the spool files
        let spool = if self.config.capture {
            Some(CaptureSpool::new(
                self.config.max_output_size,
                self.config.spool_dir.as_deref(),
            )?)
        } else {
            None
        };

        let mut process = TokioCommand::new(&self.config.shell);
        process.arg("-c").arg(command.as_str()).kill_on_drop(true);

        let isolated = self.config.isolate_group();
        if isolated {
            process_group::isolate(&mut process);
        }

        if let Some(ref dir) = self.config.working_dir {
            process.current_dir(dir);
        }

        if let Some(ref spool) = spool {
            let (stdout, stderr) = spool.stdio()?;
            process.stdout(stdout);
            process.stderr(stderr);
        }

        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = process.spawn().map_err(|source| GuardError::Spawn {
            shell: self.config.shell.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), isolated, "Spawned {}", self.config.shell);
        // the leader's pid doubles as the group id
        let group = if isolated { child.id() } else { None };

        let outcome = self.wait(&mut child).await?;

        let (exit_code, timed_out, interrupted) = match outcome {
            WaitOutcome::Exited(status) => (exit_code_of(&status), false, false),
            WaitOutcome::TimedOut => {
                warn!("Command timed out after {:?}", self.timeout_duration());
                reap(&mut child, group).await?;
                (EXIT_TIMEOUT, true, false)
            }
            WaitOutcome::Interrupted => {
                warn!("Interrupted, terminating command");
                reap(&mut child, group).await?;
                (EXIT_INTERRUPTED, false, true)
            }
        };

        let duration = start.elapsed();
        let captured = match spool {
            Some(ref spool) => Some(spool.collect()?),
            None => None,
        };

        let result = ExecutionResult {
            exit_code,
            stdout_captured: captured.is_some(),
            stderr_captured: captured.is_some(),
            stdout: captured.as_ref().map(|c| c.stdout.clone()),
            stderr: captured.map(|c| c.stderr),
            duration_ms: duration.as_secs_f64() * 1000.0,
            timed_out,
            interrupted,
            started_at,
        };

        info!("{}", result.summary());
        Ok(result)
    }

    /// Wait for the child, racing the optional timeout and Ctrl-C
    async fn wait(&self, child: &mut Child) -> Result<WaitOutcome> {
        let timeout = self.config.timeout;
        let exited = async {
            match timeout {
                Some(timeout) => match timeout.run(child.wait()).await {
                    Some(status) => status.map(WaitOutcome::Exited),
                    None => Ok(WaitOutcome::TimedOut),
                },
                None => child.wait().await.map(WaitOutcome::Exited),
            }
        };

        if !self.config.handle_interrupt {
            return Ok(exited.await?);
        }

        tokio::select! {
            outcome = exited => Ok(outcome?),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                Ok(WaitOutcome::Interrupted)
            }
        }
    }

    fn timeout_duration(&self) -> Option<std::time::Duration> {
        self.config.timeout.map(|t| t.duration())
    }
}

/// Kill the child (and its group, if it leads one) and wait for it, so no
/// zombie or orphan is left behind
async fn reap(child: &mut Child, group: Option<u32>) -> Result<()> {
    if let Some(pgid) = group {
        process_group::kill_group(pgid)?;
    }
    if let Err(err) = child.start_kill() {
        // already exited between the race and the kill
        debug!("kill skipped: {}", err);
    }
    child.wait().await?;
    Ok(())
}

/// Map an exit status to the code the front-end propagates
fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    EXIT_INTERNAL
}
