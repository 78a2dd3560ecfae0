// crates/test-gate-sandbox/src/process.rs
// ============================================================================
// Module: Test Gate Process Sandbox
// Description: Child-process sandbox runner with deadlines and cancellation.
// Purpose: Execute toolchain commands against an artifact under hard limits.
// Dependencies: async-trait, thiserror, tokio, test-gate-core
// ============================================================================

//! ## Overview
//! Each run creates a [`ScratchDir`], writes the artifact into it, and runs
//! the language's commands one after another. The whole run shares one
//! deadline. Children get a cleared environment (only `PATH`, `HOME` set to
//! the scratch directory, and `LANG`), a null stdin, and are spawned with
//! `kill_on_drop`. On unix each child leads its own process group. On timeout
//! or cancellation the whole group is killed and the child reaped before the
//! scratch directory is removed, so background processes started by a test
//! do not outlive the run.
//!
//! Output is captured as a bounded tail per stream so a noisy artifact
//! cannot exhaust memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use test_gate_core::CancelSignal;
use test_gate_core::SandboxLimits;
use test_gate_core::SandboxOutcome;
use test_gate_core::SandboxRequest;
use test_gate_core::SandboxRunner;
use test_gate_core::SandboxStatus;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;

use crate::toolchain::CommandTemplate;
use crate::toolchain::Toolchains;
use crate::workspace::ScratchDir;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cap on captured bytes per output stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Read buffer size for output pipes.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Locale passed to child processes.
const CHILD_LANG: &str = "C.UTF-8";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Internal sandbox setup failures, reported as `failed` outcomes.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// No toolchain is configured for the artifact language.
    #[error("no toolchain configured for language {0}")]
    MissingToolchain(String),
    /// Scratch directory or source file could not be prepared.
    #[error("sandbox workspace error: {0}")]
    Workspace(std::io::Error),
    /// A toolchain command could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Spawn error.
        source: std::io::Error,
    },
    /// Waiting on a child process failed.
    #[error("failed to wait for {program}: {source}")]
    Wait {
        /// Program being awaited.
        program: String,
        /// Wait error.
        source: std::io::Error,
    },
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Process sandbox configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSandboxConfig {
    /// Toolchains per language.
    pub toolchains: Toolchains,
    /// Whether the `run` command executes after a successful check.
    pub run_tests: bool,
    /// Directory under which scratch directories are created.
    pub scratch_root: Option<PathBuf>,
    /// Cap on captured bytes per output stream.
    pub max_output_bytes: usize,
}

impl Default for ProcessSandboxConfig {
    fn default() -> Self {
        Self {
            toolchains: Toolchains::default(),
            run_tests: false,
            scratch_root: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Sandbox
// ============================================================================

/// Sandbox runner backed by child processes.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    /// Sandbox configuration.
    config: ProcessSandboxConfig,
}

/// Terminal state of one command.
enum CommandEnd {
    /// The command exited on its own.
    Exited {
        /// Exit status.
        status: ExitStatus,
        /// Captured stdout tail.
        stdout: Vec<u8>,
        /// Captured stderr tail.
        stderr: Vec<u8>,
    },
    /// The deadline elapsed and the child was killed.
    TimedOut,
    /// Cancellation fired and the child was killed.
    Cancelled,
}

impl ProcessSandbox {
    /// Creates a sandbox runner.
    #[must_use]
    pub const fn new(config: ProcessSandboxConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the sandbox configuration.
    #[must_use]
    pub const fn config(&self) -> &ProcessSandboxConfig {
        &self.config
    }

    /// Runs every toolchain command for the request.
    async fn execute(
        &self,
        request: &SandboxRequest,
        limits: &SandboxLimits,
        cancel: &mut CancelSignal,
        started: Instant,
    ) -> Result<SandboxOutcome, SandboxError> {
        let toolchain = self
            .config
            .toolchains
            .get(&request.language)
            .ok_or_else(|| SandboxError::MissingToolchain(request.language.to_string()))?;
        let commands = toolchain.commands(self.config.run_tests);
        if commands.is_empty() {
            return Err(SandboxError::MissingToolchain(request.language.to_string()));
        }
        let scratch = ScratchDir::create(self.config.scratch_root.as_deref()).map_err(SandboxError::Workspace)?;
        let file = scratch.write_source(&request.file_name, &request.source_text).map_err(SandboxError::Workspace)?;
        let deadline = TokioInstant::now() + limits.timeout;

        let mut outcome = SandboxOutcome::new(SandboxStatus::Passed, 0);
        for template in commands {
            let end = self.run_command(template, &file, scratch.path(), limits, deadline, cancel).await?;
            match end {
                CommandEnd::TimedOut => {
                    outcome.status = SandboxStatus::TimedOut;
                    outcome.stderr = format!("sandbox timed out after {} ms", limits.timeout.as_millis());
                    break;
                }
                CommandEnd::Cancelled => {
                    outcome.status = SandboxStatus::Cancelled;
                    break;
                }
                CommandEnd::Exited {
                    status,
                    stdout,
                    stderr,
                } => {
                    outcome.stdout = String::from_utf8_lossy(&stdout).into_owned();
                    outcome.stderr = String::from_utf8_lossy(&stderr).into_owned();
                    outcome.exit_code = status.code();
                    if !status.success() {
                        outcome.status = SandboxStatus::Failed;
                        break;
                    }
                }
            }
        }
        outcome.duration_ms = elapsed_ms(started);
        drop(scratch);
        Ok(outcome)
    }

    /// Spawns one command and waits for exit, deadline, or cancellation.
    async fn run_command(
        &self,
        template: &CommandTemplate,
        file: &Path,
        dir: &Path,
        limits: &SandboxLimits,
        deadline: TokioInstant,
        cancel: &mut CancelSignal,
    ) -> Result<CommandEnd, SandboxError> {
        let Some((program, args)) = template.render(file, dir) else {
            return Err(SandboxError::Spawn {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };
        let mut command = build_command(&program, &args, dir, limits);
        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            program: program.clone(),
            source,
        })?;
        let group = child.id();
        let cap = self.config.max_output_bytes;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(read_tail(stdout, cap));
        let stderr_task = tokio::spawn(read_tail(stderr, cap));

        let status = tokio::select! {
            status = child.wait() => status,
            () = tokio::time::sleep_until(deadline) => {
                abandon(&mut child, group, [stdout_task, stderr_task]).await;
                return Ok(CommandEnd::TimedOut);
            }
            () = cancel.cancelled() => {
                abandon(&mut child, group, [stdout_task, stderr_task]).await;
                return Ok(CommandEnd::Cancelled);
            }
        };
        let status = status.map_err(|source| SandboxError::Wait {
            program,
            source,
        })?;
        let stdout = collect(stdout_task, deadline).await;
        let stderr = collect(stderr_task, deadline).await;
        Ok(CommandEnd::Exited {
            status,
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl SandboxRunner for ProcessSandbox {
    async fn run(
        &self,
        request: &SandboxRequest,
        limits: &SandboxLimits,
        mut cancel: CancelSignal,
    ) -> SandboxOutcome {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return SandboxOutcome::new(SandboxStatus::Cancelled, 0);
        }
        match self.execute(request, limits, &mut cancel, started).await {
            Ok(outcome) => outcome,
            Err(err) => SandboxOutcome::failed(err.to_string(), elapsed_ms(started)),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a child command with a cleared environment and optional memory cap.
fn build_command(program: &str, args: &[String], dir: &Path, limits: &SandboxLimits) -> Command {
    let mut command = match limits.memory_limit_bytes.filter(|_| cfg!(unix)) {
        Some(bytes) => {
            let kib = (bytes / 1024).max(1);
            let mut shell = Command::new("sh");
            shell.arg("-c").arg(format!("ulimit -v {kib} && exec \"$0\" \"$@\"")).arg(program).args(args);
            shell
        }
        None => {
            let mut direct = Command::new(program);
            direct.args(args);
            direct
        }
    };
    command
        .current_dir(dir)
        .env_clear()
        .env("PATH", host_path())
        .env("HOME", dir)
        .env("LANG", CHILD_LANG)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    command
}

/// Returns the host `PATH` so toolchains resolve as they do for the operator.
fn host_path() -> OsString {
    std::env::var_os("PATH").unwrap_or_else(|| OsString::from("/usr/local/bin:/usr/bin:/bin"))
}

/// Kills the child's process group, reaps the child, then stops its readers.
async fn abandon(child: &mut Child, group: Option<u32>, readers: [JoinHandle<Vec<u8>>; 2]) {
    if let Some(group) = group {
        kill_group(group).await;
    }
    if !matches!(child.try_wait(), Ok(Some(_))) {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
    for reader in readers {
        reader.abort();
    }
}

/// Sends `SIGKILL` to every process in the group led by `leader`.
#[cfg(unix)]
async fn kill_group(leader: u32) {
    let _ = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{leader}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

/// Process groups are unix-only; the direct child is still killed.
#[cfg(not(unix))]
async fn kill_group(_leader: u32) {}

/// Awaits an output reader until the deadline; leftover writers are ignored.
async fn collect(mut reader: JoinHandle<Vec<u8>>, deadline: TokioInstant) -> Vec<u8> {
    match tokio::time::timeout_at(deadline, &mut reader).await {
        Ok(result) => result.unwrap_or_default(),
        Err(_) => {
            reader.abort();
            Vec::new()
        }
    }
}

/// Reads a stream to the end, keeping at most the last `cap` bytes.
async fn read_tail<R>(reader: Option<R>, cap: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    let mut tail = Vec::new();
    let mut buffer = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                tail.extend_from_slice(&buffer[.. read]);
                if tail.len() > cap {
                    let excess = tail.len() - cap;
                    tail.drain(.. excess);
                }
            }
        }
    }
    tail
}

/// Returns milliseconds elapsed since `started`.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[tokio::test]
    async fn read_tail_keeps_last_bytes() {
        let data: &[u8] = b"0123456789";
        let tail = read_tail(Some(data), 4).await;
        assert_eq!(tail, b"6789");
    }

    #[tokio::test]
    async fn read_tail_without_stream_is_empty() {
        let tail = read_tail::<&[u8]>(None, 4).await;
        assert!(tail.is_empty());
    }
}
