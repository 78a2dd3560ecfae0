// crates/test-gate-sandbox/tests/process_sandbox.rs
// ============================================================================
// Module: Process Sandbox Tests
// Description: Exit mapping, deadlines, cancellation, and scratch cleanup.
// ============================================================================
//! ## Overview
//! Runs small POSIX shell artifacts through the process sandbox using an
//! `sh`-based toolchain so the tests need no language runtimes.

#![cfg(unix)]
#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use test_gate_core::ArtifactId;
use test_gate_core::CancelHandle;
use test_gate_core::CancelSignal;
use test_gate_core::Language;
use test_gate_core::SandboxLimits;
use test_gate_core::SandboxRequest;
use test_gate_core::SandboxRunner;
use test_gate_core::SandboxStatus;
use test_gate_sandbox::ProcessSandbox;
use test_gate_sandbox::ProcessSandboxConfig;
use test_gate_sandbox::ToolchainSpec;
use test_gate_sandbox::Toolchains;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn shell() -> Language {
    Language::Other("shell".to_string())
}

fn sandbox(scratch_root: &Path, max_output_bytes: usize) -> ProcessSandbox {
    let toolchains = Toolchains::empty().with(&shell(), ToolchainSpec::new(&["sh", "-n", "{file}"], &["sh", "{file}"]));
    ProcessSandbox::new(ProcessSandboxConfig {
        toolchains,
        run_tests: true,
        scratch_root: Some(scratch_root.to_path_buf()),
        max_output_bytes,
    })
}

fn request(language: Language, source: &str) -> SandboxRequest {
    SandboxRequest {
        artifact_id: ArtifactId::new("art-shell"),
        language,
        source_text: Arc::from(source),
        file_name: "artifact.sh".to_string(),
    }
}

fn limits(timeout_ms: u64) -> SandboxLimits {
    SandboxLimits {
        timeout: Duration::from_millis(timeout_ms),
        memory_limit_bytes: None,
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

/// Returns true when `pid` names a live, non-zombie process.
fn is_running(pid: &str) -> bool {
    let output = std::process::Command::new("ps").args(["-o", "stat=", "-p", pid]).output().unwrap();
    let stat = String::from_utf8_lossy(&output.stdout);
    let stat = stat.trim();
    !stat.is_empty() && !stat.starts_with('Z')
}

// ============================================================================
// SECTION: Exit Mapping
// ============================================================================

#[tokio::test]
async fn successful_script_passes_and_captures_stdout() {
    let root = tempfile::tempdir().unwrap();
    let outcome = sandbox(root.path(), 1024)
        .run(&request(shell(), "echo gate-ok\n"), &limits(10_000), CancelSignal::never())
        .await;
    assert_eq!(outcome.status, SandboxStatus::Passed, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout.trim(), "gate-ok");
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn non_zero_exit_fails_with_code() {
    let root = tempfile::tempdir().unwrap();
    let outcome = sandbox(root.path(), 1024)
        .run(&request(shell(), "echo broken >&2\nexit 3\n"), &limits(10_000), CancelSignal::never())
        .await;
    assert_eq!(outcome.status, SandboxStatus::Failed);
    assert_eq!(outcome.exit_code, Some(3));
    assert_eq!(outcome.stderr.trim(), "broken");
}

#[tokio::test]
async fn syntax_error_fails_at_check_stage() {
    let root = tempfile::tempdir().unwrap();
    let outcome = sandbox(root.path(), 1024)
        .run(&request(shell(), "if then fi (\n"), &limits(10_000), CancelSignal::never())
        .await;
    assert_eq!(outcome.status, SandboxStatus::Failed);
    assert!(outcome.stdout.is_empty());
}

#[tokio::test]
async fn missing_toolchain_fails_without_spawning() {
    let root = tempfile::tempdir().unwrap();
    let outcome = sandbox(root.path(), 1024)
        .run(&request(Language::Other("cobol".to_string()), "DISPLAY 'HI'.\n"), &limits(1_000), CancelSignal::never())
        .await;
    assert_eq!(outcome.status, SandboxStatus::Failed);
    assert!(outcome.stderr.contains("no toolchain configured"));
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn unknown_program_fails_to_spawn() {
    let root = tempfile::tempdir().unwrap();
    let toolchains =
        Toolchains::empty().with(&shell(), ToolchainSpec::new(&["test-gate-no-such-program", "{file}"], &[]));
    let runner = ProcessSandbox::new(ProcessSandboxConfig {
        toolchains,
        run_tests: false,
        scratch_root: Some(root.path().to_path_buf()),
        max_output_bytes: 1024,
    });
    let outcome = runner.run(&request(shell(), "echo hi\n"), &limits(1_000), CancelSignal::never()).await;
    assert_eq!(outcome.status, SandboxStatus::Failed);
    assert!(outcome.stderr.contains("failed to spawn"));
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn traversing_file_name_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let mut escaping = request(shell(), "echo hi\n");
    escaping.file_name = "../escape.sh".to_string();
    let outcome = sandbox(root.path(), 1024).run(&escaping, &limits(1_000), CancelSignal::never()).await;
    assert_eq!(outcome.status, SandboxStatus::Failed);
    assert!(!root.path().parent().unwrap().join("escape.sh").exists());
}

// ============================================================================
// SECTION: Environment
// ============================================================================

#[tokio::test]
async fn child_runs_in_scratch_dir_with_scratch_home() {
    let root = tempfile::tempdir().unwrap();
    let outcome = sandbox(root.path(), 4096)
        .run(&request(shell(), "pwd -P\ncd \"$HOME\" && pwd -P\n"), &limits(10_000), CancelSignal::never())
        .await;
    assert_eq!(outcome.status, SandboxStatus::Passed, "stderr: {}", outcome.stderr);
    let lines: Vec<&str> = outcome.stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], lines[1]);
    assert!(lines[0].contains("test-gate-"));
}

#[tokio::test]
async fn output_is_capped_to_tail() {
    let root = tempfile::tempdir().unwrap();
    let script = "i=0\nwhile [ $i -lt 2000 ]; do echo line-$i; i=$((i+1)); done\n";
    let outcome = sandbox(root.path(), 64).run(&request(shell(), script), &limits(10_000), CancelSignal::never()).await;
    assert_eq!(outcome.status, SandboxStatus::Passed);
    assert!(outcome.stdout.len() <= 64);
    assert!(outcome.stdout.ends_with("line-1999\n"));
}

// ============================================================================
// SECTION: Limits
// ============================================================================

#[tokio::test]
async fn slow_script_times_out_and_is_cleaned_up() {
    let root = tempfile::tempdir().unwrap();
    let started = std::time::Instant::now();
    let outcome =
        sandbox(root.path(), 1024).run(&request(shell(), "sleep 10\n"), &limits(300), CancelSignal::never()).await;
    assert_eq!(outcome.status, SandboxStatus::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.exit_code.is_none());
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn cancellation_kills_running_script() {
    let root = tempfile::tempdir().unwrap();
    let runner = sandbox(root.path(), 1024);
    let handle = CancelHandle::new();
    let artifact = request(shell(), "sleep 10\n");
    let run_limits = limits(20_000);
    let run = runner.run(&artifact, &run_limits, handle.signal());
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
    };
    let (outcome, ()) = tokio::join!(run, cancel);
    assert_eq!(outcome.status, SandboxStatus::Cancelled);
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn timeout_kills_background_grandchildren() {
    let root = tempfile::tempdir().unwrap();
    let marker = tempfile::tempdir().unwrap();
    let pid_file = marker.path().join("grandchild.pid");
    let script = format!("sleep 30 &\necho $! > '{}'\nwait\n", pid_file.display());
    let outcome = sandbox(root.path(), 1024).run(&request(shell(), &script), &limits(500), CancelSignal::never()).await;
    assert_eq!(outcome.status, SandboxStatus::TimedOut);

    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    assert!(!pid.is_empty());
    let mut alive = true;
    for _ in 0 .. 40 {
        if !is_running(&pid) {
            alive = false;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!alive, "background sleep {pid} survived the sandbox timeout");
}

#[tokio::test]
async fn already_cancelled_signal_skips_execution() {
    let root = tempfile::tempdir().unwrap();
    let handle = CancelHandle::new();
    handle.cancel();
    let outcome = sandbox(root.path(), 1024).run(&request(shell(), "echo hi\n"), &limits(1_000), handle.signal()).await;
    assert_eq!(outcome.status, SandboxStatus::Cancelled);
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn memory_ceiling_still_runs_small_scripts() {
    let root = tempfile::tempdir().unwrap();
    let bounded = SandboxLimits {
        timeout: Duration::from_secs(10),
        memory_limit_bytes: Some(512 * 1024 * 1024),
    };
    let outcome = sandbox(root.path(), 1024).run(&request(shell(), "echo bounded\n"), &bounded, CancelSignal::never()).await;
    assert_eq!(outcome.status, SandboxStatus::Passed, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout.trim(), "bounded");
}
