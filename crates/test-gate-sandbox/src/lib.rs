// crates/test-gate-sandbox/src/lib.rs
// ============================================================================
// Module: Test Gate Sandbox Library
// Description: Process-backed sandbox runner for candidate test artifacts.
// Purpose: Parse, compile, and optionally run artifacts under hard limits.
// Dependencies: test-gate-core, tempfile, tokio
// ============================================================================

//! ## Overview
//! [`ProcessSandbox`] implements [`test_gate_core::SandboxRunner`] by writing
//! the artifact into a fresh scratch directory and running the language's
//! check command (and optionally its test command) as a child process with
//! a cleared environment, a wall-clock deadline, and an optional memory
//! ceiling. The scratch directory and the child are released on every exit
//! path.
//!
//! Security posture: artifact text is untrusted. The sandbox bounds time,
//! memory, and output size but does not provide network or syscall
//! isolation on its own; run it inside a container or VM when that matters.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod process;
pub mod toolchain;
pub mod workspace;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use process::DEFAULT_MAX_OUTPUT_BYTES;
pub use process::ProcessSandbox;
pub use process::ProcessSandboxConfig;
pub use process::SandboxError;
pub use toolchain::CommandTemplate;
pub use toolchain::DEFAULT_JAVA_CLASSPATH;
pub use toolchain::ToolchainSpec;
pub use toolchain::Toolchains;
pub use toolchain::java_toolchain;
pub use workspace::ScratchDir;
