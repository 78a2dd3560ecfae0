// crates/test-gate-cli/src/lib.rs
// ============================================================================
// Module: Test Gate CLI Library
// Description: Shared helpers for the `test-gate` binary.
// Purpose: Expose the message catalog, artifact input loading, and runtime wiring.
// Dependencies: crate::{i18n, inputs, runtime}
// ============================================================================

//! ## Overview
//! The binary stays a thin dispatcher; reusable pieces live here so they can
//! be tested without spawning processes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod i18n;
pub mod inputs;
pub mod runtime;
