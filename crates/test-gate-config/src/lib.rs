// crates/test-gate-config/src/lib.rs
// ============================================================================
// Module: Test Gate Config Library
// Description: Canonical config model, validation, and runtime builders.
// Purpose: Single source of truth for test-gate.toml semantics.
// Dependencies: test-gate-core, test-gate-sandbox, test-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `test-gate-config` defines the canonical configuration model for Test
//! Gate. It provides strict, fail-closed validation and converts a validated
//! config into the runtime types the pipeline consumes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
