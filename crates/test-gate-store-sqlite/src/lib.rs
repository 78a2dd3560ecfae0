// crates/test-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Test Gate SQLite Store Library
// Description: Durable review and report stores backed by SQLite.
// Purpose: Expose the SQLite store and its configuration types.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Provides [`SqliteGateStore`], a single `SQLite` database that implements
//! both [`test_gate_core::ReviewStore`] and [`test_gate_core::ReportStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_PAYLOAD_BYTES;
pub use store::RunSummary;
pub use store::SqliteGateStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
