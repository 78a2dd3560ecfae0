// crates/test-gate-core/src/lib.rs
// ============================================================================
// Module: Test Gate Core Library
// Description: Public API surface for the Test Gate core.
// Purpose: Expose core types, interfaces, audit sinks, and runtime components.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Test Gate decides, deterministically and auditably, which machine-generated
//! test artifacts are safe to execute, which need a human decision, and which
//! are rejected. The core is backend-agnostic: sandboxes, review storage, and
//! report storage plug in through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::FileAuditSink;
pub use audit::GateAuditDetail;
pub use audit::GateAuditEvent;
pub use audit::GateAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::Clock;
pub use interfaces::ReportStore;
pub use interfaces::ReviewStore;
pub use interfaces::SandboxLimits;
pub use interfaces::SandboxRequest;
pub use interfaces::SandboxRunner;
pub use interfaces::StoreError;
pub use runtime::CancelHandle;
pub use runtime::CancelSignal;
pub use runtime::EvaluationHarness;
pub use runtime::HarnessConfig;
pub use runtime::InMemoryReportStore;
pub use runtime::InMemoryReviewStore;
pub use runtime::ManualClock;
pub use runtime::MatchScope;
pub use runtime::Orchestrator;
pub use runtime::OrchestratorConfig;
pub use runtime::OrchestratorError;
pub use runtime::PolicyChecker;
pub use runtime::PolicyConfig;
pub use runtime::ReviewError;
pub use runtime::ReviewPolicy;
pub use runtime::ReviewRequest;
pub use runtime::ReviewStateMachine;
pub use runtime::RuleError;
pub use runtime::RuleSpec;
pub use runtime::ScoreWeights;
pub use runtime::SystemClock;
