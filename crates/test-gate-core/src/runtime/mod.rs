// crates/test-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Test Gate Runtime
// Description: Policy checker, evaluation harness, reviews, and orchestration.
// Purpose: Execute the gating pipeline against injected stores and sandboxes.
// Dependencies: crate::{audit, core, interfaces}, regex, tokio
// ============================================================================

//! ## Overview
//! Runtime modules implement the gating pipeline. Every entry point (CLI,
//! tests, embedding applications) goes through the same harness and
//! orchestrator logic so verdicts never depend on the caller.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cancel;
pub mod clock;
pub mod harness;
pub mod lexer;
pub mod orchestrator;
pub mod policy;
pub mod review;
pub mod rules;
pub mod store;
pub mod units;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancelHandle;
pub use cancel::CancelSignal;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use harness::EvaluationHarness;
pub use harness::HarnessConfig;
pub use lexer::ScannedSource;
pub use lexer::UnparseableArtifact;
pub use lexer::scan;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::OrchestratorError;
pub use policy::PolicyChecker;
pub use policy::PolicyConfig;
pub use policy::ScoreWeights;
pub use review::ReviewError;
pub use review::ReviewPolicy;
pub use review::ReviewRequest;
pub use review::ReviewStateMachine;
pub use review::review_checklist;
pub use rules::FORBIDDEN_PATTERN_RULE_ID;
pub use rules::MatchScope;
pub use rules::RuleError;
pub use rules::RuleSet;
pub use rules::RuleSpec;
pub use rules::builtin_rules;
pub use store::InMemoryReportStore;
pub use store::InMemoryReviewStore;
pub use units::TestUnit;
pub use units::UnitPatterns;
