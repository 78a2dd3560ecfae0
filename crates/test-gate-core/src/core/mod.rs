// crates/test-gate-core/src/core/mod.rs
// ============================================================================
// Module: Test Gate Core Types
// Description: Canonical artifact, policy, report, and review structures.
// Purpose: Provide stable, serializable types shared by every gate component.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types are the canonical source of truth for gate records. Persisted
//! forms (run reports, review records) are derived from these types through
//! canonical JSON.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod artifact;
pub mod hashing;
pub mod identifiers;
pub mod policy;
pub mod report;
pub mod review;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifact::ARTIFACT_ID_PREFIX;
pub use artifact::Artifact;
pub use artifact::ArtifactInput;
pub use artifact::Language;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::ArtifactId;
pub use identifiers::ReviewId;
pub use identifiers::RuleId;
pub use identifiers::RunId;
pub use policy::Location;
pub use policy::PolicyOutcome;
pub use policy::PolicyViolation;
pub use policy::QualityBreakdown;
pub use policy::RuleCategory;
pub use policy::Severity;
pub use policy::UNPARSEABLE_RULE_ID;
pub use policy::round_score;
pub use report::ArtifactDecision;
pub use report::Eligibility;
pub use report::EvaluationReport;
pub use report::EvaluationReportBuilder;
pub use report::Mode;
pub use report::RunReport;
pub use report::SandboxOutcome;
pub use report::SandboxStatus;
pub use report::Stage;
pub use report::Verdict;
pub use report::VerdictCounts;
pub use review::ReviewFilter;
pub use review::ReviewRecord;
pub use review::ReviewState;
pub use time::Timestamp;
