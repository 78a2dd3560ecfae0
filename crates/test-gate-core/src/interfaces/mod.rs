// crates/test-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Test Gate Interfaces
// Description: Backend-agnostic interfaces for stores, sandboxes, and clocks.
// Purpose: Define the seams between gate runtime logic and its backends.
// Dependencies: async-trait, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the gate runtime persists reviews and run reports,
//! executes candidate artifacts, and reads time. Implementations must be
//! deterministic where the runtime relies on them and fail closed on
//! missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::ArtifactId;
use crate::core::EvaluationReport;
use crate::core::Language;
use crate::core::ReviewFilter;
use crate::core::ReviewId;
use crate::core::ReviewRecord;
use crate::core::RunId;
use crate::core::RunReport;
use crate::core::SandboxOutcome;
use crate::core::Timestamp;
use crate::runtime::cancel::CancelSignal;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors raised by review and report stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("gate store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("gate store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("gate store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("gate store invalid data: {0}")]
    Invalid(String),
    /// A record with the same identity already exists.
    #[error("gate store duplicate record: {0}")]
    Duplicate(String),
    /// Compare-and-swap lost against a concurrent writer.
    #[error("gate store version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the writer expected.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
    /// Record does not exist.
    #[error("gate store record not found: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("gate store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Review Store
// ============================================================================

/// Durable storage for review records.
///
/// # Invariants
/// - At most one pending record exists per artifact.
/// - `compare_and_swap` writes only when the stored version equals `expected_version`.
pub trait ReviewStore: Send + Sync {
    /// Loads a review by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get(&self, review_id: &ReviewId) -> Result<Option<ReviewRecord>, StoreError>;

    /// Finds the pending review for an artifact, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn find_pending(&self, artifact_id: &ArtifactId) -> Result<Option<ReviewRecord>, StoreError>;

    /// Inserts a new review record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the id exists or a pending review
    /// already exists for the artifact.
    fn create(&self, record: &ReviewRecord) -> Result<(), StoreError>;

    /// Replaces a record when the stored version equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the stored version differs and
    /// [`StoreError::NotFound`] when the record is missing.
    fn compare_and_swap(&self, record: &ReviewRecord, expected_version: u64) -> Result<(), StoreError>;

    /// Lists records matching the filter, ordered by review id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn list(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>, StoreError>;

    /// Returns every stored version of a review, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn history(&self, review_id: &ReviewId) -> Result<Vec<ReviewRecord>, StoreError>;

    /// Returns the number of reviews ever created for an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn count_for_artifact(&self, artifact_id: &ArtifactId) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Report Store
// ============================================================================

/// Append-only storage for run reports.
pub trait ReportStore: Send + Sync {
    /// Persists a run report and its evaluation reports in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the run id exists and
    /// [`StoreError`] when persistence fails.
    fn append_run(&self, report: &RunReport) -> Result<(), StoreError>;

    /// Loads a run report by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading or integrity verification fails.
    fn load_run(&self, run_id: &RunId) -> Result<Option<RunReport>, StoreError>;

    /// Loads the evaluation report for one artifact within one run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading or integrity verification fails.
    fn load_evaluation(
        &self,
        artifact_id: &ArtifactId,
        run_id: &RunId,
    ) -> Result<Option<EvaluationReport>, StoreError>;
}

// ============================================================================
// SECTION: Sandbox Runner
// ============================================================================

/// Artifact handed to a sandbox runner.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Declared language.
    pub language: Language,
    /// Frozen source text.
    pub source_text: Arc<str>,
    /// File name the artifact is written under.
    pub file_name: String,
}

/// Resource limits applied to one sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Wall-clock limit for the whole run.
    pub timeout: Duration,
    /// Optional virtual memory ceiling in bytes.
    pub memory_limit_bytes: Option<u64>,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            memory_limit_bytes: None,
        }
    }
}

/// Executes candidate artifacts in an isolated, bounded environment.
///
/// # Invariants
/// - Failures are reported through [`SandboxOutcome`]; runners never panic or
///   return errors for artifact misbehavior.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Runs the artifact and reports its outcome.
    async fn run(
        &self,
        request: &SandboxRequest,
        limits: &SandboxLimits,
        cancel: CancelSignal,
    ) -> SandboxOutcome;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of timestamps for reports and reviews.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}
