// crates/test-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Test Gate In-Memory Stores
// Description: In-memory review and report stores for tests and dry runs.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! These stores keep records in mutex-guarded maps. They honor the same
//! compare-and-swap and uniqueness rules as the durable store, so the state
//! machine behaves identically against either backend. Contents are lost
//! when the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::ArtifactId;
use crate::core::EvaluationReport;
use crate::core::ReviewFilter;
use crate::core::ReviewId;
use crate::core::ReviewRecord;
use crate::core::ReviewState;
use crate::core::RunId;
use crate::core::RunReport;
use crate::interfaces::ReportStore;
use crate::interfaces::ReviewStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Review Store
// ============================================================================

/// Review map contents.
#[derive(Debug, Default)]
struct ReviewTables {
    /// Latest record per review id.
    latest: BTreeMap<String, ReviewRecord>,
    /// Every stored version per review id.
    history: BTreeMap<String, Vec<ReviewRecord>>,
}

/// In-memory review store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReviewStore {
    /// Review tables protected by a mutex.
    tables: Arc<Mutex<ReviewTables>>,
}

impl InMemoryReviewStore {
    /// Creates an empty review store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the review tables.
    fn lock(&self) -> Result<MutexGuard<'_, ReviewTables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Store("review store mutex poisoned".to_string()))
    }
}

impl ReviewStore for InMemoryReviewStore {
    fn get(&self, review_id: &ReviewId) -> Result<Option<ReviewRecord>, StoreError> {
        Ok(self.lock()?.latest.get(review_id.as_str()).cloned())
    }

    fn find_pending(&self, artifact_id: &ArtifactId) -> Result<Option<ReviewRecord>, StoreError> {
        Ok(self
            .lock()?
            .latest
            .values()
            .find(|record| record.artifact_id == *artifact_id && record.state == ReviewState::Pending)
            .cloned())
    }

    fn create(&self, record: &ReviewRecord) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.latest.contains_key(record.review_id.as_str()) {
            return Err(StoreError::Duplicate(format!("review {} exists", record.review_id)));
        }
        if record.state == ReviewState::Pending
            && guard
                .latest
                .values()
                .any(|other| other.artifact_id == record.artifact_id && other.state == ReviewState::Pending)
        {
            return Err(StoreError::Duplicate(format!(
                "artifact {} has a pending review",
                record.artifact_id
            )));
        }
        guard.latest.insert(record.review_id.to_string(), record.clone());
        guard.history.entry(record.review_id.to_string()).or_default().push(record.clone());
        drop(guard);
        Ok(())
    }

    fn compare_and_swap(&self, record: &ReviewRecord, expected_version: u64) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let Some(current) = guard.latest.get(record.review_id.as_str()) else {
            return Err(StoreError::NotFound(record.review_id.to_string()));
        };
        if current.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: current.version,
            });
        }
        if record.version != expected_version + 1 {
            return Err(StoreError::Invalid(format!(
                "review {} must advance to version {}",
                record.review_id,
                expected_version + 1
            )));
        }
        guard.latest.insert(record.review_id.to_string(), record.clone());
        guard.history.entry(record.review_id.to_string()).or_default().push(record.clone());
        drop(guard);
        Ok(())
    }

    fn list(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>, StoreError> {
        Ok(self.lock()?.latest.values().filter(|record| filter.matches(record)).cloned().collect())
    }

    fn history(&self, review_id: &ReviewId) -> Result<Vec<ReviewRecord>, StoreError> {
        Ok(self.lock()?.history.get(review_id.as_str()).cloned().unwrap_or_default())
    }

    fn count_for_artifact(&self, artifact_id: &ArtifactId) -> Result<u64, StoreError> {
        let count = self.lock()?.latest.values().filter(|record| record.artifact_id == *artifact_id).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Report Store
// ============================================================================

/// In-memory append-only report store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReportStore {
    /// Run reports keyed by run id.
    runs: Arc<Mutex<BTreeMap<String, RunReport>>>,
}

impl InMemoryReportStore {
    /// Creates an empty report store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the mutex is poisoned.
    pub fn run_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .runs
            .lock()
            .map_err(|_| StoreError::Store("report store mutex poisoned".to_string()))?
            .len())
    }
}

impl ReportStore for InMemoryReportStore {
    fn append_run(&self, report: &RunReport) -> Result<(), StoreError> {
        let mut guard = self
            .runs
            .lock()
            .map_err(|_| StoreError::Store("report store mutex poisoned".to_string()))?;
        if guard.contains_key(report.run_id.as_str()) {
            return Err(StoreError::Duplicate(format!("run {} exists", report.run_id)));
        }
        guard.insert(report.run_id.to_string(), report.clone());
        drop(guard);
        Ok(())
    }

    fn load_run(&self, run_id: &RunId) -> Result<Option<RunReport>, StoreError> {
        let guard = self
            .runs
            .lock()
            .map_err(|_| StoreError::Store("report store mutex poisoned".to_string()))?;
        Ok(guard.get(run_id.as_str()).cloned())
    }

    fn load_evaluation(
        &self,
        artifact_id: &ArtifactId,
        run_id: &RunId,
    ) -> Result<Option<EvaluationReport>, StoreError> {
        let guard = self
            .runs
            .lock()
            .map_err(|_| StoreError::Store("report store mutex poisoned".to_string()))?;
        Ok(guard.get(run_id.as_str()).and_then(|run| {
            run.reports.iter().find(|report| report.artifact_id() == artifact_id).cloned()
        }))
    }
}
