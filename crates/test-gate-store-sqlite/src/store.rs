// crates/test-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Gate Store
// Description: Durable review and report stores backed by SQLite WAL.
// Purpose: Persist reviews and run reports with deterministic serialization.
// Dependencies: test-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`ReviewStore`] and [`ReportStore`] on one `SQLite`
//! database. Every record is stored as RFC 8785 canonical JSON next to its
//! hash; loads verify the hash before deserializing and fail closed on any
//! mismatch.
//!
//! Review writes run in immediate transactions so compare-and-swap holds
//! across processes sharing the file. A partial unique index keeps at most
//! one pending review per artifact. Every review version is also appended to
//! `review_events`, which gives the audit history. A run report and all of
//! its evaluation reports are written in a single transaction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use test_gate_core::ArtifactId;
use test_gate_core::DEFAULT_HASH_ALGORITHM;
use test_gate_core::EvaluationReport;
use test_gate_core::HashAlgorithm;
use test_gate_core::HashDigest;
use test_gate_core::ReportStore;
use test_gate_core::ReviewFilter;
use test_gate_core::ReviewId;
use test_gate_core::ReviewRecord;
use test_gate_core::ReviewState;
use test_gate_core::ReviewStore;
use test_gate_core::RunId;
use test_gate_core::RunReport;
use test_gate_core::StoreError;
use test_gate_core::canonical_json_bytes;
use test_gate_core::hash_bytes;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum size of one stored JSON payload.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` gate store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
    /// A record with the same identity already exists.
    #[error("sqlite store duplicate record: {0}")]
    Duplicate(String),
    /// Compare-and-swap version mismatch.
    #[error("sqlite store version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the writer expected.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
    /// Record does not exist.
    #[error("sqlite store record not found: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!("payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})")),
            SqliteStoreError::Duplicate(message) => Self::Duplicate(message),
            SqliteStoreError::Conflict {
                expected,
                actual,
            } => Self::Conflict {
                expected,
                actual,
            },
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

/// Maps a generic `SQLite` error.
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Maps an insert error, treating constraint violations as duplicates.
fn insert_error(err: rusqlite::Error, subject: &str) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err
        && failure.code == ErrorCode::ConstraintViolation
    {
        return SqliteStoreError::Duplicate(subject.to_string());
    }
    db_error(err)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed review and report store with WAL support.
///
/// # Invariants
/// - Loads verify stored hashes before deserialization.
/// - `SQLite` connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteGateStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

/// Summary metadata for a stored run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: RunId,
    /// Number of evaluated artifacts.
    pub artifacts: u64,
    /// True when the run was cancelled.
    pub cancelled: bool,
    /// Unix milliseconds when the run was stored.
    pub saved_at: i64,
}

/// Raw payload columns for one stored record.
#[derive(Debug)]
struct StoredPayload {
    /// Canonical JSON bytes.
    bytes: Vec<u8>,
    /// Stored hash value.
    hash_value: String,
    /// Stored hash algorithm label.
    hash_algorithm: String,
}

/// Canonical bytes and digest ready for insertion.
struct EncodedPayload {
    /// Canonical JSON bytes.
    bytes: Vec<u8>,
    /// Digest of `bytes`.
    digest: HashDigest,
}

impl SqliteGateStore {
    /// Opens an `SQLite`-backed gate store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid or the database
    /// cannot be opened or initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Lists stored runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunSummary>, SqliteStoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        let rows = {
            let mut statement = guard
                .prepare(
                    "SELECT run_id, artifact_count, cancelled, saved_at FROM run_reports ORDER BY \
                     saved_at DESC, run_id LIMIT ?1",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![limit], |row| {
                    let run_id: String = row.get(0)?;
                    let artifacts: i64 = row.get(1)?;
                    let cancelled: bool = row.get(2)?;
                    let saved_at: i64 = row.get(3)?;
                    Ok((run_id, artifacts, cancelled, saved_at))
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        drop(guard);
        rows.into_iter()
            .map(|(run_id, artifacts, cancelled, saved_at)| {
                let artifacts = u64::try_from(artifacts)
                    .map_err(|_| SqliteStoreError::Corrupt(format!("negative artifact count for run {run_id}")))?;
                Ok(RunSummary {
                    run_id: RunId::new(run_id),
                    artifacts,
                    cancelled,
                    saved_at,
                })
            })
            .collect()
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Loads and verifies one review row.
    fn load_review(&self, review_id: &ReviewId) -> Result<Option<ReviewRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT version, record_json, record_hash, hash_algorithm FROM reviews WHERE review_id = ?1",
                params![review_id.as_str()],
                |row| Ok((row.get::<_, i64>(0)?, map_payload(row, 1)?)),
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        let Some((version, payload)) = row else {
            return Ok(None);
        };
        let record: ReviewRecord = decode_payload(payload, &format!("review {review_id}"))?;
        verify_review_row(&record, review_id.as_str(), version)?;
        Ok(Some(record))
    }

    /// Inserts a new review and its first event.
    fn insert_review(&self, record: &ReviewRecord) -> Result<(), SqliteStoreError> {
        let encoded = encode_payload(record)?;
        let version = version_to_i64(record.version)?;
        let now = unix_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM reviews WHERE review_id = ?1", params![record.review_id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_error)?;
        if exists.is_some() {
            return Err(SqliteStoreError::Duplicate(format!("review {} exists", record.review_id)));
        }
        if record.state == ReviewState::Pending {
            let pending: Option<String> = tx
                .query_row(
                    "SELECT review_id FROM reviews WHERE artifact_id = ?1 AND state = 'pending'",
                    params![record.artifact_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)?;
            if pending.is_some() {
                return Err(SqliteStoreError::Duplicate(format!(
                    "artifact {} has a pending review",
                    record.artifact_id
                )));
            }
        }
        let subject = format!("review {}", record.review_id);
        tx.execute(
            "INSERT INTO reviews (review_id, artifact_id, state, version, record_json, record_hash, \
             hash_algorithm, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.review_id.as_str(),
                record.artifact_id.as_str(),
                record.state.as_str(),
                version,
                encoded.bytes,
                encoded.digest.value,
                encoded.digest.algorithm.label(),
                now
            ],
        )
        .map_err(|err| insert_error(err, &subject))?;
        insert_review_event(&tx, record, version, &encoded, now)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Replaces a review when the stored version matches.
    fn swap_review(&self, record: &ReviewRecord, expected_version: u64) -> Result<(), SqliteStoreError> {
        let next_version = expected_version
            .checked_add(1)
            .ok_or_else(|| SqliteStoreError::Invalid("review version overflow".to_string()))?;
        if record.version != next_version {
            return Err(SqliteStoreError::Invalid(format!(
                "review {} must advance to version {next_version}",
                record.review_id
            )));
        }
        let encoded = encode_payload(record)?;
        let expected = version_to_i64(expected_version)?;
        let version = version_to_i64(record.version)?;
        let now = unix_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        let stored: Option<i64> = tx
            .query_row(
                "SELECT version FROM reviews WHERE review_id = ?1",
                params![record.review_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        let Some(stored) = stored else {
            return Err(SqliteStoreError::NotFound(record.review_id.to_string()));
        };
        if stored != expected {
            return Err(SqliteStoreError::Conflict {
                expected: expected_version,
                actual: u64::try_from(stored).unwrap_or(0),
            });
        }
        let updated = tx
            .execute(
                "UPDATE reviews SET state = ?1, version = ?2, record_json = ?3, record_hash = ?4, \
                 hash_algorithm = ?5, updated_at = ?6 WHERE review_id = ?7 AND version = ?8",
                params![
                    record.state.as_str(),
                    version,
                    encoded.bytes,
                    encoded.digest.value,
                    encoded.digest.algorithm.label(),
                    now,
                    record.review_id.as_str(),
                    expected
                ],
            )
            .map_err(|err| insert_error(err, &format!("artifact {} has a pending review", record.artifact_id)))?;
        if updated != 1 {
            return Err(SqliteStoreError::Conflict {
                expected: expected_version,
                actual: u64::try_from(stored).unwrap_or(0),
            });
        }
        insert_review_event(&tx, record, version, &encoded, now)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Lists reviews matching the filter, ordered by review id.
    fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>, SqliteStoreError> {
        let state = filter.state.map(ReviewState::as_str);
        let artifact = filter.artifact_id.as_ref().map(ArtifactId::as_str);
        let guard = self.lock()?;
        let rows = {
            let mut statement = guard
                .prepare(
                    "SELECT review_id, version, record_json, record_hash, hash_algorithm FROM reviews \
                     WHERE (?1 IS NULL OR state = ?1) AND (?2 IS NULL OR artifact_id = ?2) ORDER BY \
                     review_id",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![state, artifact], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, map_payload(row, 2)?))
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        drop(guard);
        let mut records = Vec::with_capacity(rows.len());
        for (review_id, version, payload) in rows {
            let record: ReviewRecord = decode_payload(payload, &format!("review {review_id}"))?;
            verify_review_row(&record, &review_id, version)?;
            if !filter.matches(&record) {
                return Err(SqliteStoreError::Corrupt(format!(
                    "review {review_id} does not match its index columns"
                )));
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Loads every stored version of a review, oldest first.
    fn review_history(&self, review_id: &ReviewId) -> Result<Vec<ReviewRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let rows = {
            let mut statement = guard
                .prepare(
                    "SELECT version, record_json, record_hash, hash_algorithm FROM review_events WHERE \
                     review_id = ?1 ORDER BY version",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![review_id.as_str()], |row| Ok((row.get::<_, i64>(0)?, map_payload(row, 1)?)))
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        drop(guard);
        rows.into_iter()
            .map(|(version, payload)| {
                let record: ReviewRecord = decode_payload(payload, &format!("review {review_id} v{version}"))?;
                verify_review_row(&record, review_id.as_str(), version)?;
                Ok(record)
            })
            .collect()
    }

    /// Counts reviews ever created for an artifact.
    fn count_reviews(&self, artifact_id: &ArtifactId) -> Result<u64, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(1) FROM reviews WHERE artifact_id = ?1",
                params![artifact_id.as_str()],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        drop(guard);
        u64::try_from(count).map_err(|_| SqliteStoreError::Corrupt("negative review count".to_string()))
    }

    /// Writes a run report and its evaluation reports atomically.
    fn insert_run(&self, report: &RunReport) -> Result<(), SqliteStoreError> {
        let encoded = encode_payload(report)?;
        let evaluations = report
            .reports
            .iter()
            .map(|evaluation| encode_payload(evaluation).map(|payload| (evaluation, payload)))
            .collect::<Result<Vec<_>, _>>()?;
        let artifact_count = i64::try_from(report.reports.len())
            .map_err(|_| SqliteStoreError::Invalid("too many reports in run".to_string()))?;
        let now = unix_millis();
        let subject = format!("run {}", report.run_id);
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        tx.execute(
            "INSERT INTO run_reports (run_id, artifact_count, cancelled, report_json, report_hash, \
             hash_algorithm, saved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                report.run_id.as_str(),
                artifact_count,
                report.cancelled,
                encoded.bytes,
                encoded.digest.value,
                encoded.digest.algorithm.label(),
                now
            ],
        )
        .map_err(|err| insert_error(err, &subject))?;
        for (position, (evaluation, payload)) in evaluations.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| SqliteStoreError::Invalid("too many reports in run".to_string()))?;
            tx.execute(
                "INSERT INTO evaluation_reports (run_id, position, artifact_id, verdict, report_json, \
                 report_hash, hash_algorithm) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    report.run_id.as_str(),
                    position,
                    evaluation.artifact_id().as_str(),
                    evaluation.verdict().as_str(),
                    payload.bytes,
                    payload.digest.value,
                    payload.digest.algorithm.label()
                ],
            )
            .map_err(|err| insert_error(err, &subject))?;
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Loads and verifies a run report.
    fn fetch_run(&self, run_id: &RunId) -> Result<Option<RunReport>, SqliteStoreError> {
        let guard = self.lock()?;
        let payload = guard
            .query_row(
                "SELECT report_json, report_hash, hash_algorithm FROM run_reports WHERE run_id = ?1",
                params![run_id.as_str()],
                |row| map_payload(row, 0),
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        let Some(payload) = payload else {
            return Ok(None);
        };
        let report: RunReport = decode_payload(payload, &format!("run {run_id}"))?;
        if report.run_id != *run_id {
            return Err(SqliteStoreError::Corrupt(format!("run {run_id} payload names run {}", report.run_id)));
        }
        Ok(Some(report))
    }

    /// Loads and verifies one evaluation report within a run.
    fn fetch_evaluation(
        &self,
        artifact_id: &ArtifactId,
        run_id: &RunId,
    ) -> Result<Option<EvaluationReport>, SqliteStoreError> {
        let guard = self.lock()?;
        let payload = guard
            .query_row(
                "SELECT report_json, report_hash, hash_algorithm FROM evaluation_reports WHERE run_id = \
                 ?1 AND artifact_id = ?2 ORDER BY position LIMIT 1",
                params![run_id.as_str(), artifact_id.as_str()],
                |row| map_payload(row, 0),
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        let Some(payload) = payload else {
            return Ok(None);
        };
        let report: EvaluationReport = decode_payload(payload, &format!("evaluation {artifact_id} in run {run_id}"))?;
        if report.artifact_id() != artifact_id {
            return Err(SqliteStoreError::Corrupt(format!(
                "evaluation row for {artifact_id} names artifact {}",
                report.artifact_id()
            )));
        }
        Ok(Some(report))
    }
}

impl ReviewStore for SqliteGateStore {
    fn get(&self, review_id: &ReviewId) -> Result<Option<ReviewRecord>, StoreError> {
        Ok(self.load_review(review_id)?)
    }

    fn find_pending(&self, artifact_id: &ArtifactId) -> Result<Option<ReviewRecord>, StoreError> {
        let filter = ReviewFilter {
            state: Some(ReviewState::Pending),
            artifact_id: Some(artifact_id.clone()),
        };
        Ok(self.list_reviews(&filter)?.into_iter().next())
    }

    fn create(&self, record: &ReviewRecord) -> Result<(), StoreError> {
        Ok(self.insert_review(record)?)
    }

    fn compare_and_swap(&self, record: &ReviewRecord, expected_version: u64) -> Result<(), StoreError> {
        Ok(self.swap_review(record, expected_version)?)
    }

    fn list(&self, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>, StoreError> {
        Ok(self.list_reviews(filter)?)
    }

    fn history(&self, review_id: &ReviewId) -> Result<Vec<ReviewRecord>, StoreError> {
        Ok(self.review_history(review_id)?)
    }

    fn count_for_artifact(&self, artifact_id: &ArtifactId) -> Result<u64, StoreError> {
        Ok(self.count_reviews(artifact_id)?)
    }
}

impl ReportStore for SqliteGateStore {
    fn append_run(&self, report: &RunReport) -> Result<(), StoreError> {
        Ok(self.insert_run(report)?)
    }

    fn load_run(&self, run_id: &RunId) -> Result<Option<RunReport>, StoreError> {
        Ok(self.fetch_run(run_id)?)
    }

    fn load_evaluation(
        &self,
        artifact_id: &ArtifactId,
        run_id: &RunId,
    ) -> Result<Option<EvaluationReport>, StoreError> {
        Ok(self.fetch_evaluation(artifact_id, run_id)?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags =
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);").map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS reviews (
                    review_id TEXT NOT NULL PRIMARY KEY,
                    artifact_id TEXT NOT NULL,
                    state TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    record_json BLOB NOT NULL,
                    record_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_reviews_artifact ON reviews (artifact_id);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_one_pending
                    ON reviews (artifact_id) WHERE state = 'pending';
                CREATE TABLE IF NOT EXISTS review_events (
                    review_id TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    record_json BLOB NOT NULL,
                    record_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    recorded_at INTEGER NOT NULL,
                    PRIMARY KEY (review_id, version),
                    FOREIGN KEY (review_id) REFERENCES reviews(review_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS run_reports (
                    run_id TEXT NOT NULL PRIMARY KEY,
                    artifact_count INTEGER NOT NULL,
                    cancelled INTEGER NOT NULL,
                    report_json BLOB NOT NULL,
                    report_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    saved_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS evaluation_reports (
                    run_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    artifact_id TEXT NOT NULL,
                    verdict TEXT NOT NULL,
                    report_json BLOB NOT NULL,
                    report_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    PRIMARY KEY (run_id, position),
                    FOREIGN KEY (run_id) REFERENCES run_reports(run_id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_evaluation_reports_artifact
                    ON evaluation_reports (artifact_id, run_id);",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Appends one review version to the event history.
fn insert_review_event(
    tx: &rusqlite::Transaction<'_>,
    record: &ReviewRecord,
    version: i64,
    encoded: &EncodedPayload,
    now: i64,
) -> Result<(), SqliteStoreError> {
    tx.execute(
        "INSERT INTO review_events (review_id, version, state, record_json, record_hash, hash_algorithm, \
         recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.review_id.as_str(),
            version,
            record.state.as_str(),
            encoded.bytes,
            encoded.digest.value,
            encoded.digest.algorithm.label(),
            now
        ],
    )
    .map_err(|err| insert_error(err, &format!("review {} v{version}", record.review_id)))?;
    Ok(())
}

/// Reads payload columns starting at `start`.
fn map_payload(row: &rusqlite::Row<'_>, start: usize) -> rusqlite::Result<StoredPayload> {
    Ok(StoredPayload {
        bytes: row.get(start)?,
        hash_value: row.get(start + 1)?,
        hash_algorithm: row.get(start + 2)?,
    })
}

/// Serializes a record to canonical JSON and hashes it.
fn encode_payload<T: Serialize>(value: &T) -> Result<EncodedPayload, SqliteStoreError> {
    let bytes = canonical_json_bytes(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_PAYLOAD_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
    Ok(EncodedPayload {
        bytes,
        digest,
    })
}

/// Verifies a stored payload hash and deserializes it.
fn decode_payload<T: DeserializeOwned>(payload: StoredPayload, subject: &str) -> Result<T, SqliteStoreError> {
    if payload.bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_PAYLOAD_BYTES,
            actual_bytes: payload.bytes.len(),
        });
    }
    let algorithm = HashAlgorithm::parse(&payload.hash_algorithm).ok_or_else(|| {
        SqliteStoreError::Invalid(format!("unsupported hash algorithm: {}", payload.hash_algorithm))
    })?;
    let digest = hash_bytes(algorithm, &payload.bytes);
    if digest.value != payload.hash_value {
        return Err(SqliteStoreError::Corrupt(format!("hash mismatch for {subject}")));
    }
    serde_json::from_slice(&payload.bytes)
        .map_err(|err| SqliteStoreError::Corrupt(format!("invalid payload for {subject}: {err}")))
}

/// Checks that a decoded review matches its row keys.
fn verify_review_row(record: &ReviewRecord, review_id: &str, version: i64) -> Result<(), SqliteStoreError> {
    if record.review_id.as_str() != review_id {
        return Err(SqliteStoreError::Corrupt(format!(
            "review row {review_id} holds record {}",
            record.review_id
        )));
    }
    if i64::try_from(record.version).ok() != Some(version) {
        return Err(SqliteStoreError::Corrupt(format!(
            "review {review_id} version column {version} disagrees with payload version {}",
            record.version
        )));
    }
    Ok(())
}

/// Converts a review version to an `SQLite` integer.
fn version_to_i64(version: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(version).map_err(|_| SqliteStoreError::Invalid(format!("review version out of range: {version}")))
}

/// Returns the current unix time in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
