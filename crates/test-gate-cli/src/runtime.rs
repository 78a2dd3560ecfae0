// crates/test-gate-cli/src/runtime.rs
// ============================================================================
// Module: CLI Runtime Wiring
// Description: Builds stores, audit sinks, the sandbox, and the orchestrator.
// Purpose: Turn a validated configuration into runnable gate components.
// Dependencies: test-gate-config, test-gate-core, test-gate-sandbox, test-gate-store-sqlite
// ============================================================================

//! ## Overview
//! Every command builds its collaborators through [`GateRuntime::build`], so
//! `evaluate` and the `review`/`report` commands always open the same store
//! with the same review policy and audit destination.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use test_gate_config::GateConfig;
use test_gate_core::Clock;
use test_gate_core::EvaluationHarness;
use test_gate_core::FileAuditSink;
use test_gate_core::GateAuditSink;
use test_gate_core::InMemoryReportStore;
use test_gate_core::InMemoryReviewStore;
use test_gate_core::Mode;
use test_gate_core::NoopAuditSink;
use test_gate_core::Orchestrator;
use test_gate_core::PolicyChecker;
use test_gate_core::ReportStore;
use test_gate_core::ReviewStateMachine;
use test_gate_core::ReviewStore;
use test_gate_core::RuleError;
use test_gate_core::StderrAuditSink;
use test_gate_core::SystemClock;
use test_gate_core::Timestamp;
use test_gate_sandbox::ProcessSandbox;
use test_gate_store_sqlite::RunSummary;
use test_gate_store_sqlite::SqliteGateStore;
use test_gate_store_sqlite::SqliteStoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while assembling the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The `SQLite` store could not be opened.
    #[error("store: {0}")]
    Store(#[from] SqliteStoreError),
    /// The audit log could not be opened.
    #[error("audit log {path}: {error}")]
    Audit {
        /// Audit log path.
        path: String,
        /// Underlying error.
        error: std::io::Error,
    },
    /// Policy rules failed to compile.
    #[error("policy: {0}")]
    Policy(#[from] RuleError),
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Assembled gate components for one CLI invocation.
pub struct GateRuntime {
    /// Batch runner (owns the harness and review state machine).
    orchestrator: Orchestrator,
    /// Run report store.
    reports: Arc<dyn ReportStore>,
    /// Durable store, when configured.
    sqlite: Option<SqliteGateStore>,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
}

impl GateRuntime {
    /// Builds the runtime from configuration, optionally overriding the mode.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the store, audit log, or policy rules
    /// cannot be initialized.
    pub fn build(config: &GateConfig, mode: Option<Mode>) -> Result<Self, RuntimeError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let audit = build_audit_sink(config)?;
        let sqlite = config.sqlite_store_config().map(SqliteGateStore::new).transpose()?;
        let reviews: Arc<dyn ReviewStore> = match &sqlite {
            Some(store) => Arc::new(store.clone()),
            None => Arc::new(InMemoryReviewStore::new()),
        };
        let reports: Arc<dyn ReportStore> = match &sqlite {
            Some(store) => Arc::new(store.clone()),
            None => Arc::new(InMemoryReportStore::new()),
        };
        let checker = Arc::new(PolicyChecker::new(config.policy_config())?);
        let sandbox = Arc::new(ProcessSandbox::new(config.process_sandbox_config()));
        let harness = Arc::new(EvaluationHarness::new(
            checker,
            sandbox,
            config.harness_config(),
            Arc::clone(&clock),
            Arc::clone(&audit),
        ));
        let review_machine = ReviewStateMachine::new(reviews, config.review_policy(), Arc::clone(&audit));
        let orchestrator = Orchestrator::new(
            harness,
            review_machine,
            Arc::clone(&reports),
            Arc::clone(&clock),
            audit,
            config.orchestrator_config(mode),
        );
        Ok(Self {
            orchestrator,
            reports,
            sqlite,
            clock,
        })
    }

    /// Returns the orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Returns the review state machine.
    #[must_use]
    pub const fn reviews(&self) -> &ReviewStateMachine {
        self.orchestrator.reviews()
    }

    /// Returns the run report store.
    #[must_use]
    pub fn reports(&self) -> &dyn ReportStore {
        self.reports.as_ref()
    }

    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Lists the most recent stored runs; `None` for the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the listing query fails.
    pub fn list_runs(&self, limit: usize) -> Result<Option<Vec<RunSummary>>, SqliteStoreError> {
        self.sqlite.as_ref().map(|store| store.list_runs(limit)).transpose()
    }
}

/// Selects the audit sink named by configuration.
fn build_audit_sink(config: &GateConfig) -> Result<Arc<dyn GateAuditSink>, RuntimeError> {
    if !config.audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.audit.path {
        Some(path) => {
            let sink = FileAuditSink::new(path).map_err(|error| RuntimeError::Audit {
                path: path.display().to_string(),
                error,
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}
