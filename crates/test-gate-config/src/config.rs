// crates/test-gate-config/src/config.rs
// ============================================================================
// Module: Test Gate Configuration
// Description: Configuration loading and validation for Test Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: test-gate-core, test-gate-sandbox, test-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is resolved from an explicit path, then the `TEST_GATE_CONFIG`
//! environment variable, then `test-gate.toml` in the working directory. Only
//! the last of these may be absent, in which case every default applies.
//! Unknown fields, out-of-range values, and regexes that do not compile are
//! rejected before any runtime component is built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use test_gate_core::HarnessConfig;
use test_gate_core::Language;
use test_gate_core::Mode;
use test_gate_core::OrchestratorConfig;
use test_gate_core::PolicyChecker;
use test_gate_core::PolicyConfig;
use test_gate_core::ReviewPolicy;
use test_gate_core::RuleSpec;
use test_gate_core::SandboxLimits;
use test_gate_core::ScoreWeights;
use test_gate_sandbox::DEFAULT_MAX_OUTPUT_BYTES;
use test_gate_sandbox::ProcessSandboxConfig;
use test_gate_sandbox::ToolchainSpec;
use test_gate_sandbox::Toolchains;
use test_gate_sandbox::java_toolchain;
use test_gate_store_sqlite::SqliteStoreConfig;
use test_gate_store_sqlite::SqliteStoreMode;
use test_gate_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "test-gate.toml";
/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "TEST_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` database path.
pub const DEFAULT_STORE_PATH: &str = ".test-gate/test-gate.db";
/// Upper bound for the per-artifact sandbox timeout.
pub(crate) const MAX_SANDBOX_TIMEOUT_MS: u64 = 60 * 60 * 1000;
/// Upper bound for concurrent evaluations.
pub(crate) const MAX_WORKERS: usize = 64;
/// Upper bound for the accepted artifact size.
pub(crate) const MAX_SOURCE_BYTES_LIMIT: usize = 10 * 1024 * 1024;
/// Upper bound for captured sandbox output per stream.
pub(crate) const MAX_OUTPUT_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for the sandbox memory ceiling.
pub(crate) const MAX_MEMORY_LIMIT_MB: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Test Gate configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Default evaluation mode.
    #[serde(default)]
    pub mode: Mode,
    /// Scores below this threshold route artifacts to review.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// Per-artifact sandbox wall-clock limit in milliseconds.
    #[serde(default = "default_sandbox_timeout_ms")]
    pub sandbox_timeout_ms: u64,
    /// Pending review lifetime in milliseconds; `0` disables expiry.
    #[serde(default = "default_review_expiry_ms")]
    pub review_expiry_ms: u64,
    /// Regexes that block an artifact outright.
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    /// Policy checker settings.
    #[serde(default)]
    pub policy: PolicySection,
    /// Sandbox settings.
    #[serde(default)]
    pub sandbox: SandboxSection,
    /// Review and report store settings.
    #[serde(default)]
    pub store: StoreSection,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditSection,
    /// File the configuration was loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            score_threshold: default_score_threshold(),
            sandbox_timeout_ms: default_sandbox_timeout_ms(),
            review_expiry_ms: default_review_expiry_ms(),
            forbidden_patterns: Vec::new(),
            policy: PolicySection::default(),
            sandbox: SandboxSection::default(),
            store: StoreSection::default(),
            audit: AuditSection::default(),
            source: None,
        }
    }
}

impl GateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path, env::var(CONFIG_ENV_VAR).ok())?;
        validate_path(&resolved)?;
        if !explicit && !resolved.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content =
            std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown fields and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.score_threshold.is_finite() || !(0.0 ..= 1.0).contains(&self.score_threshold) {
            return Err(ConfigError::Invalid("score_threshold must be within [0, 1]".to_string()));
        }
        if self.sandbox_timeout_ms == 0 || self.sandbox_timeout_ms > MAX_SANDBOX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "sandbox_timeout_ms must be within [1, {MAX_SANDBOX_TIMEOUT_MS}]"
            )));
        }
        for pattern in &self.forbidden_patterns {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Invalid("forbidden_patterns entries must be non-empty".to_string()));
            }
        }
        self.policy.validate()?;
        self.sandbox.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        PolicyChecker::new(self.policy_config()).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(())
    }

    /// Builds the policy checker configuration.
    #[must_use]
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            min_test_name_length: self.policy.min_test_name_length,
            max_test_lines: self.policy.max_test_lines,
            max_source_bytes: self.policy.max_source_bytes,
            max_assertions_per_test: self.policy.max_assertions_per_test,
            weights: self.policy.weights,
            forbidden_patterns: self.forbidden_patterns.clone(),
            rules: self.policy.rules.clone(),
        }
    }

    /// Builds the per-run sandbox limits.
    #[must_use]
    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            timeout: Duration::from_millis(self.sandbox_timeout_ms),
            memory_limit_bytes: self.sandbox.memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024)),
        }
    }

    /// Builds the harness configuration.
    #[must_use]
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            score_threshold: self.score_threshold,
            sandbox_enabled: self.sandbox.enabled,
            limits: self.sandbox_limits(),
        }
    }

    /// Builds the review expiry policy.
    #[must_use]
    pub const fn review_policy(&self) -> ReviewPolicy {
        ReviewPolicy {
            expiry_ms: if self.review_expiry_ms == 0 { None } else { Some(self.review_expiry_ms) },
        }
    }

    /// Builds the orchestrator configuration, optionally overriding the mode.
    #[must_use]
    pub fn orchestrator_config(&self, mode: Option<Mode>) -> OrchestratorConfig {
        OrchestratorConfig {
            mode: mode.unwrap_or(self.mode),
            max_workers: self.sandbox.max_workers,
        }
    }

    /// Builds the process sandbox configuration.
    ///
    /// Configured toolchains replace the built-in entry for the same language.
    #[must_use]
    pub fn process_sandbox_config(&self) -> ProcessSandboxConfig {
        let mut toolchains = Toolchains::default();
        if let Some(classpath) = &self.sandbox.java_classpath {
            toolchains.insert(&Language::Java, java_toolchain(classpath));
        }
        for (label, spec) in &self.sandbox.toolchains {
            toolchains.insert(&Language::parse(label), spec.clone());
        }
        ProcessSandboxConfig {
            toolchains,
            run_tests: self.sandbox.run_tests,
            scratch_root: self.sandbox.scratch_root.clone(),
            max_output_bytes: self.sandbox.max_output_bytes,
        }
    }

    /// Builds the `SQLite` store configuration when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_store_config(&self) -> Option<SqliteStoreConfig> {
        match self.store.store_type {
            StoreType::Memory => None,
            StoreType::Sqlite => Some(SqliteStoreConfig {
                path: self.store.sqlite_path(),
                busy_timeout_ms: self.store.busy_timeout_ms,
                journal_mode: self.store.journal_mode,
                sync_mode: self.store.sync_mode,
            }),
        }
    }
}

/// Policy checker settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Minimum test name length in characters.
    #[serde(default = "default_min_test_name_length")]
    pub min_test_name_length: usize,
    /// Maximum lines per test unit.
    #[serde(default = "default_max_test_lines")]
    pub max_test_lines: usize,
    /// Maximum artifact size in bytes.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
    /// Assertions per test above which a test is flagged.
    #[serde(default = "default_max_assertions_per_test")]
    pub max_assertions_per_test: usize,
    /// Quality score weights.
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Extra rules appended to the built-in table.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            min_test_name_length: default_min_test_name_length(),
            max_test_lines: default_max_test_lines(),
            max_source_bytes: default_max_source_bytes(),
            max_assertions_per_test: default_max_assertions_per_test(),
            weights: ScoreWeights::default(),
            rules: Vec::new(),
        }
    }
}

impl PolicySection {
    /// Validates policy limits and weights.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_test_name_length == 0 {
            return Err(ConfigError::Invalid("policy.min_test_name_length must be greater than zero".to_string()));
        }
        if self.max_test_lines == 0 {
            return Err(ConfigError::Invalid("policy.max_test_lines must be greater than zero".to_string()));
        }
        if self.max_source_bytes == 0 || self.max_source_bytes > MAX_SOURCE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "policy.max_source_bytes must be within [1, {MAX_SOURCE_BYTES_LIMIT}]"
            )));
        }
        if self.max_assertions_per_test == 0 {
            return Err(ConfigError::Invalid(
                "policy.max_assertions_per_test must be greater than zero".to_string(),
            ));
        }
        let weights = self.weights.as_array();
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err(ConfigError::Invalid("policy.weights must be finite and non-negative".to_string()));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Invalid("policy.weights must not all be zero".to_string()));
        }
        for rule in &self.rules {
            if rule.rule_id.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("policy.rules entries require a rule_id".to_string()));
            }
            if rule.message.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("policy rule {} requires a message", rule.rule_id)));
            }
        }
        Ok(())
    }
}

/// Sandbox settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxSection {
    /// Whether the sandbox stage runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether test commands run after a successful check.
    #[serde(default)]
    pub run_tests: bool,
    /// Optional address-space ceiling for sandboxed processes.
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    /// Maximum artifacts evaluated concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Directory under which scratch directories are created.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    /// Cap on captured bytes per output stream.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Compile classpath for the built-in Java toolchain (for example the
    /// `JUnit` console jar); unset compiles against `/usr/share/java/*`.
    #[serde(default)]
    pub java_classpath: Option<String>,
    /// Toolchain overrides keyed by language label.
    #[serde(default)]
    pub toolchains: BTreeMap<String, ToolchainSpec>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            enabled: true,
            run_tests: false,
            memory_limit_mb: None,
            max_workers: default_max_workers(),
            scratch_root: None,
            max_output_bytes: default_max_output_bytes(),
            java_classpath: None,
            toolchains: BTreeMap::new(),
        }
    }
}

impl SandboxSection {
    /// Validates sandbox limits and toolchains.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 || self.max_workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!("sandbox.max_workers must be within [1, {MAX_WORKERS}]")));
        }
        if let Some(memory) = self.memory_limit_mb
            && (memory == 0 || memory > MAX_MEMORY_LIMIT_MB)
        {
            return Err(ConfigError::Invalid(format!(
                "sandbox.memory_limit_mb must be within [1, {MAX_MEMORY_LIMIT_MB}]"
            )));
        }
        if self.max_output_bytes == 0 || self.max_output_bytes > MAX_OUTPUT_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "sandbox.max_output_bytes must be within [1, {MAX_OUTPUT_BYTES_LIMIT}]"
            )));
        }
        if let Some(root) = &self.scratch_root {
            validate_path_string("sandbox.scratch_root", &root.to_string_lossy())?;
        }
        if self.java_classpath.as_deref().is_some_and(|classpath| classpath.trim().is_empty()) {
            return Err(ConfigError::Invalid("sandbox.java_classpath must be non-empty when set".to_string()));
        }
        for (label, spec) in &self.toolchains {
            if label.trim().is_empty() {
                return Err(ConfigError::Invalid("sandbox.toolchains keys must be non-empty".to_string()));
            }
            if spec.check.is_empty() {
                return Err(ConfigError::Invalid(format!("sandbox.toolchains.{label}.check must be non-empty")));
            }
        }
        Ok(())
    }
}

/// Review and report store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path; defaults to [`DEFAULT_STORE_PATH`].
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreSection {
    /// Returns the effective `SQLite` path.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => validate_path_string("store.path", &self.sqlite_path().to_string_lossy()),
        }
    }
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store; contents are lost on exit.
    Memory,
    /// `SQLite`-backed durable store.
    #[default]
    Sqlite,
}

/// Audit sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    /// Whether audit events are emitted.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Append-only JSON lines file; stderr when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditSection {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// Returns the path and whether it was named explicitly.
fn resolve_path(path: Option<&Path>, env_value: Option<String>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Some(env_path) = env_value.filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Returns `true` for serde defaults.
const fn default_true() -> bool {
    true
}

/// Returns the default review score threshold.
const fn default_score_threshold() -> f64 {
    0.6
}

/// Returns the default sandbox timeout in milliseconds.
const fn default_sandbox_timeout_ms() -> u64 {
    30_000
}

/// Returns the default review expiry (seven days) in milliseconds.
const fn default_review_expiry_ms() -> u64 {
    7 * 24 * 60 * 60 * 1000
}

/// Returns the default minimum test name length.
const fn default_min_test_name_length() -> usize {
    10
}

/// Returns the default maximum lines per test.
const fn default_max_test_lines() -> usize {
    100
}

/// Returns the default maximum artifact size in bytes.
const fn default_max_source_bytes() -> usize {
    10_000
}

/// Returns the default assertion count threshold.
const fn default_max_assertions_per_test() -> usize {
    8
}

/// Returns the default worker count.
const fn default_max_workers() -> usize {
    4
}

/// Returns the default captured output cap.
const fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

/// Returns the default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn explicit_path_wins_over_environment() {
        let (path, explicit) =
            resolve_path(Some(Path::new("cli.toml")), Some("env.toml".to_string())).unwrap();
        assert_eq!(path, PathBuf::from("cli.toml"));
        assert!(explicit);
    }

    #[test]
    fn environment_path_is_explicit() {
        let (path, explicit) = resolve_path(None, Some("env.toml".to_string())).unwrap();
        assert_eq!(path, PathBuf::from("env.toml"));
        assert!(explicit);
    }

    #[test]
    fn blank_environment_falls_back_to_default_name() {
        let (path, explicit) = resolve_path(None, Some("  ".to_string())).unwrap();
        assert_eq!(path, PathBuf::from(DEFAULT_CONFIG_NAME));
        assert!(!explicit);
    }

    #[test]
    fn overlong_environment_path_is_rejected() {
        let err = resolve_path(None, Some("x".repeat(MAX_TOTAL_PATH_LENGTH + 1))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
