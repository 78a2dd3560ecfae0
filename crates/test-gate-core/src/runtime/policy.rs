// crates/test-gate-core/src/runtime/policy.rs
// ============================================================================
// Module: Test Gate Policy Checker
// Description: Static policy enforcement and quality scoring for artifacts.
// Purpose: Produce violations and an advisory score without executing code.
// Dependencies: regex, serde, crate::{core, runtime::{lexer, rules, units}}
// ============================================================================

//! ## Overview
//! [`PolicyChecker::check`] is a pure function of the artifact text, its
//! language, and the immutable checker configuration. It scans the text,
//! runs the pattern rule table, extracts test units for structural rules,
//! and computes a weighted quality score.
//!
//! Security posture: artifact text is untrusted input; the checker never
//! executes it and never reads anything besides the artifact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::core::Artifact;
use crate::core::Language;
use crate::core::Location;
use crate::core::PolicyOutcome;
use crate::core::PolicyViolation;
use crate::core::QualityBreakdown;
use crate::core::RuleCategory;
use crate::core::RuleId;
use crate::core::Severity;
use crate::core::UNPARSEABLE_RULE_ID;
use crate::core::round_score;
use crate::runtime::lexer::ScannedSource;
use crate::runtime::lexer::scan;
use crate::runtime::rules::RuleError;
use crate::runtime::rules::RuleSet;
use crate::runtime::rules::RuleSpec;
use crate::runtime::rules::builtin_rules;
use crate::runtime::rules::snippet;
use crate::runtime::units::TestUnit;
use crate::runtime::units::UnitPatterns;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Test names that never describe behavior.
const GENERIC_TEST_NAMES: &[&str] = &[
    "test", "test1", "test2", "test_1", "test_it", "test_foo", "test_bar", "test_basic",
    "test_simple", "test_example", "test_sample", "test_works", "test_stuff", "it works",
    "works", "my test", "example", "sample",
];

/// Fixture pairs whose setup half requires a teardown half.
const FIXTURE_PAIRS: &[(&str, &str)] = &[
    (r"\bsetUp\s*\(", r"\btearDown\s*\("),
    (r"\bsetUpClass\s*\(", r"\btearDownClass\s*\("),
    (r"\bsetup_method\s*\(", r"\bteardown_method\s*\("),
    (r"\bsetup_function\s*\(", r"\bteardown_function\s*\("),
    (r"\bsetup_module\s*\(", r"\bteardown_module\s*\("),
    (r"\bbeforeEach\s*\(", r"\bafterEach\s*\("),
    (r"\bbeforeAll\s*\(", r"\bafterAll\s*\("),
    (r"@BeforeEach\b", r"@AfterEach\b"),
    (r"@BeforeAll\b", r"@AfterAll\b"),
    (r"@Before\b", r"@After\b"),
];

/// Rule ids whose lines count as weak assertions when scoring.
const WEAK_ASSERTION_RULES: &[&str] = &["trivial-assertion", "vague-assertion"];

/// Rule id for broad exception handlers.
const SWALLOW_RULE_ID: &str = "broad-exception-swallow";

/// Rule id for fixture asymmetry.
const ASYMMETRY_RULE_ID: &str = "setup-teardown-asymmetry";

/// Rule id for async tests that never wait on their promises.
const ASYNC_RULE_ID: &str = "async-without-await";

/// Rule id for non-descriptive names.
const NAMING_RULE_ID: &str = "non-descriptive-test-name";

/// Substrings in test names that signal negative or boundary cases.
const NEGATIVE_NAME_MARKERS: &[&str] = &[
    "invalid", "error", "fail", "empty", "missing", "negative", "zero", "null", "none",
    "boundary", "edge", "overflow", "raise", "throw", "reject", "without", "exceed", "limit",
    "not_", "_not",
];

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Weights of the five quality sub-signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    /// Naming clarity weight.
    #[serde(default = "default_naming_weight")]
    pub naming: f64,
    /// Assertion specificity weight.
    #[serde(default = "default_assertion_weight")]
    pub assertion: f64,
    /// Isolation weight.
    #[serde(default = "default_isolation_weight")]
    pub isolation: f64,
    /// Edge-case breadth weight.
    #[serde(default = "default_edge_case_weight")]
    pub edge_cases: f64,
    /// Documentation weight.
    #[serde(default = "default_documentation_weight")]
    pub documentation: f64,
}

impl ScoreWeights {
    /// Returns the weights in breakdown order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 5] {
        [self.naming, self.assertion, self.isolation, self.edge_cases, self.documentation]
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            naming: default_naming_weight(),
            assertion: default_assertion_weight(),
            isolation: default_isolation_weight(),
            edge_cases: default_edge_case_weight(),
            documentation: default_documentation_weight(),
        }
    }
}

/// Default naming weight.
const fn default_naming_weight() -> f64 {
    0.20
}

/// Default assertion weight.
const fn default_assertion_weight() -> f64 {
    0.30
}

/// Default isolation weight.
const fn default_isolation_weight() -> f64 {
    0.20
}

/// Default edge-case weight.
const fn default_edge_case_weight() -> f64 {
    0.15
}

/// Default documentation weight.
const fn default_documentation_weight() -> f64 {
    0.15
}

/// Immutable policy checker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Minimum test name length in characters.
    pub min_test_name_length: usize,
    /// Maximum lines per test unit.
    pub max_test_lines: usize,
    /// Maximum artifact size in bytes.
    pub max_source_bytes: usize,
    /// Assertions per test above which the test is flagged as doing too much.
    pub max_assertions_per_test: usize,
    /// Score weights.
    pub weights: ScoreWeights,
    /// Regexes that block an artifact outright.
    pub forbidden_patterns: Vec<String>,
    /// Extra rules appended to the built-in table.
    pub rules: Vec<RuleSpec>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_test_name_length: 10,
            max_test_lines: 100,
            max_source_bytes: 10_000,
            max_assertions_per_test: 8,
            weights: ScoreWeights::default(),
            forbidden_patterns: Vec::new(),
            rules: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Policy Checker
// ============================================================================

/// Static policy checker.
///
/// # Invariants
/// - `check` is deterministic: equal (text, language) inputs yield equal outcomes.
/// - A blocking violation forces the score to `0.0`.
#[derive(Debug, Clone)]
pub struct PolicyChecker {
    /// Checker configuration.
    config: PolicyConfig,
    /// Compiled pattern rules.
    rules: RuleSet,
    /// Test unit extraction patterns.
    units: UnitPatterns,
    /// Compiled fixture pairs.
    fixtures: Vec<(Regex, Regex)>,
    /// Edge-case indicator patterns.
    indicators: EdgeCaseIndicators,
    /// JUnit `@Test` marker.
    junit_test: Regex,
    /// JUnit import.
    junit_import: Regex,
    /// `async` keyword in a test declaration.
    async_marker: Regex,
    /// Constructs that settle an async test body.
    async_settle: Regex,
}

/// Compiled edge-case indicators.
#[derive(Debug, Clone)]
struct EdgeCaseIndicators {
    /// Expected-exception constructs.
    exception: Regex,
    /// Boundary literals.
    boundary: Regex,
    /// Parametrized tests.
    parametrized: Regex,
}

/// Compiles an internal pattern, reporting it under a synthetic rule id.
fn internal_regex(rule_id: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|err| RuleError::InvalidPattern {
        rule_id: rule_id.to_string(),
        field: "pattern",
        message: err.to_string(),
    })
}

impl PolicyChecker {
    /// Builds a checker from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when a configured pattern fails to compile.
    pub fn new(config: PolicyConfig) -> Result<Self, RuleError> {
        let mut specs = builtin_rules();
        specs.extend(config.forbidden_patterns.iter().map(|pattern| RuleSpec::forbidden_pattern(pattern)));
        specs.extend(config.rules.iter().cloned());
        let rules = RuleSet::compile(specs)?;
        let units = UnitPatterns::compile().map_err(|err| RuleError::InvalidPattern {
            rule_id: "test-units".to_string(),
            field: "pattern",
            message: err.to_string(),
        })?;
        let fixtures = FIXTURE_PAIRS
            .iter()
            .map(|(setup, teardown)| {
                Ok((internal_regex(ASYMMETRY_RULE_ID, setup)?, internal_regex(ASYMMETRY_RULE_ID, teardown)?))
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        let indicators = EdgeCaseIndicators {
            exception: internal_regex(
                "edge-cases",
                r"pytest\.raises|assertRaises|\.toThrow|\.rejects\.|assertThrows|expectedExceptions|@Test\s*\(\s*expected",
            )?,
            boundary: internal_regex(
                "edge-cases",
                r#"-1\b|\bNone\b|\bnull\b|\bundefined\b|\bNaN\b|\b(MAX|MIN)_VALUE\b|\bsys\.maxsize\b|""|''|\[\s*\]"#,
            )?,
            parametrized: internal_regex(
                "edge-cases",
                r"@pytest\.mark\.parametrize|@ParameterizedTest|\.each\s*[(`\[]|\bsubTest\s*\(|@ValueSource|@CsvSource|@MethodSource",
            )?,
        };
        Ok(Self {
            config,
            rules,
            units,
            fixtures,
            indicators,
            junit_test: internal_regex("missing-junit-import", r"@Test\b")?,
            junit_import: internal_regex("missing-junit-import", r"\bimport\s+(static\s+)?org\.junit")?,
            async_marker: internal_regex(ASYNC_RULE_ID, r"\basync\b")?,
            async_settle: internal_regex(ASYNC_RULE_ID, r"\b(await|return)\b|\.(resolves|rejects)\b")?,
        })
    }

    /// Returns the checker configuration.
    #[must_use]
    pub const fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Checks one artifact.
    #[must_use]
    pub fn check(&self, artifact: &Artifact) -> PolicyOutcome {
        let raw = artifact.source_text();
        let language = artifact.language();
        let scanned = match scan(raw, language) {
            Ok(scanned) => scanned,
            Err(err) => {
                let location = err.line.map_or(Location::File, |line| Location::Line {
                    line,
                });
                return PolicyOutcome {
                    violations: vec![PolicyViolation {
                        rule_id: RuleId::new(UNPARSEABLE_RULE_ID),
                        category: RuleCategory::Syntax,
                        severity: Severity::Block,
                        location,
                        message: format!("source is not valid {language}: {err}"),
                        snippet: None,
                    }],
                    score: 0.0,
                    breakdown: QualityBreakdown::default(),
                };
            }
        };

        let units = self.units.extract(raw, &scanned, language);
        let mut violations = self.rules.evaluate(raw, &scanned, language);
        violations.extend(self.structural_violations(raw, &scanned, language, &units));
        violations.sort_by(|left, right| left.sort_key().cmp(&right.sort_key()));
        violations.dedup_by(|left, right| left.sort_key() == right.sort_key());

        let breakdown = self.breakdown(&scanned, &units, &violations);
        let weighted = weighted_average(&self.config.weights, &breakdown);
        let score = if violations.iter().any(PolicyViolation::is_blocking) {
            0.0
        } else {
            round_score(weighted)
        };
        PolicyOutcome {
            violations,
            score,
            breakdown,
        }
    }

    /// Computes per-unit and file-level structural violations.
    fn structural_violations(
        &self,
        raw: &str,
        scanned: &ScannedSource,
        language: &Language,
        units: &[TestUnit],
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let code = scanned.code();

        if raw.len() > self.config.max_source_bytes {
            violations.push(file_violation(
                "source-too-large",
                format!(
                    "artifact is {} bytes, limit is {}",
                    raw.len(),
                    self.config.max_source_bytes
                ),
            ));
        }
        if units.is_empty() && !matches!(language, Language::Other(_)) {
            violations.push(file_violation("no-test-units", "no test functions found".to_string()));
        }
        if matches!(language, Language::Java)
            && self.junit_test.is_match(code)
            && !self.junit_import.is_match(code)
        {
            violations.push(file_violation(
                "missing-junit-import",
                "uses @Test without importing JUnit".to_string(),
            ));
        }
        for (setup, teardown) in &self.fixtures {
            if let Some(found) = setup.find(code)
                && !teardown.is_match(code)
            {
                let line = scanned.line_of(found.start());
                violations.push(unit_violation(
                    ASYMMETRY_RULE_ID,
                    RuleCategory::Structural,
                    line,
                    "setup fixture has no matching teardown".to_string(),
                    raw,
                    scanned,
                ));
            }
        }

        for unit in units {
            if unit.assertion_count == 0 {
                violations.push(unit_violation(
                    "missing-assertion",
                    RuleCategory::AssertionQuality,
                    unit.line,
                    format!("test `{}` has no assertions", unit.name),
                    raw,
                    scanned,
                ));
            }
            if self.is_non_descriptive(&unit.name) {
                violations.push(unit_violation(
                    NAMING_RULE_ID,
                    RuleCategory::Structural,
                    unit.line,
                    format!("test name `{}` does not describe the behavior under test", unit.name),
                    raw,
                    scanned,
                ));
            }
            if let Some(message) = self.multiple_behaviors(unit) {
                violations.push(unit_violation(
                    "multiple-behaviors",
                    RuleCategory::Structural,
                    unit.line,
                    message,
                    raw,
                    scanned,
                ));
            }
            if matches!(language, Language::JavaScript | Language::TypeScript)
                && let Some(body) = unit_code(scanned, unit)
                && self.async_marker.is_match(body)
                && !self.async_settle.is_match(body)
            {
                violations.push(unit_violation(
                    ASYNC_RULE_ID,
                    RuleCategory::AssertionQuality,
                    unit.line,
                    format!("async test `{}` never awaits or returns a promise", unit.name),
                    raw,
                    scanned,
                ));
            }
            if unit.line_span() > self.config.max_test_lines {
                violations.push(unit_violation(
                    "test-too-long",
                    RuleCategory::Structural,
                    unit.line,
                    format!(
                        "test `{}` spans {} lines, limit is {}",
                        unit.name,
                        unit.line_span(),
                        self.config.max_test_lines
                    ),
                    raw,
                    scanned,
                ));
            }
        }
        violations
    }

    /// Returns true when a test name is too short or generic.
    fn is_non_descriptive(&self, name: &str) -> bool {
        let normalized = name.trim().to_ascii_lowercase();
        normalized.chars().count() < self.config.min_test_name_length
            || GENERIC_TEST_NAMES.contains(&normalized.as_str())
    }

    /// Returns a message when a test appears to cover several behaviors.
    fn multiple_behaviors(&self, unit: &TestUnit) -> Option<String> {
        if has_conjunction(&unit.name) {
            return Some(format!("test `{}` names more than one behavior", unit.name));
        }
        if unit.assertion_count > self.config.max_assertions_per_test {
            return Some(format!(
                "test `{}` has {} assertions, limit is {}",
                unit.name, unit.assertion_count, self.config.max_assertions_per_test
            ));
        }
        None
    }

    /// Computes the five quality sub-signals.
    fn breakdown(
        &self,
        scanned: &ScannedSource,
        units: &[TestUnit],
        violations: &[PolicyViolation],
    ) -> QualityBreakdown {
        let naming = mean(units.iter().map(|unit| {
            if has_rule_at(violations, NAMING_RULE_ID, unit.line) {
                0.0
            } else if name_words(&unit.name) >= 3 {
                1.0
            } else {
                0.6
            }
        }));
        let assertion = mean(units.iter().map(|unit| {
            if unit.assertion_count == 0 {
                return 0.0;
            }
            let weak = violations
                .iter()
                .filter(|violation| WEAK_ASSERTION_RULES.contains(&violation.rule_id.as_str()))
                .filter_map(|violation| violation.location.line())
                .filter(|line| unit.contains_line(*line))
                .count()
                .min(unit.assertion_count);
            ratio(unit.assertion_count - weak, unit.assertion_count)
        }));
        let asymmetry = violations.iter().any(|violation| violation.rule_id.as_str() == ASYMMETRY_RULE_ID);
        let swallow = violations.iter().any(|violation| violation.rule_id.as_str() == SWALLOW_RULE_ID);
        let mut isolation = 1.0;
        if asymmetry {
            isolation -= 0.5;
        }
        if swallow {
            isolation -= 0.25;
        }
        let edge_cases = self.edge_case_score(scanned, units);
        let documentation = ratio(units.iter().filter(|unit| unit.has_doc).count(), units.len());
        QualityBreakdown {
            naming: round_score(naming),
            assertion: round_score(assertion),
            isolation: round_score(isolation),
            edge_cases: round_score(edge_cases),
            documentation: round_score(documentation),
        }
    }

    /// Scores edge-case breadth as the fraction of indicator categories present.
    fn edge_case_score(&self, scanned: &ScannedSource, units: &[TestUnit]) -> f64 {
        let code = scanned.code();
        let negative_names = units.iter().any(|unit| {
            let name = unit.name.to_ascii_lowercase();
            NEGATIVE_NAME_MARKERS.iter().any(|marker| name.contains(marker))
        });
        let present = [
            self.indicators.exception.is_match(code),
            self.indicators.boundary.is_match(code),
            self.indicators.parametrized.is_match(code),
            negative_names,
        ]
        .iter()
        .filter(|flag| **flag)
        .count();
        ratio(present, 4)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a file-level structural warning.
fn file_violation(rule_id: &str, message: String) -> PolicyViolation {
    PolicyViolation {
        rule_id: RuleId::new(rule_id),
        category: RuleCategory::Structural,
        severity: Severity::Warn,
        location: Location::File,
        message,
        snippet: None,
    }
}

/// Builds a line-level warning.
fn unit_violation(
    rule_id: &str,
    category: RuleCategory,
    line: usize,
    message: String,
    raw: &str,
    scanned: &ScannedSource,
) -> PolicyViolation {
    PolicyViolation {
        rule_id: RuleId::new(rule_id),
        category,
        severity: Severity::Warn,
        location: Location::Line {
            line,
        },
        message,
        snippet: snippet(raw, scanned, line),
    }
}

/// Returns the code view of a test from its declaration to its last line.
fn unit_code<'a>(scanned: &'a ScannedSource, unit: &TestUnit) -> Option<&'a str> {
    let (start, _) = scanned.line_span(unit.line)?;
    let (_, end) = scanned.line_span(unit.end_line)?;
    scanned.code().get(start .. end)
}

/// Returns true when a rule fired on the given line.
fn has_rule_at(violations: &[PolicyViolation], rule_id: &str, line: usize) -> bool {
    violations
        .iter()
        .any(|violation| violation.rule_id.as_str() == rule_id && violation.location.line() == Some(line))
}

/// Returns true when a test name joins behaviors with "and".
fn has_conjunction(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.contains("_and_") || lower.contains(" and ") {
        return true;
    }
    name.match_indices("And").any(|(index, _)| {
        let before = name[.. index].chars().next_back();
        let after = name[index + 3 ..].chars().next();
        before.is_some_and(char::is_lowercase) && after.is_some_and(char::is_uppercase)
    })
}

/// Counts words in a test name, ignoring a leading `test` prefix.
fn name_words(name: &str) -> usize {
    let mut words = 0;
    let mut in_word = false;
    let mut previous_lower = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if !in_word || (previous_lower && ch.is_uppercase()) {
                words += 1;
            }
            in_word = true;
            previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
        } else {
            in_word = false;
            previous_lower = false;
        }
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("test") && words > 0 { words - 1 } else { words }
}

/// Returns the mean of an iterator of values, or `0.0` when empty.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), value| (sum + value, count + 1));
    if count == 0 { 0.0 } else { sum / f64::from(count) }
}

/// Returns `part / whole`, or `0.0` when `whole` is zero.
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let part = u32::try_from(part).unwrap_or(u32::MAX);
    let whole = u32::try_from(whole).unwrap_or(u32::MAX);
    f64::from(part) / f64::from(whole)
}

/// Returns the weighted average of the breakdown.
fn weighted_average(weights: &ScoreWeights, breakdown: &QualityBreakdown) -> f64 {
    let values = [
        breakdown.naming,
        breakdown.assertion,
        breakdown.isolation,
        breakdown.edge_cases,
        breakdown.documentation,
    ];
    let weights = weights.as_array();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    values.iter().zip(weights.iter()).map(|(value, weight)| value * weight).sum::<f64>() / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjunction_detection_covers_snake_and_camel_case() {
        assert!(has_conjunction("test_create_and_delete_user"));
        assert!(has_conjunction("createAndDeleteUser"));
        assert!(has_conjunction("creates and deletes a user"));
        assert!(!has_conjunction("test_handles_android_devices"));
        assert!(!has_conjunction("testAndroidLayout"));
    }

    #[test]
    fn name_words_ignores_test_prefix() {
        assert_eq!(name_words("test_parse_empty_input"), 3);
        assert_eq!(name_words("testParseEmptyInput"), 3);
        assert_eq!(name_words("rejects an empty password"), 4);
    }

    #[test]
    fn weighted_average_with_zero_weights_is_zero() {
        let weights = ScoreWeights {
            naming: 0.0,
            assertion: 0.0,
            isolation: 0.0,
            edge_cases: 0.0,
            documentation: 0.0,
        };
        let breakdown = QualityBreakdown {
            naming: 1.0,
            assertion: 1.0,
            isolation: 1.0,
            edge_cases: 1.0,
            documentation: 1.0,
        };
        assert!(weighted_average(&weights, &breakdown).abs() < f64::EPSILON);
    }
}
