// crates/test-gate-core/src/runtime/rules.rs
// ============================================================================
// Module: Test Gate Rule Tables
// Description: Data-driven policy rules and their generic regex matcher.
// Purpose: Detect forbidden constructs in artifact text without per-rule code.
// Dependencies: regex, serde, thiserror, crate::{core, runtime::lexer}
// ============================================================================

//! ## Overview
//! Every pattern rule is a [`RuleSpec`] row: a regex, the languages it applies
//! to, the masked view it runs against, and optional exemptions. A single
//! matcher evaluates all rows; adding a rule never adds code.
//!
//! Exemptions are matched against the comment-masked text view so that
//! string arguments such as `patch("requests.get")` count as evidence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Language;
use crate::core::Location;
use crate::core::PolicyViolation;
use crate::core::RuleCategory;
use crate::core::RuleId;
use crate::core::Severity;
use crate::runtime::lexer::ScannedSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Rule identifier used for configured forbidden patterns.
pub const FORBIDDEN_PATTERN_RULE_ID: &str = "forbidden-pattern";

/// Maximum snippet length in characters.
const MAX_SNIPPET_CHARS: usize = 120;

// ============================================================================
// SECTION: Rule Specs
// ============================================================================

/// Source view a rule pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// Comments and string contents masked.
    #[default]
    Code,
    /// Comments masked, string contents visible.
    Text,
    /// Raw source including comments.
    Raw,
}

/// Declarative policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Rule identifier reported in violations.
    pub rule_id: RuleId,
    /// Rule category.
    pub category: RuleCategory,
    /// Violation severity.
    pub severity: Severity,
    /// Regex matched against the scoped view.
    pub pattern: String,
    /// Languages the rule applies to; empty means all.
    #[serde(default)]
    pub languages: Vec<Language>,
    /// Violation message.
    pub message: String,
    /// Source view to match.
    #[serde(default)]
    pub scope: MatchScope,
    /// Whole-artifact exemption regex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exempt_if_source: Option<String>,
    /// Same-line exemption regex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exempt_if_line: Option<String>,
}

impl RuleSpec {
    /// Builds the blocking rule for one configured forbidden pattern.
    #[must_use]
    pub fn forbidden_pattern(pattern: &str) -> Self {
        Self {
            rule_id: RuleId::new(FORBIDDEN_PATTERN_RULE_ID),
            category: RuleCategory::Custom,
            severity: Severity::Block,
            pattern: pattern.to_string(),
            languages: Vec::new(),
            message: format!("forbidden pattern `{pattern}` matched"),
            scope: MatchScope::Text,
            exempt_if_source: None,
            exempt_if_line: None,
        }
    }
}

// ============================================================================
// SECTION: Built-in Table
// ============================================================================

/// Static row of the built-in rule table.
struct BuiltinRule {
    /// Rule identifier.
    rule_id: &'static str,
    /// Rule category.
    category: RuleCategory,
    /// Violation severity.
    severity: Severity,
    /// Source view.
    scope: MatchScope,
    /// Match pattern.
    pattern: &'static str,
    /// Whole-artifact exemption.
    exempt_if_source: Option<&'static str>,
    /// Same-line exemption.
    exempt_if_line: Option<&'static str>,
    /// Violation message.
    message: &'static str,
}

/// Built-in pattern rules.
const BUILTIN_RULES: &[BuiltinRule] = &[
    BuiltinRule {
        rule_id: "nondeterministic-random",
        category: RuleCategory::Determinism,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"\brandom\.(random|randint|choice|choices|shuffle|uniform|sample|randrange|getrandbits)\s*\(|\bMath\.random\s*\(|\bnew\s+Random\s*\(\s*\)|\buuid\.uuid4\s*\(|\bcrypto\.randomUUID\s*\(|\bUUID\.randomUUID\s*\(|\bnp\.random\.(rand|randn|randint|choice|random)\s*\(",
        exempt_if_source: Some(
            r"\brandom\.seed\s*\(|\bnp\.random\.seed\s*\(|\bseedrandom\b|\bsetSeed\s*\(|\bfaker\.seed",
        ),
        exempt_if_line: None,
        message: "unseeded random value makes the test nondeterministic",
    },
    BuiltinRule {
        rule_id: "uncontrolled-sleep",
        category: RuleCategory::Determinism,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"(?m)\btime\.sleep\s*\(|\basyncio\.sleep\s*\(\s*(0\.\d*[1-9]|[1-9])|\bThread\.sleep\s*\(|\bsetTimeout\s*\(|\bTimeUnit\.\w+\.sleep\s*\(|^\s*sleep\s*\(",
        exempt_if_source: Some(
            r"useFakeTimers|freeze_time|freezegun|patch\([^)]*sleep|monkeypatch\.setattr\([^)]*sleep",
        ),
        exempt_if_line: None,
        message: "real sleep makes the test timing-dependent",
    },
    BuiltinRule {
        rule_id: "live-network-call",
        category: RuleCategory::Determinism,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"\brequests\.(get|post|put|delete|patch|head|request)\s*\(|\burlopen\s*\(|\bhttpx\.(get|post|put|delete|patch|Client|AsyncClient)\b|\baiohttp\.ClientSession\s*\(|\bsocket\.socket\s*\(|(?m:^|[^.\w\n])fetch\s*\(|\baxios(\.(get|post|put|delete|patch|request))?\s*\(|\bhttps?\.(get|request)\s*\(|\.openConnection\s*\(|\bHttpClient\.new(HttpClient|Builder)\s*\(|\bnew\s+Socket\s*\(",
        exempt_if_source: Some(
            r"requests_mock|responses\.activate|\bnock\s*\(|jest\.mock\s*\(|vi\.mock\s*\(|setupServer|httpretty|respx|MockWebServer|WireMock|patch\([^)]*(requests|urlopen|httpx|fetch)",
        ),
        exempt_if_line: None,
        message: "live network access makes the test depend on external services",
    },
    BuiltinRule {
        rule_id: "hardcoded-local-endpoint",
        category: RuleCategory::Isolation,
        severity: Severity::Block,
        scope: MatchScope::Text,
        pattern: r"\blocalhost:\d+|\b127\.0\.0\.1\b",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "test depends on a hard-coded local endpoint",
    },
    BuiltinRule {
        rule_id: "wall-clock-assertion",
        category: RuleCategory::Determinism,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"\b(assert\w*|expect)\b[^\n]*(datetime\.(now|utcnow)\s*\(|\btime\.time\s*\(|\bdate\.today\s*\(|\bDate\.now\s*\(|\bnew\s+Date\s*\(\s*\)|\bSystem\.currentTimeMillis\s*\(|\b(LocalDateTime|LocalDate|Instant)\.now\s*\()",
        exempt_if_source: Some(
            r"freezegun|freeze_time|time_machine|useFakeTimers|setSystemTime|Clock\.fixed|mockdate",
        ),
        exempt_if_line: None,
        message: "assertion depends on the current wall-clock time",
    },
    BuiltinRule {
        rule_id: "filesystem-write-outside-tmp",
        category: RuleCategory::Isolation,
        severity: Severity::Block,
        scope: MatchScope::Text,
        pattern: r#"\bopen\s*\([^)\n]*,\s*['"](w|a|x|wb|ab|xb|w\+|a\+|r\+)['"]|\.write_(text|bytes)\s*\(|\bos\.(remove|unlink|makedirs|mkdir|rmdir|rename)\s*\(|\bshutil\.(rmtree|copy|copyfile|move)\s*\(|\bfs\.(writeFileSync|writeFile|appendFileSync|appendFile|mkdirSync|rmSync|unlinkSync|rmdirSync)\s*\(|\bnew\s+(FileWriter|FileOutputStream)\s*\(|\bFiles\.(write|writeString|createFile|delete|createDirectory|createDirectories)\s*\("#,
        exempt_if_source: None,
        exempt_if_line: Some(
            r"tmp_path|tmpdir|tempfile|TemporaryDirectory|mkdtemp|gettempdir|os\.tmpdir|@TempDir|tempDir|createTempFile|createTempDirectory|/tmp/",
        ),
        message: "test writes to the filesystem outside a temporary directory",
    },
    BuiltinRule {
        rule_id: "process-spawn",
        category: RuleCategory::Isolation,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"\bsubprocess\.(run|call|Popen|check_call|check_output)\s*\(|\bos\.(system|popen|spawn\w*|exec\w*)\s*\(|\bchild_process\b|\b(execSync|spawnSync|execFileSync)\s*\(|\bRuntime\.getRuntime\s*\(\s*\)\.exec\s*\(|\bnew\s+ProcessBuilder\s*\(",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "test spawns an external process",
    },
    BuiltinRule {
        rule_id: "global-state-mutation",
        category: RuleCategory::Isolation,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"\bos\.environ\s*\[[^\]]*\]\s*=[^=]|\bos\.environ\.(update|setdefault|pop)\s*\(|\bos\.putenv\s*\(|\bprocess\.env\.\w+\s*=[^=]|\bprocess\.env\[[^\]]*\]\s*=[^=]|\bSystem\.setProperty\s*\(|(?m)^\s*global\s+\w+|\bwindow\.\w+\s*=[^=]|\bglobalThis\.\w+\s*=[^=]|\bsys\.path\.(append|insert)\s*\(",
        exempt_if_source: Some(
            r"monkeypatch|patch\.dict|tearDown|teardown|afterEach|afterAll|@AfterEach|@After\b|@AfterAll|addCleanup|replaceProperty|stubEnv",
        ),
        exempt_if_line: None,
        message: "test mutates global state without restoring it",
    },
    BuiltinRule {
        rule_id: "execution-order-dependency",
        category: RuleCategory::Isolation,
        severity: Severity::Block,
        scope: MatchScope::Code,
        pattern: r"@pytest\.mark\.(order|run|dependency)\b|@Order\s*\(|@TestMethodOrder\b|@FixMethodOrder\b|\bdependsOnMethods\b",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "test depends on execution order",
    },
    BuiltinRule {
        rule_id: "trivial-assertion",
        category: RuleCategory::AssertionQuality,
        severity: Severity::Warn,
        scope: MatchScope::Code,
        pattern: r"(?m)\bassert\s+(True|1)\s*$|\bassert\s+not\s+False\b|\bassert\s+1\s*==\s*1\b|\bassertTrue\s*\(\s*(True|true)\s*\)|\bexpect\s*\(\s*(true|1)\s*\)|\bassertEquals\s*\(\s*(true|1|0)\s*,\s*(true|1|0)\s*\)",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "assertion is always true",
    },
    BuiltinRule {
        rule_id: "vague-assertion",
        category: RuleCategory::AssertionQuality,
        severity: Severity::Warn,
        scope: MatchScope::Code,
        pattern: r"(?m)\bassert\s+[A-Za-z_][\w.]*\s+is\s+not\s+None\s*$|\bassert\s+[a-z_][\w.]*\s*$|\bassertIsNotNone\s*\(|\.toBeDefined\s*\(|\.toBeTruthy\s*\(|\.not\.toBeNull\s*\(|\.not\.toBeUndefined\s*\(|\bassertNotNull\s*\(",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "assertion only checks existence or truthiness",
    },
    BuiltinRule {
        rule_id: "broad-exception-swallow",
        category: RuleCategory::AssertionQuality,
        severity: Severity::Warn,
        scope: MatchScope::Code,
        pattern: r"\bexcept\s*:\s*(pass\b|\.\.\.)|\bexcept\s+(Exception|BaseException)(\s+as\s+\w+)?\s*:\s*(pass\b|\.\.\.)|\bcatch\s*(\([^)]*\))?\s*\{\s*\}",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "broad exception handler swallows failures",
    },
    BuiltinRule {
        rule_id: "todo-marker",
        category: RuleCategory::Structural,
        severity: Severity::Info,
        scope: MatchScope::Raw,
        pattern: r"\b(TODO|FIXME|XXX)\b",
        exempt_if_source: None,
        exempt_if_line: None,
        message: "unfinished work marker",
    },
];

/// Returns the built-in rule table as specs.
#[must_use]
pub fn builtin_rules() -> Vec<RuleSpec> {
    BUILTIN_RULES
        .iter()
        .map(|rule| RuleSpec {
            rule_id: RuleId::new(rule.rule_id),
            category: rule.category,
            severity: rule.severity,
            pattern: rule.pattern.to_string(),
            languages: Vec::new(),
            message: rule.message.to_string(),
            scope: rule.scope,
            exempt_if_source: rule.exempt_if_source.map(str::to_string),
            exempt_if_line: rule.exempt_if_line.map(str::to_string),
        })
        .collect()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while compiling rule tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A rule regex failed to compile.
    #[error("rule {rule_id} has invalid {field}: {message}")]
    InvalidPattern {
        /// Offending rule.
        rule_id: String,
        /// Field holding the regex.
        field: &'static str,
        /// Compiler message.
        message: String,
    },
}

// ============================================================================
// SECTION: Compiled Rules
// ============================================================================

/// Rule with its regexes compiled.
#[derive(Debug, Clone)]
struct CompiledRule {
    /// Declarative source.
    spec: RuleSpec,
    /// Match pattern.
    pattern: Regex,
    /// Whole-artifact exemption.
    exempt_source: Option<Regex>,
    /// Same-line exemption.
    exempt_line: Option<Regex>,
}

impl CompiledRule {
    /// Returns true when the rule applies to the language.
    fn applies_to(&self, language: &Language) -> bool {
        self.spec.languages.is_empty() || self.spec.languages.contains(language)
    }
}

/// Compiles one optional regex field.
fn compile_field(
    rule_id: &RuleId,
    field: &'static str,
    pattern: Option<&str>,
) -> Result<Option<Regex>, RuleError> {
    pattern
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| RuleError::InvalidPattern {
                rule_id: rule_id.to_string(),
                field,
                message: err.to_string(),
            })
        })
        .transpose()
}

/// Compiled rule table evaluated by one generic matcher.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Compiled rules in table order.
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compiles a rule table.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidPattern`] when any regex fails to compile.
    pub fn compile(specs: Vec<RuleSpec>) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let pattern = compile_field(&spec.rule_id, "pattern", Some(&spec.pattern))?
                .ok_or_else(|| RuleError::InvalidPattern {
                    rule_id: spec.rule_id.to_string(),
                    field: "pattern",
                    message: "missing pattern".to_string(),
                })?;
            let exempt_source =
                compile_field(&spec.rule_id, "exempt_if_source", spec.exempt_if_source.as_deref())?;
            let exempt_line =
                compile_field(&spec.rule_id, "exempt_if_line", spec.exempt_if_line.as_deref())?;
            rules.push(CompiledRule {
                spec,
                pattern,
                exempt_source,
                exempt_line,
            });
        }
        Ok(Self {
            rules,
        })
    }

    /// Returns the number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates every applicable rule against the scanned source.
    ///
    /// Each rule reports at most one violation per line.
    #[must_use]
    pub fn evaluate(
        &self,
        raw: &str,
        scanned: &ScannedSource,
        language: &Language,
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        for rule in self.rules.iter().filter(|rule| rule.applies_to(language)) {
            if rule.exempt_source.as_ref().is_some_and(|exempt| exempt.is_match(scanned.text())) {
                continue;
            }
            let haystack = match rule.spec.scope {
                MatchScope::Code => scanned.code(),
                MatchScope::Text => scanned.text(),
                MatchScope::Raw => raw,
            };
            let mut seen_lines = BTreeSet::new();
            for found in rule.pattern.find_iter(haystack) {
                let line = scanned.line_of(found.start());
                if !seen_lines.insert(line) {
                    continue;
                }
                if let Some(exempt) = &rule.exempt_line
                    && line_text(scanned.text(), scanned, line).is_some_and(|text| exempt.is_match(text))
                {
                    continue;
                }
                violations.push(PolicyViolation {
                    rule_id: rule.spec.rule_id.clone(),
                    category: rule.spec.category,
                    severity: rule.spec.severity,
                    location: Location::Line {
                        line,
                    },
                    message: rule.spec.message.clone(),
                    snippet: snippet(raw, scanned, line),
                });
            }
        }
        violations
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the text of a one-based line from a view of the source.
fn line_text<'a>(view: &'a str, scanned: &ScannedSource, line: usize) -> Option<&'a str> {
    let (start, end) = scanned.line_span(line)?;
    view.get(start .. end)
}

/// Returns the trimmed raw line, truncated to the snippet limit.
#[must_use]
pub fn snippet(raw: &str, scanned: &ScannedSource, line: usize) -> Option<String> {
    let text = line_text(raw, scanned, line)?.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_SNIPPET_CHARS).collect())
}
