// crates/test-gate-core/src/runtime/units.rs
// ============================================================================
// Module: Test Gate Test Units
// Description: Per-language extraction of test functions and their bodies.
// Purpose: Feed structural rules and quality scoring with test-level facts.
// Dependencies: regex, crate::{core, runtime::lexer}
// ============================================================================

//! ## Overview
//! A test unit is one test function: Python `def test_*`, JavaScript or
//! TypeScript `it(...)` / `test(...)`, or a Java `@Test` method. Extraction
//! runs on the code mask, so test-looking text inside strings or comments is
//! never picked up. Names of JavaScript tests are read back from the raw
//! source because their string contents are masked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::Regex;

use crate::core::Language;
use crate::runtime::lexer::ScannedSource;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One extracted test function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUnit {
    /// Test name (function name or test description).
    pub name: String,
    /// One-based line where the test is declared.
    pub line: usize,
    /// One-based last line of the test body.
    pub end_line: usize,
    /// Number of assertion calls in the body.
    pub assertion_count: usize,
    /// True when a docstring or a leading comment documents the test.
    pub has_doc: bool,
}

impl TestUnit {
    /// Returns the number of source lines spanned by the test.
    #[must_use]
    pub const fn line_span(&self) -> usize {
        self.end_line.saturating_sub(self.line) + 1
    }

    /// Returns true when a one-based line lies inside the test.
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.line && line <= self.end_line
    }
}

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Compiled extraction and assertion patterns.
#[derive(Debug, Clone)]
pub struct UnitPatterns {
    /// Python test function declaration.
    python_test: Regex,
    /// JavaScript/TypeScript test call.
    js_test: Regex,
    /// Java `@Test` method declaration.
    java_test: Regex,
    /// Python assertion calls.
    python_assert: Regex,
    /// JavaScript/TypeScript assertion calls.
    js_assert: Regex,
    /// Java assertion calls.
    java_assert: Regex,
}

impl UnitPatterns {
    /// Compiles the extraction patterns.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] when a pattern fails to compile.
    pub fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            python_test: Regex::new(r"(?m)^([ \t]*)(?:async[ \t]+)?def[ \t]+(test\w*)\s*\(")?,
            js_test: Regex::new(r#"\b(?:it|test)(?:\.(?:only|skip|concurrent))?\s*\(\s*['"`]"#)?,
            java_test: Regex::new(
                r"@Test\b[^;{]*?\b(?:(?:public|protected|private|static|final)\s+)*void\s+(\w+)\s*\(",
            )?,
            python_assert: Regex::new(
                r"\bassert\s|\bself\.assert\w*\s*\(|\bpytest\.raises\s*\(|\.assert_\w+\s*\(",
            )?,
            js_assert: Regex::new(r"\bexpect\s*\(|\bassert(?:\.\w+)?\s*\(")?,
            java_assert: Regex::new(r"\bassert\w*\s*\(|\bassert\s|\bverify\s*\(")?,
        })
    }

    /// Extracts test units from a scanned artifact.
    #[must_use]
    pub fn extract(&self, raw: &str, scanned: &ScannedSource, language: &Language) -> Vec<TestUnit> {
        match language {
            Language::Python => self.extract_python(raw, scanned),
            Language::JavaScript | Language::TypeScript => self.extract_js(raw, scanned),
            Language::Java => self.extract_java(raw, scanned),
            Language::Other(_) => Vec::new(),
        }
    }

    /// Extracts indentation-delimited Python test functions.
    fn extract_python(&self, raw: &str, scanned: &ScannedSource) -> Vec<TestUnit> {
        let code = scanned.code();
        let mut units = Vec::new();
        for captures in self.python_test.captures_iter(code) {
            let (Some(whole), Some(indent), Some(name)) =
                (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };
            let line = scanned.line_of(whole.start() + indent.len());
            let mut end_line = line;
            let mut first_body_line = None;
            for candidate in line + 1 ..= scanned.line_count() {
                let Some(text) = line_view(code, scanned, candidate) else {
                    break;
                };
                if text.trim().is_empty() {
                    continue;
                }
                let depth = text.len() - text.trim_start().len();
                if depth <= indent.len() {
                    break;
                }
                first_body_line.get_or_insert(candidate);
                end_line = candidate;
            }
            let has_doc = first_body_line
                .and_then(|body_line| line_view(raw, scanned, body_line))
                .is_some_and(|text| {
                    let text = text.trim_start();
                    ["\"\"\"", "'''", "r\"\"\"", "r'''"].iter().any(|quote| text.starts_with(quote))
                })
                || comment_above(raw, scanned, line);
            let assertion_count = count_in_lines(&self.python_assert, code, scanned, line, end_line);
            units.push(TestUnit {
                name: name.as_str().to_string(),
                line,
                end_line,
                assertion_count,
                has_doc,
            });
        }
        units
    }

    /// Extracts paren-delimited JavaScript/TypeScript test calls.
    fn extract_js(&self, raw: &str, scanned: &ScannedSource) -> Vec<TestUnit> {
        let code = scanned.code();
        let bytes = code.as_bytes();
        let mut units = Vec::new();
        for found in self.js_test.find_iter(code) {
            let name_start = found.end();
            let Some(quote) = bytes.get(name_start - 1).copied() else {
                continue;
            };
            let Some(name_end) =
                bytes[name_start ..].iter().position(|byte| *byte == quote).map(|pos| name_start + pos)
            else {
                continue;
            };
            let Some(open) = code[found.start() .. found.end()].rfind('(').map(|pos| found.start() + pos)
            else {
                continue;
            };
            let close = matching_close(bytes, open, b'(', b')').unwrap_or(code.len().saturating_sub(1));
            let line = scanned.line_of(found.start());
            let end_line = scanned.line_of(close);
            let name = raw.get(name_start .. name_end).unwrap_or_default().to_string();
            units.push(TestUnit {
                name,
                line,
                end_line,
                assertion_count: count_in_lines(&self.js_assert, code, scanned, line, end_line),
                has_doc: comment_above(raw, scanned, line),
            });
        }
        units
    }

    /// Extracts brace-delimited Java `@Test` methods.
    fn extract_java(&self, raw: &str, scanned: &ScannedSource) -> Vec<TestUnit> {
        let code = scanned.code();
        let bytes = code.as_bytes();
        let mut units = Vec::new();
        for captures in self.java_test.captures_iter(code) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let annotation_line = scanned.line_of(whole.start());
            let line = scanned.line_of(name.start());
            let Some(open) = code[whole.end() ..].find('{').map(|pos| whole.end() + pos) else {
                continue;
            };
            let close = matching_close(bytes, open, b'{', b'}').unwrap_or(code.len().saturating_sub(1));
            let end_line = scanned.line_of(close);
            let span_text = &code[whole.start() .. whole.end()];
            units.push(TestUnit {
                name: name.as_str().to_string(),
                line,
                end_line,
                assertion_count: count_in_lines(&self.java_assert, code, scanned, line, end_line),
                has_doc: comment_above(raw, scanned, annotation_line)
                    || span_text.contains("@DisplayName"),
            });
        }
        units
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns one line of a view.
fn line_view<'a>(view: &'a str, scanned: &ScannedSource, line: usize) -> Option<&'a str> {
    let (start, end) = scanned.line_span(line)?;
    view.get(start .. end)
}

/// Counts pattern matches starting within `[first, last]` lines.
fn count_in_lines(
    pattern: &Regex,
    code: &str,
    scanned: &ScannedSource,
    first: usize,
    last: usize,
) -> usize {
    let Some((start, _)) = scanned.line_span(first) else {
        return 0;
    };
    let end = scanned.line_span(last).map_or(code.len(), |(_, end)| end);
    code.get(start .. end).map_or(0, |body| pattern.find_iter(body).count())
}

/// Returns true when a comment sits directly above `line`, skipping decorators.
fn comment_above(raw: &str, scanned: &ScannedSource, line: usize) -> bool {
    let mut current = line;
    while current > 1 {
        current -= 1;
        if scanned.is_comment_line(current) {
            return true;
        }
        let Some(text) = line_view(raw, scanned, current) else {
            return false;
        };
        if !text.trim_start().starts_with('@') {
            return false;
        }
    }
    false
}

/// Returns the offset of the bracket closing the one at `open`.
fn matching_close(bytes: &[u8], open: usize, open_byte: u8, close_byte: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in bytes.iter().enumerate().skip(open) {
        if *byte == open_byte {
            depth += 1;
        } else if *byte == close_byte {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(offset);
            }
        }
    }
    None
}
