// crates/test-gate-core/src/runtime/lexer.rs
// ============================================================================
// Module: Test Gate Source Scanner
// Description: Language-aware masking of comments and string literals.
// Purpose: Give rule matching offset-stable views of artifact source text.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! The scanner walks source text once and produces two masks with the same
//! byte length as the input:
//! - `code`: comments and string contents replaced by spaces (quote
//!   delimiters kept), so rules never match inside literals.
//! - `text`: comments replaced by spaces, string contents kept.
//!
//! Newlines are preserved in both masks, so offsets and line numbers map
//! directly onto the raw source. Non-ASCII bytes become spaces.
//!
//! JavaScript and TypeScript regex literals are masked like strings when a
//! `/` appears where an expression may start.
//!
//! Scanning fails for empty text. For known languages it also fails on
//! unterminated strings, block comments, or regex literals and on unbalanced
//! brackets. Unknown languages use a tolerant C-family grammar that masks
//! what it recognizes and never rejects the source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::Language;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Source text cannot be tokenized in its declared language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UnparseableArtifact {
    /// Line where the problem was detected, when known.
    pub line: Option<usize>,
    /// Description of the problem.
    pub message: String,
}

impl UnparseableArtifact {
    /// Creates a new error.
    fn new(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Syntax Tables
// ============================================================================

/// Lexical syntax of one language family.
#[derive(Debug, Clone, Copy)]
struct Syntax {
    /// Line comment opener.
    line_comment: &'static [u8],
    /// Block comment delimiters.
    block_comment: Option<(&'static [u8], &'static [u8])>,
    /// Quote characters that open string literals.
    quotes: &'static [u8],
    /// Quote characters that also open triple-quoted literals.
    triple_quotes: &'static [u8],
    /// Quote character whose literals may span lines (template literals).
    multiline_quote: Option<u8>,
    /// Whether ordinary quoted literals must close on the same line.
    single_line_strings: bool,
    /// Whether `/` may open a regex literal.
    regex_literals: bool,
    /// Whether lexical errors reject the source.
    strict: bool,
}

impl Syntax {
    /// Returns the syntax table for a language.
    const fn for_language(language: &Language) -> Self {
        match language {
            Language::Python => Self {
                line_comment: b"#",
                block_comment: None,
                quotes: b"'\"",
                triple_quotes: b"'\"",
                multiline_quote: None,
                single_line_strings: true,
                regex_literals: false,
                strict: true,
            },
            Language::JavaScript | Language::TypeScript => Self {
                line_comment: b"//",
                block_comment: Some((b"/*", b"*/")),
                quotes: b"'\"`",
                triple_quotes: b"",
                multiline_quote: Some(b'`'),
                single_line_strings: true,
                regex_literals: true,
                strict: true,
            },
            Language::Java => Self {
                line_comment: b"//",
                block_comment: Some((b"/*", b"*/")),
                quotes: b"'\"",
                triple_quotes: b"\"",
                multiline_quote: None,
                single_line_strings: true,
                regex_literals: false,
                strict: true,
            },
            // Apostrophes are left as code: lifetimes, runes, and prose in
            // comments of unknown grammars would otherwise open strings.
            Language::Other(_) => Self {
                line_comment: b"//",
                block_comment: Some((b"/*", b"*/")),
                quotes: b"\"`",
                triple_quotes: b"",
                multiline_quote: Some(b'`'),
                single_line_strings: false,
                regex_literals: false,
                strict: false,
            },
        }
    }
}

/// Punctuation after which a `/` opens a regex literal; `=>` is handled separately.
const REGEX_PREFIX_PUNCTUATION: &[u8] = b"(,=:[!&|?{};+-*%~^";

/// Keywords after which a `/` opens a regex literal.
const REGEX_PREFIX_KEYWORDS: &[&str] =
    &["return", "typeof", "case", "delete", "void", "in", "of", "instanceof", "new", "throw", "yield", "await"];

/// Returns true for identifier bytes.
const fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

// ============================================================================
// SECTION: Scanned Source
// ============================================================================

/// Offset-preserving views of one artifact's source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSource {
    /// Comments and string contents masked.
    code: String,
    /// Comments masked.
    text: String,
    /// One-based lines that contain comment text.
    comment_lines: BTreeSet<usize>,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
}

impl ScannedSource {
    /// Returns the view with comments and string contents masked.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the view with comments masked.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true when the one-based line carries a comment.
    #[must_use]
    pub fn is_comment_line(&self, line: usize) -> bool {
        self.comment_lines.contains(&line)
    }

    /// Returns the number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Returns the one-based line containing a byte offset.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset).max(1)
    }

    /// Returns the byte range `[start, end)` of a one-based line, excluding the newline.
    #[must_use]
    pub fn line_span(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map_or(self.code.len(), |next| next.saturating_sub(1));
        Some((start, end.max(start)))
    }
}

// ============================================================================
// SECTION: Scanner
// ============================================================================

/// Scans source text for the given language.
///
/// # Errors
///
/// Returns [`UnparseableArtifact`] when the text is empty or cannot be
/// tokenized.
pub fn scan(source: &str, language: &Language) -> Result<ScannedSource, UnparseableArtifact> {
    if source.trim().is_empty() {
        return Err(UnparseableArtifact::new(None, "source text is empty"));
    }
    let syntax = Syntax::for_language(language);
    let mut scanner = Scanner::new(source.as_bytes(), syntax);
    scanner.run()?;
    scanner.finish()
}

/// Single-pass scanner state.
struct Scanner<'a> {
    /// Raw source bytes.
    raw: &'a [u8],
    /// Language syntax.
    syntax: Syntax,
    /// Code mask under construction.
    code: Vec<u8>,
    /// Text mask under construction.
    text: Vec<u8>,
    /// Lines carrying comments.
    comment_lines: BTreeSet<usize>,
    /// Line start offsets.
    line_starts: Vec<usize>,
    /// Open brackets with the line they opened on.
    brackets: Vec<(u8, usize)>,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner with masks initialized to the ASCII-folded source.
    fn new(raw: &'a [u8], syntax: Syntax) -> Self {
        let folded: Vec<u8> =
            raw.iter().map(|byte| if byte.is_ascii() { *byte } else { b' ' }).collect();
        let mut line_starts = vec![0];
        for (index, byte) in raw.iter().enumerate() {
            if *byte == b'\n' {
                line_starts.push(index + 1);
            }
        }
        Self {
            raw,
            syntax,
            code: folded.clone(),
            text: folded,
            comment_lines: BTreeSet::new(),
            line_starts,
            brackets: Vec::new(),
        }
    }

    /// Returns the one-based line of an offset.
    fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset).max(1)
    }

    /// Returns true when `pattern` occurs at `offset`.
    fn at(&self, offset: usize, pattern: &[u8]) -> bool {
        !pattern.is_empty() && self.raw.get(offset ..).is_some_and(|rest| rest.starts_with(pattern))
    }

    /// Walks the whole source.
    fn run(&mut self) -> Result<(), UnparseableArtifact> {
        let mut index = 0;
        while index < self.raw.len() {
            let byte = self.raw[index];
            if self.at(index, self.syntax.line_comment) {
                index = self.line_comment(index);
                continue;
            }
            if let Some((open, close)) = self.syntax.block_comment
                && self.at(index, open)
            {
                index = self.block_comment(index, open, close)?;
                continue;
            }
            if self.syntax.quotes.contains(&byte) {
                index = self.string_literal(index, byte)?;
                continue;
            }
            if byte == b'/' && self.syntax.regex_literals && self.regex_allowed(index) {
                index = self.regex_literal(index)?;
                continue;
            }
            if self.syntax.strict {
                self.bracket(index, byte)?;
            }
            index += 1;
        }
        Ok(())
    }

    /// Masks a line comment and returns the offset of the terminating newline.
    fn line_comment(&mut self, start: usize) -> usize {
        let end = self.raw[start ..]
            .iter()
            .position(|byte| *byte == b'\n')
            .map_or(self.raw.len(), |pos| start + pos);
        self.mask_comment(start, end);
        end
    }

    /// Masks a block comment and returns the offset after it.
    fn block_comment(
        &mut self,
        start: usize,
        open: &[u8],
        close: &[u8],
    ) -> Result<usize, UnparseableArtifact> {
        let mut index = start + open.len();
        while index < self.raw.len() {
            if self.at(index, close) {
                let end = index + close.len();
                self.mask_comment(start, end);
                return Ok(end);
            }
            index += 1;
        }
        if !self.syntax.strict {
            self.mask_comment(start, self.raw.len());
            return Ok(self.raw.len());
        }
        Err(UnparseableArtifact::new(Some(self.line_of(start)), "unterminated block comment"))
    }

    /// Masks a string literal and returns the offset after its closing quote.
    fn string_literal(&mut self, start: usize, quote: u8) -> Result<usize, UnparseableArtifact> {
        let triple = [quote; 3];
        let (delimiter_len, multiline) =
            if self.syntax.triple_quotes.contains(&quote) && self.at(start, &triple) {
                (3, true)
            } else {
                (
                    1,
                    self.syntax.multiline_quote == Some(quote) || !self.syntax.single_line_strings,
                )
            };
        let content_start = start + delimiter_len;
        let mut index = content_start;
        while index < self.raw.len() {
            let byte = self.raw[index];
            if byte == b'\\' {
                index += 2;
                continue;
            }
            if byte == b'\n' && !multiline {
                break;
            }
            let closes = if delimiter_len == 3 { self.at(index, &triple) } else { byte == quote };
            if closes {
                self.mask_string(content_start, index);
                return Ok(index + delimiter_len);
            }
            index += 1;
        }
        if !self.syntax.strict {
            return Ok(start + 1);
        }
        Err(UnparseableArtifact::new(Some(self.line_of(start)), "unterminated string literal"))
    }

    /// Returns true when a `/` at `offset` starts a regex rather than a division.
    ///
    /// Looks back over the code mask, which already has comments and string
    /// contents blanked, for the previous significant token.
    fn regex_allowed(&self, offset: usize) -> bool {
        let before = &self.code[.. offset];
        let Some(last) = before.iter().rposition(|byte| !byte.is_ascii_whitespace()) else {
            return true;
        };
        let byte = before[last];
        if is_word_byte(byte) {
            let start = before[.. last].iter().rposition(|byte| !is_word_byte(*byte)).map_or(0, |pos| pos + 1);
            return REGEX_PREFIX_KEYWORDS.iter().any(|keyword| keyword.as_bytes() == &before[start ..= last]);
        }
        if byte == b'>' {
            return last > 0 && before[last - 1] == b'=';
        }
        REGEX_PREFIX_PUNCTUATION.contains(&byte)
    }

    /// Masks a regex literal body and returns the offset after its flags.
    fn regex_literal(&mut self, start: usize) -> Result<usize, UnparseableArtifact> {
        let mut index = start + 1;
        let mut in_class = false;
        while index < self.raw.len() {
            match self.raw[index] {
                b'\\' => {
                    index += 2;
                    continue;
                }
                b'\n' => break,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    self.mask_string(start + 1, index);
                    let flags = self.raw[index + 1 ..].iter().take_while(|byte| byte.is_ascii_alphabetic()).count();
                    return Ok(index + 1 + flags);
                }
                _ => {}
            }
            index += 1;
        }
        Err(UnparseableArtifact::new(Some(self.line_of(start)), "unterminated regex literal"))
    }

    /// Tracks bracket balance for one code byte.
    fn bracket(&mut self, offset: usize, byte: u8) -> Result<(), UnparseableArtifact> {
        let expected_open = match byte {
            b'(' | b'[' | b'{' => {
                self.brackets.push((byte, self.line_of(offset)));
                return Ok(());
            }
            b')' => b'(',
            b']' => b'[',
            b'}' => b'{',
            _ => return Ok(()),
        };
        match self.brackets.pop() {
            Some((open, _)) if open == expected_open => Ok(()),
            _ => Err(UnparseableArtifact::new(
                Some(self.line_of(offset)),
                format!("unbalanced '{}'", char::from(byte)),
            )),
        }
    }

    /// Blanks a comment range in both masks, keeping newlines.
    fn mask_comment(&mut self, start: usize, end: usize) {
        for index in start .. end {
            if self.raw[index] != b'\n' {
                self.code[index] = b' ';
                self.text[index] = b' ';
            }
        }
        let first = self.line_of(start);
        let last = self.line_of(end.saturating_sub(1).max(start));
        self.comment_lines.extend(first ..= last);
    }

    /// Blanks string contents in the code mask, keeping newlines.
    fn mask_string(&mut self, start: usize, end: usize) {
        for index in start .. end {
            if self.raw[index] != b'\n' {
                self.code[index] = b' ';
            }
        }
    }

    /// Checks final bracket balance and converts the masks.
    fn finish(self) -> Result<ScannedSource, UnparseableArtifact> {
        if let Some((open, line)) = self.brackets.last() {
            return Err(UnparseableArtifact::new(
                Some(*line),
                format!("unclosed '{}'", char::from(*open)),
            ));
        }
        let code = String::from_utf8(self.code)
            .map_err(|_| UnparseableArtifact::new(None, "source mask is not ascii"))?;
        let text = String::from_utf8(self.text)
            .map_err(|_| UnparseableArtifact::new(None, "source mask is not ascii"))?;
        Ok(ScannedSource {
            code,
            text,
            comment_lines: self.comment_lines,
            line_starts: self.line_starts,
        })
    }
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
    fn python_comments_and_strings_are_masked_in_code_view() {
        let source = "x = 'random.random()'  # time.sleep(1)\n";
        let scanned = scan(source, &Language::Python).unwrap();
        assert_eq!(scanned.code().len(), source.len());
        assert!(!scanned.code().contains("random.random"));
        assert!(!scanned.code().contains("sleep"));
        assert!(scanned.text().contains("random.random"));
        assert!(!scanned.text().contains("sleep"));
        assert!(scanned.is_comment_line(1));
    }

    #[test]
    fn python_triple_quoted_docstring_spans_lines() {
        let source = "def test_x():\n    \"\"\"Doc with ' quote\n    more\"\"\"\n    assert 1 == 1\n";
        let scanned = scan(source, &Language::Python).unwrap();
        assert_eq!(scanned.line_count(), 5);
        assert!(scanned.code().contains("assert 1 == 1"));
        assert!(!scanned.code().contains("Doc with"));
    }

    #[test]
    fn python_unterminated_string_reports_line() {
        let err = scan("a = 1\nb = 'oops\n", &Language::Python).unwrap_err();
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn js_template_literal_may_span_lines() {
        let source = "const s = `line one\nline (two`;\ntest('a', () => {});\n";
        let scanned = scan(source, &Language::JavaScript).unwrap();
        assert!(!scanned.code().contains("line one"));
    }

    #[test]
    fn js_regex_literals_are_masked_not_parsed() {
        for source in [
            "test('quotes', () => {\n  expect(msg).toMatch(/don't/);\n});\n",
            "test('urls', () => {\n  expect(url).toMatch(/https?:\\/\\//);\n});\n",
            "test('parens', () => {\n  expect(s.replace(/[(]/g, '')).toBe('a');\n});\n",
            "const isWord = (s) => /^[a-z']+$/.test(s);\n",
        ] {
            let scanned = scan(source, &Language::JavaScript).unwrap();
            assert_eq!(scanned.code().len(), source.len());
            assert!(scanned.code().contains("expect("));
        }
    }

    #[test]
    fn js_division_is_not_a_regex() {
        let source = "const half = total / 2;\nconst ratio = (a) / (b) / 3;\nconst q = 'x' / 1;\n";
        let scanned = scan(source, &Language::JavaScript).unwrap();
        assert!(scanned.code().contains("total / 2"));
        assert!(scanned.code().contains("(b) / 3"));
        let markup = "const view = () => <p>don</p>;\n";
        assert!(scan(markup, &Language::JavaScript).unwrap().code().contains("</p>"));
    }

    #[test]
    fn js_regex_after_return_keyword() {
        let source = "function pattern() {\n  return /[)}]+/gi;\n}\n";
        let scanned = scan(source, &Language::TypeScript).unwrap();
        assert!(!scanned.code().contains(")}]+"));
        assert!(scan("const r = (/abc\n);\n", &Language::JavaScript).is_err());
    }

    #[test]
    fn unknown_languages_tolerate_apostrophes_and_lifetimes() {
        let go = "// don't share state between tests\nfunc TestAdd(t *testing.T) {\n\tif add(1, 2) != 3 {\n\t\tt.Fatal(\"bad\")\n\t}\n}\n";
        let scanned = scan(go, &Language::parse("go")).unwrap();
        assert!(scanned.is_comment_line(1));
        assert!(!scanned.code().contains("share state"));
        assert!(scanned.code().contains("func TestAdd"));

        let rust = "fn first<'a>(items: &'a [u8]) -> &'a u8 {\n    &items[0]\n}\n/* unclosed";
        let scanned = scan(rust, &Language::parse("rust")).unwrap();
        assert!(scanned.code().contains("items: &'a [u8]"));
        assert!(scan("x = \"open\n(\n", &Language::parse("ruby")).is_ok());
    }

    #[test]
    fn java_text_block_is_a_string() {
        let source = "class A {\n  String s = \"\"\"\n    {unbalanced\n    \"\"\";\n}\n";
        assert!(scan(source, &Language::Java).is_ok());
    }

    #[test]
    fn unbalanced_brackets_are_unparseable() {
        let err = scan("function f() {\n  return (1;\n}\n", &Language::JavaScript).unwrap_err();
        assert!(err.message.contains("unbalanced"));
        let err = scan("def f(:\n    pass\n", &Language::Python).unwrap_err();
        assert!(err.message.contains("unclosed") || err.message.contains("unbalanced"));
    }

    #[test]
    fn unterminated_block_comment_is_unparseable() {
        let err = scan("/* open\nclass A {}\n", &Language::Java).unwrap_err();
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn whitespace_only_text_is_unparseable() {
        assert!(scan("  \n\t\n", &Language::Python).is_err());
    }

    #[test]
    fn non_ascii_bytes_keep_offsets_stable() {
        let source = "# caf\u{e9}\nx = \"\u{e9}t\u{e9}\"\n";
        let scanned = scan(source, &Language::Python).unwrap();
        assert_eq!(scanned.code().len(), source.len());
        assert_eq!(scanned.text().len(), source.len());
        assert_eq!(scanned.line_of(source.find('x').unwrap()), 2);
    }

    #[test]
    fn line_span_excludes_newline() {
        let scanned = scan("ab\ncd\n", &Language::Python).unwrap();
        assert_eq!(scanned.line_span(1), Some((0, 2)));
        assert_eq!(scanned.line_span(2), Some((3, 5)));
    }
}
