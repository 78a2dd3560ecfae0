// crates/test-gate-core/src/core/artifact.rs
// ============================================================================
// Module: Test Gate Artifacts
// Description: Candidate test artifacts and their declared languages.
// Purpose: Hold immutable generated test text with stable content-addressed ids.
// Dependencies: serde, crate::core::{hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! An [`Artifact`] is one unit of generated test code. Its source text is
//! frozen at ingestion inside an `Arc<str>` and only ever exposed by shared
//! reference, so every stage of an evaluation reads the same bytes.
//!
//! Generators may assign an id; otherwise the id is derived from the
//! language label and the source text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::ArtifactId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix applied to content-addressed artifact identifiers.
pub const ARTIFACT_ID_PREFIX: &str = "art-";

/// Number of digest hex characters kept in content-addressed identifiers.
const ARTIFACT_ID_HEX_LEN: usize = 16;

// ============================================================================
// SECTION: Language
// ============================================================================

/// Declared language of a test artifact.
///
/// # Invariants
/// - Serialized as its lowercase label; unknown labels round-trip as [`Language::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// Python sources (pytest / unittest).
    Python,
    /// JavaScript sources (Jest / Mocha).
    JavaScript,
    /// TypeScript sources (Jest / Vitest).
    TypeScript,
    /// Java sources (JUnit).
    Java,
    /// Any other language, identified by label.
    Other(String),
}

impl Language {
    /// Returns the canonical label for the language.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Other(name) => name,
        }
    }

    /// Parses a language label (case-insensitive, common aliases accepted).
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Self::Python,
            "javascript" | "js" => Self::JavaScript,
            "typescript" | "ts" => Self::TypeScript,
            "java" => Self::Java,
            other => Self::Other(other.to_string()),
        }
    }

    /// Infers a language from a file extension (without the leading dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "py" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "java" => Self::Java,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for the JavaScript family (JavaScript and TypeScript).
    #[must_use]
    pub const fn is_js_family(&self) -> bool {
        matches!(self, Self::JavaScript | Self::TypeScript)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.label().to_string()
    }
}

// ============================================================================
// SECTION: Artifact
// ============================================================================

/// Candidate unit of generated test code.
///
/// # Invariants
/// - `source_text` is never mutated after construction.
/// - `id` is either generator-assigned or derived from language and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Stable artifact identifier.
    id: ArtifactId,
    /// Declared language.
    language: Language,
    /// Frozen source text.
    source_text: Arc<str>,
    /// Paths the artifact claims to test, in generator order.
    target_files: Vec<String>,
    /// Generation timestamp supplied by the generator or ingest clock.
    generated_at: Timestamp,
    /// Display label of where the artifact was read from.
    origin: Option<String>,
}

impl Artifact {
    /// Creates an artifact with a content-addressed identifier.
    #[must_use]
    pub fn new(language: Language, source_text: impl Into<Arc<str>>, generated_at: Timestamp) -> Self {
        let source_text = source_text.into();
        let id = Self::content_id(&language, &source_text);
        Self {
            id,
            language,
            source_text,
            target_files: Vec::new(),
            generated_at,
            origin: None,
        }
    }

    /// Replaces the derived identifier with a generator-assigned one.
    #[must_use]
    pub fn with_id(mut self, id: ArtifactId) -> Self {
        self.id = id;
        self
    }

    /// Sets the ordered list of target files.
    #[must_use]
    pub fn with_target_files(mut self, target_files: Vec<String>) -> Self {
        self.target_files = target_files;
        self
    }

    /// Sets the display origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Derives the content-addressed identifier for a language and text.
    #[must_use]
    pub fn content_id(language: &Language, source_text: &str) -> ArtifactId {
        let mut bytes = Vec::with_capacity(source_text.len() + 16);
        bytes.extend_from_slice(language.label().as_bytes());
        bytes.push(b'\n');
        bytes.extend_from_slice(source_text.as_bytes());
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
        ArtifactId::new(format!("{ARTIFACT_ID_PREFIX}{}", digest.short(ARTIFACT_ID_HEX_LEN)))
    }

    /// Returns the artifact identifier.
    #[must_use]
    pub const fn id(&self) -> &ArtifactId {
        &self.id
    }

    /// Returns the declared language.
    #[must_use]
    pub const fn language(&self) -> &Language {
        &self.language
    }

    /// Returns the frozen source text.
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Returns a shared handle to the source text.
    #[must_use]
    pub fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source_text)
    }

    /// Returns the ordered target files.
    #[must_use]
    pub fn target_files(&self) -> &[String] {
        &self.target_files
    }

    /// Returns the generation timestamp.
    #[must_use]
    pub const fn generated_at(&self) -> Timestamp {
        self.generated_at
    }

    /// Returns the display origin, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns the sha256 digest of the source text.
    #[must_use]
    pub fn source_hash(&self) -> HashDigest {
        hash_bytes(DEFAULT_HASH_ALGORITHM, self.source_text.as_bytes())
    }

    /// Returns a file name the language toolchain will accept for this artifact.
    ///
    /// Java sources are named after their public class so `javac` accepts them.
    #[must_use]
    pub fn suggested_file_name(&self) -> String {
        let stem = sanitize_stem(self.id.as_str());
        match &self.language {
            Language::Python => format!("test_{stem}.py"),
            Language::JavaScript => format!("{stem}.test.js"),
            Language::TypeScript => format!("{stem}.test.ts"),
            Language::Java => {
                let class = public_class_name(&self.source_text)
                    .unwrap_or_else(|| "GeneratedTest".to_string());
                format!("{class}.java")
            }
            Language::Other(name) => format!("{stem}.{}", sanitize_stem(name)),
        }
    }
}

// ============================================================================
// SECTION: Artifact Input
// ============================================================================

/// Wire form of an artifact as supplied by a generator bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInput {
    /// Optional generator-assigned identifier.
    #[serde(default)]
    pub id: Option<ArtifactId>,
    /// Declared language label.
    pub language: Language,
    /// Test source text.
    pub source_text: String,
    /// Paths the artifact claims to test.
    #[serde(default)]
    pub target_files: Vec<String>,
    /// Optional generation timestamp.
    #[serde(default)]
    pub generated_at: Option<Timestamp>,
}

impl ArtifactInput {
    /// Converts the wire form into an immutable artifact.
    ///
    /// `ingested_at` is used when the generator did not supply a timestamp.
    #[must_use]
    pub fn into_artifact(self, ingested_at: Timestamp) -> Artifact {
        let artifact = Artifact::new(
            self.language,
            self.source_text,
            self.generated_at.unwrap_or(ingested_at),
        )
        .with_target_files(self.target_files);
        match self.id {
            Some(id) => artifact.with_id(id),
            None => artifact,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Replaces characters that are unsafe in file names with underscores.
fn sanitize_stem(value: &str) -> String {
    let stem: String = value
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if stem.is_empty() { "artifact".to_string() } else { stem }
}

/// Extracts the first `public class` name from Java source text.
fn public_class_name(source: &str) -> Option<String> {
    for line in source.lines() {
        let mut words = line.split_whitespace().peekable();
        if words.next() != Some("public") {
            continue;
        }
        while matches!(words.peek(), Some(&("final" | "abstract" | "static"))) {
            words.next();
        }
        if words.next() != Some("class") {
            continue;
        }
        let name: String = words
            .next()?
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '$')
            .collect();
        if !name.is_empty() {
            return Some(name);
        }
    }
    None
}
