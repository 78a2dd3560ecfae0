// crates/test-gate-cli/src/inputs.rs
// ============================================================================
// Module: Artifact Inputs
// Description: Loads candidate test artifacts from source files and JSON bundles.
// Purpose: Turn command-line paths into immutable artifacts with bounded reads.
// Dependencies: serde, serde_json, test-gate-core, thiserror
// ============================================================================

//! ## Overview
//! `evaluate` accepts two kinds of input. A `*.json` path is an artifact
//! bundle holding one [`ArtifactInput`] or an array of them; any other path
//! is a test source file whose language comes from `--language` or its
//! extension. Every read is capped at [`MAX_INPUT_BYTES`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use test_gate_core::Artifact;
use test_gate_core::ArtifactInput;
use test_gate_core::Language;
use test_gate_core::Timestamp;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a single input file in bytes.
pub const MAX_INPUT_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading artifact inputs.
#[derive(Debug, Error)]
pub enum InputError {
    /// File could not be read.
    #[error("{path}: {error}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        error: std::io::Error,
    },
    /// File exceeds the input size limit.
    #[error("{path}: {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Offending path.
        path: String,
        /// Observed size in bytes.
        size: u64,
        /// Allowed size in bytes.
        limit: usize,
    },
    /// Source file is not UTF-8.
    #[error("{path}: source must be utf-8")]
    NotUtf8 {
        /// Offending path.
        path: String,
    },
    /// Bundle is not valid artifact JSON.
    #[error("{path}: invalid artifact bundle: {error}")]
    Bundle {
        /// Offending path.
        path: String,
        /// Parser message.
        error: String,
    },
    /// Language could not be inferred.
    #[error("{path}: cannot infer language without a file extension; pass --language")]
    UnknownLanguage {
        /// Offending path.
        path: String,
    },
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// One bundle file: a single artifact or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Bundle {
    /// Array of artifacts.
    Many(Vec<ArtifactInput>),
    /// Single artifact.
    One(ArtifactInput),
}

/// Loads artifacts from every path in order.
///
/// `language` overrides extension inference for source files; bundles carry
/// their own language labels. `now` stamps artifacts without a generation
/// time.
///
/// # Errors
///
/// Returns [`InputError`] for the first path that cannot be loaded.
pub fn load_artifacts(
    paths: &[PathBuf],
    language: Option<&Language>,
    now: Timestamp,
) -> Result<Vec<Artifact>, InputError> {
    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        if is_bundle(path) {
            artifacts.extend(load_bundle(path, now)?);
        } else {
            artifacts.push(load_source(path, language, now)?);
        }
    }
    Ok(artifacts)
}

/// Returns true when the path names a JSON bundle.
fn is_bundle(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Loads a JSON bundle.
fn load_bundle(path: &Path, now: Timestamp) -> Result<Vec<Artifact>, InputError> {
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES)?;
    let bundle: Bundle = serde_json::from_slice(&bytes).map_err(|err| InputError::Bundle {
        path: path.display().to_string(),
        error: err.to_string(),
    })?;
    let inputs = match bundle {
        Bundle::Many(inputs) => inputs,
        Bundle::One(input) => vec![input],
    };
    Ok(inputs.into_iter().map(|input| input.into_artifact(now)).collect())
}

/// Loads one test source file.
fn load_source(path: &Path, language: Option<&Language>, now: Timestamp) -> Result<Artifact, InputError> {
    let language = match language {
        Some(language) => language.clone(),
        None => path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Language::from_extension)
            .ok_or_else(|| InputError::UnknownLanguage {
                path: path.display().to_string(),
            })?,
    };
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES)?;
    let text = String::from_utf8(bytes).map_err(|_| InputError::NotUtf8 {
        path: path.display().to_string(),
    })?;
    Ok(Artifact::new(language, text, now).with_origin(path.display().to_string()))
}

/// Reads a file while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, InputError> {
    let io_error = |error| InputError::Io {
        path: path.display().to_string(),
        error,
    };
    let file = File::open(path).map_err(io_error)?;
    let size = file.metadata().map_err(io_error)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(InputError::TooLarge {
            path: path.display().to_string(),
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(io_error)?;
    if bytes.len() > max_bytes {
        return Err(InputError::TooLarge {
            path: path.display().to_string(),
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use std::fs;

    use test_gate_core::ArtifactId;

    use super::*;

    const NOW: Timestamp = Timestamp::Logical(7);

    #[test]
    fn source_language_comes_from_extension_or_override() {
        let dir = tempfile::tempdir().unwrap();
        let python = dir.path().join("test_math.py");
        let script = dir.path().join("check.rb");
        fs::write(&python, "def test_adds_two_numbers():\n    assert 1 + 1 == 2\n").unwrap();
        fs::write(&script, "puts 1").unwrap();

        let loaded = load_artifacts(&[python.clone(), script], None, NOW).unwrap();
        assert_eq!(loaded[0].language(), &Language::Python);
        assert_eq!(loaded[1].language(), &Language::Other("rb".to_string()));
        assert_eq!(loaded[0].generated_at(), NOW);
        assert_eq!(loaded[0].origin(), Some(python.display().to_string().as_str()));

        let forced = load_artifacts(&[python], Some(&Language::Java), NOW).unwrap();
        assert_eq!(forced[0].language(), &Language::Java);
    }

    #[test]
    fn extensionless_source_requires_language() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Testfile");
        fs::write(&path, "x").unwrap();
        let err = load_artifacts(&[path.clone()], None, NOW).unwrap_err();
        assert!(matches!(err, InputError::UnknownLanguage { .. }));
        assert_eq!(load_artifacts(&[path], Some(&Language::Python), NOW).unwrap().len(), 1);
    }

    #[test]
    fn bundles_accept_one_or_many_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        let many = dir.path().join("many.JSON");
        fs::write(&one, r#"{"id":"gen-1","language":"python","source_text":"pass"}"#).unwrap();
        fs::write(
            &many,
            r#"[{"language":"js","source_text":"a"},{"language":"java","source_text":"b","generated_at":{"kind":"logical","value":3}}]"#,
        )
        .unwrap();

        let loaded = load_artifacts(&[one, many], None, NOW).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].id(), &ArtifactId::new("gen-1"));
        assert_eq!(loaded[1].language(), &Language::JavaScript);
        assert_eq!(loaded[1].generated_at(), NOW);
        assert_eq!(loaded[2].generated_at(), Timestamp::Logical(3));
    }

    #[test]
    fn malformed_bundle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"language":"python"}"#).unwrap();
        let err = load_artifacts(&[path], None, NOW).unwrap_err();
        assert!(matches!(err, InputError::Bundle { .. }));
    }

    #[test]
    fn oversized_and_binary_sources_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.py");
        fs::write(&big, vec![b'a'; 64]).unwrap();
        assert!(matches!(read_bytes_with_limit(&big, 16), Err(InputError::TooLarge { size: 64, .. })));

        let binary = dir.path().join("blob.py");
        fs::write(&binary, [0xFF, 0xFE]).unwrap();
        assert!(matches!(load_artifacts(&[binary], None, NOW), Err(InputError::NotUtf8 { .. })));

        let missing = dir.path().join("absent.py");
        assert!(matches!(load_artifacts(&[missing], None, NOW), Err(InputError::Io { .. })));
    }
}
