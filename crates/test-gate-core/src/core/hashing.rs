// crates/test-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Test Gate Content Digests
// Description: Digests for artifact source, run seeds, and stored payloads.
// Purpose: Give artifacts, runs, and store rows stable content hashes.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Artifact identifiers and source hashes are digests of raw UTF-8 bytes.
//! Run identifiers and store rows hash the RFC 8785 (JCS) form of a record,
//! so the same record hashes the same in every process. Digests carry their
//! algorithm label so stored rows can be re-verified after an upgrade.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Digest algorithms understood by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the label written next to stored digests.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a stored label; unknown labels yield `None`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        (label == Self::Sha256.label()).then_some(Self::Sha256)
    }
}

/// Algorithm used for every digest the gate writes.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Algorithm-tagged lowercase hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced `value`.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
}

impl HashDigest {
    /// Returns at most `len` leading hex characters, for compact identifiers.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        self.value.get(.. len).unwrap_or(&self.value)
    }
}

/// Digests raw bytes.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    let raw = match algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(bytes),
    };
    HashDigest {
        algorithm,
        value: raw.iter().map(|byte| format!("{byte:02x}")).collect(),
    }
}

// ============================================================================
// SECTION: Canonical JSON
// ============================================================================

/// Serializes `value` as RFC 8785 canonical JSON.
///
/// # Errors
///
/// Returns [`serde_json::Error`] when the value cannot be serialized, for
/// example a map with non-string keys or a non-finite float.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_jcs::to_vec(value)
}

/// Digests the canonical JSON form of `value`.
///
/// # Errors
///
/// Returns [`serde_json::Error`] when the value cannot be serialized.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, serde_json::Error> {
    Ok(hash_bytes(algorithm, &canonical_json_bytes(value)?))
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let digest = hash_bytes(HashAlgorithm::Sha256, b"abc");
        assert_eq!(digest.value, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(digest.short(8), "ba7816bf");
        assert_eq!(digest.short(500).len(), 64);
    }

    #[test]
    fn canonical_hash_ignores_key_order() {
        let left = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &json!({"b": 1, "a": [true, null]})).unwrap();
        let right = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &json!({"a": [true, null], "b": 1})).unwrap();
        assert_eq!(left, right);
        assert_eq!(canonical_json_bytes(&json!({"b": 1, "a": 2})).unwrap(), br#"{"a":2,"b":1}"#.to_vec());
    }

    #[test]
    fn algorithm_labels_parse_back() {
        assert_eq!(HashAlgorithm::parse(DEFAULT_HASH_ALGORITHM.label()), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::parse("md5"), None);
    }
}
