// crates/test-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Test Gate Identifiers
// Description: Canonical opaque identifiers for artifacts, reviews, and runs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque UTF-8 strings that serialize transparently. They
//! are never parsed for meaning; derived identifiers (content-addressed
//! artifact ids, sequential review ids) are produced by their owning
//! components and treated as opaque everywhere else.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Defines an opaque string identifier newtype.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier for one candidate test artifact.
    ArtifactId
);

opaque_id!(
    /// Identifier for a human review record.
    ReviewId
);

opaque_id!(
    /// Identifier for one orchestrator batch run.
    RunId
);

opaque_id!(
    /// Identifier for a policy rule (for example `nondeterministic-random`).
    RuleId
);
