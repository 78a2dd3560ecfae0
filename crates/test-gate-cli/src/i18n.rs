// crates/test-gate-cli/src/i18n.rs
// ============================================================================
// Module: CLI Internationalization Helpers
// Description: Message catalog and translation utilities for the CLI.
// Purpose: Keep every user-facing string in one localized catalog.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The `test-gate` binary routes all runtime output through the
//! [`t!`](crate::t) macro so verdict lines, review listings, and diagnostics
//! render consistently in every supported locale.
//!
//! ## Invariants
//! - The locale is selected once per process and read-only thereafter.
//! - Missing keys fall back to English and then to the key itself.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported CLI locales.
///
/// # Invariants
/// - [`Locale::En`] is the default fallback locale.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Locale {
    /// English (default).
    En,
    /// Catalan.
    Ca,
}

impl Locale {
    /// Returns the canonical locale label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ca => "ca",
        }
    }

    /// Attempts to parse a locale value (case-insensitive, tolerant of region tags).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.split(['-', '_']).next().unwrap_or("") {
            "en" => Some(Self::En),
            "ca" => Some(Self::Ca),
            _ => None,
        }
    }
}

/// Ordered list of supported CLI locales.
pub const SUPPORTED_LOCALES: &[Locale] = &[Locale::En, Locale::Ca];

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// Placeholder name without braces.
    pub key: &'static str,
    /// Preformatted substitution value.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Locale Selection
// ============================================================================

/// Global locale selection for CLI output.
static CURRENT_LOCALE: OnceLock<Locale> = OnceLock::new();

/// Sets the CLI locale. Only the first call wins.
pub fn set_locale(locale: Locale) {
    let _ = CURRENT_LOCALE.set(locale);
}

/// Returns the current CLI locale (defaults to English).
#[must_use]
pub fn current_locale() -> Locale {
    CURRENT_LOCALE.get().copied().unwrap_or(Locale::En)
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// English catalog entries.
const CATALOG_EN: &[(&str, &str)] = &[
    ("main.version", "test-gate {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.json_failed", "Failed to serialize output: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config valid."),
    ("runtime.build_failed", "Failed to initialize the gate: {error}"),
    ("evaluate.input_failed", "Failed to read artifacts: {error}"),
    ("evaluate.failed", "Evaluation failed: {error}"),
    ("evaluate.line", "{artifact_id} {verdict} {reason}"),
    ("evaluate.review_pending", "review {review_id} pending for {artifact_id}"),
    (
        "evaluate.summary",
        "run {run_id}: {total} artifacts, {pass} pass, {needs_review} needs_review, {policy_blocked} \
         policy_blocked, {sandbox_failed} sandbox_failed, {cancelled} cancelled",
    ),
    ("evaluate.cancelled", "Run cancelled before every artifact completed."),
    ("review.failed", "Review operation failed: {error}"),
    ("review.list.header", "Reviews:"),
    ("review.list.none", "No reviews found."),
    ("review.list.entry", "{review_id} {state} artifact={artifact_id} version={version}"),
    ("review.approve.ok", "Review {review_id} approved by {reviewer} (version {version})."),
    ("review.reject.ok", "Review {review_id} rejected by {reviewer} (version {version})."),
    (
        "review.status.entry",
        "{review_id} {state} artifact={artifact_id} version={version} eligibility={eligibility}",
    ),
    ("review.history.entry", "v{version} {state}"),
    ("review.expire.ok", "Expired {count} due review(s)."),
    ("report.failed", "Report lookup failed: {error}"),
    ("report.show.not_found", "Run report {run_id} not found."),
    ("report.list.header", "Runs:"),
    ("report.list.none", "No runs stored."),
    ("report.list.entry", "{run_id} artifacts={artifacts} cancelled={cancelled} saved_at={saved_at}"),
    ("report.list.requires_sqlite", "Listing runs requires the sqlite store."),
    ("i18n.lang.invalid_env", "Invalid value for {env}: {value}. Expected 'en' or 'ca'."),
    (
        "i18n.disclaimer.machine_translated",
        "Note: non-English output is machine-translated and may be inaccurate.",
    ),
];

/// Catalan catalog entries.
const CATALOG_CA: &[(&str, &str)] = &[
    ("main.version", "test-gate {version}"),
    ("output.stream.stdout", "sortida estàndard"),
    ("output.stream.stderr", "sortida d'errors"),
    ("output.stream.unknown", "sortida"),
    ("output.write_failed", "No s'ha pogut escriure a {stream}: {error}"),
    ("output.json_failed", "No s'ha pogut serialitzar la sortida: {error}"),
    ("config.load_failed", "No s'ha pogut carregar la configuració: {error}"),
    ("config.validate.ok", "Configuració vàlida."),
    ("runtime.build_failed", "No s'ha pogut inicialitzar la porta: {error}"),
    ("evaluate.input_failed", "No s'han pogut llegir els artefactes: {error}"),
    ("evaluate.failed", "L'avaluació ha fallat: {error}"),
    ("evaluate.line", "{artifact_id} {verdict} {reason}"),
    ("evaluate.review_pending", "revisió {review_id} pendent per a {artifact_id}"),
    (
        "evaluate.summary",
        "execució {run_id}: {total} artefactes, {pass} pass, {needs_review} needs_review, \
         {policy_blocked} policy_blocked, {sandbox_failed} sandbox_failed, {cancelled} cancelled",
    ),
    ("evaluate.cancelled", "Execució cancel·lada abans que es completessin tots els artefactes."),
    ("review.failed", "L'operació de revisió ha fallat: {error}"),
    ("review.list.header", "Revisions:"),
    ("review.list.none", "No s'han trobat revisions."),
    ("review.list.entry", "{review_id} {state} artefacte={artifact_id} versió={version}"),
    ("review.approve.ok", "Revisió {review_id} aprovada per {reviewer} (versió {version})."),
    ("review.reject.ok", "Revisió {review_id} rebutjada per {reviewer} (versió {version})."),
    (
        "review.status.entry",
        "{review_id} {state} artefacte={artifact_id} versió={version} elegibilitat={eligibility}",
    ),
    ("review.history.entry", "v{version} {state}"),
    ("review.expire.ok", "S'han caducat {count} revisions vençudes."),
    ("report.failed", "La consulta de l'informe ha fallat: {error}"),
    ("report.show.not_found", "No s'ha trobat l'informe d'execució {run_id}."),
    ("report.list.header", "Execucions:"),
    ("report.list.none", "No hi ha execucions desades."),
    ("report.list.entry", "{run_id} artefactes={artifacts} cancel·lada={cancelled} desada={saved_at}"),
    ("report.list.requires_sqlite", "Per llistar execucions cal el magatzem sqlite."),
    ("i18n.lang.invalid_env", "Valor no vàlid per a {env}: {value}. S'esperava 'en' o 'ca'."),
    (
        "i18n.disclaimer.machine_translated",
        "Nota: la sortida que no és en anglès està traduïda automàticament i pot ser inexacta.",
    ),
];

/// Returns the raw catalog entries for the requested locale.
#[cfg(test)]
#[must_use]
pub(crate) const fn catalog_entries_for(locale: Locale) -> &'static [(&'static str, &'static str)] {
    match locale {
        Locale::En => CATALOG_EN,
        Locale::Ca => CATALOG_CA,
    }
}

/// Returns the message catalog for the requested locale.
pub(crate) fn catalog_for(locale: Locale) -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_EN_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    static CATALOG_CA_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    match locale {
        Locale::En => CATALOG_EN_MAP.get_or_init(|| CATALOG_EN.iter().copied().collect()),
        Locale::Ca => CATALOG_CA_MAP.get_or_init(|| CATALOG_CA.iter().copied().collect()),
    }
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the selected locale while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog_for(current_locale())
        .get(key)
        .copied()
        .or_else(|| catalog_for(Locale::En).get(key).copied())
        .unwrap_or(key);
    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a localized message from a key and named arguments.
///
/// Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

#[cfg(test)]
#[path = "tests/i18n.rs"]
mod tests;
