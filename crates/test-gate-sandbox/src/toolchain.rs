// crates/test-gate-sandbox/src/toolchain.rs
// ============================================================================
// Module: Test Gate Toolchains
// Description: Per-language check and test command templates.
// Purpose: Map an artifact language to the commands that validate it.
// Dependencies: serde, test-gate-core
// ============================================================================

//! ## Overview
//! A toolchain is two argv templates: a `check` command that parses or
//! compiles the artifact and an optional `run` command that executes its
//! tests. Templates substitute `{file}` with the artifact path and `{dir}`
//! with the scratch directory. No shell is involved in substitution.
//!
//! The built-in Java toolchain compiles against [`DEFAULT_JAVA_CLASSPATH`],
//! the directory where distribution packages install the `JUnit` jars. Hosts
//! that keep `JUnit` elsewhere build the entry with [`java_toolchain`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use test_gate_core::Language;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Placeholder replaced with the artifact file path.
const FILE_PLACEHOLDER: &str = "{file}";

/// Placeholder replaced with the scratch directory path.
const DIR_PLACEHOLDER: &str = "{dir}";

/// Default Java compile classpath; `javac` expands the trailing `*` to every jar.
pub const DEFAULT_JAVA_CLASSPATH: &str = "/usr/share/java/*";

/// Separator between classpath entries on this host.
const CLASSPATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

// ============================================================================
// SECTION: Templates
// ============================================================================

/// Argv template; the first element is the program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    /// Creates a template from argv parts.
    #[must_use]
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Returns true when the template has no program.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.first().is_none_or(|program| program.trim().is_empty())
    }

    /// Returns the program name, if any.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Substitutes placeholders and splits into program and arguments.
    #[must_use]
    pub fn render(&self, file: &Path, dir: &Path) -> Option<(String, Vec<String>)> {
        if self.is_empty() {
            return None;
        }
        let file = file.to_string_lossy();
        let dir = dir.to_string_lossy();
        let mut parts = self
            .0
            .iter()
            .map(|part| part.replace(FILE_PLACEHOLDER, &file).replace(DIR_PLACEHOLDER, &dir));
        let program = parts.next()?;
        Some((program, parts.collect()))
    }
}

/// Commands used for one language.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSpec {
    /// Parse or compile command.
    pub check: CommandTemplate,
    /// Optional test execution command.
    #[serde(default)]
    pub run: CommandTemplate,
}

impl ToolchainSpec {
    /// Creates a toolchain from check and run argv parts.
    #[must_use]
    pub fn new(check: &[&str], run: &[&str]) -> Self {
        Self {
            check: CommandTemplate::new(check.iter().copied()),
            run: CommandTemplate::new(run.iter().copied()),
        }
    }

    /// Returns the commands to execute in order.
    #[must_use]
    pub fn commands(&self, run_tests: bool) -> Vec<&CommandTemplate> {
        let mut commands = Vec::with_capacity(2);
        if !self.check.is_empty() {
            commands.push(&self.check);
        }
        if run_tests && !self.run.is_empty() {
            commands.push(&self.run);
        }
        commands
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Toolchains keyed by language label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchains {
    /// Toolchain per canonical language label.
    by_language: BTreeMap<String, ToolchainSpec>,
}

impl Toolchains {
    /// Creates an empty registry.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            by_language: BTreeMap::new(),
        }
    }

    /// Registers or replaces the toolchain for a language.
    #[must_use]
    pub fn with(mut self, language: &Language, spec: ToolchainSpec) -> Self {
        self.insert(language, spec);
        self
    }

    /// Registers or replaces the toolchain for a language.
    pub fn insert(&mut self, language: &Language, spec: ToolchainSpec) {
        self.by_language.insert(language.label().to_string(), spec);
    }

    /// Returns the toolchain for a language.
    #[must_use]
    pub fn get(&self, language: &Language) -> Option<&ToolchainSpec> {
        self.by_language.get(language.label())
    }

    /// Returns the configured language labels.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.by_language.keys().map(String::as_str)
    }
}

impl Default for Toolchains {
    fn default() -> Self {
        Self::empty()
            .with(
                &Language::Python,
                ToolchainSpec::new(
                    &["python3", "-m", "py_compile", FILE_PLACEHOLDER],
                    &["python3", "-m", "pytest", "-q", "-p", "no:cacheprovider", FILE_PLACEHOLDER],
                ),
            )
            .with(
                &Language::JavaScript,
                ToolchainSpec::new(&["node", "--check", FILE_PLACEHOLDER], &["node", "--test", FILE_PLACEHOLDER]),
            )
            .with(
                &Language::TypeScript,
                ToolchainSpec::new(
                    &["tsc", "--noEmit", "--skipLibCheck", FILE_PLACEHOLDER],
                    &["npx", "--no-install", "jest", FILE_PLACEHOLDER],
                ),
            )
            .with(&Language::Java, java_toolchain(DEFAULT_JAVA_CLASSPATH))
    }
}

/// Builds the Java toolchain compiling against `classpath` plus the scratch directory.
#[must_use]
pub fn java_toolchain(classpath: &str) -> ToolchainSpec {
    let classpath = format!("{DIR_PLACEHOLDER}{CLASSPATH_SEPARATOR}{classpath}");
    ToolchainSpec::new(&["javac", "-cp", &classpath, "-d", DIR_PLACEHOLDER, FILE_PLACEHOLDER], &[])
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
    fn render_substitutes_file_and_dir() {
        let template = CommandTemplate::new(["javac", "-d", "{dir}", "{file}"]);
        let (program, args) =
            template.render(Path::new("/scratch/CalcTest.java"), Path::new("/scratch")).unwrap();
        assert_eq!(program, "javac");
        assert_eq!(args, vec!["-d", "/scratch", "/scratch/CalcTest.java"]);
    }

    #[cfg(unix)]
    #[test]
    fn java_toolchain_compiles_against_junit_classpath() {
        let java = Toolchains::default();
        let (program, args) = java
            .get(&Language::Java)
            .unwrap()
            .check
            .render(Path::new("/scratch/CalcTest.java"), Path::new("/scratch"))
            .unwrap();
        assert_eq!(program, "javac");
        assert_eq!(args, vec!["-cp", "/scratch:/usr/share/java/*", "-d", "/scratch", "/scratch/CalcTest.java"]);

        let custom = java_toolchain("/opt/junit/junit-platform-console-standalone.jar");
        let (_, args) = custom.check.render(Path::new("/s/T.java"), Path::new("/s")).unwrap();
        assert_eq!(args[1], "/s:/opt/junit/junit-platform-console-standalone.jar");
    }

    #[test]
    fn empty_template_renders_nothing() {
        assert!(CommandTemplate::default().render(Path::new("a"), Path::new("b")).is_none());
        assert!(CommandTemplate::new([" "]).is_empty());
    }

    #[test]
    fn defaults_cover_supported_languages() {
        let toolchains = Toolchains::default();
        for language in [Language::Python, Language::JavaScript, Language::TypeScript, Language::Java] {
            assert!(toolchains.get(&language).is_some(), "missing {language}");
        }
        assert!(toolchains.get(&Language::Other("cobol".to_string())).is_none());
    }

    #[test]
    fn commands_skip_run_unless_requested() {
        let spec = ToolchainSpec::new(&["sh", "-n", "{file}"], &["sh", "{file}"]);
        assert_eq!(spec.commands(false).len(), 1);
        assert_eq!(spec.commands(true).len(), 2);
        let java = Toolchains::default();
        assert_eq!(java.get(&Language::Java).unwrap().commands(true).len(), 1);
    }
}
