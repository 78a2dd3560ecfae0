// crates/test-gate-sandbox/src/workspace.rs
// ============================================================================
// Module: Test Gate Scratch Directories
// Description: Owned temporary directories for one sandbox run.
// Purpose: Guarantee scratch space is removed on every exit path.
// Dependencies: tempfile
// ============================================================================

//! ## Overview
//! A [`ScratchDir`] owns a fresh temporary directory. Dropping the value
//! deletes the directory and everything the child process wrote into it, so
//! cleanup happens on success, failure, timeout, cancellation, and panic
//! unwinding alike.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for scratch directory names.
const SCRATCH_PREFIX: &str = "test-gate-";

// ============================================================================
// SECTION: Scratch Directory
// ============================================================================

/// Temporary directory removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    /// Owned temporary directory.
    dir: TempDir,
}

impl ScratchDir {
    /// Creates a scratch directory under `root`, or the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be created.
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self {
            dir,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a source file directly inside the directory.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] when `file_name` is not a
    /// single normal path component, or the underlying write error.
    pub fn write_source(&self, file_name: &str, contents: &str) -> io::Result<PathBuf> {
        let mut components = Path::new(file_name).components();
        let valid = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid artifact file name: {file_name}"),
            ));
        }
        let path = self.dir.path().join(file_name);
        fs::write(&path, contents)?;
        Ok(path)
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
    fn drop_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path())).unwrap();
        let path = scratch.path().to_path_buf();
        scratch.write_source("test_a.py", "x = 1\n").unwrap();
        assert!(path.join("test_a.py").exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn write_source_rejects_path_traversal() {
        let scratch = ScratchDir::create(None).unwrap();
        for name in ["../escape.py", "nested/test.py", "/etc/passwd", "", ".."] {
            let err = scratch.write_source(name, "x").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "accepted {name}");
        }
    }

    #[test]
    fn directory_name_carries_prefix() {
        let scratch = ScratchDir::create(None).unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(SCRATCH_PREFIX));
    }
}
