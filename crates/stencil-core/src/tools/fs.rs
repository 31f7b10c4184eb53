//! Storage adapter trait and operations.
//!
//! This module defines the `FsAdapter` trait, the storage abstraction that
//! templates, the variable prompt registry and documents are read through.
//! Both a real file system implementation and an in-memory mock exist.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Storage adapter trait.
///
/// Implementations can be real (using `std::fs`) or mocked for testing.
pub trait FsAdapter: Send + Sync {
    /// Reads the contents of a file as a string.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::PathNotFound` if the file doesn't exist and
    /// `StencilError::FileReadError` if reading fails.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes a string to a file, creating it and its parents if needed.
    ///
    /// Readers never observe a half-written file.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::FileWriteError` if writing fails or
    /// `StencilError::PermissionDenied` if lacking write permissions.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Lists the entry names (not full paths) of a directory.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::PathNotFound` if the directory doesn't exist
    /// and `StencilError::InvalidPath` if the path is not a directory.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Checks if a path exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::FileWriteError` or
    /// `StencilError::PermissionDenied` if creation fails.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Checks if a path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Checks if a path exists and is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns the last modification time of a path, `None` if unknown.
    ///
    /// This is the change signal for cached templates.
    fn modified(&self, path: &Path) -> Option<SystemTime>;

    /// Recursively collects the files below `root`, sorted by path.
    ///
    /// Entries whose name starts with `.` are skipped, as are the
    /// directories listed in `exclude`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` or one of its subdirectories cannot be listed.
    fn walk_files(&self, root: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for name in self.list_dir(&dir)? {
                if name.starts_with('.') {
                    continue;
                }
                let path = dir.join(&name);
                if self.is_dir(&path) {
                    if !exclude.contains(&path) {
                        pending.push(path);
                    }
                } else if self.is_file(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
