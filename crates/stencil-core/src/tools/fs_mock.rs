//! Mock storage adapter for testing.
//!
//! This module provides an in-memory implementation of the `FsAdapter`
//! trait. Every write bumps a logical clock so modification times behave
//! like a real file system for cache invalidation.

use crate::error::{Result, StencilError};
use crate::tools::fs::FsAdapter;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, (String, u64)>,
    dirs: BTreeSet<PathBuf>,
    clock: u64,
    writes: usize,
}

impl MockState {
    fn add_dir_chain(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() || ancestor == Path::new("/") {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }
}

/// Mock storage adapter for testing.
///
/// Clones share the same state, so a test can hand one clone to the
/// runtime and inspect the other.
///
/// # Examples
///
/// ```
/// use stencil_core::tools::fs_mock::MockFsAdapter;
/// use stencil_core::tools::fs::FsAdapter;
/// use std::path::Path;
///
/// let fs = MockFsAdapter::new();
/// fs.write(Path::new("/vault/a.md"), "content").unwrap();
/// assert_eq!(fs.read_to_string(Path::new("/vault/a.md")).unwrap(), "content");
/// assert!(fs.is_dir(Path::new("/vault")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFsAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockFsAdapter {
    /// Creates a new, empty mock storage adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock pre-populated with files (path -> content).
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil_core::tools::fs_mock::MockFsAdapter;
    ///
    /// let fs = MockFsAdapter::with_files([("/vault/note.md", "# Note")]);
    /// assert_eq!(fs.get_all_files().len(), 1);
    /// ```
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let fs = Self::new();
        for (path, content) in files {
            let path: PathBuf = path.into();
            let content: String = content.into();
            let _ = fs.write(&path, &content);
        }
        fs.state.lock().unwrap().writes = 0;
        fs
    }

    /// Returns a copy of all files (path -> content).
    pub fn get_all_files(&self) -> HashMap<PathBuf, String> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .map(|(path, (content, _))| (path.clone(), content.clone()))
            .collect()
    }

    /// Returns all directory paths, sorted.
    pub fn get_all_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().dirs.iter().cloned().collect()
    }

    /// Number of writes performed since construction.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Removes a file, as if it was deleted outside the application.
    pub fn remove(&self, path: &Path) {
        self.state.lock().unwrap().files.remove(path);
    }
}

impl FsAdapter for MockFsAdapter {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| StencilError::PathNotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains(path) {
            return Err(StencilError::FileWriteError(format!(
                "{}: is a directory",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            state.add_dir_chain(parent);
        }

        state.clock += 1;
        state.writes += 1;
        let stamp = state.clock;
        state
            .files
            .insert(path.to_path_buf(), (content.to_string(), stamp));
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();

        if state.files.contains_key(path) {
            return Err(StencilError::InvalidPath(path.to_path_buf()));
        }
        if !state.dirs.contains(path) {
            return Err(StencilError::PathNotFound(path.to_path_buf()));
        }

        let files = state.files.keys();
        let dirs = state.dirs.iter();
        let mut entries: Vec<String> = files
            .chain(dirs)
            .filter(|entry| entry.parent() == Some(path) && entry.as_path() != path)
            .filter_map(|entry| entry.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();

        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.files.contains_key(path) {
            return Err(StencilError::FileWriteError(format!(
                "{}: is a file",
                path.display()
            )));
        }
        state.add_dir_chain(path);
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|(_, stamp)| SystemTime::UNIX_EPOCH + Duration::from_secs(*stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_read_write() {
        let fs = MockFsAdapter::new();
        let path = Path::new("/vault/note.md");

        fs.write(path, "hello world").unwrap();
        assert_eq!(fs.read_to_string(path).unwrap(), "hello world");
        assert_eq!(fs.write_count(), 1);
    }

    #[test]
    fn test_mock_fs_file_not_found() {
        let fs = MockFsAdapter::new();
        let result = fs.read_to_string(Path::new("/nonexistent.md"));

        assert!(matches!(result.unwrap_err(), StencilError::PathNotFound(_)));
    }

    #[test]
    fn test_mock_fs_list_dir_includes_subdirs() {
        let fs = MockFsAdapter::new();
        let dir = Path::new("/vault/templates");

        fs.write(&dir.join("a.md"), "a").unwrap();
        fs.write(&dir.join("default/b.md"), "b").unwrap();

        let entries = fs.list_dir(dir).unwrap();
        assert_eq!(entries, vec!["a.md".to_string(), "default".to_string()]);
    }

    #[test]
    fn test_mock_fs_modified_advances_on_write() {
        let fs = MockFsAdapter::new();
        let path = Path::new("/vault/a.md");

        fs.write(path, "v1").unwrap();
        let first = fs.modified(path).unwrap();
        fs.write(path, "v2").unwrap();
        let second = fs.modified(path).unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_mock_fs_with_files_does_not_count_writes() {
        let fs = MockFsAdapter::with_files([("/vault/a.md", "a"), ("/vault/b/c.md", "c")]);

        assert_eq!(fs.write_count(), 0);
        assert!(fs.is_dir(Path::new("/vault/b")));
        assert_eq!(fs.get_all_files().len(), 2);
    }

    #[test]
    fn test_mock_fs_walk_files() {
        let fs = MockFsAdapter::with_files([
            ("/vault/a.md", "a"),
            ("/vault/x/b.md", "b"),
            ("/vault/.hidden/c.md", "c"),
        ]);

        let files = fs.walk_files(Path::new("/vault"), &[]).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("/vault/a.md"), PathBuf::from("/vault/x/b.md")]
        );
    }
}
