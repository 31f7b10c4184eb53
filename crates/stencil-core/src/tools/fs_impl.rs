//! Standard storage adapter implementation.
//!
//! This module provides a concrete implementation of the `FsAdapter` trait
//! using `std::fs`. Writes go through a sibling temporary file and a rename
//! so a crash never leaves a truncated template or registry behind.

use crate::error::{Result, StencilError};
use crate::tools::fs::FsAdapter;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Standard storage adapter using `std::fs`.
///
/// This adapter provides real file system access and is the default
/// implementation in production. For testing, use
/// [`MockFsAdapter`](crate::tools::fs_mock::MockFsAdapter) instead.
#[derive(Debug, Default)]
pub struct StdFsAdapter;

impl StdFsAdapter {
    /// Creates a new standard storage adapter.
    pub fn new() -> Self {
        Self
    }

    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.stencil-tmp"))
    }

    fn write_error(path: &Path, e: std::io::Error) -> StencilError {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            StencilError::PermissionDenied(path.display().to_string())
        } else {
            StencilError::FileWriteError(format!("{}: {}", path.display(), e))
        }
    }
}

impl FsAdapter for StdFsAdapter {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StencilError::PathNotFound(path.to_path_buf())
            } else {
                StencilError::FileReadError(format!("{}: {}", path.display(), e))
            }
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            self.create_dir_all(parent)?;
        }

        let temp = Self::temp_path(path);
        std::fs::write(&temp, content).map_err(|e| Self::write_error(path, e))?;
        std::fs::rename(&temp, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            Self::write_error(path, e)
        })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(StencilError::PathNotFound(path.to_path_buf()));
        }

        if !path.is_dir() {
            return Err(StencilError::InvalidPath(path.to_path_buf()));
        }

        std::fs::read_dir(path)
            .map_err(|e| StencilError::FileReadError(format!("{}: {}", path.display(), e)))?
            .map(|entry| {
                entry
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .map_err(|e| {
                        StencilError::FileReadError(format!("failed to read directory entry: {e}"))
                    })
            })
            .collect()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| Self::write_error(path, e))
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}
