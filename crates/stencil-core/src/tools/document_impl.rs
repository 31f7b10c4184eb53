//! File-backed document handle.
//!
//! `FileDocument` loads a note through an [`FsAdapter`], buffers every
//! mutation in memory and writes the result back once on commit.

use crate::error::{Result, StencilError};
use crate::tools::document::{DocumentHandle, Position};
use crate::tools::fs::FsAdapter;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A markdown note on disk.
///
/// Files are independently addressable, so block merge is supported.
pub struct FileDocument<'a> {
    fs: &'a dyn FsAdapter,
    file: PathBuf,
    display_path: String,
    text: String,
    selection: Option<String>,
    cursor: Option<Position>,
    dirty: bool,
}

impl<'a> FileDocument<'a> {
    /// Opens a document, reporting its path relative to `vault_root`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read.
    pub fn open(fs: &'a dyn FsAdapter, vault_root: &Path, file: &Path) -> Result<Self> {
        let text = fs.read_to_string(file)?;
        let display_path = file
            .strip_prefix(vault_root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");

        Ok(Self {
            fs,
            file: file.to_path_buf(),
            display_path,
            text,
            selection: None,
            cursor: None,
            dirty: false,
        })
    }

    /// Sets an explicit selection.
    #[must_use]
    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    /// Selects lines `start..=end` (1-based, inclusive).
    ///
    /// # Errors
    ///
    /// Returns `StencilError::InvalidSelection` if the range is empty or
    /// outside the document.
    pub fn with_line_selection(mut self, start: usize, end: usize) -> Result<Self> {
        let lines: Vec<&str> = self.text.lines().collect();
        if start == 0 || start > end || end > lines.len() {
            return Err(StencilError::InvalidSelection(format!(
                "lines {start}:{end} in {} ({} lines)",
                self.display_path,
                lines.len()
            )));
        }
        self.selection = Some(lines[start - 1..end].join("\n"));
        Ok(self)
    }

    /// Cursor position set by the last merge, if any.
    pub fn cursor(&self) -> Option<Position> {
        self.cursor
    }

    /// Whether the buffer differs from what was loaded or last committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl DocumentHandle for FileDocument<'_> {
    fn path(&self) -> &str {
        &self.display_path
    }

    fn full_text(&self) -> String {
        self.text.clone()
    }

    fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn append(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        self.dirty = true;
        Ok(())
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = Some(pos);
    }

    fn supports_block_merge(&self) -> bool {
        true
    }

    fn replace_range(&mut self, range: Range<usize>, text: &str) -> Result<()> {
        if range.start > range.end
            || range.end > self.text.len()
            || !self.text.is_char_boundary(range.start)
            || !self.text.is_char_boundary(range.end)
        {
            return Err(StencilError::InvalidSelection(format!(
                "byte range {}..{} in {}",
                range.start, range.end, self.display_path
            )));
        }
        self.text.replace_range(range, text);
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.dirty {
            self.fs.write(&self.file, &self.text)?;
            self.dirty = false;
            tracing::info!(path = %self.display_path, "document written");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fs_mock::MockFsAdapter;

    #[test]
    fn test_open_reports_vault_relative_path() {
        let fs = MockFsAdapter::with_files([("/vault/notes/a.md", "Body")]);
        let doc = FileDocument::open(&fs, Path::new("/vault"), Path::new("/vault/notes/a.md")).unwrap();

        assert_eq!(doc.path(), "notes/a.md");
        assert_eq!(doc.full_text(), "Body");
        assert!(doc.selection().is_none());
    }

    #[test]
    fn test_line_selection() {
        let fs = MockFsAdapter::with_files([("/vault/a.md", "one\ntwo\nthree\nfour")]);
        let doc = FileDocument::open(&fs, Path::new("/vault"), Path::new("/vault/a.md"))
            .unwrap()
            .with_line_selection(2, 3)
            .unwrap();

        assert_eq!(doc.selection().as_deref(), Some("two\nthree"));
    }

    #[test]
    fn test_line_selection_out_of_range() {
        let fs = MockFsAdapter::with_files([("/vault/a.md", "one")]);
        let result = FileDocument::open(&fs, Path::new("/vault"), Path::new("/vault/a.md"))
            .unwrap()
            .with_line_selection(1, 2);

        assert!(matches!(result, Err(StencilError::InvalidSelection(_))));
    }

    #[test]
    fn test_mutations_are_written_once_on_commit() {
        let fs = MockFsAdapter::with_files([("/vault/a.md", "# A\nold\n")]);
        let mut doc = FileDocument::open(&fs, Path::new("/vault"), Path::new("/vault/a.md")).unwrap();

        doc.replace_range(4..7, "new").unwrap();
        doc.append("tail\n").unwrap();
        assert_eq!(fs.write_count(), 0);

        doc.commit().unwrap();
        doc.commit().unwrap();
        assert_eq!(fs.write_count(), 1);
        assert_eq!(
            fs.read_to_string(Path::new("/vault/a.md")).unwrap(),
            "# A\nnew\ntail\n"
        );
    }

    #[test]
    fn test_replace_range_rejects_bad_range() {
        let fs = MockFsAdapter::with_files([("/vault/a.md", "abc")]);
        let mut doc = FileDocument::open(&fs, Path::new("/vault"), Path::new("/vault/a.md")).unwrap();

        assert!(doc.replace_range(1..10, "x").is_err());
    }
}
