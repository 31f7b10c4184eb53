//! Mock document handle for testing.
//!
//! Records every mutation so tests can assert that failed renders leave the
//! document untouched.

use crate::error::{Result, StencilError};
use crate::tools::document::{DocumentHandle, Position};
use std::ops::Range;

/// In-memory document.
///
/// # Examples
///
/// ```
/// use stencil_core::tools::document::DocumentHandle;
/// use stencil_core::tools::document_mock::MockDocument;
///
/// let mut doc = MockDocument::new("notes/a.md", "Body").with_selection("Bo");
/// assert_eq!(doc.selection().as_deref(), Some("Bo"));
/// doc.append("\nmore").unwrap();
/// assert_eq!(doc.full_text(), "Body\nmore");
/// assert_eq!(doc.write_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDocument {
    path: String,
    text: String,
    selection: Option<String>,
    cursor: Option<Position>,
    block_merge: bool,
    writes: usize,
    commits: usize,
}

impl MockDocument {
    /// Creates a document with block merge enabled.
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            block_merge: true,
            ..Default::default()
        }
    }

    /// Sets the current selection.
    #[must_use]
    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    /// Enables or disables block merge support.
    #[must_use]
    pub fn with_block_merge(mut self, enabled: bool) -> Self {
        self.block_merge = enabled;
        self
    }

    /// Last cursor position set.
    pub fn cursor(&self) -> Option<Position> {
        self.cursor
    }

    /// Number of mutating calls (`append`, `replace_range`).
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of commits.
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl DocumentHandle for MockDocument {
    fn path(&self) -> &str {
        &self.path
    }

    fn full_text(&self) -> String {
        self.text.clone()
    }

    fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn append(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        self.writes += 1;
        Ok(())
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = Some(pos);
    }

    fn supports_block_merge(&self) -> bool {
        self.block_merge
    }

    fn replace_range(&mut self, range: Range<usize>, text: &str) -> Result<()> {
        if !self.block_merge {
            return Err(StencilError::BlockMergeUnsupported(self.path.clone()));
        }
        self.text.replace_range(range, text);
        self.writes += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}
