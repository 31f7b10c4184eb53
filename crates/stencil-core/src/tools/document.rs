//! Document handle trait.
//!
//! A document handle is the target a rendered template is merged into: the
//! note the user is editing. Implementations buffer mutations and make them
//! durable in [`DocumentHandle::commit`].

use crate::error::{Result, StencilError};
use std::ops::Range;

/// Zero-based cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line index.
    pub line: usize,
    /// Character offset within the line.
    pub ch: usize,
}

impl Position {
    /// Creates a position at the start of `line`.
    pub fn line_start(line: usize) -> Self {
        Self { line, ch: 0 }
    }
}

/// Document handle trait.
///
/// Defines the operations the output merger needs on the target document.
/// Block-level merge is optional: handles that cannot address sections
/// independently keep the default `supports_block_merge`, and the merger
/// falls back to appending.
pub trait DocumentHandle: Send {
    /// Path of the document as shown to the user (vault-relative).
    fn path(&self) -> &str;

    /// Current full text of the document.
    fn full_text(&self) -> String;

    /// Current selection, if any.
    fn selection(&self) -> Option<String>;

    /// Appends text verbatim at the end of the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be modified.
    fn append(&mut self, text: &str) -> Result<()>;

    /// Moves the cursor (and view) to `pos`.
    fn set_cursor(&mut self, pos: Position);

    /// Whether [`DocumentHandle::replace_range`] is supported.
    fn supports_block_merge(&self) -> bool {
        false
    }

    /// Replaces the byte range `range` of the full text with `text`.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::BlockMergeUnsupported` by default.
    fn replace_range(&mut self, range: Range<usize>, text: &str) -> Result<()> {
        let _ = (range, text);
        Err(StencilError::BlockMergeUnsupported(self.path().to_string()))
    }

    /// Makes buffered mutations durable.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the document cannot be written.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}
