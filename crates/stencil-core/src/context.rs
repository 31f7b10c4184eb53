//! Render context assembly.
//!
//! Builds the immutable [`RenderContext`] for one render from the target
//! document, its selection and the template frontmatter.

use crate::error::{Result, StencilError};
use crate::frontmatter::{Frontmatter, RECOGNIZED_KEYS};
use crate::tools::document::DocumentHandle;
use crate::tools::tags::{TagCount, TagIndex};

/// Raw inputs describing the document a template is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextInputs {
    /// Document path as shown to the user.
    pub file_path: String,
    /// Full document text, if available.
    pub full_text: Option<String>,
    /// Current selection, if any.
    pub selection: Option<String>,
}

impl ContextInputs {
    /// Creates inputs for a document path.
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    /// Sets the full document text.
    #[must_use]
    pub fn with_full_text(mut self, text: impl Into<String>) -> Self {
        self.full_text = Some(text.into());
        self
    }

    /// Sets the selection.
    #[must_use]
    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    /// Captures path, text and selection from a document handle.
    pub fn from_document(doc: &dyn DocumentHandle) -> Self {
        Self {
            file_path: doc.path().to_string(),
            full_text: Some(doc.full_text()),
            selection: doc.selection(),
        }
    }
}

/// Context for a single render. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    file_path: String,
    primary_text: String,
    supplementary_text: Option<String>,
    system_prompt: Option<String>,
}

impl RenderContext {
    /// Creates a context with only the required fields.
    pub fn new(file_path: impl Into<String>, primary_text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            primary_text: primary_text.into(),
            supplementary_text: None,
            system_prompt: None,
        }
    }

    /// Sets the supplementary text.
    #[must_use]
    pub fn with_supplementary_text(mut self, text: impl Into<String>) -> Self {
        self.supplementary_text = Some(text.into());
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn primary_text(&self) -> &str {
        &self.primary_text
    }

    pub fn supplementary_text(&self) -> Option<&str> {
        self.supplementary_text.as_deref()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }
}

/// Builds the render context.
///
/// A non-empty selection is used verbatim, otherwise the full document
/// text. The tag index is only consulted when the frontmatter asks for it.
///
/// # Errors
///
/// Returns `StencilError::EmptyContext` when there is neither a selection
/// nor any document text.
pub fn assemble_context(
    inputs: &ContextInputs,
    frontmatter: Option<&Frontmatter>,
    tags: &dyn TagIndex,
) -> Result<RenderContext> {
    let primary_text = [inputs.selection.as_deref(), inputs.full_text.as_deref()]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
        .ok_or_else(|| StencilError::EmptyContext(inputs.file_path.clone()))?;

    let mut context = RenderContext::new(&inputs.file_path, primary_text);

    if let Some(fm) = frontmatter {
        if fm.tags_as_context() {
            let all_tags = tags.all_tags();
            tracing::debug!(count = all_tags.len(), "adding tag context");
            context.supplementary_text = Some(format_tag_context(all_tags));
        }
        context.system_prompt = fm.system_prompt().map(str::to_string);
    }

    Ok(context)
}

/// Formats tags one per line, most frequent first.
///
/// Equal counts are ordered by name. Tags named like a frontmatter control
/// key are left out.
pub fn format_tag_context(mut tags: Vec<TagCount>) -> String {
    tags.retain(|tag| !RECOGNIZED_KEYS.contains(&tag.name.trim_start_matches('#')));
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    tags.iter()
        .map(|tag| {
            if tag.count > 1 {
                format!("{} ({})", tag.name, tag.count)
            } else {
                tag.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse_frontmatter;
    use crate::tools::document_mock::MockDocument;
    use crate::tools::tags::StaticTagIndex;

    #[test]
    fn test_selection_is_verbatim() {
        let inputs = ContextInputs::new("a.md")
            .with_full_text("Whole doc")
            .with_selection("  picked\n");
        let ctx = assemble_context(&inputs, None, &StaticTagIndex::default()).unwrap();

        assert_eq!(ctx.primary_text(), "  picked\n");
        assert_eq!(ctx.file_path(), "a.md");
    }

    #[test]
    fn test_empty_selection_falls_back_to_full_text() {
        let inputs = ContextInputs::new("a.md").with_full_text("Whole doc").with_selection("");
        let ctx = assemble_context(&inputs, None, &StaticTagIndex::default()).unwrap();
        assert_eq!(ctx.primary_text(), "Whole doc");
    }

    #[test]
    fn test_empty_context() {
        let inputs = ContextInputs::new("a.md").with_full_text("");
        let err = assemble_context(&inputs, None, &StaticTagIndex::default()).unwrap_err();
        assert!(matches!(err, StencilError::EmptyContext(path) if path == "a.md"));
    }

    #[test]
    fn test_tag_context_and_system_prompt() {
        let fm = parse_frontmatter("---\ntags_as_context: true\nsystem_prompt: Be terse\n---\n").unwrap();
        let tags = StaticTagIndex::from_pairs([("#y", 1), ("#x", 3)]);
        let inputs = ContextInputs::new("a.md").with_full_text("Body");

        let ctx = assemble_context(&inputs, Some(&fm), &tags).unwrap();
        assert_eq!(ctx.supplementary_text(), Some("#x (3)\n#y"));
        assert_eq!(ctx.system_prompt(), Some("Be terse"));
    }

    #[test]
    fn test_tags_not_requested() {
        let fm = parse_frontmatter("---\ntitle: x\n---\n").unwrap();
        let tags = StaticTagIndex::from_pairs([("#x", 3)]);
        let inputs = ContextInputs::new("a.md").with_full_text("Body");

        let ctx = assemble_context(&inputs, Some(&fm), &tags).unwrap();
        assert_eq!(ctx.supplementary_text(), None);
        assert_eq!(ctx.system_prompt(), None);
    }

    #[test]
    fn test_format_tag_context_ties_and_exclusions() {
        let tags = vec![
            TagCount::new("#b", 2),
            TagCount::new("#a", 2),
            TagCount::new("#tags_as_context", 9),
            TagCount::new("#c", 1),
        ];
        assert_eq!(format_tag_context(tags), "#a (2)\n#b (2)\n#c");
    }

    #[test]
    fn test_from_document() {
        let doc = MockDocument::new("notes/a.md", "Body").with_selection("Bo");
        let inputs = ContextInputs::from_document(&doc);

        assert_eq!(inputs.file_path, "notes/a.md");
        assert_eq!(inputs.full_text.as_deref(), Some("Body"));
        assert_eq!(inputs.selection.as_deref(), Some("Bo"));
    }
}
