//! Context structures for request rendering.

use serde::Serialize;

/// One field the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Variable name the value is returned under.
    pub name: String,

    /// Instruction describing what the value should contain.
    pub instruction: String,
}

impl FieldSpec {
    /// Creates a new field specification.
    #[must_use]
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
        }
    }
}

/// Context data provided to request templates for rendering.
///
/// This structure carries everything the `generate` template needs to
/// compose the user message of a batched variable-filling request.
///
/// # Examples
///
/// ```
/// use stencil_pm::{FieldSpec, GenerationContext};
///
/// let context = GenerationContext {
///     file_path: "notes/a.md".to_string(),
///     primary_text: "Meeting notes".to_string(),
///     supplementary_text: None,
///     fields: vec![FieldSpec::new("summary", "A brief summary paragraph.")],
/// };
/// assert_eq!(context.fields.len(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationContext {
    /// Path of the document the template is applied to.
    pub file_path: String,

    /// Selection or full document text.
    pub primary_text: String,

    /// Extra context placed before the primary text (tag index).
    pub supplementary_text: Option<String>,

    /// Fields the model must fill, in template order.
    pub fields: Vec<FieldSpec>,
}

impl GenerationContext {
    /// Creates a new `GenerationContext` with the document identity and text.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil_pm::GenerationContext;
    ///
    /// let context = GenerationContext::new("notes/a.md", "Body");
    /// assert_eq!(context.file_path, "notes/a.md");
    /// assert!(context.supplementary_text.is_none());
    /// ```
    #[must_use]
    pub fn new(file_path: impl Into<String>, primary_text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            primary_text: primary_text.into(),
            ..Default::default()
        }
    }

    /// Sets the supplementary text for this context.
    #[must_use]
    pub fn with_supplementary(mut self, text: impl Into<String>) -> Self {
        self.supplementary_text = Some(text.into());
        self
    }

    /// Sets the requested fields for this context.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil_pm::{FieldSpec, GenerationContext};
    ///
    /// let context = GenerationContext::new("a.md", "Body")
    ///     .with_fields(vec![FieldSpec::new("notes", "Concise notes.")]);
    /// assert_eq!(context.fields[0].name, "notes");
    /// ```
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }
}
