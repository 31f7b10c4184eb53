//! Core prompt engine trait definition.

use crate::error::Result;
use serde::Serialize;

/// Trait for rendering request templates with dynamic context.
///
/// Implementations handle loading, caching, and rendering of the templates
/// that compose model requests.
///
/// # Examples
///
/// ```
/// use stencil_pm::{GenerationContext, PromptEngine, PromptManager};
///
/// let manager = PromptManager::new()?;
/// let context = GenerationContext::new("notes/a.md", "Some text");
/// let rendered = manager.render("generate", &context)?;
/// assert!(rendered.contains("Some text"));
/// # Ok::<(), stencil_pm::PromptError>(())
/// ```
pub trait PromptEngine {
    /// Renders a template with the provided context.
    ///
    /// # Arguments
    ///
    /// * `template` - Name of the template to render (without extension)
    /// * `ctx` - Context data to use for rendering
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not exist or rendering fails.
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String>;

    /// Gets a system prompt for a specific role.
    ///
    /// Renders the role's template with an empty context.
    ///
    /// # Errors
    ///
    /// Returns an error if the template for the role does not exist or rendering fails.
    fn get_system_prompt(&self, role: &str) -> Result<String>;

    /// Lists all available templates, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the template set cannot be enumerated.
    fn list_templates(&self) -> Result<Vec<String>>;
}
