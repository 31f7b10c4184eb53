//! Error types for the prompt manager crate.

use std::path::PathBuf;

/// Errors that can occur in the prompt manager.
#[derive(thiserror::Error, Debug)]
pub enum PromptError {
    /// Template was not found among embedded or override templates.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Error occurred while rendering a template.
    #[error("template render error: {0}")]
    TemplateRenderError(String),

    /// Override template failed to compile.
    #[error("template syntax error in {name}: {message}")]
    TemplateSyntaxError {
        /// Name of the offending template.
        name: String,
        /// Compiler message.
        message: String,
    },

    /// Failed to load or read template from filesystem.
    #[error("template load error: {path}")]
    TemplateLoadError {
        /// Path to the template that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Override directory does not exist or is not accessible.
    #[error("template directory not found: {0}")]
    TemplateDirectoryNotFound(PathBuf),

    /// Override directory listing failed.
    #[error("failed to list templates in {path}")]
    TemplateListError {
        /// Path to the template directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for prompt manager operations.
pub type Result<T> = std::result::Result<T, PromptError>;
