//! Error types for Stencil operations.
//!
//! This module defines the error variants that can occur while loading
//! templates, assembling render context, resolving variables and merging
//! output. All errors use `thiserror` for ergonomic error handling with
//! context.

use crate::resolver::ResolutionError;
use crate::tools::model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// Comprehensive error types for Stencil operations.
///
/// Parse problems never show up here: the template parser is tolerant and
/// simply yields no declaration for malformed tags.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StencilError {
    // Render errors
    /// Neither a selection nor document text was available.
    #[error("no selection or document text available for {0}")]
    EmptyContext(String),

    /// Model call failed or returned incomplete data.
    #[error(transparent)]
    Resolution(Box<ResolutionError>),

    /// Template with the given key was not found.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Requested selection does not exist in the document.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Document does not support section-level replacement.
    #[error("document does not support block merge: {0}")]
    BlockMergeUnsupported(String),

    // Storage errors
    /// Path not found in storage.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// Invalid path provided.
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Error reading file.
    #[error("file read error: {0}")]
    FileReadError(String),

    /// Error writing file.
    #[error("file write error: {0}")]
    FileWriteError(String),

    /// Permission denied for the specified operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Variable prompt registry file could not be parsed.
    #[error("invalid var prompts file {path}: {message}")]
    RegistryParseError {
        /// Path of the registry file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    // Config errors
    /// Invalid configuration detected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Error parsing configuration file.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    // Collaborator errors
    /// Request template error.
    #[error(transparent)]
    Prompt(#[from] stencil_pm::PromptError),

    /// Model client error outside of variable resolution.
    #[error(transparent)]
    Model(#[from] ModelError),

    // IO and system errors
    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Standard IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context from anyhow.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl StencilError {
    /// Returns `true` for errors raised by the storage layer.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            StencilError::PathNotFound(_)
                | StencilError::InvalidPath(_)
                | StencilError::FileReadError(_)
                | StencilError::FileWriteError(_)
                | StencilError::PermissionDenied(_)
                | StencilError::RegistryParseError { .. }
                | StencilError::Json(_)
                | StencilError::Io(_)
        )
    }

    /// Returns the resolution failure, if this is one.
    pub fn as_resolution(&self) -> Option<&ResolutionError> {
        match self {
            StencilError::Resolution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResolutionError> for StencilError {
    fn from(err: ResolutionError) -> Self {
        StencilError::Resolution(Box::new(err))
    }
}

/// Result type alias for Stencil operations.
///
/// All fallible Stencil operations return this type, using [`StencilError`] for error variants.
pub type Result<T> = std::result::Result<T, StencilError>;
