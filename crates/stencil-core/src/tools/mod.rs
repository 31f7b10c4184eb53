//! Collaborator adapters and registry for Stencil workflows.
//!
//! This module provides the tool registry that holds the injected
//! collaborators: storage, tag index and model client. Document handles are
//! per render and are passed explicitly instead. Each adapter trait has a
//! real implementation and an in-memory mock.

pub mod document;
pub mod document_impl;
pub mod document_mock;
pub mod fs;
pub mod fs_impl;
pub mod fs_mock;
pub mod model;
pub mod model_mock;
pub mod model_openai;
pub mod tags;

use std::sync::Arc;

/// Tool registry that manages all available adapters.
///
/// Adapters are shared trait objects so concurrent renders can use them
/// and tests can swap in mocks.
#[derive(Clone)]
pub struct ToolRegistry {
    /// Storage adapter for templates, settings and notes.
    pub fs: Arc<dyn fs::FsAdapter>,

    /// Tag index used when a template asks for tag context.
    pub tags: Arc<dyn tags::TagIndex>,

    /// Model client for prompted variables.
    pub model: Arc<dyn model::ModelClient>,
}

impl ToolRegistry {
    /// Creates a new tool registry with the provided adapters.
    ///
    /// # Arguments
    ///
    /// * `fs` - Storage adapter implementation.
    /// * `tags` - Tag index implementation.
    /// * `model` - Model client implementation.
    pub fn new(
        fs: Arc<dyn fs::FsAdapter>,
        tags: Arc<dyn tags::TagIndex>,
        model: Arc<dyn model::ModelClient>,
    ) -> Self {
        Self { fs, tags, model }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("fs", &"Arc<dyn FsAdapter>")
            .field("tags", &"Arc<dyn TagIndex>")
            .field("model", &"Arc<dyn ModelClient>")
            .finish()
    }
}
