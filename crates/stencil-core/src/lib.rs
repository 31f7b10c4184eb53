//! Stencil Core - template engine for markdown notes.
//!
//! This crate turns note templates into finished note sections. A template
//! declares variables; the engine fills them from the document (file path,
//! selection or text) or asks a language model for the rest, renders the
//! template and merges the output back into the document.
//!
//! # Architecture
//!
//! The core crate is organized into several modules:
//!
//! - [`parser`]: Variable declarations in both template dialects
//! - [`frontmatter`]: Template header keys
//! - [`context`]: Render context assembly
//! - [`resolver`]: Variable value resolution
//! - [`renderer`]: Substitution of resolved values
//! - [`merger`]: Merging rendered output into a document
//! - [`render`]: The end-to-end render pipeline
//! - [`registry`] and [`settings`]: Persisted per-variable prompts
//! - [`store`]: Template loading and caching
//! - [`runtime`] and [`workflows`]: Vault-level operations
//! - [`tools`]: Adapter traits for storage, documents, tags and the model
//!
//! # Example
//!
//! ```
//! use stencil_core::{Dialect, parse_variables};
//!
//! let decls = parse_variables("## Summary\n{{summary}}\nSource: {{file_path}}", Dialect::Markdown);
//! assert_eq!(decls.len(), 2);
//! assert!(decls[0].is_prompted());
//! assert!(decls[1].inline);
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod frontmatter;
pub mod merger;
pub mod parser;
pub mod registry;
pub mod render;
pub mod renderer;
pub mod resolver;
pub mod runtime;
pub mod settings;
pub mod store;
pub mod tools;
pub mod workflows;

// Re-export core types for convenience
pub use config::{ModelConfig, StencilConfig};
pub use context::{ContextInputs, RenderContext, assemble_context};
pub use error::{Result, StencilError};
pub use frontmatter::{Frontmatter, parse_frontmatter, strip_recognized_keys};
pub use merger::{MergeMode, MergeReport, merge_output};
pub use parser::{Dialect, VariableDeclaration, apply_registry, parse_variables};
pub use registry::{VarPrompt, VarPromptEntry, VariablePromptRegistry};
pub use render::{MissingValuePolicy, RenderCollaborators, RenderOptions, RenderResult, render};
pub use renderer::render_template;
pub use resolver::{ResolutionError, ResolvedVariables, ValueSource, resolve_variables};
pub use runtime::{StencilRuntime, TemplateSummary};
pub use settings::SettingsStore;
pub use store::{Template, TemplateStore};
pub use tools::ToolRegistry;
