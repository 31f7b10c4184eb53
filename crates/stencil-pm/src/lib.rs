//! Prompt manager crate for Stencil.
//!
//! This crate renders the text sent to the language model when template
//! variables are filled: the system prompt and the user message listing the
//! requested fields. Templates are minijinja sources embedded in the crate,
//! optionally overridden from a user directory.
//!
//! # Examples
//!
//! ```
//! use stencil_pm::{FieldSpec, GenerationContext, PromptEngine, PromptManager};
//!
//! let manager = PromptManager::new()?;
//!
//! let context = GenerationContext::new("notes/a.md", "Meeting notes")
//!     .with_fields(vec![FieldSpec::new("summary", "A brief summary paragraph.")]);
//!
//! let prompt = manager.render("generate", &context)?;
//! assert!(prompt.contains("- summary: A brief summary paragraph."));
//! # Ok::<(), stencil_pm::PromptError>(())
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod manager;

// Re-export public types for convenience
pub use context::{FieldSpec, GenerationContext};
pub use engine::PromptEngine;
pub use error::{PromptError, Result};
pub use manager::PromptManager;
