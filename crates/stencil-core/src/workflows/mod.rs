//! Workflow modules for Stencil.
//!
//! This module organizes the different workflow implementations:
//! - `init`: Prepare a vault (templates folder, defaults, registry)
//! - `sync`: Record template variables in the prompt registry
//! - `generate`: Apply a template to a document

pub mod generate;
pub mod init;
pub mod sync;

// Re-export workflow functions
pub use generate::{GenerateOutcome, generate};
pub use init::{InitReport, init_vault};
pub use sync::{SyncReport, sync_var_prompts};
