//! Generative model client trait and error types.
//!
//! A render makes at most one model call: every prompted variable of the
//! template is requested in the same [`GenerationRequest`], and the client
//! answers with one value per field name.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use stencil_pm::FieldSpec;
use thiserror::Error;

/// Values returned by the model, keyed by field name.
pub type GeneratedValues = BTreeMap<String, String>;

/// A single batched generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// System prompt, if any.
    pub system_prompt: Option<String>,
    /// User message: the document context followed by the field list.
    pub user_content: String,
    /// Requested fields in template order.
    pub fields: Vec<FieldSpec>,
}

impl GenerationRequest {
    /// Names of the requested fields, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Errors that can occur while talking to the model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RateLimited { .. } => true,
            ModelError::ApiError { status, .. } => *status >= 500,
            ModelError::Network(_) | ModelError::Transport(_) => true,
            ModelError::InvalidResponse(_) | ModelError::MissingApiKey(_) | ModelError::Json(_) => false,
        }
    }
}

/// Stateless model client: each call is an independent request.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generates one value per requested field.
    ///
    /// Implementations may return extra keys or omit fields; matching
    /// returned keys to declarations is the resolver's job.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedValues, ModelError>;
}
