//! Mock model client for testing.

use crate::tools::model::{GeneratedValues, GenerationRequest, ModelClient, ModelError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
enum Scripted {
    Values(GeneratedValues),
    Failure(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Scripted>,
    requests: Vec<GenerationRequest>,
}

/// Scripted model client.
///
/// Answers are consumed in order; an exhausted script yields
/// `ModelError::InvalidResponse`. Every request is recorded.
///
/// # Examples
///
/// ```
/// use stencil_core::tools::model_mock::MockModelClient;
///
/// let model = MockModelClient::new().push_values([("summary", "Short recap.")]);
/// assert_eq!(model.call_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockModelClient {
    state: Arc<Mutex<MockState>>,
}

impl MockModelClient {
    /// Creates a client with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful answer.
    #[must_use]
    pub fn push_values<'a>(self, values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state.lock().unwrap().script.push_back(Scripted::Values(values));
        self
    }

    /// Queues a transport failure.
    #[must_use]
    pub fn push_failure(self, message: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(Scripted::Failure(message.into()));
        self
    }

    /// Number of `generate` calls made.
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Copies of every request received, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedValues, ModelError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        match state.script.pop_front() {
            Some(Scripted::Values(values)) => Ok(values),
            Some(Scripted::Failure(message)) => Err(ModelError::Transport(message)),
            None => Err(ModelError::InvalidResponse("no more mock responses".to_string())),
        }
    }
}
