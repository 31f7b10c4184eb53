//! OpenAI-compatible model client.
//!
//! Uses the Chat Completions API with a single forced function call whose
//! parameters are the requested fields, so the answer arrives as one JSON
//! object keyed by variable name.

use crate::config::ModelConfig;
use crate::tools::model::{GeneratedValues, GenerationRequest, ModelClient, ModelError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Name of the function the model is forced to call.
const FILL_FUNCTION: &str = "fill_template_variables";

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 500 | 502 | 503 | 504)
}

/// OpenAI API client
pub struct OpenAiClient {
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Creates a client from configuration.
    ///
    /// The API key is read from the configured environment variable now; a
    /// missing key only fails once a request is actually made, so commands
    /// that never call the model work offline.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Network` if the HTTP client cannot be built.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        debug!(?config, "from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ModelError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.user_content }));

        let properties: serde_json::Map<String, serde_json::Value> = request
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    serde_json::json!({ "type": "string", "description": field.instruction }),
                )
            })
            .collect();
        let required: Vec<&str> = request.field_names().collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "tools": [{
                "type": "function",
                "function": {
                    "name": FILL_FUNCTION,
                    "description": "Provide a value for every template variable.",
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    }
                }
            }],
            "tool_choice": { "type": "function", "function": { "name": FILL_FUNCTION } },
        });

        // Reasoning models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");
        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(self.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(self.max_tokens);
        }

        body
    }

    fn parse_response(api_response: OpenAiResponse) -> Result<GeneratedValues, ModelError> {
        let message = api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ModelError::InvalidResponse("response has no choices".to_string()))?;

        if let Some(call) = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .find(|call| call.function.name == FILL_FUNCTION)
        {
            return parse_values(&call.function.arguments);
        }

        match message.content {
            Some(content) if !content.trim().is_empty() => parse_values(strip_code_fence(&content)),
            _ => Err(ModelError::InvalidResponse(
                "response has neither a function call nor content".to_string(),
            )),
        }
    }
}

/// Parses a JSON object of field values.
///
/// Strings are taken as-is, arrays are joined with newlines and `null`
/// values are dropped so the field counts as missing.
fn parse_values(raw: &str) -> Result<GeneratedValues, ModelError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let serde_json::Value::Object(map) = value else {
        return Err(ModelError::InvalidResponse(format!(
            "expected a JSON object of field values, got: {raw}"
        )));
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| value_to_text(value).map(|text| (key, text)))
        .collect())
}

fn value_to_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(value_to_text)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        other => Some(other.to_string()),
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedValues, ModelError> {
        debug!(model = %self.model, fields = request.fields.len(), "generate: called");
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::MissingApiKey(self.api_key_env.clone()))?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(request);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "generate: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "generate: network error");
                    last_error = Some(ModelError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(ModelError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "generate: retryable error");
                last_error = Some(ModelError::ApiError { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ModelError::ApiError { status, message: text });
            }

            let api_response: OpenAiResponse = response.json().await?;
            return Self::parse_response(api_response);
        }

        Err(last_error.unwrap_or_else(|| ModelError::InvalidResponse("max retries exceeded".to_string())))
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_pm::FieldSpec;

    fn client(model: &str) -> OpenAiClient {
        let config = ModelConfig {
            model: model.to_string(),
            api_key_env: "STENCIL_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..ModelConfig::default()
        };
        OpenAiClient::from_config(&config).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_prompt: Some("Be brief.".to_string()),
            user_content: "Body".to_string(),
            fields: vec![
                FieldSpec::new("summary", "A summary."),
                FieldSpec::new("notes", "Notes."),
            ],
        }
    }

    #[test]
    fn test_request_body_forces_fill_function() {
        let body = client("gpt-4o-mini").build_request_body(&request());

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Body");
        assert_eq!(body["tool_choice"]["function"]["name"], FILL_FUNCTION);
        let params = &body["tools"][0]["function"]["parameters"];
        assert_eq!(params["properties"]["summary"]["description"], "A summary.");
        assert_eq!(params["required"], serde_json::json!(["summary", "notes"]));
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn test_request_body_uses_completion_tokens_for_reasoning_models() {
        let body = client("o3-mini").build_request_body(&request());
        assert_eq!(body["max_completion_tokens"], 2048);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_function_call() {
        let response: OpenAiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": {
                "content": null,
                "tool_calls": [{ "function": {
                    "name": FILL_FUNCTION,
                    "arguments": "{\"summary\":\"Short.\",\"notes\":[\"- a\",\"- b\"],\"gone\":null}"
                }}]
            }}]
        }))
        .unwrap();

        let values = OpenAiClient::parse_response(response).unwrap();
        assert_eq!(values.get("summary").map(String::as_str), Some("Short."));
        assert_eq!(values.get("notes").map(String::as_str), Some("- a\n- b"));
        assert!(!values.contains_key("gone"));
    }

    #[test]
    fn test_parse_fenced_content_fallback() {
        let response: OpenAiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": "```json\n{\"summary\": \"S\"}\n```" } }]
        }))
        .unwrap();

        let values = OpenAiClient::parse_response(response).unwrap();
        assert_eq!(values.get("summary").map(String::as_str), Some("S"));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(parse_values("[1, 2]"), Err(ModelError::InvalidResponse(_))));
        assert!(matches!(parse_values("not json"), Err(ModelError::Json(_))));
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_before_network() {
        let result = client("gpt-4o-mini").generate(&request()).await;
        assert!(matches!(result, Err(ModelError::MissingApiKey(name)) if name == "STENCIL_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
