//! OpenAI chat-completions backend.
//!
//! Tool calls ride on the assistant message as a `tool_calls` array with
//! JSON-string arguments; results go back as `tool` role messages.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Result, SibylError};
use crate::history::flavor_messages;
use crate::llm::message::{Message, ToolCallRequest};
use crate::llm::provider::{ChatProvider, ToolSchema};
use crate::llm::types::{ProviderKind, ProviderResponse, RequestOptions};

use super::{map_http_status, map_transport_error, PROVIDER_HTTP_TIMEOUT};

/// Default model for the OpenAI backend.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const DEFAULT_MAX_TOKENS: u32 = 300;

/// OpenAI chat-completions provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a provider. An empty `model` selects the default.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: if model.is_empty() {
                DEFAULT_OPENAI_MODEL.to_string()
            } else {
                model
            },
            base_url: "https://api.openai.com".to_string(),
        }
    }

    /// Override the base URL (tests, proxies, compatible servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_body(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &RequestOptions,
    ) -> Value {
        let mut wire = vec![json!({"role": "system", "content": system})];
        wire.extend(flavor_messages(ProviderKind::OpenAi, messages));

        let mut body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": wire,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            let tool_values: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = Value::Array(tool_values);
        }
        body
    }

    fn parse_response(&self, payload: &Value) -> Result<ProviderResponse> {
        let message = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| {
                SibylError::InvalidResponse("openai: response missing choices[0].message".into())
            })?;

        let text = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for (i, call) in calls.iter().enumerate() {
                let function = call.get("function").cloned().unwrap_or_else(|| json!({}));
                let name = function
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                // Arguments arrive as a JSON-encoded string.
                let arguments_json = match function.get("arguments") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "{}".to_string(),
                };
                let call_id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{i}"));
                tool_calls.push(ToolCallRequest {
                    call_id,
                    name,
                    arguments_json,
                });
            }
        }

        let usage = payload.get("usage");
        let prompt_tokens = usage
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let eval_tokens = usage
            .and_then(|u| u.get("completion_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(ProviderResponse {
            text,
            tool_calls,
            prompt_tokens,
            eval_tokens,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &RequestOptions,
    ) -> Result<ProviderResponse> {
        let body = self.build_body(system, messages, tools, options);
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .timeout(PROVIDER_HTTP_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderKind::OpenAi, e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| map_transport_error(ProviderKind::OpenAi, e))?;
        if !status.is_success() {
            return Err(map_http_status(ProviderKind::OpenAi, status, &raw));
        }

        let payload: Value = serde_json::from_str(&raw)
            .map_err(|e| SibylError::InvalidResponse(format!("openai: {e}")))?;
        let parsed = self.parse_response(&payload)?;
        tracing::info!(
            model = %self.model,
            chars = parsed.text.len(),
            tool_calls = parsed.tool_calls.len(),
            "openai response"
        );
        Ok(parsed)
    }
}
