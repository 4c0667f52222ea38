//! Anthropic Messages API backend.
//!
//! Tool calls arrive as `tool_use` content blocks; tool results travel
//! back as `tool_result` blocks inside a user message (the inline
//! content-block history flavor).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Result, SibylError};
use crate::history::flavor_messages;
use crate::llm::message::{Message, ToolCallRequest};
use crate::llm::provider::{ChatProvider, ToolSchema};
use crate::llm::types::{ProviderKind, ProviderResponse, RequestOptions};

use super::{map_http_status, map_transport_error, PROVIDER_HTTP_TIMEOUT};

/// Default model for the Anthropic backend.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";

/// Default output budget. Voice replies are short.
const DEFAULT_MAX_TOKENS: u32 = 300;

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a provider. An empty `model` selects the default.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: if model.is_empty() {
                DEFAULT_ANTHROPIC_MODEL.to_string()
            } else {
                model
            },
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    /// Override the base URL (tests and proxies).
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
        let mut body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "system": system,
            "messages": flavor_messages(ProviderKind::Anthropic, messages),
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            let tool_values: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = Value::Array(tool_values);
        }
        body
    }

    fn parse_response(&self, payload: &Value) -> Result<ProviderResponse> {
        let content = payload
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SibylError::InvalidResponse("anthropic: response missing content array".into())
            })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in content {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    text.push_str(block.get("text").and_then(Value::as_str).unwrap_or(""));
                }
                Some("tool_use") => {
                    let call_id = block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    let name = block
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    tool_calls.push(ToolCallRequest {
                        call_id,
                        name,
                        arguments_json: input.to_string(),
                    });
                }
                _ => {}
            }
        }

        let usage = payload.get("usage");
        let prompt_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let eval_tokens = usage
            .and_then(|u| u.get("output_tokens"))
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
impl ChatProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
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
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .timeout(PROVIDER_HTTP_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderKind::Anthropic, e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| map_transport_error(ProviderKind::Anthropic, e))?;
        if !status.is_success() {
            return Err(map_http_status(ProviderKind::Anthropic, status, &raw));
        }

        let payload: Value = serde_json::from_str(&raw)
            .map_err(|e| SibylError::InvalidResponse(format!("anthropic: {e}")))?;
        let parsed = self.parse_response(&payload)?;
        tracing::info!(
            model = %self.model,
            chars = parsed.text.len(),
            tool_calls = parsed.tool_calls.len(),
            "anthropic response"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-ant-test", "")
    }

    #[test]
    fn empty_model_selects_default() {
        assert_eq!(provider().model(), DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(AnthropicProvider::new("k", "claude-sonnet-4-5").model(), "claude-sonnet-4-5");
    }

    #[test]
    fn body_carries_system_and_tools() {
        let tools = vec![ToolSchema::new(
            "web_search",
            "Search the web",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        )];
        let body = provider().build_body(
            "Be helpful.",
            &[Message::user("hi")],
            &tools,
            &RequestOptions::new().with_temperature(0.2),
        );
        assert_eq!(body["system"], "Be helpful.");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["tools"][0]["name"], "web_search");
        assert!(body["tools"][0]["input_schema"].is_object());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "web_search",
                 "input": {"query": "weather"}},
            ],
            "usage": {"input_tokens": 42, "output_tokens": 17},
        });
        let parsed = provider().parse_response(&payload);
        assert!(parsed.is_ok());
        let parsed = match parsed {
            Ok(p) => p,
            Err(_) => unreachable!("parse succeeded"),
        };
        assert_eq!(parsed.text, "Let me check.");
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].call_id, "toolu_1");
        assert_eq!(parsed.tool_calls[0].arguments()["query"], "weather");
        assert_eq!(parsed.prompt_tokens, 42);
        assert_eq!(parsed.eval_tokens, 17);
    }

    #[test]
    fn missing_content_is_invalid_response() {
        let err = provider().parse_response(&json!({"usage": {}}));
        assert!(matches!(err, Err(SibylError::InvalidResponse(_))));
    }
}
