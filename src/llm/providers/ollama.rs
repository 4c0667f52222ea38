//! Local Ollama backend.
//!
//! Speaks `POST /api/chat` with `stream: false`. Tool-call arguments
//! arrive as JSON objects (not strings) and calls carry no ids, so ids
//! are synthesized by position.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Result, SibylError};
use crate::history::flavor_messages;
use crate::llm::message::{Message, ToolCallRequest};
use crate::llm::provider::{ChatProvider, ToolSchema};
use crate::llm::types::{ProviderKind, ProviderResponse, RequestOptions};

use super::{map_http_status, map_transport_error, PROVIDER_HTTP_TIMEOUT};

/// Local Ollama chat provider.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a provider for the given endpoint and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn build_body(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &RequestOptions,
    ) -> Value {
        let mut wire = vec![json!({"role": "system", "content": system})];
        wire.extend(flavor_messages(ProviderKind::Ollama, messages));

        let mut body = json!({
            "model": self.model,
            "messages": wire,
            "stream": false,
        });
        if options.disable_thinking {
            body["think"] = json!(false);
        }
        if let Some(temperature) = options.temperature {
            body["options"] = json!({"temperature": temperature});
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
        let message = payload.get("message").ok_or_else(|| {
            SibylError::InvalidResponse("ollama: response missing message".into())
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
                let arguments = function
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                tool_calls.push(ToolCallRequest {
                    call_id: format!("call_{i}"),
                    name,
                    arguments_json: arguments.to_string(),
                });
            }
        }

        let prompt_tokens = payload
            .get("prompt_eval_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let eval_tokens = payload
            .get("eval_count")
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
impl ChatProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
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
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .timeout(PROVIDER_HTTP_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(ProviderKind::Ollama, e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| map_transport_error(ProviderKind::Ollama, e))?;
        if !status.is_success() {
            return Err(map_http_status(ProviderKind::Ollama, status, &raw));
        }

        let payload: Value = serde_json::from_str(&raw)
            .map_err(|e| SibylError::InvalidResponse(format!("ollama: {e}")))?;
        let parsed = self.parse_response(&payload)?;
        tracing::info!(
            model = %self.model,
            chars = parsed.text.len(),
            tool_calls = parsed.tool_calls.len(),
            "ollama response"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OllamaProvider {
        OllamaProvider::new("http://localhost:11434", "qwen2.5:14b")
    }

    #[test]
    fn body_is_non_streaming() {
        let body = provider().build_body("s", &[Message::user("hi")], &[], &RequestOptions::new());
        assert_eq!(body["stream"], false);
        assert_eq!(body["model"], "qwen2.5:14b");
        assert!(body.get("think").is_none());
    }

    #[test]
    fn disable_thinking_sets_think_false() {
        let opts = RequestOptions::new().with_disable_thinking(true);
        let body = provider().build_body("s", &[], &[], &opts);
        assert_eq!(body["think"], false);
    }

    #[test]
    fn temperature_rides_in_options() {
        let opts = RequestOptions::new().with_temperature(0.2);
        let body = provider().build_body("s", &[], &[], &opts);
        assert_eq!(body["options"]["temperature"], 0.2);
    }

    #[test]
    fn parses_object_arguments_and_synthesizes_ids() {
        let payload = json!({
            "message": {
                "content": "",
                "tool_calls": [
                    {"function": {"name": "web_search", "arguments": {"query": "a"}}},
                    {"function": {"name": "web_search", "arguments": {"query": "b"}}},
                ],
            },
            "prompt_eval_count": 25,
            "eval_count": 12,
        });
        let parsed = provider().parse_response(&payload);
        assert!(parsed.is_ok());
        if let Ok(p) = parsed {
            assert_eq!(p.tool_calls.len(), 2);
            assert_eq!(p.tool_calls[0].call_id, "call_0");
            assert_eq!(p.tool_calls[1].call_id, "call_1");
            assert_eq!(p.tool_calls[1].arguments()["query"], "b");
            assert_eq!(p.prompt_tokens, 25);
            assert_eq!(p.eval_tokens, 12);
        }
    }

    #[test]
    fn missing_message_is_invalid_response() {
        let err = provider().parse_response(&json!({"done": true}));
        assert!(matches!(err, Err(SibylError::InvalidResponse(_))));
    }
}
