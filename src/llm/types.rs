//! Core domain types for the LLM adaptor.
//!
//! - [`ProviderKind`] — identifies the chat-completion backend
//! - [`RequestOptions`] — configures generation parameters
//! - [`ProviderResponse`] — raw, pre-normalization provider output
//! - [`GenerateResult`] / [`LlmDiagnostics`] — normalized adaptor output

use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::ToolCallRequest;

/// The chat-completion backend handling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI chat completions API.
    OpenAi,
    /// Local Ollama endpoint.
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Options controlling LLM generation behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens to generate. `None` means the provider default.
    pub max_tokens: Option<u32>,
    /// Sampling temperature. `None` means the provider default.
    pub temperature: Option<f64>,
    /// Suppress reasoning/thinking output where the backend supports it.
    pub disable_thinking: bool,
    /// Route this request to a specific provider instead of the default.
    pub provider_override: Option<ProviderKind>,
}

impl RequestOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum output tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Suppress reasoning/thinking output.
    pub fn with_disable_thinking(mut self, disable: bool) -> Self {
        self.disable_thinking = disable;
        self
    }

    /// Route to a specific provider.
    pub fn with_provider(mut self, kind: ProviderKind) -> Self {
        self.provider_override = Some(kind);
        self
    }
}

/// Raw output from a provider backend, before normalization.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    /// Assistant text (possibly empty if tools were called).
    pub text: String,
    /// Structured tool-call requests, already converted to the internal shape.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Prompt token count, when the provider reports it.
    pub prompt_tokens: u64,
    /// Output token count, when the provider reports it.
    pub eval_tokens: u64,
}

/// Per-request timing and accounting, emitted with `workflow_debug` events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmDiagnostics {
    /// The model that served the request.
    pub model: String,
    /// Prompt token count.
    pub prompt_tokens: u64,
    /// Output token count.
    pub eval_tokens: u64,
    /// Wall-clock duration of the request in milliseconds.
    pub total_ms: u64,
    /// Output tokens per second (0.0 when elapsed time is zero).
    pub tok_per_sec: f64,
    /// Character count of the assistant text before reasoning was stripped.
    pub raw_chars: usize,
    /// Estimated tokens consumed by stripped reasoning content.
    pub think_tokens: u64,
    /// Name of the first reasoning tag detected, if any.
    pub think_detected: Option<String>,
}

/// Normalized result of one adaptor generation.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    /// Assistant text with reasoning content stripped.
    pub text: String,
    /// Tool-call requests (structured or rescued from text output).
    pub tool_calls: Vec<ToolCallRequest>,
    /// Timing and token accounting for this request.
    pub diagnostics: LlmDiagnostics,
}
