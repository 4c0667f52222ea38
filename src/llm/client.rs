//! The LLM adaptor facade.
//!
//! [`LlmClient`] unifies the provider backends behind one `generate`
//! operation and applies the normalization contract: reasoning-tag
//! stripping, text-tool-call rescue, and per-request diagnostics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::{Result, SibylError};
use crate::tools::registry::ToolRegistry;

use super::message::Message;
use super::provider::{ChatProvider, ToolSchema};
use super::providers::build_providers;
use super::text_calls::{default_tool_aliases, parse_text_tool_calls};
use super::thinking::{estimate_think_tokens, strip_reasoning};
use super::types::{GenerateResult, LlmDiagnostics, ProviderKind, RequestOptions};

/// Unified entry point for chat completion across providers.
pub struct LlmClient {
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
    default_kind: ProviderKind,
    registry: Arc<ToolRegistry>,
    aliases: HashMap<String, String>,
}

impl LlmClient {
    /// Create a client over pre-built providers.
    pub fn new(
        providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
        default_kind: ProviderKind,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            providers,
            default_kind,
            registry,
            aliases: default_tool_aliases(),
        }
    }

    /// Build providers from environment configuration.
    pub fn from_config(config: &EngineConfig, registry: Arc<ToolRegistry>) -> Self {
        Self::new(build_providers(config), config.resolve_provider(), registry)
    }

    /// Replace the text-tool-call alias table.
    pub fn with_tool_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// The provider kind handling requests by default.
    pub fn default_kind(&self) -> ProviderKind {
        self.default_kind
    }

    /// Model label for the given (or default) provider, for display.
    pub fn model_label(&self, kind: Option<ProviderKind>) -> String {
        let kind = kind.unwrap_or(self.default_kind);
        self.providers
            .get(&kind)
            .map(|p| p.model().to_string())
            .unwrap_or_else(|| kind.to_string())
    }

    /// Run one normalized generation.
    ///
    /// Applies the ordered reasoning-strip rules to the assistant text and,
    /// when tools were offered but no structured call came back, attempts
    /// the text-tool-call rescue. A synthesized call is only produced for
    /// names present in the live tool registry.
    pub async fn generate(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &RequestOptions,
    ) -> Result<GenerateResult> {
        let kind = options.provider_override.unwrap_or(self.default_kind);
        let provider = self.providers.get(&kind).ok_or_else(|| {
            SibylError::Config(format!("provider '{kind}' is not configured"))
        })?;

        let offered: &[ToolSchema] = if provider.supports_tools() { tools } else { &[] };

        tracing::debug!(
            provider = %kind,
            model = provider.model(),
            messages = messages.len(),
            tools = offered.len(),
            "llm generate"
        );

        let started = Instant::now();
        let response = provider.chat(system, messages, offered, options).await?;
        let total_ms = started.elapsed().as_millis() as u64;

        let raw_chars = response.text.chars().count();
        let stripped = strip_reasoning(&response.text);
        let mut text = stripped.text;
        let mut tool_calls = response.tool_calls;

        if tool_calls.is_empty() && !offered.is_empty() && !text.is_empty() {
            let rescued = parse_text_tool_calls(&text, &self.aliases, &self.registry);
            if !rescued.is_empty() {
                tracing::info!(
                    count = rescued.len(),
                    "rescued tool calls from plain-text output"
                );
                tool_calls = rescued;
                text.clear();
            }
        }

        let elapsed_secs = total_ms as f64 / 1000.0;
        let tok_per_sec = if elapsed_secs > 0.0 {
            response.eval_tokens as f64 / elapsed_secs
        } else {
            0.0
        };

        Ok(GenerateResult {
            text,
            tool_calls,
            diagnostics: LlmDiagnostics {
                model: provider.model().to_string(),
                prompt_tokens: response.prompt_tokens,
                eval_tokens: response.eval_tokens,
                total_ms,
                tok_per_sec,
                raw_chars,
                think_tokens: estimate_think_tokens(stripped.stripped_bytes),
                think_detected: stripped.first_tag.map(str::to_string),
            },
        })
    }
}
