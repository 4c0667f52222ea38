//! Environment-driven configuration for the assistant core.
//!
//! [`EngineConfig::from_env()`] reads every knob the core recognizes.
//! Invalid numeric values fall back to defaults with a warning; missing
//! credentials simply disable the provider they belong to.

use serde::{Deserialize, Serialize};

use crate::llm::types::ProviderKind;

/// Default maximum tool-calling iterations in the orchestrator loop.
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;

/// Default maximum retained history groups (10 user/assistant round trips).
pub const DEFAULT_MAX_HISTORY_GROUPS: usize = 20;

/// Default sleep between workflow loop iterations, in seconds.
///
/// Calibrated to stay under public search API rate limits.
pub const DEFAULT_LOOP_DELAY_SECS: f64 = 1.5;

/// Default per-snippet character cap for intermediate LLM outputs.
pub const DEFAULT_SNIPPET_CHAR_CAP: usize = 150;

/// Default aggregate character cap for intermediate LLM outputs.
pub const DEFAULT_AGGREGATE_CHAR_CAP: usize = 2500;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:14b";

/// Configuration for the assistant core, loaded from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default provider. `None` means auto-detect by credential presence.
    pub provider: Option<ProviderKind>,
    /// Model override within the provider ("" = provider default).
    pub model: String,
    /// Anthropic API key; presence enables the provider.
    pub anthropic_api_key: String,
    /// OpenAI API key; presence enables the provider.
    pub openai_api_key: String,
    /// Ollama endpoint URL.
    pub ollama_url: String,
    /// Ollama model name.
    pub ollama_model: String,
    /// Tavily search API key.
    pub tavily_api_key: String,
    /// Brave search API key.
    pub brave_api_key: String,
    /// Maximum tool-calling iterations in the orchestrator loop.
    pub max_tool_iterations: u32,
    /// Maximum retained history groups.
    pub max_history_groups: usize,
    /// Sleep between workflow loop iterations, in seconds.
    pub loop_delay_secs: f64,
    /// Per-snippet character cap for intermediate outputs.
    pub snippet_char_cap: usize,
    /// Aggregate character cap for intermediate outputs.
    pub aggregate_char_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: String::new(),
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            tavily_api_key: String::new(),
            brave_api_key: String::new(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            max_history_groups: DEFAULT_MAX_HISTORY_GROUPS,
            loop_delay_secs: DEFAULT_LOOP_DELAY_SECS,
            snippet_char_cap: DEFAULT_SNIPPET_CHAR_CAP,
            aggregate_char_cap: DEFAULT_AGGREGATE_CHAR_CAP,
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            provider: env_string("SIBYL_PROVIDER")
                .as_deref()
                .and_then(parse_provider),
            model: env_string("SIBYL_MODEL").unwrap_or_default(),
            anthropic_api_key: env_string("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_api_key: env_string("OPENAI_API_KEY").unwrap_or_default(),
            ollama_url: env_string("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: env_string("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            tavily_api_key: env_string("TAVILY_API_KEY").unwrap_or_default(),
            brave_api_key: env_string("BRAVE_API_KEY").unwrap_or_default(),
            max_tool_iterations: env_parsed("SIBYL_MAX_TOOL_ITERATIONS", DEFAULT_MAX_TOOL_ITERATIONS),
            max_history_groups: env_parsed("SIBYL_MAX_HISTORY_GROUPS", DEFAULT_MAX_HISTORY_GROUPS),
            loop_delay_secs: env_parsed("SIBYL_LOOP_DELAY_SECS", DEFAULT_LOOP_DELAY_SECS),
            snippet_char_cap: env_parsed("SIBYL_SNIPPET_CHAR_CAP", DEFAULT_SNIPPET_CHAR_CAP),
            aggregate_char_cap: env_parsed("SIBYL_AGGREGATE_CHAR_CAP", DEFAULT_AGGREGATE_CHAR_CAP),
        }
    }

    /// Resolve which provider handles a session by default.
    ///
    /// An explicit setting wins; otherwise auto-detect by credential
    /// presence: Anthropic, then OpenAI, then the local Ollama endpoint.
    pub fn resolve_provider(&self) -> ProviderKind {
        if let Some(kind) = self.provider {
            return kind;
        }
        if !self.anthropic_api_key.is_empty() {
            ProviderKind::Anthropic
        } else if !self.openai_api_key.is_empty() {
            ProviderKind::OpenAi
        } else {
            ProviderKind::Ollama
        }
    }

    /// Set the default provider.
    pub fn with_provider(mut self, kind: ProviderKind) -> Self {
        self.provider = Some(kind);
        self
    }

    /// Set the model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the maximum orchestrator tool iterations.
    pub fn with_max_tool_iterations(mut self, n: u32) -> Self {
        self.max_tool_iterations = n;
        self
    }

    /// Set the maximum retained history groups.
    pub fn with_max_history_groups(mut self, n: usize) -> Self {
        self.max_history_groups = n;
        self
    }

    /// Set the workflow loop inter-iteration delay in seconds.
    pub fn with_loop_delay_secs(mut self, secs: f64) -> Self {
        self.loop_delay_secs = secs;
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparseable config value");
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_provider(raw: &str) -> Option<ProviderKind> {
    match raw.trim().to_lowercase().as_str() {
        "anthropic" | "claude" => Some(ProviderKind::Anthropic),
        "openai" => Some(ProviderKind::OpenAi),
        "ollama" | "local" => Some(ProviderKind::Ollama),
        other => {
            tracing::warn!(provider = other, "unknown provider name, using auto-detect");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tool_iterations, 5);
        assert_eq!(config.max_history_groups, 20);
        assert_eq!(config.loop_delay_secs, 1.5);
        assert_eq!(config.snippet_char_cap, 150);
        assert_eq!(config.aggregate_char_cap, 2500);
        assert_eq!(config.ollama_url, "http://localhost:11434");
    }

    #[test]
    fn resolve_provider_auto_detect_order() {
        let mut config = EngineConfig::default();
        assert_eq!(config.resolve_provider(), ProviderKind::Ollama);

        config.openai_api_key = "sk-test".into();
        assert_eq!(config.resolve_provider(), ProviderKind::OpenAi);

        config.anthropic_api_key = "sk-ant-test".into();
        assert_eq!(config.resolve_provider(), ProviderKind::Anthropic);
    }

    #[test]
    fn explicit_provider_wins_over_credentials() {
        let config = EngineConfig {
            anthropic_api_key: "sk-ant-test".into(),
            ..EngineConfig::default()
        }
        .with_provider(ProviderKind::Ollama);
        assert_eq!(config.resolve_provider(), ProviderKind::Ollama);
    }

    #[test]
    fn parse_provider_accepts_aliases() {
        assert_eq!(parse_provider("claude"), Some(ProviderKind::Anthropic));
        assert_eq!(parse_provider("ANTHROPIC"), Some(ProviderKind::Anthropic));
        assert_eq!(parse_provider("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(parse_provider("local"), Some(ProviderKind::Ollama));
        assert_eq!(parse_provider("mystery"), None);
    }

    #[test]
    fn builder_setters() {
        let config = EngineConfig::new()
            .with_model("qwen2.5:7b")
            .with_max_tool_iterations(3)
            .with_max_history_groups(6)
            .with_loop_delay_secs(0.1);
        assert_eq!(config.model, "qwen2.5:7b");
        assert_eq!(config.max_tool_iterations, 3);
        assert_eq!(config.max_history_groups, 6);
        assert_eq!(config.loop_delay_secs, 0.1);
    }

    #[test]
    fn serde_round_trip() {
        let original = EngineConfig::new().with_model("test-model");
        let json = serde_json::to_string(&original).unwrap_or_default();
        let parsed: Result<EngineConfig, _> = serde_json::from_str(&json);
        assert!(parsed.is_ok());
        match parsed {
            Ok(c) => assert_eq!(c.model, "test-model"),
            Err(_) => unreachable!("deserialization succeeded"),
        }
    }
}
