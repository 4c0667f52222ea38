//! Provider implementations (Anthropic, OpenAI, Ollama).
//!
//! Each backend speaks its native wire format over `reqwest` and
//! normalizes the response into [`ProviderResponse`](crate::llm::types::ProviderResponse).
//! Providers are wired at startup from environment credentials by
//! [`build_providers`].

pub mod anthropic;
pub mod ollama;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::SibylError;

use super::provider::ChatProvider;
use super::types::ProviderKind;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// HTTP timeout per provider request.
pub(crate) const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Construct every provider the environment has credentials for.
///
/// The local Ollama backend is always present (no credential needed);
/// managed backends appear only when their API key is set.
pub fn build_providers(config: &EngineConfig) -> HashMap<ProviderKind, Arc<dyn ChatProvider>> {
    let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();

    let ollama_model = if config.model.is_empty() {
        config.ollama_model.clone()
    } else {
        config.model.clone()
    };
    providers.insert(
        ProviderKind::Ollama,
        Arc::new(OllamaProvider::new(&config.ollama_url, ollama_model)),
    );

    if !config.anthropic_api_key.is_empty() {
        providers.insert(
            ProviderKind::Anthropic,
            Arc::new(AnthropicProvider::new(
                &config.anthropic_api_key,
                config.model.clone(),
            )),
        );
    }
    if !config.openai_api_key.is_empty() {
        providers.insert(
            ProviderKind::OpenAi,
            Arc::new(OpenAiProvider::new(
                &config.openai_api_key,
                config.model.clone(),
            )),
        );
    }

    providers
}

/// Map an HTTP error status to the provider error taxonomy.
pub(crate) fn map_http_status(
    provider: ProviderKind,
    status: reqwest::StatusCode,
    body: &str,
) -> SibylError {
    let summary = body.chars().take(200).collect::<String>();
    if status.as_u16() == 429 {
        return SibylError::RateLimited(format!("{provider}: {summary}"));
    }
    if status.as_u16() == 413 {
        return SibylError::ContextOverflow(format!("{provider}: {summary}"));
    }
    if status.is_client_error() {
        let lower = body.to_lowercase();
        if lower.contains("context") || lower.contains("too long") || lower.contains("too large") {
            return SibylError::ContextOverflow(format!("{provider}: {summary}"));
        }
    }
    SibylError::ProviderUnavailable(format!("{provider}: HTTP {status}: {summary}"))
}

/// Map a transport failure to the provider error taxonomy.
pub(crate) fn map_transport_error(provider: ProviderKind, err: reqwest::Error) -> SibylError {
    SibylError::ProviderUnavailable(format!("{provider}: {err}"))
}
