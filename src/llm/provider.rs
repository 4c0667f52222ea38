//! Provider adapter trait for chat-completion backends.
//!
//! All backends normalize to [`ProviderResponse`]: assistant text plus
//! tool-call requests in the internal shape, with token counts when the
//! provider reports them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::message::Message;
use super::types::{ProviderKind, ProviderResponse, RequestOptions};

/// A tool definition offered to the LLM for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name (e.g. `"web_search"`).
    pub name: String,
    /// Human-readable description of the tool's purpose.
    pub description: String,
    /// JSON Schema describing the tool's arguments.
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Create a new tool schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Trait for chat-completion provider backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// The model this provider instance targets.
    fn model(&self) -> &str;

    /// Whether this backend supports structured tool calling.
    ///
    /// Capability discovery is static per provider.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Run one chat completion.
    ///
    /// `messages` is the internal conversation shape; each backend
    /// materializes its own wire format. The system prompt rides
    /// separately because backends place it differently.
    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &RequestOptions,
    ) -> Result<ProviderResponse>;
}
