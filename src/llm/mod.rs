//! LLM adaptor — multi-provider chat completion behind one interface.
//!
//! # Submodules
//!
//! - [`message`] — conversation message types and the normalized tool-call shape
//! - [`types`] — provider kinds, request options, results, diagnostics
//! - [`provider`] — the [`ChatProvider`](provider::ChatProvider) adapter trait
//! - [`providers`] — Anthropic, OpenAI, and Ollama backends
//! - [`thinking`] — reasoning-tag stripping pipeline
//! - [`text_calls`] — text-tool-call fallback parser
//! - [`client`] — the [`LlmClient`](client::LlmClient) facade
//!
//! Different providers return tool calls in different shapes; everything
//! here converges on [`ToolCallRequest`](message::ToolCallRequest).
//! Reasoning content wrapped in recognized tags is excised before any
//! text leaves this module.

pub mod client;
pub mod message;
pub mod provider;
pub mod providers;
pub mod text_calls;
pub mod thinking;
pub mod types;

pub use client::LlmClient;
pub use message::{AssistantToolCall, Message, MessageContent, Role, ToolCallRequest};
pub use provider::{ChatProvider, ToolSchema};
pub use providers::{AnthropicProvider, OllamaProvider, OpenAiProvider};
pub use thinking::strip_reasoning;
pub use types::{GenerateResult, LlmDiagnostics, ProviderKind, ProviderResponse, RequestOptions};
