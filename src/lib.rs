//! sibyl — voice research assistant core.
//!
//! A user speaks a query; the core decides whether it is simple (direct
//! LLM call) or complex (multi-step research). Complex queries run
//! through a declarative finite-state workflow engine that decomposes
//! the question, drives a web-search tool in controlled iterations, and
//! synthesizes a spoken answer. Every state transition, step latency,
//! tool call, and partial result streams to observers in real time.
//!
//! # Architecture
//!
//! - [`llm`] — multi-provider LLM adaptor with format normalization,
//!   reasoning-tag stripping, and text-tool-call rescue
//! - [`tools`] — tool trait, registry, dispatcher, and the web-search tool
//! - [`history`] — conversation log with group-aware trimming
//! - [`orchestrator`] — bounded tool-calling loop for the direct path,
//!   with hedging detection and the safety-net search
//! - [`workflow`] — the FSM interpreter, keyword router, templates, and
//!   observation protocol
//! - [`dispatch`] — the per-session entry point gluing it all together
//! - [`fast_path`] / [`input_filter`] — deterministic shortcuts and the
//!   STT quality gate in front of everything
//!
//! Speech capture, synthesis, transport, and persistence are external
//! collaborators; this crate consumes them only through the interfaces
//! above.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fast_path;
pub mod history;
pub mod input_filter;
pub mod llm;
pub mod orchestrator;
pub mod tools;
pub mod workflow;

pub use config::EngineConfig;
pub use dispatch::EntryDispatcher;
pub use error::{Result, SibylError};
pub use history::ConversationHistory;
pub use llm::{LlmClient, Message, ProviderKind, RequestOptions};
pub use orchestrator::{ChatCallbacks, ChatOutcome, Orchestrator, OrchestratorConfig};
pub use tools::{Tool, ToolDispatcher, ToolRegistry, WebSearchTool};
pub use workflow::{
    KeywordRouter, WorkflowEngine, WorkflowEngineConfig, WorkflowEvent, WorkflowObserver,
};
