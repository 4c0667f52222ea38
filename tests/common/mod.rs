//! Shared test doubles: a scripted provider, a stub search tool, and a
//! recording observer.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sibyl::error::{Result, SibylError};
use sibyl::history::ConversationHistory;
use sibyl::llm::message::{Message, ToolCallRequest};
use sibyl::llm::provider::{ChatProvider, ToolSchema};
use sibyl::llm::types::{ProviderKind, ProviderResponse, RequestOptions};
use sibyl::llm::LlmClient;
use sibyl::orchestrator::{Orchestrator, OrchestratorConfig};
use sibyl::tools::{Tool, ToolDispatcher, ToolRegistry};
use sibyl::workflow::{WorkflowEngine, WorkflowEngineConfig, WorkflowEvent, WorkflowObserver};

/// One scripted provider turn.
pub enum Scripted {
    /// Plain text reply.
    Text(String),
    /// A structured tool-call reply.
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// A provider failure.
    Fail(String),
}

impl Scripted {
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }

    pub fn search_call(query: &str) -> Self {
        Self::ToolCall {
            name: "web_search".to_string(),
            arguments: serde_json::json!({ "query": query }),
        }
    }
}

/// What the provider saw on one call.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub system: String,
    pub message_count: usize,
    pub tools_offered: usize,
    pub last_user_text: String,
}

/// Provider that pops scripted turns and records what it was asked.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Scripted>>,
    captured: Mutex<Vec<CapturedRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Mutex::new(responses),
            captured: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        _options: &RequestOptions,
    ) -> Result<ProviderResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let last_user_text = messages
            .iter()
            .rev()
            .find(|m| m.role == sibyl::llm::message::Role::User)
            .map(|m| m.content_text().to_string())
            .unwrap_or_default();
        self.captured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CapturedRequest {
                system: system.to_string(),
                message_count: messages.len(),
                tools_offered: tools.len(),
                last_user_text,
            });

        let next = {
            let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
            if responses.is_empty() {
                Scripted::Text(String::new())
            } else {
                responses.remove(0)
            }
        };
        match next {
            Scripted::Text(text) => Ok(ProviderResponse {
                text,
                prompt_tokens: 40,
                eval_tokens: 12,
                ..ProviderResponse::default()
            }),
            Scripted::ToolCall { name, arguments } => Ok(ProviderResponse {
                tool_calls: vec![ToolCallRequest::new(
                    format!("call_{}", self.call_count.load(Ordering::SeqCst)),
                    name,
                    &arguments,
                )],
                prompt_tokens: 40,
                eval_tokens: 8,
                ..ProviderResponse::default()
            }),
            Scripted::Fail(message) => Err(SibylError::ProviderUnavailable(message)),
        }
    }
}

/// Search tool that records queries and can fail or fire a cancel token
/// at a chosen call number (1-based).
pub struct StubSearchTool {
    queries: Mutex<Vec<String>>,
    fail_on_call: Option<usize>,
    cancel_on_call: Option<(usize, CancellationToken)>,
}

impl StubSearchTool {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            fail_on_call: None,
            cancel_on_call: None,
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    pub fn cancelling_on(call: usize, token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some((call, token)),
            ..Self::new()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Tool for StubSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Stub search"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let call_number = {
            let mut queries = self.queries.lock().unwrap_or_else(|e| e.into_inner());
            queries.push(query.clone());
            queries.len()
        };
        if let Some((n, token)) = &self.cancel_on_call {
            if call_number == *n {
                token.cancel();
            }
        }
        if self.fail_on_call == Some(call_number) {
            return Err(SibylError::ToolFailed("stub provider outage".into()));
        }
        Ok(format!("Results for \"{query}\": fact one, fact two."))
    }
}

/// Observer that records every event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.event_type()).collect()
    }
}

impl WorkflowObserver for RecordingObserver {
    fn emit(&self, event: WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Wire a scripted provider and search stub into an LLM client and
/// dispatcher pair.
pub fn make_stack(
    provider: Arc<ScriptedProvider>,
    search: Arc<StubSearchTool>,
) -> (Arc<LlmClient>, Arc<ToolDispatcher>) {
    let mut registry = ToolRegistry::new();
    registry.register(search);
    let registry = Arc::new(registry);

    let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();
    providers.insert(ProviderKind::Ollama, provider);
    let client = Arc::new(LlmClient::new(
        providers,
        ProviderKind::Ollama,
        Arc::clone(&registry),
    ));
    let dispatcher = Arc::new(ToolDispatcher::new(registry));
    (client, dispatcher)
}

/// An orchestrator over the scripted stack.
pub fn make_orchestrator(
    provider: Arc<ScriptedProvider>,
    search: Arc<StubSearchTool>,
    config: OrchestratorConfig,
) -> Orchestrator {
    let (client, dispatcher) = make_stack(provider, search);
    Orchestrator::new(client, dispatcher, ConversationHistory::new(20), config)
}

/// A workflow engine over the scripted stack with a short loop delay.
pub fn make_engine(
    provider: Arc<ScriptedProvider>,
    search: Arc<StubSearchTool>,
    loop_delay_secs: f64,
) -> WorkflowEngine {
    let (client, dispatcher) = make_stack(provider, search);
    let config = WorkflowEngineConfig {
        loop_delay_secs,
        ..WorkflowEngineConfig::default()
    };
    WorkflowEngine::with_builtin_templates(client, dispatcher, config)
}
