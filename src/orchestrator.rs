//! Unified orchestrator — the direct (non-workflow) chat path.
//!
//! Runs one user utterance through a bounded tool-calling loop with
//! several robustness measures:
//!
//! - on the final iteration tool schemas are withheld, forcing a text
//!   reply instead of an endless tool loop;
//! - reasoning tags are stripped (guard pass; the adaptor already strips);
//! - tool calls emitted as plain text are rescued by the adaptor;
//! - a hedging reply after a search triggers one directive retry;
//! - a hedging reply without any search triggers the one-shot safety-net
//!   search.
//!
//! Callers wire I/O via callbacks; this module never touches transport.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::history::ConversationHistory;
use crate::llm::message::{AssistantToolCall, Message, ToolCallRequest};
use crate::llm::provider::ToolSchema;
use crate::llm::thinking::strip_reasoning;
use crate::llm::types::RequestOptions;
use crate::llm::LlmClient;
use crate::tools::ToolDispatcher;

/// Default maximum tool-calling iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Returned when the loop exhausts without producing any text.
const EXHAUSTED_REPLY: &str = "I wasn't able to complete that request.";

/// Hedging phrases, matched as lowercase substrings after whitespace
/// normalization. Kept small; override via
/// [`OrchestratorConfig::with_hedging_phrases`].
pub const DEFAULT_HEDGING_PHRASES: [&str; 12] = [
    "don't have access",
    "don't have real-time",
    "don't have current",
    "do not have access",
    "can't browse",
    "cannot browse",
    "can't search",
    "cannot search",
    "unable to browse",
    "my knowledge cutoff",
    "my training data",
    "as an ai",
];

/// One-shot prompt used to distill a search query from a user utterance.
const SEARCH_CLASSIFIER_PROMPT: &str = "Extract a clean web search query from this user message. \
Strip conversational filler and keep only the factual question.\n\n\
Reply with ONLY the search query, nothing else.\n\n\
Examples:\n\
User: 'What is the weather today in Austin?' -> weather in Austin today\n\
User: 'Yes, look that up, what's the S&P 500?' -> S&P 500 current price\n\
User: 'Can you tell me who won the Super Bowl?' -> who won the Super Bowl";

/// Directive injected when the model hedges despite having search results.
const POST_TOOL_DIRECTIVE: &str = "You already searched the web and received results above. \
Use those results to answer my question directly. \
Do not say you cannot access real-time data - you just did.";

/// Build the default system prompt with the current date baked in.
pub fn default_system_prompt() -> String {
    let today = chrono::Local::now().format("%B %d, %Y");
    format!(
        "You are a helpful voice assistant. Today is {today}. \
         Keep responses concise, one to three sentences. \
         Speak naturally as in a conversation. \
         When searching the web, always include the current year in queries \
         to get fresh results."
    )
}

/// Status callback: phase is `"thinking"`, `"searching"`, or `"tool:<name>"`.
pub type StatusFn = Box<dyn Fn(&str) + Send + Sync>;

/// Tool-call callback, fired before dispatch.
pub type ToolCallFn = Box<dyn Fn(&str, &Value) + Send + Sync>;

/// Best-effort, fire-and-forget observation callbacks.
#[derive(Default)]
pub struct ChatCallbacks {
    /// Called on phase changes.
    pub on_status: Option<StatusFn>,
    /// Called before each tool dispatch with name and arguments.
    pub on_tool_call: Option<ToolCallFn>,
}

impl ChatCallbacks {
    /// Create empty callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status callback.
    pub fn with_on_status(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    /// Set the tool-call callback.
    pub fn with_on_tool_call(mut self, f: impl Fn(&str, &Value) + Send + Sync + 'static) -> Self {
        self.on_tool_call = Some(Box::new(f));
        self
    }

    fn status(&self, phase: &str) {
        if let Some(f) = &self.on_status {
            f(phase);
        }
    }

    fn tool_call(&self, name: &str, args: &Value) {
        if let Some(f) = &self.on_tool_call {
            f(name, args);
        }
    }
}

/// Configuration for the orchestrator loop.
pub struct OrchestratorConfig {
    /// Maximum provider round-trips per utterance.
    pub max_iterations: u32,
    /// System prompt override. `None` uses [`default_system_prompt`].
    pub system_prompt: Option<String>,
    /// Whether the hedging safety net is armed.
    pub enable_hedging_safety_net: bool,
    /// Hedging vocabulary (lowercase substrings).
    pub hedging_phrases: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: None,
            enable_hedging_safety_net: true,
            hedging_phrases: DEFAULT_HEDGING_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum tool iterations.
    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Arm or disarm the hedging safety net.
    pub fn with_hedging_safety_net(mut self, enabled: bool) -> Self {
        self.enable_hedging_safety_net = enabled;
        self
    }

    /// Replace the hedging vocabulary.
    pub fn with_hedging_phrases(mut self, phrases: Vec<String>) -> Self {
        self.hedging_phrases = phrases;
        self
    }
}

/// Outcome of one orchestrated exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// The assistant's final text.
    pub text: String,
    /// True when a mid-loop provider failure forced a partial answer.
    pub degraded: bool,
}

/// The direct-path chat loop.
pub struct Orchestrator {
    client: Arc<LlmClient>,
    dispatcher: Arc<ToolDispatcher>,
    history: ConversationHistory,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(
        client: Arc<LlmClient>,
        dispatcher: Arc<ToolDispatcher>,
        history: ConversationHistory,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            client,
            dispatcher,
            history,
            config,
        }
    }

    /// The conversation history.
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Reset conversation history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Record a user/assistant pair produced outside this loop (the
    /// workflow engine's final answer) and trim to budget.
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.history.append(Message::user(user));
        self.history.append(Message::assistant(assistant));
        self.history.trim();
    }

    /// Process one utterance through the tool-calling loop.
    ///
    /// # Errors
    ///
    /// A provider failure on the first iteration propagates. Later
    /// failures degrade to the partial tentative reply instead.
    pub async fn chat(&mut self, utterance: &str, callbacks: &ChatCallbacks) -> Result<ChatOutcome> {
        self.history.append(Message::user(utterance));
        self.history.trim();

        let system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(default_system_prompt);
        let tools = self.dispatcher.list_schemas();
        callbacks.status("thinking");

        let mut reply: Option<String> = None;
        let mut degraded = false;
        let mut search_performed = false;
        let mut last_text = String::new();

        let max_iterations = self.config.max_iterations.max(1);
        for iteration in 0..max_iterations {
            // On the last iteration, omit tools to force a text response.
            let is_last = iteration + 1 == max_iterations;
            let offered: &[ToolSchema] = if is_last { &[] } else { &tools };

            let result = match self
                .client
                .generate(&system, self.history.messages(), offered, &RequestOptions::new())
                .await
            {
                Ok(result) => result,
                Err(e) if iteration == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, iteration, "provider failed mid-loop, degrading");
                    degraded = true;
                    break;
                }
            };

            // Guard pass; the adaptor already stripped and this is idempotent.
            let text = strip_reasoning(&result.text).text;

            if result.tool_calls.is_empty() {
                reply = Some(text);
                break;
            }

            last_text = text.clone();
            let assistant_calls: Vec<AssistantToolCall> = result
                .tool_calls
                .iter()
                .map(|c| AssistantToolCall {
                    call_id: c.call_id.clone(),
                    name: c.name.clone(),
                    arguments: c.arguments_json.clone(),
                })
                .collect();
            self.history.append(Message::assistant_with_tool_calls(
                if text.is_empty() { None } else { Some(text) },
                assistant_calls,
            ));

            for call in &result.tool_calls {
                callbacks.tool_call(&call.name, &call.arguments());
                if call.name == "web_search" {
                    search_performed = true;
                    callbacks.status("searching");
                } else {
                    callbacks.status(&format!("tool:{}", call.name));
                }

                match self.dispatcher.dispatch(call).await {
                    Ok(result_text) => {
                        self.history
                            .append(Message::tool_result(&call.call_id, result_text));
                    }
                    Err(e) => {
                        // Local failure; the LLM gets to react to it.
                        tracing::warn!(tool = %call.name, error = %e, "tool dispatch failed");
                        self.history.append(Message::tool_error(
                            &call.call_id,
                            format!("Error executing '{}': {}", call.name, e.message()),
                        ));
                    }
                }
            }
            callbacks.status("thinking");
        }

        let mut reply = match reply {
            Some(text) if !text.is_empty() => text,
            _ if !last_text.is_empty() => last_text,
            _ => EXHAUSTED_REPLY.to_string(),
        };

        // Model got search results but still refused: retry with a directive.
        if search_performed && self.reply_is_hedging(&reply) {
            tracing::info!("hedged after search results, retrying with directive");
            if let Some(retry) = self.post_tool_hedging_retry(&system, callbacks).await {
                reply = retry;
            }
        }

        // Model never used tools and hedged: one-shot safety-net search.
        if !search_performed
            && self.config.enable_hedging_safety_net
            && !tools.is_empty()
            && self.reply_is_hedging(&reply)
        {
            tracing::info!("hedged without tools, running safety-net search");
            if let Some(better) = self.safety_net_search(utterance, &system, callbacks).await {
                reply = better;
            }
        }

        if !reply.is_empty() {
            self.history.append(Message::assistant(&reply));
        }
        self.history.trim();

        Ok(ChatOutcome {
            text: reply,
            degraded,
        })
    }

    /// Lowercase, whitespace-collapsed substring match against the
    /// hedging vocabulary.
    fn reply_is_hedging(&self, reply: &str) -> bool {
        let normalized = reply
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        self.config
            .hedging_phrases
            .iter()
            .any(|phrase| normalized.contains(phrase.as_str()))
    }

    /// Distill a search query from the utterance via a one-shot LLM call.
    /// Falls back to the raw utterance.
    async fn extract_search_query(&self, utterance: &str) -> String {
        let result = self
            .client
            .generate(
                SEARCH_CLASSIFIER_PROMPT,
                &[Message::user(utterance)],
                &[],
                &RequestOptions::new(),
            )
            .await;
        match result {
            Ok(r) => {
                let query = r.text.trim().to_string();
                if query.len() > 5 {
                    tracing::info!(query = %query, "extracted search query");
                    query
                } else {
                    utterance.to_string()
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "query extraction failed");
                utterance.to_string()
            }
        }
    }

    /// When the model hedges without calling tools: search, inject the
    /// results, and regenerate once. Fires at most once per exchange.
    async fn safety_net_search(
        &self,
        utterance: &str,
        system: &str,
        callbacks: &ChatCallbacks,
    ) -> Option<String> {
        if !self.dispatcher.has_tool("web_search") {
            return None;
        }

        let query = self.extract_search_query(utterance).await;
        callbacks.status("searching");

        let call = ToolCallRequest::new(
            format!("safety_{}", Uuid::new_v4().simple()),
            "web_search",
            &serde_json::json!({ "query": query }),
        );
        let context = match self.dispatcher.dispatch(&call).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(error = %e, "safety-net search failed");
                return None;
            }
        };

        // Ephemeral injection: the directive never enters persistent history.
        let mut messages = self.history.messages().to_vec();
        messages.push(Message::assistant(format!(
            "I searched the web and found:\n\n{context}\nI'll use these results to answer."
        )));

        callbacks.status("thinking");
        let result = self
            .client
            .generate(system, &messages, &[], &RequestOptions::new())
            .await
            .ok()?;
        if result.text.is_empty() {
            None
        } else {
            Some(result.text)
        }
    }

    /// When the model hedges despite having search results in context:
    /// regenerate once with an explicit directive.
    async fn post_tool_hedging_retry(
        &self,
        system: &str,
        callbacks: &ChatCallbacks,
    ) -> Option<String> {
        callbacks.status("thinking");

        let mut messages = self.history.messages().to_vec();
        messages.push(Message::user(POST_TOOL_DIRECTIVE));

        let result = self
            .client
            .generate(system, &messages, &[], &RequestOptions::new())
            .await;
        match result {
            Ok(r) if !r.text.is_empty() => Some(r.text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "post-tool hedging retry failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    fn make_orchestrator(config: OrchestratorConfig) -> Orchestrator {
        let registry = Arc::new(ToolRegistry::new());
        let client = Arc::new(LlmClient::new(
            std::collections::HashMap::new(),
            crate::llm::types::ProviderKind::Ollama,
            Arc::clone(&registry),
        ));
        let dispatcher = Arc::new(ToolDispatcher::new(registry));
        Orchestrator::new(client, dispatcher, ConversationHistory::new(20), config)
    }

    #[test]
    fn hedging_detection_normalizes_whitespace_and_case() {
        let orchestrator = make_orchestrator(OrchestratorConfig::new());
        assert!(orchestrator.reply_is_hedging("I DON'T   have real-time information."));
        assert!(orchestrator.reply_is_hedging("Sorry, I cannot browse the internet."));
        assert!(!orchestrator.reply_is_hedging("The S&P 500 closed at 6,120 today."));
    }

    #[test]
    fn hedging_vocabulary_is_configurable() {
        let config =
            OrchestratorConfig::new().with_hedging_phrases(vec!["special marker".to_string()]);
        let orchestrator = make_orchestrator(config);
        assert!(orchestrator.reply_is_hedging("this has a SPECIAL marker inside"));
        assert!(!orchestrator.reply_is_hedging("I don't have real-time data"));
    }

    #[test]
    fn config_defaults() {
        let config = OrchestratorConfig::new();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.enable_hedging_safety_net);
        assert_eq!(config.hedging_phrases.len(), DEFAULT_HEDGING_PHRASES.len());
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn default_system_prompt_mentions_today() {
        let prompt = default_system_prompt();
        assert!(prompt.contains("Today is"));
        assert!(prompt.contains("voice assistant"));
    }

    #[test]
    fn record_exchange_appends_pair() {
        let mut orchestrator = make_orchestrator(OrchestratorConfig::new());
        orchestrator.record_exchange("question", "answer");
        let messages = orchestrator.history().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("question"));
        assert_eq!(messages[1], Message::assistant("answer"));
    }

    #[test]
    fn callbacks_are_optional() {
        let callbacks = ChatCallbacks::new();
        callbacks.status("thinking");
        callbacks.tool_call("web_search", &serde_json::json!({}));
    }
}
