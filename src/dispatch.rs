//! Entry dispatcher: one utterance in, one final text out.
//!
//! Routes each utterance through the fast path, the keyword router, and
//! then either the workflow engine or the orchestrator. Provider and
//! workflow failures are converted to friendly user-visible messages at
//! this boundary; cancellation propagates as
//! [`SibylError::Cancelled`] so the embedding layer can distinguish it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Result, SibylError};
use crate::fast_path::try_fast_path;
use crate::history::ConversationHistory;
use crate::llm::LlmClient;
use crate::orchestrator::{ChatCallbacks, Orchestrator, OrchestratorConfig};
use crate::tools::{ToolDispatcher, ToolRegistry, WebSearchTool};
use crate::workflow::{KeywordRouter, WorkflowEngine, WorkflowEngineConfig, WorkflowObserver};

/// Utterances longer than this are refused outright.
pub const MAX_UTTERANCE_BYTES: usize = 8 * 1024;

const REFUSAL_EMPTY: &str = "I didn't catch that. Could you say it again?";
const REFUSAL_TOO_LONG: &str = "That was a lot at once. Could you ask a shorter question?";
const WORKFLOW_FALLBACK: &str =
    "I ran into a problem while researching that. Please try again.";
const PROVIDER_FALLBACK: &str =
    "I'm having trouble thinking right now. Please try again in a moment.";

/// Per-session entry point into the core.
pub struct EntryDispatcher {
    router: KeywordRouter,
    engine: Arc<WorkflowEngine>,
    orchestrator: Orchestrator,
    cancel: CancellationToken,
    client_utc_offset_minutes: Option<i32>,
}

impl EntryDispatcher {
    /// Create a dispatcher over a shared engine and a per-session
    /// orchestrator. The router compiles from the engine's templates.
    pub fn new(engine: Arc<WorkflowEngine>, orchestrator: Orchestrator) -> Self {
        let router = KeywordRouter::new(engine.templates());
        Self {
            router,
            engine,
            orchestrator,
            cancel: CancellationToken::new(),
            client_utc_offset_minutes: None,
        }
    }

    /// Assemble a full session from environment configuration: search
    /// tool, providers, engine, and orchestrator.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(WebSearchTool::new(
            config.tavily_api_key.clone(),
            config.brave_api_key.clone(),
        )));
        let registry = Arc::new(registry);

        let client = Arc::new(LlmClient::from_config(config, Arc::clone(&registry)));
        let dispatcher = Arc::new(ToolDispatcher::new(registry));
        let engine = Arc::new(WorkflowEngine::with_builtin_templates(
            Arc::clone(&client),
            Arc::clone(&dispatcher),
            WorkflowEngineConfig::from(config),
        ));
        let orchestrator = Orchestrator::new(
            client,
            dispatcher,
            ConversationHistory::new(config.max_history_groups),
            OrchestratorConfig::new().with_max_iterations(config.max_tool_iterations),
        );
        Self::new(engine, orchestrator)
    }

    /// Localize fast-path clock answers to the client's UTC offset.
    pub fn with_client_utc_offset(mut self, minutes: i32) -> Self {
        self.client_utc_offset_minutes = Some(minutes);
        self
    }

    /// Token observed by the running workflow; fires on [`cancel`](Self::cancel).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the in-flight dispatch at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The session orchestrator (history access).
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Mutable access to the session orchestrator.
    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    /// Process one utterance and return the final user-visible text.
    ///
    /// # Errors
    ///
    /// Only [`SibylError::Cancelled`] propagates; every other failure is
    /// converted into a friendly message.
    pub async fn dispatch(
        &mut self,
        utterance: &str,
        observer: &dyn WorkflowObserver,
        callbacks: &ChatCallbacks,
    ) -> Result<String> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Ok(REFUSAL_EMPTY.to_string());
        }
        if utterance.len() > MAX_UTTERANCE_BYTES {
            tracing::warn!(bytes = utterance.len(), "utterance over size limit");
            return Ok(REFUSAL_TOO_LONG.to_string());
        }

        // A cancel ends one dispatch, not the session.
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        if let Some(answer) = try_fast_path(utterance, self.client_utc_offset_minutes) {
            self.orchestrator.record_exchange(utterance, &answer);
            return Ok(answer);
        }

        let routed = self.router.route(utterance).map(str::to_string);
        match routed {
            Some(workflow_id) => {
                match self
                    .engine
                    .run(&workflow_id, utterance, observer, &self.cancel)
                    .await
                {
                    Ok(text) => {
                        // Only the final pair enters history; intermediate
                        // workflow reasoning never does.
                        self.orchestrator.record_exchange(utterance, &text);
                        Ok(text)
                    }
                    Err(SibylError::Cancelled) => Err(SibylError::Cancelled),
                    Err(e) => {
                        tracing::error!(workflow = %workflow_id, error = %e, "workflow error");
                        Ok(WORKFLOW_FALLBACK.to_string())
                    }
                }
            }
            None => match self.orchestrator.chat(utterance, callbacks).await {
                Ok(outcome) => Ok(outcome.text),
                Err(SibylError::Cancelled) => Err(SibylError::Cancelled),
                Err(e) if e.is_provider_error() => {
                    tracing::warn!(error = %e, "provider error on direct path");
                    Ok(PROVIDER_FALLBACK.to_string())
                }
                Err(e) => {
                    tracing::error!(error = %e, "unexpected direct-path error");
                    Ok(WORKFLOW_FALLBACK.to_string())
                }
            },
        }
    }
}
