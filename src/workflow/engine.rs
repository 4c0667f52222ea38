//! The workflow engine: a hybrid FSM + LLM interpreter.
//!
//! For complex queries the FSM drives the steps and the LLM reasons at
//! each step. Every intra-workflow LLM call is a focused one-shot prompt;
//! conversation history is never passed in, and prior step outputs travel
//! exclusively through state-map substitution.
//!
//! Cancellation is cooperative: the interpreter observes the token at
//! every suspension point (LLM call, tool dispatch, inter-iteration
//! sleep) and unwinds with a terminal `workflow_exit(cancelled)` event.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, SibylError};
use crate::llm::message::{Message, ToolCallRequest};
use crate::llm::provider::ToolSchema;
use crate::llm::types::RequestOptions;
use crate::llm::LlmClient;
use crate::tools::ToolDispatcher;

use super::def::{builtin_templates, StepKind, WorkflowDef, WorkflowStep};
use super::def::{LLM_TIMEOUT_SECS, SEARCH_TIMEOUT_SECS};
use super::events::{ExitReason, StateStatus, WorkflowEvent, WorkflowObserver};
use super::render::{
    extract_json, parse_query_list, render_template, shorten, RenderContext, StateMap, StateValue,
};

/// System prompt for every intra-workflow LLM call.
const WORKFLOW_SYSTEM_PROMPT: &str =
    "You are a research assistant. Follow instructions precisely.";

/// Returned when a workflow completes without a synthesized answer.
const EMPTY_ANSWER_FALLBACK: &str =
    "I completed the research but couldn't form a response.";

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkflowEngineConfig {
    /// Sleep between loop iterations, in seconds.
    pub loop_delay_secs: f64,
    /// Per-snippet character cap for prompt substitution.
    pub snippet_char_cap: usize,
    /// Aggregate character cap for prompt substitution.
    pub aggregate_char_cap: usize,
}

impl Default for WorkflowEngineConfig {
    fn default() -> Self {
        Self {
            loop_delay_secs: crate::config::DEFAULT_LOOP_DELAY_SECS,
            snippet_char_cap: crate::config::DEFAULT_SNIPPET_CHAR_CAP,
            aggregate_char_cap: crate::config::DEFAULT_AGGREGATE_CHAR_CAP,
        }
    }
}

impl From<&EngineConfig> for WorkflowEngineConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            loop_delay_secs: config.loop_delay_secs,
            snippet_char_cap: config.snippet_char_cap,
            aggregate_char_cap: config.aggregate_char_cap,
        }
    }
}

/// Ephemeral per-run state, exclusively owned by the interpreter.
struct Instance<'a> {
    user_query: &'a str,
    instance_id: String,
    state: StateMap,
    final_answer: String,
}

/// Interprets workflow definitions against user utterances.
pub struct WorkflowEngine {
    client: Arc<LlmClient>,
    dispatcher: Arc<ToolDispatcher>,
    templates: Vec<WorkflowDef>,
    config: WorkflowEngineConfig,
}

impl WorkflowEngine {
    /// Create an engine over the given templates.
    pub fn new(
        client: Arc<LlmClient>,
        dispatcher: Arc<ToolDispatcher>,
        templates: Vec<WorkflowDef>,
        config: WorkflowEngineConfig,
    ) -> Self {
        Self {
            client,
            dispatcher,
            templates,
            config,
        }
    }

    /// Create an engine with the built-in research templates.
    pub fn with_builtin_templates(
        client: Arc<LlmClient>,
        dispatcher: Arc<ToolDispatcher>,
        config: WorkflowEngineConfig,
    ) -> Self {
        Self::new(client, dispatcher, builtin_templates(), config)
    }

    /// The loaded workflow definitions.
    pub fn templates(&self) -> &[WorkflowDef] {
        &self.templates
    }

    /// Look up a definition by id.
    pub fn template(&self, id: &str) -> Option<&WorkflowDef> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Execute a workflow against an utterance.
    ///
    /// Events are emitted to `observer` in strict execution order; the
    /// final event is always `workflow_exit`.
    ///
    /// # Errors
    ///
    /// - [`SibylError::Cancelled`] when the token fires (no text is produced)
    /// - provider/template/loop errors after a `workflow_exit(error)` event
    pub async fn run(
        &self,
        workflow_id: &str,
        utterance: &str,
        observer: &dyn WorkflowObserver,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let def = self.template(workflow_id).ok_or_else(|| {
            SibylError::Config(format!("unknown workflow '{workflow_id}'"))
        })?;

        let instance_id = Uuid::new_v4().to_string();
        tracing::info!(
            workflow = %def.name,
            instance = %instance_id,
            utterance = %shorten(utterance, 60),
            "starting workflow"
        );

        observer.emit(WorkflowEvent::WorkflowStart {
            workflow_id: def.id.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            states: def.state_infos(),
        });

        let mut instance = Instance {
            user_query: utterance,
            instance_id,
            state: StateMap::new(),
            final_answer: String::new(),
        };

        let total_steps = def.steps.len() as u32;
        let mut current = def.steps.first();
        let mut failure: Option<SibylError> = None;

        while let Some(step) = current {
            if cancel.is_cancelled() {
                failure = Some(SibylError::Cancelled);
                break;
            }

            let step_index = def
                .steps
                .iter()
                .position(|s| s.id == step.id)
                .map(|i| i as u32 + 1)
                .unwrap_or(0);
            observer.emit(WorkflowEvent::WorkflowState {
                state_id: step.id.clone(),
                status: StateStatus::Active,
                step_index: Some(step_index),
                total_steps: Some(total_steps),
                step_name: Some(step.name.clone()),
                detail: None,
            });

            match self
                .execute_step(step, &mut instance, observer, cancel)
                .await
            {
                Ok(()) => {
                    observer.emit(WorkflowEvent::WorkflowState {
                        state_id: step.id.clone(),
                        status: StateStatus::Visited,
                        step_index: None,
                        total_steps: None,
                        step_name: None,
                        detail: None,
                    });
                }
                Err(SibylError::Cancelled) => {
                    failure = Some(SibylError::Cancelled);
                    break;
                }
                Err(e) => {
                    observer.emit(WorkflowEvent::WorkflowState {
                        state_id: step.id.clone(),
                        status: StateStatus::Error,
                        step_index: None,
                        total_steps: None,
                        step_name: None,
                        detail: Some(e.to_string()),
                    });
                    failure = Some(e);
                    break;
                }
            }

            current = step.next.as_deref().and_then(|id| def.step(id));
        }

        match failure {
            None => {
                observer.emit(WorkflowEvent::WorkflowExit {
                    reason: ExitReason::Complete,
                    error: None,
                });
                if instance.final_answer.is_empty() {
                    Ok(EMPTY_ANSWER_FALLBACK.to_string())
                } else {
                    Ok(instance.final_answer)
                }
            }
            Some(SibylError::Cancelled) => {
                tracing::info!(instance = %instance.instance_id, "workflow cancelled");
                observer.emit(WorkflowEvent::WorkflowExit {
                    reason: ExitReason::Cancelled,
                    error: None,
                });
                Err(SibylError::Cancelled)
            }
            Some(e) => {
                tracing::error!(instance = %instance.instance_id, error = %e, "workflow failed");
                observer.emit(WorkflowEvent::WorkflowExit {
                    reason: ExitReason::Error,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    fn render_ctx<'b>(&self, instance: &'b Instance<'_>, truncate: bool) -> RenderContext<'b> {
        RenderContext {
            user_query: instance.user_query,
            state: &instance.state,
            snippet_cap: self.config.snippet_char_cap,
            aggregate_cap: self.config.aggregate_char_cap,
            truncate_state_values: truncate,
        }
    }

    async fn execute_step(
        &self,
        step: &WorkflowStep,
        instance: &mut Instance<'_>,
        observer: &dyn WorkflowObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !step.narration.is_empty() {
            let text = {
                let ctx = self.render_ctx(instance, false);
                render_template(&step.narration, &ctx)?
            };
            observer.emit(WorkflowEvent::WorkflowNarration { text });
        }

        match &step.kind {
            StepKind::Llm {
                prompt_template,
                tool,
                output_key,
            } => {
                self.execute_llm_step(
                    step,
                    prompt_template,
                    tool.as_deref(),
                    output_key,
                    false,
                    instance,
                    observer,
                    cancel,
                )
                .await
            }
            StepKind::Synthesize { prompt_template } => {
                self.execute_llm_step(
                    step,
                    prompt_template,
                    None,
                    "final_answer",
                    true,
                    instance,
                    observer,
                    cancel,
                )
                .await
            }
            StepKind::Loop {
                source_key,
                tool,
                output_key,
            } => {
                self.execute_loop_step(step, source_key, tool, output_key, instance, observer, cancel)
                    .await
            }
            StepKind::Direct {
                tool,
                query_index,
                output_key,
            } => {
                self.execute_direct_step(tool, *query_index, output_key, instance, observer, cancel)
                    .await
            }
        }
    }

    /// One focused LLM call; tool-bound steps feed the tool with either
    /// the model's structured call or its text output as the query.
    #[allow(clippy::too_many_arguments)]
    async fn execute_llm_step(
        &self,
        step: &WorkflowStep,
        template: &str,
        tool: Option<&str>,
        output_key: &str,
        is_synthesize: bool,
        instance: &mut Instance<'_>,
        observer: &dyn WorkflowObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let prompt = {
            let ctx = self.render_ctx(instance, true);
            render_template(template, &ctx)?
        };
        tracing::info!(step = %step.id, prompt_chars = prompt.len(), "llm step");

        let model = self.client.model_label(None);
        observer.emit(WorkflowEvent::WorkflowActivity {
            activity: format!("Querying {model}..."),
            timeout_secs: LLM_TIMEOUT_SECS,
        });

        // Thinking disabled: workflow prompts are focused tasks where
        // extended reasoning wastes tokens and wall-clock.
        let options = RequestOptions::new().with_disable_thinking(true);
        let schemas: Vec<ToolSchema> = tool
            .and_then(|name| {
                self.dispatcher
                    .registry()
                    .get(name)
                    .map(|t| ToolSchema::new(t.name(), t.description(), t.schema()))
            })
            .into_iter()
            .collect();

        let messages = [Message::user(prompt)];
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(SibylError::Cancelled),
            r = self.client.generate(WORKFLOW_SYSTEM_PROMPT, &messages, &schemas, &options) => r?,
        };

        observer.emit(WorkflowEvent::debug_from_diagnostics(
            &step.id,
            &result.diagnostics,
        ));

        let text = result.text.trim().to_string();
        self.apply_step_semantics(&step.id, &text, instance);

        if let Some(tool_name) = tool {
            // Prefer the structured call; otherwise the text is the query.
            let call = result
                .tool_calls
                .iter()
                .find(|c| c.name == tool_name)
                .cloned()
                .unwrap_or_else(|| {
                    let query = text.trim_matches(|c| c == '"' || c == '\'').trim().to_string();
                    ToolCallRequest::new(
                        format!("wf_{}", Uuid::new_v4().simple()),
                        tool_name,
                        &serde_json::json!({ "query": query }),
                    )
                });

            let display = call
                .arguments()
                .get("query")
                .and_then(Value::as_str)
                .map(|q| shorten(q, 60))
                .unwrap_or_default();
            observer.emit(WorkflowEvent::WorkflowActivity {
                activity: format!("Searching: {display}"),
                timeout_secs: SEARCH_TIMEOUT_SECS,
            });

            let output = tokio::select! {
                _ = cancel.cancelled() => return Err(SibylError::Cancelled),
                r = self.dispatcher.dispatch(&call) => r?,
            };
            tracing::info!(step = %step.id, chars = output.len(), "step search results");
            instance
                .state
                .insert(output_key.to_string(), StateValue::Text(output));
        } else {
            instance
                .state
                .insert(output_key.to_string(), StateValue::Text(text.clone()));
        }

        if is_synthesize {
            tracing::info!(
                chars = text.len(),
                preview = %shorten(&text, 200),
                "final answer"
            );
            instance.final_answer = text;
        }
        Ok(())
    }

    /// Step-specific output handling, keyed by stable step id.
    fn apply_step_semantics(&self, step_id: &str, text: &str, instance: &mut Instance<'_>) {
        match step_id {
            "decompose" => {
                let queries = parse_query_list(text, 5);
                tracing::info!(count = queries.len(), queries = ?queries, "decomposed");
                instance
                    .state
                    .insert("search_queries".into(), StateValue::List(queries));
            }
            "evaluate_gaps" => {
                let queries = parse_query_list(text, 3);
                instance
                    .state
                    .insert("search_queries".into(), StateValue::List(queries));
            }
            "extract_claim" => {
                let (claim, queries) = match extract_json(text) {
                    Some(Value::Object(map)) => {
                        let claim = map
                            .get("claim")
                            .and_then(Value::as_str)
                            .unwrap_or(text)
                            .to_string();
                        let queries: Vec<String> = ["support_query", "counter_query"]
                            .iter()
                            .filter_map(|key| map.get(*key).and_then(Value::as_str))
                            .map(str::to_string)
                            .filter(|q| !q.is_empty())
                            .collect();
                        (claim, queries)
                    }
                    _ => (text.to_string(), Vec::new()),
                };
                let queries = if queries.is_empty() {
                    vec![instance.user_query.to_string()]
                } else {
                    queries
                };
                instance.state.insert("claim".into(), StateValue::Text(claim));
                instance
                    .state
                    .insert("search_queries".into(), StateValue::List(queries));
            }
            _ => {}
        }
    }

    /// Dispatch the bound tool once per source-list item, sequentially,
    /// with a rate-limit delay between iterations. One failed item does
    /// not fail the workflow.
    async fn execute_loop_step(
        &self,
        step: &WorkflowStep,
        source_key: &str,
        tool: &str,
        output_key: &str,
        instance: &mut Instance<'_>,
        observer: &dyn WorkflowObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let queries = match instance.state.get(source_key) {
            Some(StateValue::List(items)) => items.clone(),
            _ => {
                return Err(SibylError::LoopSourceMissing(format!(
                    "loop step '{}' expects a list under '{source_key}'",
                    step.id
                )))
            }
        };

        let children: Vec<String> = queries.iter().map(|q| shorten(q, 60)).collect();
        observer.emit(WorkflowEvent::WorkflowLoopUpdate {
            state_id: step.id.clone(),
            children: children.clone(),
            active_index: -1,
        });

        let delay = Duration::from_secs_f64(self.config.loop_delay_secs.max(0.0));
        let mut results = Vec::with_capacity(queries.len());

        for (i, query) in queries.iter().enumerate() {
            // Rate-limit delay between searches, not before the first.
            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SibylError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(SibylError::Cancelled);
            }

            observer.emit(WorkflowEvent::WorkflowLoopUpdate {
                state_id: step.id.clone(),
                children: children.clone(),
                active_index: i as i64,
            });
            observer.emit(WorkflowEvent::WorkflowActivity {
                activity: format!(
                    "Searching {}/{}: {}",
                    i + 1,
                    queries.len(),
                    shorten(query, 50)
                ),
                timeout_secs: SEARCH_TIMEOUT_SECS,
            });

            let call = ToolCallRequest::new(
                format!("wf_{}", Uuid::new_v4().simple()),
                tool,
                &serde_json::json!({ "query": query }),
            );
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(SibylError::Cancelled),
                r = self.dispatcher.dispatch(&call) => r,
            };
            match outcome {
                Ok(result) => results.push(format!("[Query: {query}]\n{result}")),
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "loop search failed");
                    results.push(format!("[Query: {query}]\nSearch failed: {}", e.message()));
                }
            }
        }

        instance
            .state
            .insert(output_key.to_string(), StateValue::List(results));
        Ok(())
    }

    /// Dispatch the bound tool once with a query picked from the query
    /// list. Failures are recorded into state, never fatal.
    async fn execute_direct_step(
        &self,
        tool: &str,
        query_index: usize,
        output_key: &str,
        instance: &mut Instance<'_>,
        observer: &dyn WorkflowObserver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let query = instance
            .state
            .get("search_queries")
            .and_then(StateValue::as_list)
            .and_then(|list| list.get(query_index))
            .cloned()
            .unwrap_or_else(|| instance.user_query.to_string());

        observer.emit(WorkflowEvent::WorkflowActivity {
            activity: format!("Executing {tool}..."),
            timeout_secs: SEARCH_TIMEOUT_SECS,
        });

        let call = ToolCallRequest::new(
            format!("wf_{}", Uuid::new_v4().simple()),
            tool,
            &serde_json::json!({ "query": query }),
        );
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(SibylError::Cancelled),
            r = self.dispatcher.dispatch(&call) => r,
        };
        let value = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %tool, error = %e, "direct step failed");
                format!("Search failed: {}", e.message())
            }
        };
        instance
            .state
            .insert(output_key.to_string(), StateValue::Text(value));
        Ok(())
    }
}
