//! Observation protocol: structured events describing workflow execution.
//!
//! Events are emitted in a strict total order matching execution. The
//! observer callback is invoked synchronously from the interpreter, so a
//! slow observer backpressures the workflow directly; nothing is buffered
//! and no events are dropped.
//!
//! Event-type sequence per instance:
//!
//! ```text
//! workflow_start
//!   (workflow_narration | workflow_state | workflow_activity
//!    | workflow_debug | workflow_loop_update)*
//! workflow_exit
//! ```

use serde::{Deserialize, Serialize};

use crate::llm::types::LlmDiagnostics;

/// One state entry in the `workflow_start` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInfo {
    /// Stable state identifier.
    pub state_id: String,
    /// Human-readable step name.
    pub name: String,
    /// Step type tag: "llm" | "loop" | "direct" | "synthesize".
    pub step_type: String,
    /// Whether the step has a tool binding.
    pub has_tool: bool,
    /// The bound tool name, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// The step's narration string, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    /// The next state id, if not terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
}

/// Lifecycle status of a workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStatus {
    /// The step is currently executing.
    Active,
    /// The step completed successfully.
    Visited,
    /// The step failed.
    Error,
}

/// Why a workflow terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    /// Terminal step returned.
    Complete,
    /// Cancellation was observed.
    Cancelled,
    /// A step failed.
    Error,
}

/// A structured observation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Emitted once before the first step.
    WorkflowStart {
        /// Workflow template id.
        workflow_id: String,
        /// Display name.
        name: String,
        /// Description.
        description: String,
        /// Serialized state list for the UI state diagram.
        states: Vec<StateInfo>,
    },
    /// Narration text for the step about to run.
    WorkflowNarration {
        /// Rendered narration.
        text: String,
    },
    /// A step became active, completed, or failed.
    WorkflowState {
        /// Stable state identifier.
        state_id: String,
        /// New status.
        status: StateStatus,
        /// 1-based step position (on activation).
        #[serde(skip_serializing_if = "Option::is_none")]
        step_index: Option<u32>,
        /// Total step count (on activation).
        #[serde(skip_serializing_if = "Option::is_none")]
        total_steps: Option<u32>,
        /// Step display name (on activation).
        #[serde(skip_serializing_if = "Option::is_none")]
        step_name: Option<String>,
        /// Extra detail (error text, progress).
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A long-running activity started; drives a UI progress timer.
    WorkflowActivity {
        /// Short activity label.
        activity: String,
        /// Expected wall-clock budget in seconds (advisory).
        timeout_secs: f64,
    },
    /// Per-step LLM telemetry.
    WorkflowDebug {
        /// The step id this telemetry belongs to.
        step: String,
        /// Model that served the request.
        model: String,
        /// Output token count.
        eval_tokens: u64,
        /// Output tokens per second.
        tok_per_sec: f64,
        /// Character count before reasoning was stripped.
        raw_chars: usize,
        /// Prompt token count.
        prompt_tokens: u64,
        /// Request wall-clock in milliseconds.
        total_ms: u64,
        /// Estimated stripped reasoning tokens.
        think_tokens: u64,
        /// First reasoning tag detected, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        think_detected: Option<String>,
    },
    /// Loop progress: children labels and the active index (-1 = none yet).
    WorkflowLoopUpdate {
        /// The loop step's state id.
        state_id: String,
        /// Short labels for the loop children.
        children: Vec<String>,
        /// Index of the active child, -1 before the first iteration.
        active_index: i64,
    },
    /// The last event of every workflow.
    WorkflowExit {
        /// Why the workflow ended.
        reason: ExitReason,
        /// Error description when reason is `Error`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl WorkflowEvent {
    /// The wire-level type tag, for assertions and routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkflowStart { .. } => "workflow_start",
            Self::WorkflowNarration { .. } => "workflow_narration",
            Self::WorkflowState { .. } => "workflow_state",
            Self::WorkflowActivity { .. } => "workflow_activity",
            Self::WorkflowDebug { .. } => "workflow_debug",
            Self::WorkflowLoopUpdate { .. } => "workflow_loop_update",
            Self::WorkflowExit { .. } => "workflow_exit",
        }
    }

    /// Build a `workflow_debug` event from adaptor diagnostics.
    pub fn debug_from_diagnostics(step: &str, diag: &LlmDiagnostics) -> Self {
        Self::WorkflowDebug {
            step: step.to_string(),
            model: diag.model.clone(),
            eval_tokens: diag.eval_tokens,
            tok_per_sec: diag.tok_per_sec,
            raw_chars: diag.raw_chars,
            prompt_tokens: diag.prompt_tokens,
            total_ms: diag.total_ms,
            think_tokens: diag.think_tokens,
            think_detected: diag.think_detected.clone(),
        }
    }
}

/// Sink for observation events.
///
/// Called synchronously from the interpreter's execution context.
pub trait WorkflowObserver: Send + Sync {
    /// Receive one event.
    fn emit(&self, event: WorkflowEvent);
}

/// Observer that discards everything.
pub struct NullObserver;

impl WorkflowObserver for NullObserver {
    fn emit(&self, _event: WorkflowEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_uses_snake_case_type_tags() {
        let event = WorkflowEvent::WorkflowNarration {
            text: "Searching...".into(),
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["type"], "workflow_narration");
        assert_eq!(json["text"], "Searching...");
    }

    #[test]
    fn state_event_omits_empty_fields() {
        let event = WorkflowEvent::WorkflowState {
            state_id: "decompose".into(),
            status: StateStatus::Visited,
            step_index: None,
            total_steps: None,
            step_name: None,
            detail: None,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["status"], "visited");
        assert!(json.get("step_index").is_none());
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn exit_reason_serializes_lowercase() {
        for (reason, expected) in [
            (ExitReason::Complete, "complete"),
            (ExitReason::Cancelled, "cancelled"),
            (ExitReason::Error, "error"),
        ] {
            let event = WorkflowEvent::WorkflowExit {
                reason,
                error: None,
            };
            let json = serde_json::to_value(&event).unwrap_or_default();
            assert_eq!(json["reason"], expected);
        }
    }

    #[test]
    fn event_type_tags_cover_all_variants() {
        let events = [
            WorkflowEvent::WorkflowStart {
                workflow_id: "w".into(),
                name: "n".into(),
                description: "d".into(),
                states: Vec::new(),
            },
            WorkflowEvent::WorkflowNarration { text: "t".into() },
            WorkflowEvent::WorkflowState {
                state_id: "s".into(),
                status: StateStatus::Active,
                step_index: Some(1),
                total_steps: Some(4),
                step_name: Some("n".into()),
                detail: None,
            },
            WorkflowEvent::WorkflowActivity {
                activity: "a".into(),
                timeout_secs: 5.0,
            },
            WorkflowEvent::debug_from_diagnostics("s", &LlmDiagnostics::default()),
            WorkflowEvent::WorkflowLoopUpdate {
                state_id: "s".into(),
                children: vec!["a".into()],
                active_index: -1,
            },
            WorkflowEvent::WorkflowExit {
                reason: ExitReason::Complete,
                error: None,
            },
        ];
        let tags: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            tags,
            vec![
                "workflow_start",
                "workflow_narration",
                "workflow_state",
                "workflow_activity",
                "workflow_debug",
                "workflow_loop_update",
                "workflow_exit",
            ]
        );
    }

    #[test]
    fn debug_event_mirrors_diagnostics() {
        let diag = LlmDiagnostics {
            model: "qwen2.5:14b".into(),
            prompt_tokens: 120,
            eval_tokens: 40,
            total_ms: 2000,
            tok_per_sec: 20.0,
            raw_chars: 160,
            think_tokens: 12,
            think_detected: Some("think".into()),
        };
        match WorkflowEvent::debug_from_diagnostics("decompose", &diag) {
            WorkflowEvent::WorkflowDebug {
                step,
                model,
                eval_tokens,
                tok_per_sec,
                prompt_tokens,
                think_detected,
                ..
            } => {
                assert_eq!(step, "decompose");
                assert_eq!(model, "qwen2.5:14b");
                assert_eq!(eval_tokens, 40);
                assert_eq!(tok_per_sec, 20.0);
                assert_eq!(prompt_tokens, 120);
                assert_eq!(think_detected.as_deref(), Some("think"));
            }
            other => unreachable!("expected WorkflowDebug, got {other:?}"),
        }
    }

    #[test]
    fn null_observer_accepts_events() {
        NullObserver.emit(WorkflowEvent::WorkflowNarration { text: "x".into() });
    }
}
