//! Hybrid FSM + LLM workflow engine.
//!
//! Complex queries matching a workflow template run through a declarative
//! finite-state machine: decompose the question, drive the search tool in
//! controlled iterations, synthesize a spoken answer. Simple queries take
//! the direct orchestrator path instead; the split is decided by the
//! sub-millisecond [`KeywordRouter`](router::KeywordRouter) with no LLM
//! call.
//!
//! # Submodules
//!
//! - [`def`] — step records, workflow definitions, built-in templates
//! - [`router`] — keyword-based workflow selection
//! - [`render`] — prompt-template rendering over the state map
//! - [`events`] — the observation protocol
//! - [`engine`] — the interpreter

pub mod def;
pub mod engine;
pub mod events;
pub mod render;
pub mod router;

pub use def::{builtin_templates, StepKind, WorkflowDef, WorkflowStep};
pub use engine::{WorkflowEngine, WorkflowEngineConfig};
pub use events::{ExitReason, NullObserver, StateInfo, StateStatus, WorkflowEvent, WorkflowObserver};
pub use render::{StateMap, StateValue};
pub use router::KeywordRouter;
