//! Tool dispatcher.
//!
//! Resolves a normalized tool-call request against the registry, checks
//! arguments against the tool's schema, and executes. The dispatcher
//! never retries; callers decide whether a retry is worth the rate-limit
//! cost.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, SibylError};
use crate::llm::message::ToolCallRequest;
use crate::llm::provider::ToolSchema;

use super::registry::ToolRegistry;

/// Executes tool-call requests against a shared registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    /// Create a dispatcher over the given registry.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Whether a tool with this name is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    /// Schemas of every registered tool, for LLM tool-option lists.
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas_for_api()
    }

    /// Resolve, validate, and execute one tool call.
    ///
    /// # Errors
    ///
    /// - [`SibylError::UnknownTool`] when the name is not registered
    /// - [`SibylError::InvalidArguments`] when the arguments fail to parse
    ///   or miss a required field
    /// - [`SibylError::ToolFailed`] wrapping any execution failure
    pub async fn dispatch(&self, call: &ToolCallRequest) -> Result<String> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| SibylError::UnknownTool(call.name.clone()))?;

        let args: Value = serde_json::from_str(&call.arguments_json).map_err(|e| {
            SibylError::InvalidArguments(format!("tool '{}': arguments not valid JSON: {e}", call.name))
        })?;
        if !args.is_object() {
            return Err(SibylError::InvalidArguments(format!(
                "tool '{}': arguments must be a JSON object",
                call.name
            )));
        }
        check_required(&call.name, &args, &tool.schema())?;

        let started = std::time::Instant::now();
        let result = tool.execute(args).await.map_err(|e| match e {
            SibylError::InvalidArguments(_) => e,
            other => SibylError::ToolFailed(format!("tool '{}': {}", call.name, other.message())),
        })?;
        tracing::info!(
            tool = %call.name,
            duration_ms = started.elapsed().as_millis() as u64,
            chars = result.len(),
            "tool executed"
        );
        Ok(result)
    }
}

/// Check the schema's `required` list against the provided arguments.
fn check_required(name: &str, args: &Value, schema: &Value) -> Result<()> {
    let required = match schema.get("required").and_then(Value::as_array) {
        Some(required) => required,
        None => return Ok(()),
    };
    for field in required {
        if let Some(field) = field.as_str() {
            if args.get(field).is_none() {
                return Err(SibylError::InvalidArguments(format!(
                    "tool '{name}': missing required argument '{field}'"
                )));
            }
        }
    }
    Ok(())
}
