//! Tool system: trait, registry, and dispatcher.
//!
//! Tools are registered once at startup into a [`ToolRegistry`], which is
//! passed explicitly (as an `Arc`) into everything that needs it rather
//! than living in a global. The [`ToolDispatcher`](dispatcher::ToolDispatcher)
//! resolves and executes normalized tool-call requests.

pub mod dispatcher;
pub mod registry;
pub mod web_search;

use async_trait::async_trait;

use crate::error::Result;

pub use dispatcher::ToolDispatcher;
pub use registry::ToolRegistry;
pub use web_search::WebSearchTool;

/// Core trait for LLM-callable tools.
///
/// Tools must be idempotent enough that retry by a caller is acceptable;
/// the dispatcher itself never retries.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool name (e.g. `"web_search"`).
    fn name(&self) -> &str;

    /// Human-readable description, shown to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn schema(&self) -> serde_json::Value;

    /// Execute the tool with parsed arguments, returning the textual result.
    ///
    /// # Errors
    ///
    /// Returns [`SibylError`](crate::error::SibylError) on validation or
    /// execution failure; the dispatcher wraps it.
    async fn execute(&self, args: serde_json::Value) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SibylError;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input back"
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }
        async fn execute(&self, args: serde_json::Value) -> Result<String> {
            args.get("text")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| SibylError::InvalidArguments("echo: missing text".into()))
        }
    }

    #[tokio::test]
    async fn tool_trait_executes() {
        let tool = EchoTool;
        let result = tool.execute(serde_json::json!({"text": "hello"})).await;
        assert_eq!(result.ok().as_deref(), Some("hello"));
    }

    #[test]
    fn tool_trait_is_object_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<std::sync::Arc<dyn Tool>>();
    }
}
