//! Message types for LLM conversations.
//!
//! Provides the [`Message`], [`Role`], and [`MessageContent`] types used
//! to represent conversation history, plus [`ToolCallRequest`] — the
//! normalized tool-call shape every provider is converted into.

use serde::{Deserialize, Serialize};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// The content of a message.
///
/// Most messages contain plain text. Tool results additionally carry the
/// call ID they answer and an error flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Tool execution result.
    ToolResult {
        /// The tool call ID this result corresponds to.
        call_id: String,
        /// The tool's output content (or failure description).
        content: String,
        /// Whether the tool execution failed.
        is_error: bool,
    },
}

/// A tool call recorded on an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantToolCall {
    /// Unique identifier for this tool call.
    pub call_id: String,
    /// The tool name being called.
    pub name: String,
    /// JSON-encoded arguments string.
    pub arguments: String,
}

/// A normalized tool-call request produced by a provider (or synthesized
/// by the text-tool-call fallback parser).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique identifier for this call.
    pub call_id: String,
    /// The tool name to invoke.
    pub name: String,
    /// JSON-serialized argument object.
    pub arguments_json: String,
}

impl ToolCallRequest {
    /// Create a request from a name and already-parsed argument object.
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: &serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments_json: arguments.to_string(),
        }
    }

    /// Parse the argument JSON. Unparseable arguments yield an empty object.
    pub fn arguments(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments_json)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// A message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// The message content.
    pub content: MessageContent,
    /// Tool calls made by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AssistantToolCall>,
}

impl Message {
    /// Create a text message with the given role.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text { text: text.into() },
            tool_calls: Vec::new(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Create an assistant message with tool calls and optional text.
    pub fn assistant_with_tool_calls(
        text: Option<String>,
        tool_calls: Vec<AssistantToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text {
                text: text.unwrap_or_default(),
            },
            tool_calls,
        }
    }

    /// Create a successful tool result message.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
                is_error: false,
            },
            tool_calls: Vec::new(),
        }
    }

    /// Create a failed tool result message.
    pub fn tool_error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
                is_error: true,
            },
            tool_calls: Vec::new(),
        }
    }

    /// The textual body of the message regardless of content variant.
    pub fn content_text(&self) -> &str {
        match &self.content {
            MessageContent::Text { text } => text,
            MessageContent::ToolResult { content, .. } => content,
        }
    }

    /// Whether this is an assistant message carrying pending tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}
