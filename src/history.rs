//! Conversation history with group-aware trimming.
//!
//! History is an ordered sequence of [`Message`]s. An assistant message
//! carrying tool calls and the tool results that answer it form one
//! **group** that must never be split: providers reject a dangling
//! `tool_calls` message, and a stranded tool result is meaningless.
//! Trimming therefore drops whole groups from the oldest end.
//!
//! [`flavor_messages`] materializes the provider-native wire shapes: the
//! Anthropic flavor carries tool calls and results as inline content
//! blocks, the OpenAI and Ollama flavors as separate messages.

use serde_json::{json, Value};

use crate::llm::message::{Message, MessageContent, Role};
use crate::llm::types::ProviderKind;

/// Ordered conversation log, bounded by a group budget.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    system_prompt: Option<String>,
    messages: Vec<Message>,
    max_groups: usize,
}

impl ConversationHistory {
    /// Create an empty history with the given group budget.
    pub fn new(max_groups: usize) -> Self {
        Self {
            system_prompt: None,
            messages: Vec::new(),
            max_groups,
        }
    }

    /// Set the system prompt. Held out-of-band; never trimmed.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    /// The system prompt, if one is set.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Append a message.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order (system prompt excluded).
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drop all messages. The system prompt survives.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of groups currently retained.
    pub fn group_count(&self) -> usize {
        self.group_ranges().len()
    }

    /// Trim to the configured group budget.
    pub fn trim(&mut self) {
        self.trim_to(self.max_groups);
    }

    /// Trim to at most `max_groups` groups, dropping oldest whole groups.
    pub fn trim_to(&mut self, max_groups: usize) {
        let ranges = self.group_ranges();
        if ranges.len() <= max_groups {
            return;
        }
        let excess = ranges.len() - max_groups;
        let cut = ranges[excess].start;
        tracing::debug!(
            dropped_groups = excess,
            dropped_messages = cut,
            "trimming conversation history"
        );
        self.messages.drain(..cut);
    }

    /// Materialize the provider-native message list for `kind`.
    ///
    /// The system prompt is not included; it rides separately on the
    /// request.
    pub fn to_provider_messages(&self, kind: ProviderKind) -> Vec<Value> {
        flavor_messages(kind, &self.messages)
    }

    /// Group boundaries: each range is one trimming unit.
    fn group_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let mut ranges = Vec::new();
        let mut i = 0;
        while i < self.messages.len() {
            let start = i;
            if self.messages[i].has_tool_calls() {
                i += 1;
                while i < self.messages.len() && self.messages[i].role == Role::Tool {
                    i += 1;
                }
            } else {
                i += 1;
            }
            ranges.push(start..i);
        }
        ranges
    }
}

/// Convert internal messages into the wire shape for `kind`.
pub fn flavor_messages(kind: ProviderKind, messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < messages.len() {
        let msg = &messages[i];

        if msg.has_tool_calls() {
            // Collect the whole group: this assistant + its tool results.
            let mut results: Vec<&Message> = Vec::new();
            let mut j = i + 1;
            while j < messages.len() && messages[j].role == Role::Tool {
                results.push(&messages[j]);
                j += 1;
            }
            emit_tool_group(kind, msg, &results, &mut out);
            i = j;
        } else {
            match &msg.content {
                MessageContent::Text { text } => {
                    out.push(json!({"role": msg.role.to_string(), "content": text}));
                }
                MessageContent::ToolResult {
                    call_id, content, ..
                } => {
                    // Orphan tool result: keep it addressable per flavor.
                    out.push(tool_result_value(kind, call_id, content));
                }
            }
            i += 1;
        }
    }

    out
}

fn emit_tool_group(kind: ProviderKind, assistant: &Message, results: &[&Message], out: &mut Vec<Value>) {
    let text = assistant.content_text();

    match kind {
        ProviderKind::Anthropic => {
            let mut blocks = Vec::new();
            if !text.is_empty() {
                blocks.push(json!({"type": "text", "text": text}));
            }
            for call in &assistant.tool_calls {
                let input: Value = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.call_id,
                    "name": call.name,
                    "input": input,
                }));
            }
            out.push(json!({"role": "assistant", "content": blocks}));

            let result_blocks: Vec<Value> = results
                .iter()
                .filter_map(|m| match &m.content {
                    MessageContent::ToolResult {
                        call_id,
                        content,
                        is_error,
                    } => Some(json!({
                        "type": "tool_result",
                        "tool_use_id": call_id,
                        "content": content,
                        "is_error": is_error,
                    })),
                    MessageContent::Text { .. } => None,
                })
                .collect();
            out.push(json!({"role": "user", "content": result_blocks}));
        }
        ProviderKind::OpenAi => {
            let tool_calls: Vec<Value> = assistant
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.call_id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        },
                    })
                })
                .collect();
            let content = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            };
            out.push(json!({
                "role": "assistant",
                "content": content,
                "tool_calls": tool_calls,
            }));
            for result in results {
                if let MessageContent::ToolResult {
                    call_id, content, ..
                } = &result.content
                {
                    out.push(json!({
                        "role": "tool",
                        "tool_call_id": call_id,
                        "content": content,
                    }));
                }
            }
        }
        ProviderKind::Ollama => {
            let tool_calls: Vec<Value> = assistant
                .tool_calls
                .iter()
                .map(|call| {
                    let arguments: Value = serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
                    json!({
                        "function": {
                            "name": call.name,
                            "arguments": arguments,
                        },
                    })
                })
                .collect();
            out.push(json!({
                "role": "assistant",
                "content": text,
                "tool_calls": tool_calls,
            }));
            for result in results {
                if let MessageContent::ToolResult { content, .. } = &result.content {
                    out.push(json!({"role": "tool", "content": content}));
                }
            }
        }
    }
}

fn tool_result_value(kind: ProviderKind, call_id: &str, content: &str) -> Value {
    match kind {
        ProviderKind::Anthropic => json!({
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": call_id, "content": content}],
        }),
        ProviderKind::OpenAi => {
            json!({"role": "tool", "tool_call_id": call_id, "content": content})
        }
        ProviderKind::Ollama => json!({"role": "tool", "content": content}),
    }
}
