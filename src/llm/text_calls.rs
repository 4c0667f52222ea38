//! Fallback parser for tool calls emitted as plain text.
//!
//! Some models (notably small local ones) skip the structured tool-call
//! channel and print invocations straight into their output, e.g.
//!
//! ```text
//! gc_search {"query": "weather in Austin"}
//! ```
//!
//! This parser rescues those: a candidate name is mapped through the alias
//! table, checked against the live tool registry, and its argument object
//! extracted with a brace scanner (the JSON may nest). Only calls that
//! survive all three checks are synthesized.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::tools::registry::ToolRegistry;

use super::message::ToolCallRequest;

static CANDIDATE_RE: OnceLock<Regex> = OnceLock::new();

fn candidate_re() -> &'static Regex {
    CANDIDATE_RE.get_or_init(|| {
        Regex::new(r"([A-Za-z_]\w*)\s*\(?\s*\{").expect("static candidate pattern compiles")
    })
}

/// Default alias table mapping model-invented names to registered tools.
pub fn default_tool_aliases() -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    for name in ["web_search", "search", "gc_search"] {
        aliases.insert(name.to_string(), "web_search".to_string());
    }
    aliases
}

/// Scan assistant text for tool invocations written as plain text.
///
/// A synthesized call is only produced when the name (after alias mapping)
/// is present in the live registry and the arguments parse as a JSON
/// object.
pub fn parse_text_tool_calls(
    text: &str,
    aliases: &HashMap<String, String>,
    registry: &ToolRegistry,
) -> Vec<ToolCallRequest> {
    let mut calls = Vec::new();

    for caps in candidate_re().captures_iter(text) {
        let raw_name = match caps.get(1) {
            Some(m) => m.as_str().to_lowercase(),
            None => continue,
        };
        let tool_name = match aliases.get(&raw_name) {
            Some(name) => name,
            None => continue,
        };
        if registry.get(tool_name).is_none() {
            continue;
        }

        let brace_start = match caps.get(0) {
            Some(m) => m.end() - 1,
            None => continue,
        };
        let json_str = match balanced_object(&text[brace_start..]) {
            Some(s) => s,
            None => continue,
        };
        let args: serde_json::Value = match serde_json::from_str(json_str) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !args.is_object() {
            continue;
        }

        tracing::debug!(raw = %raw_name, tool = %tool_name, "parsed text tool call");
        calls.push(ToolCallRequest {
            call_id: format!("text_call_{}", Uuid::new_v4().simple()),
            name: tool_name.clone(),
            arguments_json: args.to_string(),
        });
    }

    calls
}

/// Extract a balanced `{...}` object from the start of `s`.
///
/// Tracks string literals and escapes so braces inside values don't
/// terminate the scan early.
fn balanced_object(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SibylError;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubTool;

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            "web_search"
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<String, SibylError> {
            Ok("ok".to_string())
        }
    }

    fn registry_with_search() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(StubTool));
        reg
    }

    #[test]
    fn parses_bare_invocation() {
        let reg = registry_with_search();
        let calls = parse_text_tool_calls(
            r#"gc_search {"query": "weather in Austin"}"#,
            &default_tool_aliases(),
            &reg,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].arguments()["query"], "weather in Austin");
        assert!(calls[0].call_id.starts_with("text_call_"));
    }

    #[test]
    fn parses_parenthesized_invocation() {
        let reg = registry_with_search();
        let calls = parse_text_tool_calls(
            r#"I'll run search({"query": "S&P 500 price"}) now."#,
            &default_tool_aliases(),
            &reg,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments()["query"], "S&P 500 price");
    }

    #[test]
    fn handles_nested_objects() {
        let reg = registry_with_search();
        let calls = parse_text_tool_calls(
            r#"web_search {"query": "x", "opts": {"count": 3}}"#,
            &default_tool_aliases(),
            &reg,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments()["opts"]["count"], 3);
    }

    #[test]
    fn ignores_unknown_names() {
        let reg = registry_with_search();
        let calls = parse_text_tool_calls(
            r#"launch_rocket {"target": "moon"}"#,
            &default_tool_aliases(),
            &reg,
        );
        assert!(calls.is_empty());
    }

    #[test]
    fn rejects_aliased_name_missing_from_registry() {
        let reg = ToolRegistry::new();
        let calls = parse_text_tool_calls(
            r#"web_search {"query": "x"}"#,
            &default_tool_aliases(),
            &reg,
        );
        assert!(calls.is_empty());
    }

    #[test]
    fn ignores_malformed_json() {
        let reg = registry_with_search();
        let calls = parse_text_tool_calls(
            r#"web_search {"query": unclosed"#,
            &default_tool_aliases(),
            &reg,
        );
        assert!(calls.is_empty());
    }

    #[test]
    fn ignores_plain_prose() {
        let reg = registry_with_search();
        let calls =
            parse_text_tool_calls("The weather is sunny today.", &default_tool_aliases(), &reg);
        assert!(calls.is_empty());
    }

    #[test]
    fn braces_inside_strings_do_not_break_scan() {
        let reg = registry_with_search();
        let calls = parse_text_tool_calls(
            r#"web_search {"query": "set {a} and }b{"}"#,
            &default_tool_aliases(),
            &reg,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments()["query"], "set {a} and }b{");
    }

    #[test]
    fn balanced_object_requires_leading_brace() {
        assert!(balanced_object("no brace").is_none());
        assert_eq!(balanced_object(r#"{"a":1} rest"#), Some(r#"{"a":1}"#));
    }
}
