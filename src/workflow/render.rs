//! Prompt-template rendering over the workflow state map.
//!
//! Placeholder grammar is deliberately trivial: `{{name}}`. A placeholder
//! resolves to a built-in (query, date) or a state-map value; anything
//! else is a template error. State values substituted into prompts are
//! truncated (per-snippet and aggregate caps) so decomposition and
//! synthesis prompts stay small enough for fast models. Truncation runs
//! after reasoning-stripping by construction: the adaptor strips before
//! any text enters the state map.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, SibylError};

/// A value in the per-instance state map.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// Plain text (step output, tool result).
    Text(String),
    /// A list of strings (queries, per-item results).
    List(Vec<String>),
    /// A parsed JSON object.
    Json(Value),
}

impl StateValue {
    /// Render this value for substitution into a prompt.
    pub fn as_prompt_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join("\n\n"),
            Self::Json(value) => value.to_string(),
        }
    }

    /// Borrow the list form, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Per-instance mutable state: variable name to value.
pub type StateMap = HashMap<String, StateValue>;

/// Everything template rendering needs.
pub struct RenderContext<'a> {
    /// The original user utterance.
    pub user_query: &'a str,
    /// The instance state map.
    pub state: &'a StateMap,
    /// Per-snippet character cap for substituted state values.
    pub snippet_cap: usize,
    /// Aggregate character cap for substituted state values.
    pub aggregate_cap: usize,
    /// Whether to truncate substituted state values.
    pub truncate_state_values: bool,
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
static BULLET_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("static placeholder pattern compiles"))
}

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^[\d.\-*]+\s*").expect("static bullet pattern compiles"))
}

/// Render `template` by substituting every `{{name}}` placeholder.
///
/// # Errors
///
/// [`SibylError::TemplateVar`] when a placeholder has no built-in and no
/// state-map value.
pub fn render_template(template: &str, ctx: &RenderContext<'_>) -> Result<String> {
    let mut replacements: Vec<(String, String)> = Vec::new();

    for caps in placeholder_re().captures_iter(template) {
        let name = match caps.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };
        if replacements.iter().any(|(n, _)| n == name) {
            continue;
        }
        let value = resolve_placeholder(name, ctx)?;
        replacements.push((name.to_string(), value));
    }

    let mut rendered = template.to_string();
    for (name, value) in replacements {
        rendered = rendered.replace(&format!("{{{{{name}}}}}"), &value);
    }
    Ok(rendered)
}

fn resolve_placeholder(name: &str, ctx: &RenderContext<'_>) -> Result<String> {
    let now = chrono::Local::now();
    match name {
        "user_query" => Ok(ctx.user_query.to_string()),
        "user_query_short" => Ok(shorten(ctx.user_query, 50)),
        "current_date" => Ok(now.format("%B %d, %Y").to_string()),
        "current_year" => Ok(now.format("%Y").to_string()),
        _ => match ctx.state.get(name) {
            Some(value) => {
                let text = value.as_prompt_text();
                if ctx.truncate_state_values {
                    Ok(truncate_snippets(&text, ctx.snippet_cap, ctx.aggregate_cap))
                } else {
                    Ok(text)
                }
            }
            None => Err(SibylError::TemplateVar(format!(
                "no value for placeholder '{name}'"
            ))),
        },
    }
}

/// First `max_chars` characters, with an ellipsis when clipped.
pub fn shorten(s: &str, max_chars: usize) -> String {
    let clipped: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        format!("{clipped}...")
    } else {
        clipped
    }
}

/// Shorten search-result text for prompt injection.
///
/// Title lines (e.g. `1. Title (url)`) stay intact since entity names
/// appear there; indented snippet lines are clipped to `snippet_cap`
/// characters. Total output is capped at `aggregate_cap` characters.
pub fn truncate_snippets(text: &str, snippet_cap: usize, aggregate_cap: usize) -> String {
    let mut out_lines = Vec::new();
    for line in text.lines() {
        if line.starts_with("   ") && line.chars().count() > snippet_cap {
            let clipped: String = line.chars().take(snippet_cap).collect();
            out_lines.push(format!("{clipped}..."));
        } else {
            out_lines.push(line.to_string());
        }
    }
    let joined = out_lines.join("\n");
    if joined.chars().count() > aggregate_cap {
        let clipped: String = joined.chars().take(aggregate_cap).collect();
        format!("{clipped}\n[...truncated]")
    } else {
        joined
    }
}

/// Parse JSON from LLM output, tolerating code fences.
///
/// Models often wrap JSON in ```` ```json ... ``` ```` blocks; those are
/// stripped first. Returns `None` when the payload still isn't JSON.
pub fn extract_json(text: &str) -> Option<Value> {
    let mut stripped = text.trim();

    if stripped.starts_with("```") {
        let lines: Vec<&str> = stripped.split('\n').collect();
        if lines.len() >= 3 && lines[lines.len() - 1].trim() == "```" {
            let inner = lines[1..lines.len() - 1].join("\n");
            return serde_json::from_str(inner.trim()).ok();
        }
        stripped = stripped.trim_start_matches('`');
    }

    serde_json::from_str(stripped).ok()
}

/// Parse a query list from LLM output.
///
/// Prefers a JSON array; falls back to non-empty lines with leading
/// bullets and numbering stripped. Capped at `max_queries`.
pub fn parse_query_list(text: &str, max_queries: usize) -> Vec<String> {
    if let Some(Value::Array(items)) = extract_json(text) {
        return items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .take(max_queries)
            .collect();
    }

    text.lines()
        .map(|line| bullet_re().replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(max_queries)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(user_query: &'a str, state: &'a StateMap) -> RenderContext<'a> {
        RenderContext {
            user_query,
            state,
            snippet_cap: 150,
            aggregate_cap: 2500,
            truncate_state_values: true,
        }
    }

    #[test]
    fn renders_builtin_placeholders() {
        let state = StateMap::new();
        let rendered = render_template(
            "Asked: {{user_query}} in {{current_year}}",
            &ctx("top five stocks", &state),
        );
        assert!(rendered.is_ok());
        if let Ok(r) = rendered {
            assert!(r.starts_with("Asked: top five stocks in 2"));
            assert!(!r.contains("{{"));
        }
    }

    #[test]
    fn renders_state_values() {
        let mut state = StateMap::new();
        state.insert("claim".into(), StateValue::Text("the moon is hollow".into()));
        let rendered = render_template("Claim: {{claim}}", &ctx("q", &state));
        assert_eq!(rendered.ok().as_deref(), Some("Claim: the moon is hollow"));
    }

    #[test]
    fn repeated_placeholder_renders_everywhere() {
        let state = StateMap::new();
        let rendered = render_template(
            "{{current_year}} and again {{current_year}}",
            &ctx("q", &state),
        );
        assert!(rendered.is_ok_and(|r| !r.contains("{{")));
    }

    #[test]
    fn missing_placeholder_is_an_error() {
        let state = StateMap::new();
        let err = render_template("Value: {{nonexistent}}", &ctx("q", &state));
        assert!(matches!(err, Err(SibylError::TemplateVar(_))));
    }

    #[test]
    fn list_values_join_with_blank_lines() {
        let mut state = StateMap::new();
        state.insert(
            "search_results".into(),
            StateValue::List(vec!["first".into(), "second".into()]),
        );
        let rendered = render_template("{{search_results}}", &ctx("q", &state));
        assert_eq!(rendered.ok().as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn user_query_short_clips_at_fifty() {
        let long = "a".repeat(80);
        let state = StateMap::new();
        let rendered = render_template("{{user_query_short}}", &ctx(&long, &state));
        assert_eq!(rendered.ok().map(|r| r.len()), Some(53)); // 50 + "..."
    }

    #[test]
    fn snippet_lines_are_clipped_but_titles_kept() {
        let text = format!(
            "1. Big Company Ranking 2026 (https://example.com)\n   {}",
            "s".repeat(400)
        );
        let out = truncate_snippets(&text, 150, 2500);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "1. Big Company Ranking 2026 (https://example.com)");
        assert_eq!(lines[1].chars().count(), 153); // 150 + "..."
    }

    #[test]
    fn aggregate_cap_appends_marker() {
        let text = "x".repeat(5000);
        let out = truncate_snippets(&text, 150, 2500);
        assert!(out.ends_with("[...truncated]"));
        assert!(out.chars().count() < 2600);
    }

    #[test]
    fn truncation_applies_to_state_substitution() {
        let mut state = StateMap::new();
        state.insert("initial_lookup".into(), StateValue::Text("x".repeat(5000)));
        let rendered = render_template("{{initial_lookup}}", &ctx("q", &state));
        assert!(rendered.is_ok_and(|r| r.contains("[...truncated]")));
    }

    #[test]
    fn truncation_can_be_disabled() {
        let mut state = StateMap::new();
        state.insert("answer".into(), StateValue::Text("x".repeat(5000)));
        let context = RenderContext {
            user_query: "q",
            state: &state,
            snippet_cap: 150,
            aggregate_cap: 2500,
            truncate_state_values: false,
        };
        let rendered = render_template("{{answer}}", &context);
        assert!(rendered.is_ok_and(|r| r.len() == 5000));
    }

    // ── JSON extraction ──────────────────────────────────────

    #[test]
    fn extract_json_plain_array() {
        let value = extract_json(r#"["a", "b"]"#);
        assert!(value.is_some_and(|v| v.as_array().is_some_and(|a| a.len() == 2)));
    }

    #[test]
    fn extract_json_fenced_block() {
        let text = "```json\n{\"claim\": \"x\"}\n```";
        let value = extract_json(text);
        assert!(value.is_some_and(|v| v["claim"] == "x"));
    }

    #[test]
    fn extract_json_rejects_prose() {
        assert!(extract_json("I could not produce JSON, sorry.").is_none());
    }

    // ── Query list parsing ───────────────────────────────────

    #[test]
    fn parse_query_list_from_json_array() {
        let queries = parse_query_list(r#"["Apple market cap 2026", "NVIDIA market cap 2026"]"#, 5);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0], "Apple market cap 2026");
    }

    #[test]
    fn parse_query_list_line_fallback_strips_bullets() {
        let text = "1. Apple market cap\n- NVIDIA market cap\n* Microsoft market cap\n";
        let queries = parse_query_list(text, 5);
        assert_eq!(
            queries,
            vec![
                "Apple market cap",
                "NVIDIA market cap",
                "Microsoft market cap"
            ]
        );
    }

    #[test]
    fn parse_query_list_caps_results() {
        let text = "a\nb\nc\nd\ne\nf\ng";
        assert_eq!(parse_query_list(text, 5).len(), 5);
    }

    #[test]
    fn parse_query_list_fenced_json() {
        let text = "```json\n[\"one\", \"two\"]\n```";
        assert_eq!(parse_query_list(text, 5), vec!["one", "two"]);
    }
}
