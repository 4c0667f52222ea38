//! Keyword router: sub-millisecond workflow selection.
//!
//! No LLM call is spent deciding the route; an LLM classifier would
//! double the latency of easy queries. Each workflow's trigger keywords
//! compile into one case-insensitive alternation at startup. Routing is
//! stateless and deterministic: workflows are scanned in definition
//! order and the first match wins.

use regex::Regex;

use super::def::WorkflowDef;

/// Precompiled trigger pattern for one workflow.
struct CompiledTrigger {
    workflow_id: String,
    min_query_words: usize,
    pattern: Option<Regex>,
}

/// Classifies an utterance into a workflow id or the direct path.
pub struct KeywordRouter {
    triggers: Vec<CompiledTrigger>,
}

impl KeywordRouter {
    /// Compile trigger patterns for the given workflow definitions.
    pub fn new(definitions: &[WorkflowDef]) -> Self {
        let triggers = definitions
            .iter()
            .map(|def| CompiledTrigger {
                workflow_id: def.id.clone(),
                min_query_words: def.min_query_words,
                pattern: compile_triggers(&def.trigger_keywords),
            })
            .collect();
        Self { triggers }
    }

    /// Route an utterance: `Some(workflow_id)` or `None` for the direct path.
    ///
    /// Queries shorter than a workflow's minimum word count skip that
    /// workflow entirely.
    pub fn route(&self, utterance: &str) -> Option<&str> {
        let word_count = utterance.split_whitespace().count();

        for trigger in &self.triggers {
            if word_count < trigger.min_query_words {
                continue;
            }
            let matched = trigger
                .pattern
                .as_ref()
                .is_some_and(|p| p.is_match(utterance));
            if matched {
                tracing::info!(
                    workflow = %trigger.workflow_id,
                    utterance = %utterance.chars().take(60).collect::<String>(),
                    "workflow routed"
                );
                return Some(&trigger.workflow_id);
            }
        }
        None
    }
}

/// Build one alternation from the keyword list.
///
/// Plain keywords get word-boundary wrapping; keywords that already
/// contain regex metacharacters are used verbatim.
fn compile_triggers(keywords: &[String]) -> Option<Regex> {
    if keywords.is_empty() {
        return None;
    }
    let parts: Vec<String> = keywords
        .iter()
        .map(|kw| {
            let has_meta = kw.chars().any(|c| r"\+*?[]()".contains(c));
            if has_meta {
                kw.clone()
            } else {
                format!(r"\b{kw}\b")
            }
        })
        .collect();
    let joined = format!("(?i){}", parts.join("|"));
    match Regex::new(&joined) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "trigger pattern failed to compile");
            None
        }
    }
}
