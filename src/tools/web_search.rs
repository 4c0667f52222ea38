//! Web search tool with a provider fallback chain.
//!
//! Tries Tavily first, then Brave. Each provider failure is logged and
//! the chain moves on; only when every configured provider has failed
//! does the tool report an error. Results are formatted as a compact
//! numbered block for LLM consumption.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, SibylError};

use super::Tool;

/// Maximum results returned per search.
const MAX_RESULTS: usize = 4;

/// Snippets are clipped to keep tool results small for voice latency.
const SNIPPET_MAX_LEN: usize = 200;

/// Per-provider timeout. The voice loop cannot wait long for a search.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// One search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Clipped snippet text.
    pub snippet: String,
}

/// Web search over Tavily with Brave as fallback.
pub struct WebSearchTool {
    client: reqwest::Client,
    tavily_api_key: String,
    brave_api_key: String,
}

impl WebSearchTool {
    /// Create the tool. Empty keys disable that provider.
    pub fn new(tavily_api_key: impl Into<String>, brave_api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            tavily_api_key: tavily_api_key.into(),
            brave_api_key: brave_api_key.into(),
        }
    }

    /// Whether at least one search provider is configured.
    pub fn is_configured(&self) -> bool {
        !self.tavily_api_key.is_empty() || !self.brave_api_key.is_empty()
    }

    async fn search_tavily(&self, query: &str, max_results: usize) -> Option<Vec<SearchHit>> {
        let response = self
            .client
            .post("https://api.tavily.com/search")
            .timeout(PROVIDER_TIMEOUT)
            .header("X-API-Key", &self.tavily_api_key)
            .json(&serde_json::json!({
                "query": query,
                "max_results": max_results,
                "include_answer": false,
            }))
            .send()
            .await;
        let payload: Value = match response {
            Ok(r) if r.status().is_success() => r.json().await.ok()?,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "tavily search failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "tavily search failed");
                return None;
            }
        };
        let hits: Vec<SearchHit> = payload
            .get("results")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .take(max_results)
                    .map(|r| SearchHit {
                        title: str_field(r, "title"),
                        url: str_field(r, "url"),
                        snippet: clip(&str_field(r, "content"), SNIPPET_MAX_LEN),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if hits.is_empty() {
            return None;
        }
        tracing::info!(count = hits.len(), query = %clip(query, 60), "tavily results");
        Some(hits)
    }

    async fn search_brave(&self, query: &str, max_results: usize) -> Option<Vec<SearchHit>> {
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .timeout(PROVIDER_TIMEOUT)
            .query(&[("q", query), ("count", &max_results.to_string())])
            .header("X-Subscription-Token", &self.brave_api_key)
            .header("Accept", "application/json")
            .send()
            .await;
        let payload: Value = match response {
            Ok(r) if r.status().is_success() => r.json().await.ok()?,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "brave search failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "brave search failed");
                return None;
            }
        };
        let hits: Vec<SearchHit> = payload
            .get("web")
            .and_then(|w| w.get("results"))
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .take(max_results)
                    .map(|r| SearchHit {
                        title: str_field(r, "title"),
                        url: str_field(r, "url"),
                        snippet: clip(&str_field(r, "description"), SNIPPET_MAX_LEN),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if hits.is_empty() {
            return None;
        }
        tracing::info!(count = hits.len(), query = %clip(query, 60), "brave results");
        Some(hits)
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn clip(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Format hits as a numbered block for injection into an LLM prompt.
pub fn format_results_for_context(query: &str, hits: &[SearchHit]) -> String {
    let mut lines = vec![format!("Web search results for \"{query}\":")];
    for (i, hit) in hits.iter().enumerate() {
        let title = if hit.title.is_empty() {
            "No title"
        } else {
            &hit.title
        };
        lines.push(format!("{}. {} ({})", i + 1, title, hit.url));
        if !hit.snippet.is_empty() {
            lines.push(format!("   {}", hit.snippet));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns titles, URLs, and snippets."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 4)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                SibylError::InvalidArguments("web_search: missing required argument 'query'".into())
            })?;
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(MAX_RESULTS)
            .clamp(1, 10);

        let mut hits = None;
        if !self.tavily_api_key.is_empty() {
            hits = self.search_tavily(query, max_results).await;
        }
        if hits.is_none() && !self.brave_api_key.is_empty() {
            hits = self.search_brave(query, max_results).await;
        }

        match hits {
            Some(hits) => Ok(format_results_for_context(query, &hits)),
            None => Err(SibylError::ToolFailed(format!(
                "web_search: no provider returned results for '{}'",
                clip(query, 60)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_query() {
        let tool = WebSearchTool::new("", "");
        let schema = tool.schema();
        let required = schema.get("required").and_then(Value::as_array);
        assert!(required.is_some_and(|r| r.iter().any(|v| v.as_str() == Some("query"))));
    }

    #[test]
    fn configured_detection() {
        assert!(!WebSearchTool::new("", "").is_configured());
        assert!(WebSearchTool::new("tvly-key", "").is_configured());
        assert!(WebSearchTool::new("", "brave-key").is_configured());
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let tool = WebSearchTool::new("", "");
        let err = tool.execute(serde_json::json!({})).await;
        assert!(matches!(err, Err(SibylError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn blank_query_is_invalid_arguments() {
        let tool = WebSearchTool::new("", "");
        let err = tool.execute(serde_json::json!({"query": "   "})).await;
        assert!(matches!(err, Err(SibylError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn no_providers_configured_fails_cleanly() {
        let tool = WebSearchTool::new("", "");
        let err = tool.execute(serde_json::json!({"query": "rust"})).await;
        assert!(matches!(err, Err(SibylError::ToolFailed(_))));
    }

    #[test]
    fn formatting_matches_context_block_shape() {
        let hits = vec![
            SearchHit {
                title: "Rust Language".into(),
                url: "https://rust-lang.org".into(),
                snippet: "A systems language.".into(),
            },
            SearchHit {
                title: String::new(),
                url: "https://example.com".into(),
                snippet: String::new(),
            },
        ];
        let block = format_results_for_context("rust", &hits);
        assert!(block.starts_with("Web search results for \"rust\":"));
        assert!(block.contains("1. Rust Language (https://rust-lang.org)"));
        assert!(block.contains("   A systems language."));
        assert!(block.contains("2. No title (https://example.com)"));
        assert!(block.ends_with('\n'));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("ééééé", 3), "ééé");
        assert_eq!(clip("short", 100), "short");
    }
}
