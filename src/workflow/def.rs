//! Workflow definitions: step records and the built-in templates.
//!
//! A workflow is a declarative finite-state machine. Steps are a tagged
//! sum over {LLM, Loop, Direct, Synthesize}; the interpreter in
//! [`engine`](super::engine) dispatches on the tag. `next` pointers link
//! steps into the execution order; a step without `next` is terminal.

use serde::{Deserialize, Serialize};

use super::events::StateInfo;

/// Advisory UI budget for LLM steps, in seconds.
pub const LLM_TIMEOUT_SECS: f64 = 120.0;

/// Advisory UI budget for search steps, in seconds.
pub const SEARCH_TIMEOUT_SECS: f64 = 5.0;

/// Default minimum word count before a workflow may trigger.
///
/// Short queries are answered faster by the direct path.
pub const DEFAULT_MIN_QUERY_WORDS: usize = 6;

/// What a step does. The interpreter dispatches on this tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// One focused LLM call; optionally bound to a single tool whose
    /// result becomes the step output.
    Llm {
        /// Prompt template with `{{placeholder}}` substitution.
        prompt_template: String,
        /// Optional single tool binding.
        tool: Option<String>,
        /// State key the output is stored under.
        output_key: String,
    },
    /// Sequential per-item tool dispatch over a state-map list.
    Loop {
        /// State key holding the source list.
        source_key: String,
        /// Tool dispatched once per item.
        tool: String,
        /// State key receiving the per-item output list.
        output_key: String,
    },
    /// Direct tool dispatch with a query picked from the query list.
    Direct {
        /// Tool to dispatch.
        tool: String,
        /// Index into the query list (falls back to the utterance).
        query_index: usize,
        /// State key the result is stored under.
        output_key: String,
    },
    /// An LLM step whose output is the workflow's final answer.
    Synthesize {
        /// Prompt template referencing prior state variables.
        prompt_template: String,
    },
}

impl StepKind {
    /// Short type tag for the observation protocol.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Llm { .. } => "llm",
            Self::Loop { .. } => "loop",
            Self::Direct { .. } => "direct",
            Self::Synthesize { .. } => "synthesize",
        }
    }

    /// The bound tool name, if any.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::Llm { tool, .. } => tool.as_deref(),
            Self::Loop { tool, .. } | Self::Direct { tool, .. } => Some(tool),
            Self::Synthesize { .. } => None,
        }
    }
}

/// A single state in the workflow FSM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Stable identifier used by the observation protocol.
    pub id: String,
    /// Human-readable name, e.g. "Decomposing query".
    pub name: String,
    /// What the step does.
    pub kind: StepKind,
    /// Next state id; `None` is terminal.
    pub next: Option<String>,
    /// Brief agent narration rendered before the step runs.
    pub narration: String,
    /// Advisory wall-clock budget for UI progress display.
    pub timeout_secs: f64,
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
    /// Stable unique name, e.g. "research_compare".
    pub id: String,
    /// Display name.
    pub name: String,
    /// Brief description.
    pub description: String,
    /// Trigger keywords; entries containing regex metacharacters are
    /// used verbatim, plain words get word-boundary wrapping.
    pub trigger_keywords: Vec<String>,
    /// Queries shorter than this many words skip this workflow.
    pub min_query_words: usize,
    /// Ordered steps.
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDef {
    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Serialize the state list for the `workflow_start` event.
    pub fn state_infos(&self) -> Vec<StateInfo> {
        self.steps
            .iter()
            .map(|s| StateInfo {
                state_id: s.id.clone(),
                name: s.name.clone(),
                step_type: s.kind.type_name().to_string(),
                has_tool: s.kind.tool_name().is_some(),
                tool_name: s.kind.tool_name().map(str::to_string),
                narration: if s.narration.is_empty() {
                    None
                } else {
                    Some(s.narration.clone())
                },
                next_step_id: s.next.clone(),
            })
            .collect()
    }
}

/// The three built-in workflow templates.
pub fn builtin_templates() -> Vec<WorkflowDef> {
    vec![research_compare(), deep_research(), fact_check()]
}

fn research_compare() -> WorkflowDef {
    WorkflowDef {
        id: "research_compare".into(),
        name: "Research & Compare".into(),
        description: "Establish ranking, decompose into per-entity lookups, synthesize".into(),
        trigger_keywords: [
            "compare",
            "comparison",
            "versus",
            "vs",
            r"top \d+",
            "top (three|four|five|six|seven|eight|nine|ten)",
            "each",
            "both",
            "market cap",
            "difference between",
            "which is better",
            "pros and cons",
            "biggest",
            "largest",
            "highest",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        min_query_words: DEFAULT_MIN_QUERY_WORDS,
        steps: vec![
            WorkflowStep {
                id: "initial_lookup".into(),
                name: "Establishing ranking".into(),
                kind: StepKind::Llm {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Generate a web search query to find the CURRENT, AUTHORITATIVE \
                        ranking with company/entity names listed. The query MUST include \
                        the year {{current_year}} so results are fresh.\n\n\
                        Good: 'top 5 S&P 500 companies by market cap list {{current_year}}'\n\
                        Bad:  'S&P 500 stocks'\n\n\
                        Return ONLY the search query string, nothing else."
                        .into(),
                    tool: Some("web_search".into()),
                    output_key: "initial_lookup".into(),
                },
                next: Some("decompose".into()),
                narration: "Searching for current ranking...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "decompose".into(),
                name: "Decomposing query".into(),
                kind: StepKind::Llm {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Here are current search results:\n\
                        ---BEGIN SEARCH RESULTS---\n{{initial_lookup}}\n---END SEARCH RESULTS---\n\n\
                        TASK: Identify the entities the user is asking about and create \
                        one search query per entity to look up current data.\n\n\
                        RULES:\n\
                        - FIRST check the search results for entity names\n\
                        - If the search results don't list specific entity names, use your \
                        knowledge to identify the most likely current entities and we will \
                        verify with search\n\
                        - If the user asked for 'top N', return EXACTLY N entities\n\
                        - Include ticker symbols when known\n\
                        - Include '{{current_year}}' in each query\n\n\
                        Return ONLY a JSON array of search queries. Example format:\n\
                        [\"Apple AAPL market cap {{current_year}}\", \
                        \"NVIDIA NVDA market cap {{current_year}}\", \
                        \"Microsoft MSFT market cap {{current_year}}\"]\n\n\
                        JSON array:"
                        .into(),
                    tool: None,
                    output_key: "decompose".into(),
                },
                next: Some("search_each".into()),
                narration: "Decomposing into individual lookups...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "search_each".into(),
                name: "Searching each entity".into(),
                kind: StepKind::Loop {
                    source_key: "search_queries".into(),
                    tool: "web_search".into(),
                    output_key: "search_results".into(),
                },
                next: Some("synthesize".into()),
                narration: "Looking up each entity...".into(),
                timeout_secs: SEARCH_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "synthesize".into(),
                name: "Synthesizing".into(),
                kind: StepKind::Synthesize {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Here are per-entity search results:\n{{search_results}}\n\n\
                        RULES:\n\
                        - Present the entities in RANKED ORDER (largest to smallest, \
                        best to worst, etc., matching the user's question)\n\
                        - ONLY cite numbers that appear in the search results above\n\
                        - If your training knowledge contradicts the search results, \
                        TRUST THE SEARCH RESULTS, they are more recent\n\
                        - Include specific numbers/facts from the results\n\
                        - Keep it conversational, this will be spoken aloud by a voice \
                        assistant (2-4 sentences)"
                        .into(),
                },
                next: None,
                narration: "Putting it all together...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
        ],
    }
}

fn deep_research() -> WorkflowDef {
    WorkflowDef {
        id: "deep_research".into(),
        name: "Deep Research".into(),
        description: "Initial search, evaluate gaps, targeted follow-up, synthesize".into(),
        trigger_keywords: [
            "tell me about",
            "research",
            "explain in detail",
            "what's happening with",
            "deep dive",
            "comprehensive",
            "thorough",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        min_query_words: 5,
        steps: vec![
            WorkflowStep {
                id: "initial_search".into(),
                name: "Initial search".into(),
                kind: StepKind::Llm {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Generate a focused web search query to find the most relevant, \
                        current information. Include '{{current_year}}' in the query.\n\n\
                        Return ONLY the search query string, nothing else."
                        .into(),
                    tool: Some("web_search".into()),
                    output_key: "initial_search".into(),
                },
                next: Some("evaluate_gaps".into()),
                narration: "Searching for {{user_query_short}}...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "evaluate_gaps".into(),
                name: "Evaluating gaps".into(),
                kind: StepKind::Llm {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Initial search results:\n{{initial_search}}\n\n\
                        What key information is still missing to fully answer this \
                        question? Generate 1-2 follow-up search queries as a JSON \
                        array to fill the gaps. Include '{{current_year}}' in queries.\n\n\
                        Return ONLY the JSON array of search query strings."
                        .into(),
                    tool: None,
                    output_key: "evaluate_gaps".into(),
                },
                next: Some("targeted_search".into()),
                narration: "Evaluating what else we need...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "targeted_search".into(),
                name: "Targeted search".into(),
                kind: StepKind::Loop {
                    source_key: "search_queries".into(),
                    tool: "web_search".into(),
                    output_key: "search_results".into(),
                },
                next: Some("synthesize".into()),
                narration: "Running follow-up searches...".into(),
                timeout_secs: SEARCH_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "synthesize".into(),
                name: "Synthesizing".into(),
                kind: StepKind::Synthesize {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Initial findings:\n{{initial_search}}\n\n\
                        Follow-up findings:\n{{search_results}}\n\n\
                        RULES:\n\
                        - ONLY cite facts/numbers from the search results above\n\
                        - If your training knowledge contradicts the search results, \
                        TRUST THE SEARCH RESULTS\n\
                        - Include specific facts, dates, and numbers\n\
                        - Keep it conversational for a voice assistant (3-5 sentences)"
                        .into(),
                },
                next: None,
                narration: "Putting it all together...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
        ],
    }
}

fn fact_check() -> WorkflowDef {
    WorkflowDef {
        id: "fact_check".into(),
        name: "Fact Check".into(),
        description: "Extract claim, search evidence, search counter-evidence, verdict".into(),
        trigger_keywords: [
            "is it true",
            "fact check",
            "verify",
            "debunk",
            "is that correct",
            "true that",
            "really true",
            "actually true",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        min_query_words: DEFAULT_MIN_QUERY_WORDS,
        steps: vec![
            WorkflowStep {
                id: "extract_claim".into(),
                name: "Extracting claim".into(),
                kind: StepKind::Llm {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Extract the core factual claim being questioned. \
                        Then generate TWO search queries:\n\
                        1. A query to find evidence SUPPORTING the claim (include '{{current_year}}')\n\
                        2. A query to find evidence AGAINST the claim (include '{{current_year}}')\n\n\
                        Return JSON: {\"claim\": \"...\", \"support_query\": \"...\", \
                        \"counter_query\": \"...\"}"
                        .into(),
                    tool: None,
                    output_key: "extract_claim".into(),
                },
                next: Some("search_evidence".into()),
                narration: "Extracting the claim to check...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "search_evidence".into(),
                name: "Searching for evidence".into(),
                kind: StepKind::Direct {
                    tool: "web_search".into(),
                    query_index: 0,
                    output_key: "evidence".into(),
                },
                next: Some("search_counter".into()),
                narration: "Searching for supporting evidence...".into(),
                timeout_secs: SEARCH_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "search_counter".into(),
                name: "Searching counter-evidence".into(),
                kind: StepKind::Direct {
                    tool: "web_search".into(),
                    query_index: 1,
                    output_key: "counter_evidence".into(),
                },
                next: Some("verdict".into()),
                narration: "Searching for counter-evidence...".into(),
                timeout_secs: SEARCH_TIMEOUT_SECS,
            },
            WorkflowStep {
                id: "verdict".into(),
                name: "Rendering verdict".into(),
                kind: StepKind::Synthesize {
                    prompt_template: "Today is {{current_date}}.\n\
                        The user asked: {{user_query}}\n\n\
                        Claim: {{claim}}\n\n\
                        Supporting evidence:\n{{evidence}}\n\n\
                        Counter-evidence:\n{{counter_evidence}}\n\n\
                        RULES:\n\
                        - Base your verdict ONLY on the evidence above\n\
                        - Do NOT rely on training knowledge for factual claims\n\
                        - Render a fair verdict: true, false, partly true, or unverified\n\
                        - Cite specific evidence from the search results\n\
                        - Keep it conversational for a voice assistant (2-4 sentences)"
                        .into(),
                },
                next: None,
                narration: "Rendering verdict...".into(),
                timeout_secs: LLM_TIMEOUT_SECS,
            },
        ],
    }
}
