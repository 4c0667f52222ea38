//! Reasoning-tag stripping for assistant output.
//!
//! Some models wrap chain-of-thought in paired tags (`<think>`,
//! `<reflection>`, `<reasoning>`). That content must never reach the user
//! or downstream prompts. Three ordered rewrites handle well-formed and
//! truncated output alike:
//!
//! 1. remove every complete tag pair, including content;
//! 2. remove an opened tag with no closing tag through end of output;
//! 3. remove a dangling partial tag fragment at the end of output.
//!
//! The pipeline is idempotent: stripping twice yields the same result as
//! stripping once.

use regex::Regex;
use std::sync::OnceLock;

/// Tag names recognized as reasoning delimiters.
pub const REASONING_TAGS: [&str; 3] = ["think", "reflection", "reasoning"];

struct StripPatterns {
    /// `<tag>...</tag>` per recognized tag, dotall.
    complete: Vec<Regex>,
    /// `<tag>...` through end of output, per recognized tag.
    unclosed: Vec<Regex>,
    /// Partial opening/closing fragment at end of output (`<thin`, `</reflec`).
    dangling: Regex,
    /// First occurrence of any recognized opening tag.
    detect: Vec<(&'static str, Regex)>,
}

static PATTERNS: OnceLock<StripPatterns> = OnceLock::new();

fn patterns() -> &'static StripPatterns {
    PATTERNS.get_or_init(|| {
        let complete = REASONING_TAGS
            .iter()
            .map(|tag| compile(&format!(r"(?is)<{tag}>.*?</{tag}>")))
            .collect();
        let unclosed = REASONING_TAGS
            .iter()
            .map(|tag| compile(&format!(r"(?is)<{tag}>.*$")))
            .collect();

        // Every proper prefix of every tag name, longest first so the
        // alternation prefers the longest fragment.
        let mut prefixes: Vec<String> = Vec::new();
        for tag in REASONING_TAGS {
            for end in 1..=tag.len() {
                prefixes.push(tag[..end].to_string());
            }
        }
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        prefixes.dedup();
        let alternation = prefixes.join("|");
        let dangling = compile(&format!(r"(?i)</?(?:{alternation})?$"));

        let detect = REASONING_TAGS
            .iter()
            .map(|tag| (*tag, compile(&format!(r"(?i)<{tag}>"))))
            .collect();

        StripPatterns {
            complete,
            unclosed,
            dangling,
            detect,
        }
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static strip pattern compiles")
}

/// Output of the stripping pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Stripped {
    /// The text with all reasoning content removed, trimmed.
    pub text: String,
    /// How many bytes of reasoning content were removed.
    pub stripped_bytes: usize,
    /// Name of the first reasoning tag found, if any.
    pub first_tag: Option<&'static str>,
}

/// Apply the three-stage stripping pipeline to assistant output.
pub fn strip_reasoning(text: &str) -> Stripped {
    let pats = patterns();

    let first_tag = pats
        .detect
        .iter()
        .filter_map(|(tag, re)| re.find(text).map(|m| (m.start(), *tag)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, tag)| tag);

    let mut out = text.to_string();
    for re in &pats.complete {
        out = re.replace_all(&out, "").into_owned();
    }
    for re in &pats.unclosed {
        out = re.replace(&out, "").into_owned();
    }
    out = pats.dangling.replace(&out, "").into_owned();

    let stripped_bytes = text.len().saturating_sub(out.len());
    Stripped {
        text: out.trim().to_string(),
        stripped_bytes,
        first_tag,
    }
}

/// Rough token estimate for stripped reasoning bytes (4 bytes per token).
pub fn estimate_think_tokens(stripped_bytes: usize) -> u64 {
    (stripped_bytes / 4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_without_tags() {
        let result = strip_reasoning("The answer is 4.");
        assert_eq!(result.text, "The answer is 4.");
        assert_eq!(result.stripped_bytes, 0);
        assert!(result.first_tag.is_none());
    }

    #[test]
    fn removes_complete_think_pair() {
        let result = strip_reasoning("<think>step by step</think>The answer is 4.");
        assert_eq!(result.text, "The answer is 4.");
        assert!(result.stripped_bytes > 0);
        assert_eq!(result.first_tag, Some("think"));
    }

    #[test]
    fn removes_all_recognized_tag_names() {
        for tag in REASONING_TAGS {
            let input = format!("<{tag}>hidden</{tag}>visible");
            let result = strip_reasoning(&input);
            assert_eq!(result.text, "visible", "tag {tag}");
            assert_eq!(result.first_tag, Some(tag));
        }
    }

    #[test]
    fn removes_multiple_pairs() {
        let result =
            strip_reasoning("<think>a</think>one <reflection>b</reflection>two");
        assert_eq!(result.text, "one two");
    }

    #[test]
    fn removes_unclosed_tag_to_end() {
        let result = strip_reasoning("Answer: 4 <think>and now I will ramble");
        assert_eq!(result.text, "Answer: 4");
    }

    #[test]
    fn removes_dangling_open_fragment() {
        let result = strip_reasoning("Answer: 4 <thin");
        assert_eq!(result.text, "Answer: 4");
    }

    #[test]
    fn removes_dangling_close_fragment() {
        let result = strip_reasoning("Answer: 4 </reflec");
        assert_eq!(result.text, "Answer: 4");
    }

    #[test]
    fn removes_bare_angle_at_end() {
        let result = strip_reasoning("Answer: 4 <");
        assert_eq!(result.text, "Answer: 4");
    }

    #[test]
    fn keeps_unrecognized_tags() {
        let result = strip_reasoning("Use <code>foo</code> here.");
        assert_eq!(result.text, "Use <code>foo</code> here.");
    }

    #[test]
    fn case_insensitive_and_multiline() {
        let result = strip_reasoning("<THINK>line one\nline two</THINK>done");
        assert_eq!(result.text, "done");
    }

    #[test]
    fn idempotent_on_arbitrary_inputs() {
        let inputs = [
            "plain",
            "<think>a</think>b",
            "b<think>tail",
            "b<thin",
            "<reasoning>x</reasoning><reflection>y</reflection>z",
            "nested <think>a<think>b</think>c</think> after",
            "</think> stray close",
            "",
        ];
        for input in inputs {
            let once = strip_reasoning(input);
            let twice = strip_reasoning(&once.text);
            assert_eq!(once.text, twice.text, "input {input:?}");
            assert_eq!(twice.stripped_bytes, 0, "input {input:?}");
        }
    }

    #[test]
    fn stripped_bytes_counts_removed_content() {
        let result = strip_reasoning("<think>12345678</think>ok");
        assert_eq!(result.stripped_bytes, "<think>12345678</think>".len());
    }

    #[test]
    fn token_estimate_is_quarter_of_bytes() {
        assert_eq!(estimate_think_tokens(0), 0);
        assert_eq!(estimate_think_tokens(3), 0);
        assert_eq!(estimate_think_tokens(400), 100);
    }
}
