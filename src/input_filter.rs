//! Input quality filter: decides if STT output is worth the LLM.
//!
//! Speech transcription produces plenty of noise: accidental mic taps,
//! silence hallucinated into filler words, repeated-token artifacts.
//! Rejecting those here saves a full LLM round trip per bad input.
//!
//! Signals combined (all free, computed during transcription):
//! no-speech probability, average token log-probability, word count,
//! audio duration, and known noise transcriptions.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classification of a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputQuality {
    /// Send to fast-path / LLM.
    Valid,
    /// Drop silently.
    Garbage,
    /// Drop silently (borderline, not worth the LLM cost).
    LowQuality,
}

/// Single words commonly produced from noise or short mic presses.
///
/// Greetings and farewells are deliberately absent: those are real
/// conversational signals.
const GARBAGE_WORDS: &[&str] = &[
    "you", "the", "a", "i", "um", "uh", "hmm", "oh", "ah", "eh", "beep", "boop", "okay", "ok",
    "yeah", "yes", "no", "so", "well", "right", "like", "just", "but", "and", "or", "if", "it",
    "something", "nothing", "uh-huh", "mm-hmm", "mhm", "huh",
];

static HALLUCINATION_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn hallucination_patterns() -> &'static [Regex] {
    HALLUCINATION_PATTERNS.get_or_init(|| {
        [
            // Only punctuation: ". . . ."
            r"^[\s.,!?\-…]+$",
            // Parenthetical: "(upbeat music)"
            r"^\(.*\)$",
            // Music notes
            r"^♪",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static hallucination pattern compiles"))
        .collect()
    })
}

/// Repeated-token artifact: "the the the". At least three identical words.
fn is_repeated_word(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    words.len() >= 3 && words.iter().all(|w| *w == words[0])
}

fn is_garbage_word(word: &str) -> bool {
    let clean = word.to_lowercase();
    let clean = clean.trim_matches(|c: char| "?.!,-".contains(c));
    GARBAGE_WORDS.contains(&clean)
}

/// Classify STT output quality.
///
/// `no_speech_prob` and `avg_logprob` come from the transcription model;
/// `audio_duration_s` is the recording length. Pass zeros when unknown.
pub fn classify(
    text: &str,
    no_speech_prob: f64,
    avg_logprob: f64,
    audio_duration_s: f64,
) -> InputQuality {
    let clean = text.trim();

    if clean.is_empty() {
        return InputQuality::Garbage;
    }

    // Very short recording is almost always an accidental tap.
    if audio_duration_s > 0.0 && audio_duration_s < 0.6 {
        tracing::info!(duration = audio_duration_s, text = %clean, "filter: too short");
        return InputQuality::Garbage;
    }

    if no_speech_prob > 0.6 {
        tracing::info!(no_speech_prob, text = %clean, "filter: no speech");
        return InputQuality::Garbage;
    }

    for pattern in hallucination_patterns() {
        if pattern.is_match(clean) {
            tracing::info!(text = %clean, "filter: hallucination pattern");
            return InputQuality::Garbage;
        }
    }
    if is_repeated_word(clean) {
        tracing::info!(text = %clean, "filter: repeated word");
        return InputQuality::Garbage;
    }

    let trimmed = clean.trim_end_matches(|c: char| "?.!,".contains(c));
    let words: Vec<&str> = trimmed.split_whitespace().collect();

    if words.len() == 1 && is_garbage_word(words[0]) {
        tracing::info!(text = %clean, "filter: garbage word");
        return InputQuality::Garbage;
    }

    // Low confidence plus short: likely noise misheard as words.
    if avg_logprob < -1.0 && words.len() <= 3 {
        tracing::info!(avg_logprob, words = words.len(), text = %clean, "filter: low confidence");
        return InputQuality::LowQuality;
    }

    if words.len() == 2 && is_garbage_word(words[0]) && is_garbage_word(words[1]) {
        tracing::info!(text = %clean, "filter: two garbage words");
        return InputQuality::Garbage;
    }

    InputQuality::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_garbage() {
        assert_eq!(classify("", 0.0, 0.0, 0.0), InputQuality::Garbage);
        assert_eq!(classify("   ", 0.0, 0.0, 0.0), InputQuality::Garbage);
    }

    #[test]
    fn real_questions_are_valid() {
        assert_eq!(
            classify("what's the weather in Paris right now", 0.1, -0.3, 3.2),
            InputQuality::Valid
        );
        assert_eq!(
            classify("what is two plus two", 0.0, 0.0, 0.0),
            InputQuality::Valid
        );
    }

    #[test]
    fn greetings_survive() {
        assert_eq!(classify("hello", 0.0, 0.0, 2.0), InputQuality::Valid);
        assert_eq!(classify("hi there", 0.0, 0.0, 2.0), InputQuality::Valid);
    }

    #[test]
    fn single_garbage_words_dropped() {
        for word in ["you", "um", "Okay.", "beep", "hmm"] {
            assert_eq!(
                classify(word, 0.0, 0.0, 0.0),
                InputQuality::Garbage,
                "word {word:?}"
            );
        }
    }

    #[test]
    fn short_recording_dropped() {
        assert_eq!(
            classify("turn on the lights", 0.0, 0.0, 0.4),
            InputQuality::Garbage
        );
    }

    #[test]
    fn high_no_speech_dropped() {
        assert_eq!(classify("something", 0.9, 0.0, 2.0), InputQuality::Garbage);
    }

    #[test]
    fn hallucination_patterns_dropped() {
        for text in [". . . .", "the the the", "(upbeat music)", "♪ la la la"] {
            assert_eq!(
                classify(text, 0.0, 0.0, 2.0),
                InputQuality::Garbage,
                "text {text:?}"
            );
        }
    }

    #[test]
    fn low_confidence_short_is_low_quality() {
        assert_eq!(
            classify("green bean scene", 0.0, -1.5, 2.0),
            InputQuality::LowQuality
        );
    }

    #[test]
    fn low_confidence_long_is_still_valid() {
        assert_eq!(
            classify("please tell me the forecast for tomorrow morning", 0.0, -1.5, 3.0),
            InputQuality::Valid
        );
    }

    #[test]
    fn two_garbage_words_dropped() {
        assert_eq!(classify("um yeah", 0.0, 0.0, 2.0), InputQuality::Garbage);
        assert_eq!(classify("oh okay.", 0.0, 0.0, 2.0), InputQuality::Garbage);
    }
}
