//! Fast-path intent matching: answers before the LLM.
//!
//! Some queries have deterministic answers that don't deserve a
//! multi-second LLM round trip. Time and date questions are computed
//! instantly from the clock. City-qualified time queries fall through
//! (return `None`): timezone resolution belongs to the embedding layer,
//! which can pass the client's UTC offset instead.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use regex::Regex;

static TIME_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
static DATE_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn time_patterns() -> &'static [Regex] {
    TIME_PATTERNS.get_or_init(|| {
        [
            r"(?i)^what(?:'s| is) the (?:current )?time(?:\s+(?:right now|now|currently))?(?:\s+in\s+(.+?))?[?.!]?\s*$",
            r"(?i)^what time is it(?:\s+(?:right now|now|currently))?(?:\s+in\s+(.+?))?[?.!]?\s*$",
            r"(?i)^(?:tell me|give me|get me) the (?:current )?time(?:\s+in\s+(.+?))?[?.!]?\s*$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static time pattern compiles"))
        .collect()
    })
}

fn date_patterns() -> &'static [Regex] {
    DATE_PATTERNS.get_or_init(|| {
        [
            r"(?i)^what(?:'s| is) (?:today(?:'s date)?|the date)[?.!]?\s*$",
            r"(?i)^what day is it(?: today)?[?.!]?\s*$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static date pattern compiles"))
        .collect()
    })
}

fn format_time<Tz: TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "It's {} on {}.",
        now.format("%-I:%M %p"),
        now.format("%A, %B %-d, %Y")
    )
}

fn format_date<Tz: TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Today is {}.", now.format("%A, %B %-d, %Y"))
}

/// Try to answer a query without the LLM. Returns `None` to fall through.
///
/// `client_utc_offset_minutes` localizes the clock to the client; `None`
/// uses the server's local time.
pub fn try_fast_path(text: &str, client_utc_offset_minutes: Option<i32>) -> Option<String> {
    let clean = text.trim();
    if clean.is_empty() {
        return None;
    }

    let offset = client_utc_offset_minutes.and_then(|m| FixedOffset::east_opt(m * 60));

    for pattern in time_patterns() {
        if let Some(caps) = pattern.captures(clean) {
            let location = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if !location.is_empty() {
                // Unknown city resolution is out of scope here.
                tracing::debug!(location, "fast path: city time query falls through");
                return None;
            }
            let response = match offset {
                Some(tz) => format_time(Utc::now().with_timezone(&tz)),
                None => format_time(Local::now()),
            };
            tracing::info!(response = %response, "fast path (time)");
            return Some(response);
        }
    }

    for pattern in date_patterns() {
        if pattern.is_match(clean) {
            let response = match offset {
                Some(tz) => format_date(Utc::now().with_timezone(&tz)),
                None => format_date(Local::now()),
            };
            tracing::info!(response = %response, "fast path (date)");
            return Some(response);
        }
    }

    None
}
