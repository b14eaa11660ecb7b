//! Coercing free-form model output into a JSON object.
//!
//! The model is prompted with a trailing `{` and stopped at `}`, so its raw
//! output is usually the inside of an object, sometimes with leading chatter
//! or stray line breaks. Recovery runs a fixed sequence of steps:
//!
//! 1. [`trim_to_open`]: drop everything before the first `{`, adding one if absent.
//! 2. [`ensure_closed`]: append `}` unless the text already ends with one.
//! 3. [`parse_object`]: parse.
//! 4. [`strip_line_breaks`]: remove every `\r` and `\n`.
//! 5. [`parse_object`] once more, then give up.
//!
//! Each step is a plain function so it can be exercised on its own.

use serde_json::{Map, Value};

use crate::config::TrailingText;

pub const OPEN: char = '{';
pub const CLOSE: char = '}';

/// Step 1. Everything from the first `{` on, or the whole text behind a
/// synthesized `{`.
pub fn trim_to_open(raw: &str) -> String {
    match raw.find(OPEN) {
        Some(idx) => raw[idx..].to_string(),
        None => format!("{OPEN}{raw}"),
    }
}

/// Step 2. Append `}` unless the text already ends with one.
///
/// Trailing whitespace counts: `"{...}\n"` gets another brace, which the
/// [`TrailingText::Discard`] policy then ignores.
pub fn ensure_closed(mut candidate: String) -> String {
    if !candidate.ends_with(CLOSE) {
        candidate.push(CLOSE);
    }
    candidate
}

/// Steps 3 and 5. Parse `candidate` as a JSON object.
///
/// With [`TrailingText::Discard`] only the first complete JSON value is
/// read and whatever follows it is ignored; [`TrailingText::Reject`] requires
/// the candidate to be exactly one value.
pub fn parse_object(candidate: &str, trailing: TrailingText) -> Result<Map<String, Value>, String> {
    let value = match trailing {
        TrailingText::Reject => serde_json::from_str::<Value>(candidate).map_err(|e| e.to_string())?,
        TrailingText::Discard => serde_json::Deserializer::from_str(candidate)
            .into_iter::<Value>()
            .next()
            .ok_or_else(|| "empty response".to_string())?
            .map_err(|e| e.to_string())?,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", kind(&other))),
    }
}

/// Step 4. Remove all line-break characters.
pub fn strip_line_breaks(candidate: &str) -> String {
    candidate.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

/// Why recovery gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryError {
    /// Parser message from the first attempt.
    pub first: String,
    /// Parser message from the retry without line breaks.
    pub retry: String,
}

impl std::fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "response is not a JSON object: {} (retry without line breaks: {})",
            self.first, self.retry
        )
    }
}

impl std::error::Error for RecoveryError {}

/// Run all recovery steps over `raw`.
pub fn recover(raw: &str, trailing: TrailingText) -> Result<Map<String, Value>, RecoveryError> {
    let candidate = ensure_closed(trim_to_open(raw));
    let first = match parse_object(&candidate, trailing) {
        Ok(map) => return Ok(map),
        Err(e) => e,
    };
    tracing::debug!(error = %first, "first parse failed, retrying without line breaks");
    let flattened = strip_line_breaks(&candidate);
    parse_object(&flattened, trailing).map_err(|retry| RecoveryError { first, retry })
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(raw: &str) -> Value {
        Value::Object(recover(raw, TrailingText::Discard).unwrap())
    }

    #[test]
    fn trim_to_open_drops_preamble_or_synthesizes() {
        assert_eq!(trim_to_open("Sure! {\"a\": 1"), "{\"a\": 1");
        assert_eq!(trim_to_open("\"a\": 1"), "{\"a\": 1");
    }

    #[test]
    fn ensure_closed_appends_only_when_missing() {
        assert_eq!(ensure_closed("{\"a\": 1".into()), "{\"a\": 1}");
        assert_eq!(ensure_closed("{\"a\": 1}".into()), "{\"a\": 1}");
        assert_eq!(ensure_closed("{\"a\": 1}\n".into()), "{\"a\": 1}\n}");
    }

    #[test]
    fn strip_line_breaks_removes_cr_and_lf() {
        assert_eq!(strip_line_breaks("a\r\nb\nc"), "abc");
    }

    #[test]
    fn continuation_after_prompt_brace_is_completed() {
        // The stop sequence swallows the closing brace and the prompt supplied
        // the opening one.
        assert_eq!(
            ok("\n  \"type\": \"Compose\",\n  \"inputs\": \"x\"\n"),
            json!({"type": "Compose", "inputs": "x"})
        );
    }

    #[test]
    fn closed_nested_object_before_newline_is_completed() {
        let raw = "Sure: {\"type\": \"Compose\", \"inputs\": {\"value\": 1}\n";
        assert_eq!(
            ok(raw),
            json!({"type": "Compose", "inputs": {"value": 1}})
        );
        assert_eq!(
            ok("{\"type\": \"Compose\", \"inputs\": {\"value\": 1}\n"),
            json!({"type": "Compose", "inputs": {"value": 1}})
        );
    }

    #[test]
    fn complete_object_with_trailing_newline_survives_extra_brace() {
        assert_eq!(ok("{\"foo\": 1}\n"), json!({"foo": 1}));
    }

    #[test]
    fn trailing_noise_is_discarded_by_default() {
        assert_eq!(ok("  {\"foo\": 1}\nextra"), json!({"foo": 1}));
        // Deterministic: same input, same output.
        assert_eq!(ok("  {\"foo\": 1}\nextra"), ok("  {\"foo\": 1}\nextra"));
    }

    #[test]
    fn trailing_noise_is_rejected_when_strict() {
        let err = recover("  {\"foo\": 1}\nextra", TrailingText::Reject).unwrap_err();
        assert!(!err.first.is_empty());
        assert!(!err.retry.is_empty());
        assert!(recover("{\"foo\": 1}", TrailingText::Reject).is_ok());
    }

    #[test]
    fn newline_inside_string_is_repaired_by_retry() {
        let raw = "{\"message\": \"line one\nline two\"}";
        assert!(parse_object(raw, TrailingText::Discard).is_err());
        assert_eq!(ok(raw), json!({"message": "line oneline two"}));
    }

    #[test]
    fn prose_without_payload_gives_up() {
        let err = recover("I cannot translate this { action", TrailingText::Discard).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(parse_object("[1, 2]", TrailingText::Discard).is_err());
        assert!(parse_object("", TrailingText::Discard).is_err());
    }
}
