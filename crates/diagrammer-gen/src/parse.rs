use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractionError;

const FENCE: &str = "```";

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n").expect("fence pattern"));

/// Recover one JSON value from raw LLM output.
///
/// Tries, in order: a fenced block tagged `json` or untagged, the first
/// balanced `{...}` span, then a greedy outermost `{...}` or `[...]`.
pub fn extract_json(raw: &str) -> Result<Value, ExtractionError> {
    let candidate = fenced_block(raw)
        .or_else(|| balanced_object(raw))
        .or_else(|| greedy_span(raw, '{', '}'))
        .or_else(|| greedy_span(raw, '[', ']'))
        .unwrap_or("")
        .trim();

    if candidate.is_empty() {
        return Err(ExtractionError::EmptyExtraction);
    }
    serde_json::from_str(candidate).map_err(|e| ExtractionError::MalformedJson(e.to_string()))
}

/// Body of the first `json` or untagged fence that parses. A string value
/// may itself contain backticks, so every later closing fence is tried
/// before giving up on an opening one. When nothing parses, the first body
/// is returned so the caller can report the parse error.
fn fenced_block(raw: &str) -> Option<&str> {
    let mut first = None;
    let mut pos = 0;
    while let Some(open) = FENCE_OPEN.captures_at(raw, pos) {
        let body_start = open.get(0).map_or(raw.len(), |m| m.end());
        let body = &raw[body_start..];
        let Some(close) = body.find(FENCE) else {
            break;
        };
        let tag = open.get(1).map_or("", |m| m.as_str());
        if tag.is_empty() || tag.eq_ignore_ascii_case("json") {
            let parsed = body
                .match_indices(FENCE)
                .map(|(end, _)| &body[..end])
                .find(|candidate| serde_json::from_str::<Value>(candidate).is_ok());
            if parsed.is_some() {
                return parsed;
            }
            first.get_or_insert(&body[..close]);
        }
        pos = body_start + close + FENCE.len();
    }
    first
}

/// First `{` whose matching `}` closes a span that parses as JSON. Braces
/// inside string literals are ignored. When no span parses, the first
/// balanced span is returned so the caller can report the parse error.
fn balanced_object(raw: &str) -> Option<&str> {
    let mut first = None;
    for (start, _) in raw.match_indices('{') {
        if let Some(end) = matching_brace(&raw[start..]) {
            let span = &raw[start..start + end + 1];
            if serde_json::from_str::<Value>(span).is_ok() {
                return Some(span);
            }
            first.get_or_insert(span);
        }
    }
    first
}

/// Byte offset of the `}` that closes the `{` at the start of `text`.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn greedy_span(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}
