use crate::models::ListingReport;
use crate::utils::truncate_chars;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_SUMMARY_CHARS: usize = 500;
pub const MAX_MARKET_VALUE_CHARS: usize = 80;
pub const MAX_LIST_ITEMS: usize = 8;
pub const MIN_QUESTIONS: usize = 3;
pub const MAX_RAW_PREVIEW_CHARS: usize = 2000;

pub const DEFAULT_TITLE: &str = "Unknown Vehicle";
pub const DEFAULT_SUMMARY: &str = "No summary returned.";
pub const DEFAULT_MARKET_VALUE: &str = "Unknown";
pub const DEFAULT_SCORE: f64 = 50.0;

/// Appended, in order, whenever the model returns fewer than
/// [`MIN_QUESTIONS`] questions.
pub const FALLBACK_QUESTIONS: [&str; 3] = [
    "Can you share the full service history and any receipts for recent work?",
    "Has the vehicle ever been in an accident, flood, or had an insurance claim?",
    "Is there any finance owing on the vehicle, and can you provide a clear-title check?",
];

/// Older clients asked for the questions list under this name.
pub const LEGACY_QUESTIONS_FIELD: &str = "mechanic_questions";

/// The JSON object recovered from a model reply. Every field lookup goes
/// through [`Map::get`], so a missing key is always an explicit `None`.
pub type ExtractedCandidate = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("no JSON object could be recovered from model output")]
pub struct ExtractionFailure {
    /// The first [`MAX_RAW_PREVIEW_CHARS`] characters of the raw reply.
    pub raw_preview: String,
}

impl ExtractionFailure {
    pub fn new(raw: &str) -> Self {
        Self {
            raw_preview: truncate_chars(raw, MAX_RAW_PREVIEW_CHARS),
        }
    }
}

/// Remove a surrounding markdown code fence (` ``` ` or ` ```json `) and the
/// whitespace around it. Text without a fence is only trimmed.
pub fn unwrap_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the optional language tag
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Best-effort recovery of a JSON object from free-form model output.
///
/// Tries the fence-stripped text as a whole first, then the span from the
/// first `{` to the last `}`. No other repair is attempted. Values that parse
/// but are not objects (`42`, `"text"`, `[]`) do not count as recovered.
pub fn extract(raw: &str) -> Option<ExtractedCandidate> {
    let text = unwrap_code_fence(raw);

    if let Ok(Value::Object(candidate)) = serde_json::from_str::<Value>(text) {
        return Some(candidate);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(candidate)) => {
            debug!("Recovered JSON object from brace span {}..={}", start, end);
            Some(candidate)
        }
        _ => None,
    }
}

/// Map any candidate object onto a valid [`ListingReport`]. Total and
/// idempotent.
pub fn coerce(candidate: &ExtractedCandidate) -> ListingReport {
    let questions_source = candidate
        .get("questions_to_ask")
        .filter(|value| !value.is_null())
        .or_else(|| candidate.get(LEGACY_QUESTIONS_FIELD));

    let mut questions_to_ask = text_list(questions_source);
    if questions_to_ask.len() < MIN_QUESTIONS {
        questions_to_ask.extend(FALLBACK_QUESTIONS.iter().map(|q| q.to_string()));
    }
    questions_to_ask.truncate(MAX_LIST_ITEMS);

    ListingReport {
        vehicle_title: text_field(
            candidate.get("vehicle_title"),
            DEFAULT_TITLE,
            MAX_TITLE_CHARS,
        ),
        lens_score: score(candidate.get("lens_score")),
        summary: text_field(
            candidate.get("summary"),
            DEFAULT_SUMMARY,
            MAX_SUMMARY_CHARS,
        ),
        market_value_estimate: text_field(
            candidate.get("market_value_estimate"),
            DEFAULT_MARKET_VALUE,
            MAX_MARKET_VALUE_CHARS,
        ),
        red_flags: text_list(candidate.get("red_flags")),
        questions_to_ask,
    }
}

/// [`coerce`] over an arbitrary JSON value; anything but an object is
/// treated as an object with no fields.
pub fn coerce_value(candidate: &Value) -> ListingReport {
    match candidate {
        Value::Object(fields) => coerce(fields),
        _ => coerce(&Map::new()),
    }
}

/// Run the full pipeline over one raw model reply.
pub fn normalize(raw: &str) -> Result<ListingReport, ExtractionFailure> {
    match extract(raw) {
        Some(candidate) => {
            debug!("Extracted candidate with {} fields", candidate.len());
            Ok(coerce(&candidate))
        }
        None => {
            warn!(
                "Model output contained no recoverable JSON ({} chars)",
                raw.chars().count()
            );
            Err(ExtractionFailure::new(raw))
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_field(value: Option<&Value>, fallback: &str, max_chars: usize) -> String {
    let text = value
        .filter(|v| is_truthy(v))
        .map(as_text)
        .unwrap_or_else(|| fallback.to_string());
    truncate_chars(&text, max_chars)
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().take(MAX_LIST_ITEMS).map(as_text).collect(),
        _ => Vec::new(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        // Literals beyond f64 range (1e400) parse to an infinity and clamp
        Value::Number(n) => n.as_f64().or_else(|| n.to_string().parse::<f64>().ok()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn score(value: Option<&Value>) -> u8 {
    let raw = value
        .and_then(as_number)
        .filter(|n| !n.is_nan())
        .unwrap_or(DEFAULT_SCORE);
    // In range after clamping, so the cast cannot wrap
    raw.clamp(0.0, 100.0).round() as u8
}
