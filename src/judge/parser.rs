//! Verdict extraction from noisy judge responses.
//!
//! Judges are asked for a JSON object but reply however they like:
//! prose around the object, fenced code blocks, braces inside rationale
//! strings, or no JSON at all. Extraction is an ordered chain of pure
//! strategies, each returning `Option`; the first success wins and the
//! caller never sees an error — the worst case is a fallback verdict
//! with score 0 and a diagnostic rationale.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// A judge's declared scoring range. Parsed scores are always clamped to
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreScale {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreScale {
    fn default() -> Self {
        Self { min: 0.0, max: 10.0 }
    }
}

impl ScoreScale {
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.min, self.max)
    }
}

/// Structured judge output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Numeric score, clamped to the judge's scale.
    pub score: f64,
    /// Why the judge gave this score.
    pub rationale: String,
    /// The judge's improvement suggestion, if any.
    pub suggestion: String,
    /// True when a structured object was recovered; false for salvage
    /// and fallback verdicts (usable, low confidence).
    pub parsed: bool,
    /// The raw response text, retained for diagnostics.
    pub raw: String,
}

impl Verdict {
    /// The defined fallback when nothing could be extracted or the judge
    /// was unavailable.
    pub fn fallback(reason: &str, raw: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            rationale: format!("parse failed: {}", truncate(reason, 100)),
            suggestion: String::new(),
            parsed: false,
            raw: raw.into(),
        }
    }
}

/// Partial extraction result shared by all strategies.
#[derive(Debug, Default)]
struct Extracted {
    score: Option<f64>,
    rationale: Option<String>,
    suggestion: Option<String>,
}

/// Parse arbitrary judge text into a verdict. Never fails.
pub fn parse_verdict(text: &str, scale: ScoreScale) -> Verdict {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Verdict::fallback("empty response", text);
    }

    // Structured strategies, in order of strictness.
    let structured = parse_direct(trimmed)
        .or_else(|| parse_fenced(trimmed))
        .or_else(|| parse_outer_slice(trimmed))
        .or_else(|| parse_balanced(trimmed));

    if let Some(extracted) = structured {
        return Verdict {
            score: scale.clamp(extracted.score.unwrap_or(0.0)),
            rationale: extracted.rationale.unwrap_or_default(),
            suggestion: extracted.suggestion.unwrap_or_default(),
            parsed: true,
            raw: text.to_string(),
        };
    }

    // Regex salvage: independent field extraction, low confidence.
    let salvaged = salvage(trimmed);
    if salvaged.score.unwrap_or(0.0) > 0.0 {
        return Verdict {
            score: scale.clamp(salvaged.score.unwrap_or(0.0)),
            rationale: salvaged.rationale.unwrap_or_default(),
            suggestion: salvaged.suggestion.unwrap_or_default(),
            parsed: false,
            raw: text.to_string(),
        };
    }

    Verdict::fallback(trimmed, text)
}

/// Strategy 1: the entire text is a JSON object.
fn parse_direct(text: &str) -> Option<Extracted> {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| extract_fields(&v))
}

static FENCED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// Strategy 2: a fenced code block containing a brace-delimited object.
fn parse_fenced(text: &str) -> Option<Extracted> {
    let captures = FENCED_RE.captures(text)?;
    serde_json::from_str::<Value>(&captures[1])
        .ok()
        .and_then(|v| extract_fields(&v))
}

/// Strategy 3: slice from the first `{` to the last `}`.
fn parse_outer_slice(text: &str) -> Option<Extracted> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .and_then(|v| extract_fields(&v))
}

/// Strategy 4: brace-matching scan from the first `{`, tracking nesting
/// depth and treating characters inside quoted spans as literal. This
/// finds the exact minimal balanced object even when rationale text
/// contains nested braces or escaped quotes, which the first/last-brace
/// slice would corrupt.
fn parse_balanced(text: &str) -> Option<Extracted> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = None;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = end?;
    serde_json::from_str::<Value>(&text[start..end])
        .ok()
        .and_then(|v| extract_fields(&v))
}

static SCORE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)"score"\s*:\s*(\d+(?:\.\d+)?)"#,
        r#"(?i)\bscore\b["\s:]*(\d+(?:\.\d+)?)"#,
        r"(\d+(?:\.\d+)?)\s*/\s*10",
        r"(?i)\brating\b[:\s]+(\d+(?:\.\d+)?)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RATIONALE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)"(?:justification|rationale)"\s*:\s*"([^"]+)""#,
        r#"(?i)\b(?:justification|rationale)\b[:\s]+"?([^"\n]+)"?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static SUGGESTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)"suggestion"\s*:\s*"([^"]+)""#,
        r#"(?i)\bsuggestion\b[:\s]+"?([^"\n]+)"?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Strategy 5: independent regex extraction of each field, assembling
/// whatever subset is found.
fn salvage(text: &str) -> Extracted {
    let first_match = |patterns: &[Regex]| -> Option<String> {
        patterns
            .iter()
            .find_map(|re| re.captures(text).map(|c| c[1].trim().to_string()))
    };

    Extracted {
        score: first_match(&SCORE_RES).and_then(|s| s.parse().ok()),
        rationale: first_match(&RATIONALE_RES),
        suggestion: first_match(&SUGGESTION_RES),
    }
}

/// Pull score/rationale/suggestion out of a parsed JSON object. Non-object
/// values are rejected so the next strategy gets a chance.
fn extract_fields(value: &Value) -> Option<Extracted> {
    let object = value.as_object()?;

    let score = object.get("score").and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    let string_field = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| object.get(*k))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    Some(Extracted {
        score,
        rationale: string_field(&["justification", "rationale"]),
        suggestion: string_field(&["suggestion"]),
    })
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    }
}
