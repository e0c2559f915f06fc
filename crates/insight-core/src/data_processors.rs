use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::NOISE_CLUSTER_ID;
use crate::time_utils::TimezoneHandler;

// ── Source resolution ─────────────────────────────────────────────────────────

/// Return the first candidate for which `is_available` holds.
///
/// Used wherever several upstream sources can stand in for the same concept
/// (artifact file names, topic columns, version columns).
pub fn resolve_first<'a>(
    candidates: &[&'a str],
    is_available: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    candidates.iter().copied().find(|c| is_available(c))
}

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses review timestamps from the value shapes found in upstream exports.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a [`serde_json::Value`] into a UTC [`DateTime`].
    ///
    /// * `null`       → `None`
    /// * JSON string  → delegated to [`TimezoneHandler::parse_timestamp`].
    /// * JSON number  → Unix timestamp (integer or float seconds).
    pub fn parse(value: &Value, tz: &TimezoneHandler) -> Option<DateTime<Utc>> {
        match value {
            Value::Null => None,
            Value::String(s) => tz.parse_timestamp(s),
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    DateTime::from_timestamp(secs, 0)
                } else if let Some(f) = n.as_f64() {
                    if !f.is_finite() {
                        return None;
                    }
                    let secs = f.trunc() as i64;
                    let nanos = (f.fract().abs() * 1_000_000_000.0).round() as u32;
                    DateTime::from_timestamp(secs, nanos)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

// ── Scalar coercion ───────────────────────────────────────────────────────────

/// Coerce a value to a finite float. Numeric strings are accepted.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// Coerce a star rating to an integer in 1–5.
///
/// Fractional values are truncated; anything non-numeric or outside the
/// range is treated as missing.
pub fn coerce_score(value: &Value) -> Option<u8> {
    let truncated = coerce_f64(value)?.trunc();
    if (1.0..=5.0).contains(&truncated) {
        Some(truncated as u8)
    } else {
        None
    }
}

/// Trimmed, non-empty textual form of a scalar value.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Stringify a cluster identity.
///
/// Integers and integral floats lose any fractional part (`3.0` → `"3"`);
/// missing, null and empty values become the noise sentinel `"-1"`.
pub fn stringify_cluster_id(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return NOISE_CLUSTER_ID.to_string();
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => (f as i64).to_string(),
                    Some(f) if f.is_finite() => f.to_string(),
                    _ => NOISE_CLUSTER_ID.to_string(),
                }
            }
        }
        other => value_text(other).unwrap_or_else(|| NOISE_CLUSTER_ID.to_string()),
    }
}

// ── ListField ─────────────────────────────────────────────────────────────────

/// The encodings a list-valued column may arrive in.
///
/// Each variant has its own decoder; a serialized list that fails structured
/// parsing degrades to the delimited-string decoder instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum ListField<'a> {
    /// A real JSON array.
    NativeSequence(&'a [Value]),
    /// A string shaped like `[...]`, e.g. `"['lag', 'crash']"`.
    SerializedListString(&'a str),
    /// A comma-delimited string such as `"lag, crash"`.
    DelimitedString(Cow<'a, str>),
    /// Missing, null, `""` or `"[]"`.
    Empty,
}

impl<'a> ListField<'a> {
    /// Determine which encoding `value` uses.
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => ListField::Empty,
            Some(Value::Array(items)) => ListField::NativeSequence(items),
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "[]" {
                    ListField::Empty
                } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                    ListField::SerializedListString(trimmed)
                } else {
                    ListField::DelimitedString(Cow::Borrowed(trimmed))
                }
            }
            Some(other) => match value_text(other) {
                Some(text) => ListField::DelimitedString(Cow::Owned(text)),
                None => ListField::Empty,
            },
        }
    }

    /// Decode into a sequence of trimmed, non-empty strings.
    pub fn decode(&self) -> Vec<String> {
        match self {
            ListField::Empty => Vec::new(),
            ListField::NativeSequence(items) => decode_items(items),
            ListField::SerializedListString(s) => {
                if let Ok(items) = serde_json::from_str::<Vec<Value>>(s) {
                    return decode_items(&items);
                }
                if let Some(items) = parse_list_literal(s) {
                    return items
                        .into_iter()
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect();
                }
                split_delimited(s)
            }
            ListField::DelimitedString(s) => split_delimited(s),
        }
    }
}

/// Parse any list-valued field into its canonical sequence.
pub fn parse_list(value: Option<&Value>) -> Vec<String> {
    ListField::classify(value).decode()
}

fn decode_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::Array(_) | Value::Object(_) => Some(item.to_string()),
            scalar => value_text(scalar),
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// Strip bracket and quote characters, split on commas, trim, drop empties.
fn split_delimited(s: &str) -> Vec<String> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
        .collect();
    cleaned
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a flat Python-style list literal: `['a', "b", 3, None]`.
///
/// Supports single- and double-quoted strings with backslash escapes, bare
/// numbers and the `None`/`True`/`False` constants (`None` is skipped).
/// Nested containers or any other syntax yield `None`.
pub fn parse_list_literal(s: &str) -> Option<Vec<String>> {
    let mut chars = s.trim().chars().peekable();
    if chars.next()? != '[' {
        return None;
    }

    let mut items = Vec::new();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.peek().copied()? {
            ']' => {
                chars.next();
                break;
            }
            quote @ ('\'' | '"') => {
                chars.next();
                let mut item = String::new();
                loop {
                    match chars.next()? {
                        '\\' => match chars.next()? {
                            'n' => item.push('\n'),
                            't' => item.push('\t'),
                            other => item.push(other),
                        },
                        c if c == quote => break,
                        c => item.push(c),
                    }
                }
                items.push(item);
            }
            _ => {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' || c == ']' || c.is_whitespace() {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
                match token.as_str() {
                    "None" => {}
                    "True" | "False" => items.push(token),
                    t if t.parse::<f64>().is_ok() => items.push(token),
                    _ => return None,
                }
            }
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next()? {
            ',' => continue,
            ']' => break,
            _ => return None,
        }
    }

    if chars.all(char::is_whitespace) {
        Some(items)
    } else {
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
