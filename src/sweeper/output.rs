//! Listing output parsing and anchored regex filtering.
use regex::Regex;
use serde_json::Value;

use crate::config::section::OutputFormat;
use crate::error::{ConfigError, ParseError};

/// One entry of a list command's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A line of raw output.
    Line(String),
    /// An element of a JSON array.
    Json(Value),
}

impl Item {
    /// Value identifying this item for the sweep command.
    ///
    /// A raw line is its own key. For JSON, strings are returned as-is and
    /// numbers and booleans are stringified; any other value (or a missing
    /// field) gives `None`.
    #[must_use]
    pub fn key_value(&self, key: &str) -> Option<String> {
        match self {
            Self::Line(line) => Some(line.clone()),
            Self::Json(value) => match value.get(key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Null | Value::Array(_) | Value::Object(_) => None,
            },
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(line) => f.write_str(line),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

/// Parse list command output into items.
///
/// Raw output yields one item per non-blank line with trailing whitespace
/// removed; JSON output must be an array.
///
/// # Errors
///
/// Returns [`ParseError`] if JSON output is malformed or not an array.
pub fn parse_output(format: OutputFormat, text: &str) -> Result<Vec<Item>, ParseError> {
    match format {
        OutputFormat::Raw => Ok(text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .map(|l| Item::Line(l.to_string()))
            .collect()),
        OutputFormat::Json => match serde_json::from_str::<Value>(text)? {
            Value::Array(values) => Ok(values.into_iter().map(Item::Json).collect()),
            other => Err(ParseError::NotAnArray {
                found: json_kind(&other),
            }),
        },
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A compiled filter that matches at the start of a value.
///
/// # Examples
///
/// ```
/// use janitor::sweeper::output::Filter;
///
/// let filter = Filter::new("vol-").unwrap();
/// assert!(filter.is_match("vol-1"));
/// assert!(!filter.is_match("old-vol-1"));
/// ```
#[derive(Debug, Clone)]
pub struct Filter {
    pattern: String,
    regex: Regex,
}

impl Filter {
    /// Compile `pattern` anchored at position 0.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFilter`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex =
            Regex::new(&format!("^(?:{pattern})")).map_err(|source| ConfigError::InvalidFilter {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written, without the anchor.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `text` matches from its first character.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn matches_value(&self, value: Option<&Value>) -> bool {
        matches!(value, Some(Value::String(s)) if self.is_match(s))
    }

    /// Whether `item` passes the filter, looking at `field` for JSON items.
    #[must_use]
    pub fn accepts(&self, item: &Item, field: Option<&str>) -> bool {
        match (item, field) {
            (Item::Line(line), _) => self.is_match(line),
            (Item::Json(value), Some(field)) => self.matches_value(value.get(field)),
            (Item::Json(Value::Object(map)), None) => {
                map.values().any(|v| self.matches_value(Some(v)))
            }
            (Item::Json(_), None) => false,
        }
    }
}

/// Select the items that pass `filter`, preserving order.
#[must_use]
pub fn filter_items(items: &[Item], filter: &Filter, field: Option<&str>) -> Vec<Item> {
    items
        .iter()
        .filter(|item| filter.accepts(item, field))
        .cloned()
        .collect()
}
