use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar attribute value carried by a feature.
///
/// Serializes untagged so attribute maps round-trip through plain JSON
/// (`null`, numbers, strings, booleans).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Converts an arbitrary JSON value. Nested arrays and objects are kept as
    /// their compact JSON text so they still participate in tallying.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => AttributeValue::Number(f),
                None => AttributeValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }

    /// Null and the exact empty string are excluded from statistics. Whitespace
    /// is not trimmed.
    pub fn is_countable(&self) -> bool {
        match self {
            AttributeValue::Null => false,
            AttributeValue::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Normalizes a value into the bucket key used for frequency tallies.
    ///
    /// Keys are the display text of the value, so `Number(5.0)` and
    /// `Text("5")` land in the same bucket.
    pub fn tally_key(&self) -> Option<String> {
        if !self.is_countable() {
            return None;
        }
        Some(self.as_display())
    }

    pub fn as_display(&self) -> String {
        match self {
            AttributeValue::Null => String::new(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Number(n) => format_number(*n),
            AttributeValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

fn format_number(value: f64) -> String {
    // -0.0 shares the "0" bucket.
    let value = if value == 0.0 { 0.0 } else { value };
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
