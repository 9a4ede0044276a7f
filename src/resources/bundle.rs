//! Properties-style key-value bundles.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A parsed key-value bundle.
///
/// The format is deliberately minimal: one `key=value` pair per line,
/// `#` or `!` start a comment, surrounding whitespace is trimmed, and the
/// last occurrence of a duplicate key wins. There are no escapes or line
/// continuations.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    entries: HashMap<String, String>,
}

impl Bundle {
    /// Parses bundle content. Lines without a `=` are ignored with a
    /// warning, as are empty keys.
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();

        for (line_number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    entries.insert(key.trim().to_owned(), value.trim().to_owned());
                }
                _ => {
                    tracing::warn!("Ignoring malformed bundle line {}: '{}'", line_number + 1, line);
                }
            }
        }

        Self { entries }
    }

    /// An empty bundle, used as stand-in for missing files.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decodes the bundle into a typed settings struct.
    ///
    /// Values are offered as booleans or numbers when they parse as such,
    /// and as strings otherwise, then mapped through `serde_json`. String
    /// fields should therefore not hold values that look like numbers.
    pub fn decode<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let mut object = Map::new();
        for (key, value) in &self.entries {
            object.insert(key.clone(), coerce(value));
        }

        serde_json::from_value(Value::Object(object))
            .map_err(|err| anyhow::anyhow!("Failed to decode bundle: {}", err))
    }
}

fn coerce(value: &str) -> Value {
    if value == "true" {
        return Value::Bool(true);
    }
    if value == "false" {
        return Value::Bool(false);
    }
    if let Ok(number) = value.parse::<i64>() {
        return Value::Number(number.into());
    }
    if let Ok(number) = value.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(number) {
            return Value::Number(number);
        }
    }

    Value::String(value.to_owned())
}
