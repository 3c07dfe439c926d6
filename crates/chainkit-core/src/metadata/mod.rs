//! Segment metadata and metadata filters
//!
//! Metadata is a flat key/value record attached to every text segment stored
//! in an embedding store. Filters are predicate trees evaluated against it
//! during search.

mod filter;
mod parser;

pub use filter::{and, key, not, or, Filter, MetadataKey};
pub use parser::parse_filter;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata value types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum MetadataValue {
    /// Text string
    Text(String),

    /// 32-bit integer
    Integer(i32),

    /// 64-bit integer
    Long(i64),

    /// 32-bit float
    Float(f32),

    /// 64-bit float
    Double(f64),
}

/// Numeric view of a metadata value, used for cross-width comparisons
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Integral(i64),
    Real(f64),
}

impl MetadataValue {
    /// Name of the value type, as reported in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Text(_) => "Text",
            MetadataValue::Integer(_) => "Integer",
            MetadataValue::Long(_) => "Long",
            MetadataValue::Float(_) => "Float",
            MetadataValue::Double(_) => "Double",
        }
    }

    /// Returns the string slice for text values
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for every numeric variant
    pub fn is_number(&self) -> bool {
        !matches!(self, MetadataValue::Text(_))
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            MetadataValue::Text(_) => None,
            MetadataValue::Integer(v) => Some(Number::Integral(*v as i64)),
            MetadataValue::Long(v) => Some(Number::Integral(*v)),
            MetadataValue::Float(v) => Some(Number::Real(*v as f64)),
            MetadataValue::Double(v) => Some(Number::Real(*v)),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(v) => write!(f, "{}", v),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Long(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Double(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<&String> for MetadataValue {
    fn from(value: &String) -> Self {
        MetadataValue::Text(value.clone())
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Long(value)
    }
}

impl From<f32> for MetadataValue {
    fn from(value: f32) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Double(value)
    }
}

/// Metadata attached to a text segment
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Metadata {
    /// Key -> value mapping
    pub fields: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    ///
    /// ```
    /// use chainkit_core::Metadata;
    ///
    /// let metadata = Metadata::new().put("name", "Klaus").put("age", 42);
    /// assert!(metadata.contains_key("age"));
    /// ```
    pub fn put(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.get(key)
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.fields.remove(key)
    }

    /// Check if a field exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge with another metadata instance (other takes precedence)
    pub fn merge(&mut self, other: &Metadata) {
        for (key, value) in &other.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.fields).map_err(|e| e.into())
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let fields = serde_json::from_str(json)?;
        Ok(Self { fields })
    }
}

/// A piece of text plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextSegment {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl TextSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

impl From<&str> for TextSegment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let metadata = Metadata::new()
            .put("name", "Klaus")
            .put("age", 42)
            .put("id", 7_000_000_000i64)
            .put("ratio", 0.5f32)
            .put("score", 1.25);

        assert_eq!(
            metadata.get("name"),
            Some(&MetadataValue::Text("Klaus".to_string()))
        );
        assert_eq!(metadata.get("age"), Some(&MetadataValue::Integer(42)));
        assert_eq!(
            metadata.get("id"),
            Some(&MetadataValue::Long(7_000_000_000))
        );
        assert_eq!(metadata.get("ratio"), Some(&MetadataValue::Float(0.5)));
        assert_eq!(metadata.get("score"), Some(&MetadataValue::Double(1.25)));
        assert_eq!(metadata.len(), 5);
    }

    #[test]
    fn test_merge_overrides() {
        let mut meta1 = Metadata::new().put("author", "Alice").put("version", 1);
        let meta2 = Metadata::new().put("author", "Bob").put("lang", "en");

        meta1.merge(&meta2);

        assert_eq!(meta1.get("author").and_then(|v| v.as_text()), Some("Bob"));
        assert!(meta1.contains_key("version"));
        assert!(meta1.contains_key("lang"));
    }

    #[test]
    fn test_json_keeps_integer_widths() {
        let metadata = Metadata::new().put("a", 1).put("b", 1i64).put("c", 1.0f32);

        let json = metadata.to_json().unwrap();
        let restored = Metadata::from_json(&json).unwrap();

        assert_eq!(restored.get("a"), Some(&MetadataValue::Integer(1)));
        assert_eq!(restored.get("b"), Some(&MetadataValue::Long(1)));
        assert_eq!(restored.get("c"), Some(&MetadataValue::Float(1.0)));
    }

    #[test]
    fn test_remove() {
        let mut metadata = Metadata::new().put("key", "value");
        assert!(metadata.remove("key").is_some());
        assert!(metadata.is_empty());
        assert!(metadata.remove("key").is_none());
    }
}
