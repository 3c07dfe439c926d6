//! Metadata filter predicates
//!
//! A [`Filter`] is a tree of key comparisons joined by `and`/`or`/`not`.
//! Evaluation walks the tree against one [`Metadata`] record.
//!
//! Semantics worth knowing:
//! - a missing key fails `eq`, `gt`, `gte`, `lt`, `lte` and `in`, but
//!   satisfies `ne` and `nin`
//! - numbers compare across widths (`Integer` 1 equals `Double` 1.0)
//! - strings order lexicographically
//! - comparing text against a number is an error, not a mismatch

use super::{Metadata, MetadataValue, Number};
use crate::error::{ChainkitError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Metadata filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { key: String, value: MetadataValue },
    Ne { key: String, value: MetadataValue },
    Gt { key: String, value: MetadataValue },
    Gte { key: String, value: MetadataValue },
    Lt { key: String, value: MetadataValue },
    Lte { key: String, value: MetadataValue },
    In { key: String, values: Vec<MetadataValue> },
    Nin { key: String, values: Vec<MetadataValue> },
    And { left: Box<Filter>, right: Box<Filter> },
    Or { left: Box<Filter>, right: Box<Filter> },
    Not { filter: Box<Filter> },
}

/// Start a comparison on a metadata key
///
/// ```
/// use chainkit_core::{key, Metadata};
///
/// let filter = key("name").eq("Klaus").and(key("age").gte(42));
/// let metadata = Metadata::new().put("name", "Klaus").put("age", 42);
/// assert!(filter.test(&metadata).unwrap());
/// ```
pub fn key(name: impl Into<String>) -> MetadataKey {
    MetadataKey { name: name.into() }
}

/// Both filters must match
pub fn and(left: Filter, right: Filter) -> Filter {
    left.and(right)
}

/// Either filter must match
pub fn or(left: Filter, right: Filter) -> Filter {
    left.or(right)
}

/// Negates a filter
pub fn not(filter: Filter) -> Filter {
    Filter::Not {
        filter: Box::new(filter),
    }
}

/// A metadata key awaiting its comparison
#[derive(Debug, Clone)]
pub struct MetadataKey {
    name: String,
}

impl MetadataKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eq(self, value: impl Into<MetadataValue>) -> Filter {
        Filter::Eq {
            key: self.name,
            value: value.into(),
        }
    }

    pub fn ne(self, value: impl Into<MetadataValue>) -> Filter {
        Filter::Ne {
            key: self.name,
            value: value.into(),
        }
    }

    pub fn gt(self, value: impl Into<MetadataValue>) -> Filter {
        Filter::Gt {
            key: self.name,
            value: value.into(),
        }
    }

    pub fn gte(self, value: impl Into<MetadataValue>) -> Filter {
        Filter::Gte {
            key: self.name,
            value: value.into(),
        }
    }

    pub fn lt(self, value: impl Into<MetadataValue>) -> Filter {
        Filter::Lt {
            key: self.name,
            value: value.into(),
        }
    }

    pub fn lte(self, value: impl Into<MetadataValue>) -> Filter {
        Filter::Lte {
            key: self.name,
            value: value.into(),
        }
    }

    /// Value must equal one of `values`. An empty set matches nothing.
    pub fn is_in<I, V>(self, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<MetadataValue>,
    {
        Filter::In {
            key: self.name,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Value must equal none of `values`. An empty set matches everything.
    pub fn is_not_in<I, V>(self, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<MetadataValue>,
    {
        Filter::Nin {
            key: self.name,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter {
    /// Combine with another filter; both must match
    pub fn and(self, other: Filter) -> Filter {
        Filter::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Combine with another filter; either must match
    pub fn or(self, other: Filter) -> Filter {
        Filter::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Check if metadata matches this filter
    pub fn test(&self, metadata: &Metadata) -> Result<bool> {
        match self {
            Filter::Eq { key, value } => match metadata.get(key) {
                Some(actual) => values_equal(key, actual, value),
                None => Ok(false),
            },
            Filter::Ne { key, value } => match metadata.get(key) {
                Some(actual) => Ok(!values_equal(key, actual, value)?),
                None => Ok(true),
            },
            Filter::Gt { key, value } => {
                ordering_matches(metadata, key, value, |o| o == Ordering::Greater)
            }
            Filter::Gte { key, value } => {
                ordering_matches(metadata, key, value, |o| o != Ordering::Less)
            }
            Filter::Lt { key, value } => {
                ordering_matches(metadata, key, value, |o| o == Ordering::Less)
            }
            Filter::Lte { key, value } => {
                ordering_matches(metadata, key, value, |o| o != Ordering::Greater)
            }
            Filter::In { key, values } => match metadata.get(key) {
                Some(actual) => contains(key, actual, values),
                None => Ok(false),
            },
            Filter::Nin { key, values } => match metadata.get(key) {
                Some(actual) => Ok(!contains(key, actual, values)?),
                None => Ok(true),
            },
            Filter::And { left, right } => Ok(left.test(metadata)? && right.test(metadata)?),
            Filter::Or { left, right } => Ok(left.test(metadata)? || right.test(metadata)?),
            Filter::Not { filter } => Ok(!filter.test(metadata)?),
        }
    }

    /// All metadata keys referenced by this filter, in first-seen order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Filter::Eq { key, .. }
            | Filter::Ne { key, .. }
            | Filter::Gt { key, .. }
            | Filter::Gte { key, .. }
            | Filter::Lt { key, .. }
            | Filter::Lte { key, .. }
            | Filter::In { key, .. }
            | Filter::Nin { key, .. } => {
                if !keys.contains(&key.as_str()) {
                    keys.push(key);
                }
            }
            Filter::And { left, right } | Filter::Or { left, right } => {
                left.collect_keys(keys);
                right.collect_keys(keys);
            }
            Filter::Not { filter } => filter.collect_keys(keys),
        }
    }
}

impl std::ops::Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        not(self)
    }
}

fn ordering_matches(
    metadata: &Metadata,
    key: &str,
    value: &MetadataValue,
    accept: impl Fn(Ordering) -> bool,
) -> Result<bool> {
    match metadata.get(key) {
        Some(actual) => Ok(compare(key, actual, value)?.is_some_and(accept)),
        None => Ok(false),
    }
}

fn contains(key: &str, actual: &MetadataValue, values: &[MetadataValue]) -> Result<bool> {
    for value in values {
        if values_equal(key, actual, value)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn values_equal(key: &str, actual: &MetadataValue, expected: &MetadataValue) -> Result<bool> {
    Ok(compare(key, actual, expected)? == Some(Ordering::Equal))
}

/// Compare a stored value against a comparison value.
///
/// `Ok(None)` means the values are of compatible types but unordered (NaN).
fn compare(
    key: &str,
    actual: &MetadataValue,
    expected: &MetadataValue,
) -> Result<Option<Ordering>> {
    match (actual, expected) {
        (MetadataValue::Text(a), MetadataValue::Text(b)) => Ok(Some(a.cmp(b))),
        _ => match (actual.as_number(), expected.as_number()) {
            (Some(a), Some(b)) => Ok(compare_numbers(a, b)),
            _ => Err(ChainkitError::TypeMismatch {
                key: key.to_string(),
                actual: actual.to_string(),
                actual_type: actual.type_name(),
                expected: expected.to_string(),
                expected_type: expected.type_name(),
            }),
        },
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Integral(a), Number::Integral(b)) => Some(a.cmp(&b)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Integral(v) => v as f64,
            Number::Real(v) => v,
        }
    }
}

/// Renders the filter in the syntax accepted by [`super::parse_filter`]
///
/// Parsing the text back gives an equivalent filter, but numbers come back
/// as `Integer`, `Long` or `Double` by their value: a small `Long` reads as
/// `Integer` and a `Float` reads as `Double`.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { key, value } => write!(f, "{} = {}", KeyName(key), Literal(value)),
            Filter::Ne { key, value } => write!(f, "{} != {}", KeyName(key), Literal(value)),
            Filter::Gt { key, value } => write!(f, "{} > {}", KeyName(key), Literal(value)),
            Filter::Gte { key, value } => write!(f, "{} >= {}", KeyName(key), Literal(value)),
            Filter::Lt { key, value } => write!(f, "{} < {}", KeyName(key), Literal(value)),
            Filter::Lte { key, value } => write!(f, "{} <= {}", KeyName(key), Literal(value)),
            Filter::In { key, values } => write!(f, "{} IN ({})", KeyName(key), LiteralList(values)),
            Filter::Nin { key, values } => {
                write!(f, "{} NOT IN ({})", KeyName(key), LiteralList(values))
            }
            Filter::And { left, right } => write!(f, "({} AND {})", left, right),
            Filter::Or { left, right } => write!(f, "({} OR {})", left, right),
            Filter::Not { filter } => write!(f, "NOT ({})", filter),
        }
    }
}

struct KeyName<'a>(&'a str);

impl fmt::Display for KeyName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if super::parser::is_plain_key(self.0) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "`{}`", self.0.replace('`', "``"))
        }
    }
}

struct Literal<'a>(&'a MetadataValue);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            MetadataValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Long(v) => write!(f, "{}", v),
            MetadataValue::Float(v) if v.is_finite() => write!(f, "{:?}", v),
            MetadataValue::Float(v) => write_real(f, *v as f64),
            MetadataValue::Double(v) => write_real(f, *v),
        }
    }
}

fn write_real(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        write!(f, "NaN")
    } else if v.is_infinite() {
        write!(f, "{}Infinity", if v < 0.0 { "-" } else { "" })
    } else {
        write!(f, "{:?}", v)
    }
}

struct LiteralList<'a>(&'a [MetadataValue]);

impl fmt::Display for LiteralList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", Literal(value))?;
        }
        Ok(())
    }
}
