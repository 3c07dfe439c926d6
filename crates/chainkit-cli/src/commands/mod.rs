//! CLI command handlers

pub mod chat;
pub mod exec;
pub mod filter;
pub mod mcp;
pub mod models;
pub mod store;

use anyhow::Result;
use chainkit_core::{ChainkitError, Metadata, MetadataValue};

/// Parse `key=value` pairs. Values are typed like filter literals: whole
/// numbers become integers, other numbers doubles, and anything else (or a
/// quoted value) text.
pub fn parse_metadata(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            ChainkitError::InvalidInput(format!("metadata must be key=value, got '{}'", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(
                ChainkitError::InvalidInput(format!("empty metadata key in '{}'", pair)).into(),
            );
        }
        metadata.insert(key, metadata_value(raw.trim()));
    }
    Ok(metadata)
}

fn metadata_value(raw: &str) -> MetadataValue {
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return MetadataValue::Text(raw[1..raw.len() - 1].to_string());
        }
    }
    if let Ok(parsed) = raw.parse::<i64>() {
        return match i32::try_from(parsed) {
            Ok(small) => MetadataValue::Integer(small),
            Err(_) => MetadataValue::Long(parsed),
        };
    }
    match raw.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => MetadataValue::Double(parsed),
        _ => MetadataValue::Text(raw.to_string()),
    }
}
