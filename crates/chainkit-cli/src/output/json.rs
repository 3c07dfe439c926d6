//! JSON output formatter

use super::Table;
use anyhow::Result;
use serde_json::{Map, Value};

pub fn format_table(table: &Table) -> Result<String> {
    let output: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .headers
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.to_string(), Value::String(cell.clone())))
                .collect();
            Value::Object(object)
        })
        .collect();

    Ok(serde_json::to_string_pretty(&output)? + "\n")
}

/// Pretty JSON for any serializable value
pub fn format_value<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}
