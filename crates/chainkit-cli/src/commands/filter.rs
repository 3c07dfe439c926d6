//! Filter command

use super::parse_metadata;
use crate::app::{FilterArgs, OutputFormat};
use crate::output::json;
use anyhow::Result;
use chainkit_core::parse_filter;

pub async fn run(args: FilterArgs, format: OutputFormat) -> Result<()> {
    let filter = parse_filter(&args.expression)?;

    let matches = if args.metadata.is_empty() {
        None
    } else {
        Some(filter.test(&parse_metadata(&args.metadata)?)?)
    };

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::json!({
                "expression": filter.to_string(),
                "filter": filter,
            });
            if let Some(matches) = matches {
                value["matches"] = serde_json::Value::Bool(matches);
            }
            print!("{}", json::format_value(&value)?);
        }
        _ => {
            println!("{}", filter);
            if let Some(matches) = matches {
                println!("matches: {}", matches);
            }
        }
    }
    Ok(())
}
