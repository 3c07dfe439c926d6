//! Output formatters

pub mod csv;
pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use anyhow::Result;

/// Rows of text under named columns
pub struct Table {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Write a table to stdout
pub fn print_table(table: &Table, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            print!("{}", json::format_table(table)?);
            Ok(())
        }
        OutputFormat::Csv => {
            print!("{}", csv::format_table(table)?);
            Ok(())
        }
        OutputFormat::Cli => terminal::print_table(table),
    }
}
