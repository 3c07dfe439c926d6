//! Terminal output formatter

use super::Table;
use anyhow::Result;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub fn print_table(table: &Table) -> Result<()> {
    if table.rows.is_empty() {
        return Ok(());
    }

    let widths = column_widths(table);
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    stdout.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Cyan)))?;
    writeln!(stdout, "{}", pad_row(table.headers.iter().copied(), &widths))?;
    stdout.reset()?;

    for row in &table.rows {
        writeln!(stdout, "{}", pad_row(row.iter().map(String::as_str), &widths))?;
    }
    Ok(())
}

/// Print a highlighted line, e.g. a tool result heading
pub fn print_highlight(text: &str, color: Color) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
    writeln!(stdout, "{}", text)?;
    stdout.reset()?;
    Ok(())
}

fn column_widths(table: &Table) -> Vec<usize> {
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    padded.join("  ").trim_end().to_string()
}
