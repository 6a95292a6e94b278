//! # ASCII Table Formatter
//!
//! Renders decoded rows and column lists as MySQL-style ASCII tables.
//!
//! ## Output Format
//!
//! ```text
//! +----+-------+
//! | id | name  |
//! +----+-------+
//! | 1  | Alice |
//! | 2  | Bob   |
//! +----+-------+
//! ```
//!
//! ## Row Sources
//!
//! - RowBinary: each row node's cells, shown with the node's own display
//! - Native: rows are reassembled across the columns of every block, so a
//!   row's cells come from the same position in each column run
//!
//! Cells are truncated to `MAX_COLUMN_WIDTH` characters with `...`.

use std::fmt::Write;

use crate::tree::{ParsedResult, Payload};

const MAX_COLUMN_WIDTH: usize = 50;

pub struct TableFormatter {
    headers: Vec<String>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl TableFormatter {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut widths: Vec<usize> = headers.iter().map(|h| width_of(h).max(1)).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(width_of(cell)).min(MAX_COLUMN_WIDTH);
                }
            }
        }
        Self {
            headers,
            widths,
            rows,
        }
    }

    /// Up to `limit` rows of a decoded body, one table column per column.
    pub fn for_rows(result: &ParsedResult, limit: usize) -> Self {
        let headers = result.columns().iter().map(|c| c.name.clone()).collect();
        let rows = match &result.payload {
            Payload::Rows { rows, .. } => rows
                .iter()
                .take(limit)
                .map(|row| row.values().iter().map(|cell| cell.display.clone()).collect())
                .collect(),
            Payload::Blocks(blocks) => blocks
                .iter()
                .flat_map(|block| {
                    (0..block.row_count).map(move |r| {
                        block
                            .columns
                            .iter()
                            .map(|column| {
                                column
                                    .values
                                    .get(r)
                                    .map(|v| v.to_string())
                                    .unwrap_or_default()
                            })
                            .collect()
                    })
                })
                .take(limit)
                .collect(),
        };
        Self::new(headers, rows)
    }

    /// Column name, declared type and the byte range of the type token.
    pub fn for_columns(result: &ParsedResult) -> Self {
        let headers = vec!["name".to_string(), "type".to_string(), "range".to_string()];
        let rows = result
            .columns()
            .into_iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    c.type_string.clone(),
                    c.type_range.to_string(),
                ]
            })
            .collect();
        Self::new(headers, rows)
    }

    pub fn render(&self) -> String {
        let mut output = String::new();

        self.write_separator(&mut output);
        self.write_row(&mut output, &self.headers);
        self.write_separator(&mut output);

        for row in &self.rows {
            self.write_row(&mut output, row);
        }

        self.write_separator(&mut output);

        output
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn write_separator(&self, output: &mut String) {
        output.push('+');
        for width in &self.widths {
            output.push_str(&"-".repeat(width + 2));
            output.push('+');
        }
        output.push('\n');
    }

    fn write_row(&self, output: &mut String, row: &[String]) {
        output.push('|');
        for (i, cell) in row.iter().enumerate() {
            let width = self.widths.get(i).copied().unwrap_or(1);
            let truncated = truncate(cell, width);
            let pad = width.saturating_sub(width_of(&truncated));
            let _ = write!(output, " {}{} |", truncated, " ".repeat(pad));
        }
        output.push('\n');
    }
}

fn width_of(s: &str) -> usize {
    s.chars().count()
}

fn truncate(s: &str, max_len: usize) -> String {
    if width_of(s) <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let mut result: String = s.chars().take(max_len - 3).collect();
        result.push_str("...");
        result
    }
}
