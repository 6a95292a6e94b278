//! # Dot Command Handler
//!
//! Parses and executes the inspector's dot commands. Every input line of
//! the REPL is a command; there is no query language.
//!
//! ## Supported Commands
//!
//! | Command                  | Description                                 |
//! |--------------------------|---------------------------------------------|
//! | `.quit` / `.exit`        | Exit the CLI                                |
//! | `.help`                  | Show available commands                     |
//! | `.load <file> [format]`  | Map and decode a captured response body     |
//! | `.columns`               | List column names and types                 |
//! | `.rows [N]`              | Show the first N rows as a table            |
//! | `.blocks`                | List Native blocks                          |
//! | `.node <id>`             | Show a node and its direct children         |
//! | `.at <offset>`           | Show the deepest node covering a byte       |
//! | `.hex <start> <end>`     | Hex dump of a byte range                    |
//! | `.json`                  | Export the whole tree as JSON               |
//! | `.host [address]`        | Show or persist the ClickHouse HTTP address |
//! | `.url <query>`           | Build the request URL for a query           |
//!
//! ## Parsing
//!
//! Command names are case-insensitive and arguments are whitespace
//! separated, except for `.url` which takes the rest of the line verbatim.
//! Offsets and ids accept decimal or `0x` hexadecimal.

use std::path::Path;

use crate::cli::dump::{hex_dump, node_line};
use crate::cli::session::Session;
use crate::cli::table::TableFormatter;
use crate::config::request_url;
use crate::decoder::WireFormat;
use crate::tree::{ParsedResult, Payload};

const DEFAULT_ROW_LIMIT: usize = 20;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Output(String),
    Exit,
    Continue,
    Error(String),
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn is_command(input: &str) -> bool {
        input.trim().starts_with('.')
    }

    pub fn execute(input: &str, session: &mut Session) -> CommandResult {
        let input = input.trim();
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            return CommandResult::Continue;
        }

        let cmd = parts[0].to_lowercase();
        let args = &parts[1..];

        match cmd.as_str() {
            ".quit" | ".exit" | ".q" => CommandResult::Exit,
            ".help" | ".h" | ".?" => CommandResult::Output(help_text()),
            ".load" => load(session, args),
            ".columns" => with_result(session, list_columns),
            ".rows" => match parse_limit(args) {
                Ok(limit) => with_result(session, |result| show_rows(result, limit)),
                Err(msg) => CommandResult::Error(msg),
            },
            ".blocks" => with_result(session, list_blocks),
            ".node" => show_node(session, args),
            ".at" => show_offset(session, args),
            ".hex" => show_hex(session, args),
            ".json" => with_result(session, export_json),
            ".host" => host(session, args),
            ".url" => build_url(session, input[parts[0].len()..].trim()),
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type .help for available commands.",
                cmd
            )),
        }
    }
}

fn help_text() -> String {
    r#"chwire CLI Commands:

  .quit, .exit, .q        Exit the CLI
  .help, .h, .?           Show this help message
  .load FILE [FORMAT]     Decode FILE as Native or RowBinaryWithNamesAndTypes
  .columns                List column names and types
  .rows [N]               Show the first N rows (default 20)
  .blocks                 List Native blocks
  .node ID                Show node ID and its direct children
  .at OFFSET              Show the deepest node covering byte OFFSET
  .hex START END          Hex dump of bytes [START, END)
  .json                   Print the whole tree as JSON
  .host [ADDRESS]         Show or set the ClickHouse HTTP address
  .url QUERY              Build the HTTP request URL for QUERY

Offsets and ids accept decimal or 0x-prefixed hexadecimal.
Use Ctrl+D or .quit to exit."#
        .to_string()
}

fn with_result(session: &Session, f: impl FnOnce(&ParsedResult) -> CommandResult) -> CommandResult {
    match session.result() {
        Some(result) => f(result),
        None => CommandResult::Error("No body loaded. Use .load FILE [FORMAT].".to_string()),
    }
}

fn load(session: &mut Session, args: &[&str]) -> CommandResult {
    let Some(path) = args.first() else {
        return CommandResult::Error("Usage: .load FILE [FORMAT]".to_string());
    };
    let format = match args.get(1) {
        Some(name) => match name.parse::<WireFormat>() {
            Ok(format) => format,
            Err(e) => return CommandResult::Error(e.to_string()),
        },
        None => session.format,
    };
    match session.load(Path::new(path), format) {
        Ok(result) => CommandResult::Output(summary(result)),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

pub fn summary(result: &ParsedResult) -> String {
    let shape = match &result.payload {
        Payload::Rows { header, rows } => {
            format!("{} columns, {} rows", header.columns.len(), rows.len())
        }
        Payload::Blocks(blocks) => {
            let rows: usize = blocks.iter().map(|b| b.row_count).sum();
            format!("{} blocks, {} rows", blocks.len(), rows)
        }
    };
    format!(
        "Decoded {} bytes as {}: {}, {} nodes",
        result.total_len,
        result.format,
        shape,
        result.node_count()
    )
}

fn list_columns(result: &ParsedResult) -> CommandResult {
    if result.columns().is_empty() {
        return CommandResult::Output("No columns.".to_string());
    }
    CommandResult::Output(TableFormatter::for_columns(result).render())
}

fn parse_limit(args: &[&str]) -> Result<usize, String> {
    match args.first() {
        None => Ok(DEFAULT_ROW_LIMIT),
        Some(arg) => arg
            .parse()
            .map_err(|_| format!("Invalid row count: {}", arg)),
    }
}

fn show_rows(result: &ParsedResult, limit: usize) -> CommandResult {
    let formatter = TableFormatter::for_rows(result, limit);
    if formatter.row_count() == 0 {
        return CommandResult::Output("Empty set".to_string());
    }
    let count = formatter.row_count();
    CommandResult::Output(format!(
        "{}{} row{} shown",
        formatter.render(),
        count,
        if count == 1 { "" } else { "s" }
    ))
}

fn list_blocks(result: &ParsedResult) -> CommandResult {
    let Payload::Blocks(blocks) = &result.payload else {
        return CommandResult::Error(format!("{} bodies have no blocks.", result.format));
    };
    if blocks.is_empty() {
        return CommandResult::Output("No blocks.".to_string());
    }
    let lines: Vec<String> = blocks
        .iter()
        .map(|block| {
            let kind = if block.is_terminator() { " (end)" } else { "" };
            format!(
                "block {} {}: {} columns, {} rows{}",
                block.index,
                block.range,
                block.columns.len(),
                block.row_count,
                kind
            )
        })
        .collect();
    CommandResult::Output(lines.join("\n"))
}

fn show_node(session: &Session, args: &[&str]) -> CommandResult {
    let id = match args.first().map(|a| parse_number(a)) {
        Some(Ok(id)) => id,
        Some(Err(msg)) => return CommandResult::Error(msg),
        None => return CommandResult::Error("Usage: .node ID".to_string()),
    };
    with_result(session, |result| match result.find(id) {
        Some(node) => {
            let mut lines = vec![node_line(node)];
            lines.extend(node.children().iter().map(|c| format!("  {}", node_line(c))));
            CommandResult::Output(lines.join("\n"))
        }
        None => CommandResult::Error(format!("No node with id {}.", id)),
    })
}

fn show_offset(session: &Session, args: &[&str]) -> CommandResult {
    let offset = match args.first().map(|a| parse_number(a)) {
        Some(Ok(offset)) => offset,
        Some(Err(msg)) => return CommandResult::Error(msg),
        None => return CommandResult::Error("Usage: .at OFFSET".to_string()),
    };
    with_result(session, |result| match result.node_at(offset) {
        Some(node) => CommandResult::Output(node_line(node)),
        None => CommandResult::Error(format!(
            "Offset {} is outside the body ({} bytes).",
            offset, result.total_len
        )),
    })
}

fn show_hex(session: &Session, args: &[&str]) -> CommandResult {
    let (start, end) = match (args.first(), args.get(1)) {
        (Some(s), Some(e)) => match (parse_number(s), parse_number(e)) {
            (Ok(s), Ok(e)) => (s, e),
            (Err(msg), _) | (_, Err(msg)) => return CommandResult::Error(msg),
        },
        _ => return CommandResult::Error("Usage: .hex START END".to_string()),
    };
    if session.body().is_none() {
        return CommandResult::Error("No body loaded. Use .load FILE [FORMAT].".to_string());
    }
    let bytes = session.bytes();
    if start >= end || start >= bytes.len() {
        return CommandResult::Error(format!(
            "Empty range [{}, {}) in a body of {} bytes.",
            start,
            end,
            bytes.len()
        ));
    }
    CommandResult::Output(hex_dump(bytes, start, end).trim_end().to_string())
}

fn export_json(result: &ParsedResult) -> CommandResult {
    match serde_json::to_string_pretty(&result.to_json()) {
        Ok(text) => CommandResult::Output(text),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

fn host(session: &mut Session, args: &[&str]) -> CommandResult {
    match args.first() {
        None => CommandResult::Output(session.settings.host.clone()),
        Some(address) => match session.set_host(address) {
            Ok(()) => CommandResult::Output(format!("Host set to {}", address)),
            Err(e) => CommandResult::Error(format!("{:#}", e)),
        },
    }
}

fn build_url(session: &Session, query: &str) -> CommandResult {
    if query.is_empty() {
        return CommandResult::Error("Usage: .url QUERY".to_string());
    }
    match request_url(&session.settings.host, query, session.format) {
        Ok(url) => CommandResult::Output(url.to_string()),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

fn parse_number(arg: &str) -> Result<usize, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|_| format!("Invalid number: {}", arg))
}
