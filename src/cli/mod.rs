//! # chwire Command-Line Interface
//!
//! Interactive inspector for captured ClickHouse response bodies. A body is
//! memory-mapped from disk, decoded once, and then explored with dot
//! commands: list columns and rows, jump from a byte offset to the node that
//! covers it, dump raw bytes, or export the whole tree as JSON.
//!
//! ## Components
//!
//! - [`session`]: the loaded body, its decoded tree and the host settings
//! - [`commands`]: dot command parsing and execution
//! - [`repl`]: the rustyline read-eval-print loop
//! - [`table`]: ASCII table rendering of rows and columns
//! - [`dump`]: indented tree listings and hex dumps
//! - [`history`]: history file location
//!
//! ## Usage
//!
//! ```bash
//! chwire --native ./response.bin
//! chwire> .rows 5
//! chwire> .at 0x1c
//! ```

pub mod commands;
pub mod dump;
pub mod history;
pub mod repl;
pub mod session;
pub mod table;

pub use repl::Repl;
pub use session::Session;
