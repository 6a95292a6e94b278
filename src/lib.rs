//! # chwire - ClickHouse Wire Format Decoder
//!
//! chwire decodes the two binary response formats of ClickHouse,
//! `RowBinaryWithNamesAndTypes` and `Native`, into an annotated node tree
//! in which every decoded value keeps the exact byte range it came from.
//! It is the computational core of a format visualizer: a hex pane and a
//! tree pane can be cross-linked by offset without re-reading the buffer.
//!
//! ## Quick Start
//!
//! ```rust
//! use chwire::{decode, WireFormat};
//!
//! // One column `n UInt8` holding the single row 7.
//! let body = [0x01, 0x01, b'n', 0x05, b'U', b'I', b'n', b't', b'8', 0x07];
//! let result = decode(&body, WireFormat::RowBinaryWithNamesAndTypes).unwrap();
//!
//! let cell = &result.rows()[0].values()[0];
//! assert_eq!(cell.display, "7");
//! assert_eq!((cell.range.start, cell.range.end), (9, 10));
//! assert_eq!(result.node_at(9).map(|n| n.id), Some(cell.id));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   decode(buffer, WireFormat)         │
//! ├──────────────────┬──────────────────┤
//! │ RowBinary        │ Native           │
//! │ (row-major)      │ (prefix + runs)  │
//! ├──────────────────┴──────────────────┤
//! │  Type-string parser (TypeDescriptor) │
//! ├─────────────────────────────────────┤
//! │  ByteCursor + LEB128 varints         │
//! └─────────────────────────────────────┘
//!                   │
//!                   ▼
//!   ParsedResult { Node tree, node_at, range_of }
//! ```
//!
//! ## Guarantees
//!
//! - the input buffer is never mutated and never copied wholesale
//! - node ids are assigned in pre-order, fresh for every call
//! - leaves tile `[0, len)` of a successfully decoded buffer without gaps
//! - a malformed buffer yields a typed [`DecodeError`], never a panic
//!
//! ## Module Overview
//!
//! - [`encoding`]: byte cursor and varint codec
//! - [`types`]: type-string lexer/parser and binary type encoding
//! - [`decoder`]: the two format decoders and their shared context
//! - [`tree`]: nodes, logical values, the parsed result and its queries
//! - [`error`]: the decode error taxonomy
//! - [`config`]: wire constants and persisted host settings
//! - [`cli`]: interactive inspector used by the `chwire` binary

#[macro_use]
mod macros;

pub mod cli;
pub mod config;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod tree;
pub mod types;

pub use decoder::{decode, FormatDecoder, WireFormat};
pub use error::DecodeError;
pub use tree::{ByteRange, Node, ParsedResult, Value};
pub use types::{parse_type, TypeDescriptor};
