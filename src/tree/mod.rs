//! # Annotated Node Tree
//!
//! The common output of both decoders. Every decoded byte belongs to exactly
//! one leaf, and every leaf knows its `[start, end)` range, so a viewer can
//! map hex offsets to values and back without re-decoding anything.
//!
//! - [`node`]: [`ByteRange`] and [`Node`]
//! - [`value`]: the logical [`Value`] a node carries
//! - [`result`]: [`ParsedResult`] with header/rows/blocks and the two
//!   traversal queries

pub mod node;
pub mod result;
pub mod value;

pub use node::{ByteRange, Node, NodeId};
pub use result::{Block, ColumnBlock, ColumnDefinition, Header, ParsedResult, Payload, Row};
pub use value::{format_decimal, Value};
