//! # Wire Format Decoders
//!
//! Entry point and shared contract for the two ClickHouse binary output
//! formats:
//!
//! | Format | Layout | Decoder |
//! |--------|--------|---------|
//! | `RowBinaryWithNamesAndTypes` | header, then row-major values | [`RowBinaryDecoder`] |
//! | `Native` | blocks of columnar runs | [`NativeDecoder`] |
//!
//! ## Decode Contract
//!
//! A decode call is a pure function `(buffer, format) -> ParsedResult`:
//!
//! - the buffer is borrowed read-only and never mutated
//! - node ids come from a [`DecodeContext`] private to the call, reserved in
//!   pre-order (a parent's id is smaller than all of its descendants')
//! - any structural error aborts the call; no partial tree is returned
//! - recursion depth is bounded by `MAX_NESTING_DEPTH`
//!
//! Independent buffers can be decoded from any number of threads at once;
//! there is no shared mutable state.
//!
//! ## Usage Example
//!
//! ```rust
//! use chwire::{decode, WireFormat};
//!
//! // RowBinaryWithNamesAndTypes: 1 column `n` of type UInt8, one row = 7.
//! let body = [0x01, 0x01, b'n', 0x05, b'U', b'I', b'n', b't', b'8', 0x07];
//! let result = decode(&body, WireFormat::RowBinaryWithNamesAndTypes).unwrap();
//! assert_eq!(result.rows()[0].values()[0].display, "7");
//! ```

pub mod native;
pub mod rowbinary;
pub mod scalar;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use eyre::{bail, Result, WrapErr};
use smallvec::SmallVec;
use tracing::debug;

use crate::config::MAX_NESTING_DEPTH;
use crate::encoding::ByteCursor;
use crate::error::DecodeError;
use crate::tree::{ByteRange, ColumnDefinition, Node, NodeId, ParsedResult, Value};
use crate::types::{parse_type, TupleElement};

pub use native::NativeDecoder;
pub use rowbinary::RowBinaryDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    RowBinaryWithNamesAndTypes,
    Native,
}

impl WireFormat {
    pub fn name(&self) -> &'static str {
        match self {
            WireFormat::RowBinaryWithNamesAndTypes => "RowBinaryWithNamesAndTypes",
            WireFormat::Native => "Native",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WireFormat {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rowbinarywithnamesandtypes" | "rowbinary" | "rb" => {
                Ok(WireFormat::RowBinaryWithNamesAndTypes)
            }
            "native" => Ok(WireFormat::Native),
            _ => bail!(
                "unknown format '{}', expected RowBinaryWithNamesAndTypes or Native",
                s
            ),
        }
    }
}

pub trait FormatDecoder {
    fn format(&self) -> WireFormat;

    fn decode(&self, buf: &[u8]) -> Result<ParsedResult>;
}

/// Decodes a complete response body in the given format.
pub fn decode(buf: &[u8], format: WireFormat) -> Result<ParsedResult> {
    debug!(format = %format, len = buf.len(), "decoding response body");
    let result = match format {
        WireFormat::RowBinaryWithNamesAndTypes => RowBinaryDecoder.decode(buf),
        WireFormat::Native => NativeDecoder.decode(buf),
    };
    if let Err(e) = &result {
        debug!(format = %format, error = %e, "decode failed");
    }
    result
}

/// Per-call mutable state: the node id counter and the recursion depth.
#[derive(Debug, Default)]
pub struct DecodeContext {
    next_id: NodeId,
    depth: usize,
}

impl DecodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn nodes_created(&self) -> usize {
        self.next_id
    }

    pub fn leaf(&mut self, type_name: impl Into<String>, range: ByteRange, value: Value) -> Node {
        Node::leaf(self.reserve(), type_name, range, value)
    }

    /// Descends one nesting level; pair every successful call with `leave`.
    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            bail!(DecodeError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Builds a container whose value is the list of its children's values.
pub(crate) fn stream_container(
    id: NodeId,
    type_name: &str,
    start: usize,
    end: usize,
    children: Vec<Node>,
) -> Node {
    let values = children.iter().map(|c| c.value.clone()).collect();
    Node::container(
        id,
        type_name,
        ByteRange::new(start, end),
        Value::Array(values),
        children,
    )
}

pub(crate) fn read_varint_leaf(
    ctx: &mut DecodeContext,
    cursor: &mut ByteCursor<'_>,
    label: &str,
) -> Result<(u64, Node)> {
    let (value, range) = cursor.read_varint()?;
    let node = ctx
        .leaf("VarUInt", range, Value::UInt(value))
        .with_label(label);
    Ok((value, node))
}

/// Varint length leaf; the length is checked against the remaining bytes.
pub(crate) fn read_length_leaf(
    ctx: &mut DecodeContext,
    cursor: &mut ByteCursor<'_>,
    label: &str,
) -> Result<(usize, Node)> {
    let (len, range) = cursor.read_length()?;
    let node = ctx
        .leaf("VarUInt", range, Value::UInt(len as u64))
        .with_label(label);
    Ok((len, node))
}

pub(crate) fn read_string_leaf(
    ctx: &mut DecodeContext,
    cursor: &mut ByteCursor<'_>,
    label: &str,
) -> Result<(String, Node)> {
    let (text, range) = cursor.read_utf8()?;
    let node = ctx
        .leaf("String", range, Value::String(text.to_string()))
        .with_label(label);
    Ok((text.to_string(), node))
}

/// Logical value of a tuple: a record when every element is named.
pub(crate) fn tuple_value(elements: &[TupleElement], values: Vec<Value>) -> Value {
    let named: Option<Vec<&str>> = elements.iter().map(|e| e.name.as_deref()).collect();
    match named {
        Some(names) if !names.is_empty() => Value::Record(
            names
                .into_iter()
                .map(str::to_string)
                .zip(values)
                .collect(),
        ),
        _ => Value::Tuple(values),
    }
}

/// Inserts a JSON value at a dotted path, creating intermediate objects.
/// A path that collides with a non-object value is kept flat.
pub(crate) fn insert_json_path(object: &mut BTreeMap<String, Value>, path: &str, value: Value) {
    let segments: SmallVec<[&str; 8]> = path.split('.').collect();
    if let Err(value) = insert_segments(object, &segments, value) {
        object.insert(path.to_string(), value);
    }
}

fn insert_segments(
    object: &mut BTreeMap<String, Value>,
    segments: &[&str],
    value: Value,
) -> std::result::Result<(), Value> {
    match segments {
        [] => Err(value),
        [last] => {
            object.insert(last.to_string(), value);
            Ok(())
        }
        [first, rest @ ..] => match object
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(BTreeMap::new()))
        {
            Value::Object(child) => insert_segments(child, rest, value),
            _ => Err(value),
        },
    }
}

/// Parses a column's type string into a definition; ranges are the
/// already-read name and type tokens.
pub(crate) fn column_definition(
    name: String,
    name_range: ByteRange,
    type_string: String,
    type_range: ByteRange,
) -> Result<ColumnDefinition> {
    let descriptor = parse_type(&type_string)
        .wrap_err_with(|| format!("column `{}` has an unreadable type", name))?;
    Ok(ColumnDefinition {
        name,
        type_string,
        descriptor,
        name_range,
        type_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse_back() {
        for format in [WireFormat::RowBinaryWithNamesAndTypes, WireFormat::Native] {
            assert_eq!(format.name().parse::<WireFormat>().unwrap(), format);
        }
        assert_eq!(
            "rowbinary".parse::<WireFormat>().unwrap(),
            WireFormat::RowBinaryWithNamesAndTypes
        );
        assert!("csv".parse::<WireFormat>().is_err());
    }

    #[test]
    fn context_reserves_ids_in_order() {
        let mut ctx = DecodeContext::new();
        assert_eq!(ctx.reserve(), 0);
        let leaf = ctx.leaf("UInt8", ByteRange::new(0, 1), Value::UInt(1));
        assert_eq!(leaf.id, 1);
        assert_eq!(ctx.nodes_created(), 2);
    }

    #[test]
    fn nesting_guard_trips_at_limit() {
        let mut ctx = DecodeContext::new();
        for _ in 0..MAX_NESTING_DEPTH {
            ctx.enter().unwrap();
        }
        let err = ctx.enter().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::NestingTooDeep { .. })
        ));
        ctx.leave();
        assert!(ctx.enter().is_ok());
    }

    #[test]
    fn dotted_paths_nest_and_collisions_stay_flat() {
        let mut object = BTreeMap::new();
        insert_json_path(&mut object, "a.b", Value::UInt(1));
        insert_json_path(&mut object, "a.c", Value::UInt(2));
        insert_json_path(&mut object, "x", Value::UInt(3));
        insert_json_path(&mut object, "x.y", Value::UInt(4));

        let Value::Object(a) = &object["a"] else {
            panic!("expected nested object");
        };
        assert_eq!(a.len(), 2);
        assert_eq!(object["x"], Value::UInt(3));
        assert_eq!(object["x.y"], Value::UInt(4));
    }

    #[test]
    fn tuple_value_names_only_fully_named_tuples() {
        let named = [
            TupleElement::named("a", crate::types::TypeDescriptor::UInt8),
            TupleElement::named("b", crate::types::TypeDescriptor::UInt8),
        ];
        let value = tuple_value(&named, vec![Value::UInt(1), Value::UInt(2)]);
        assert!(matches!(value, Value::Record(_)));

        let unnamed = [TupleElement::unnamed(crate::types::TypeDescriptor::UInt8)];
        let value = tuple_value(&unnamed, vec![Value::UInt(1)]);
        assert_eq!(value, Value::Tuple(vec![Value::UInt(1)]));
    }

    #[test]
    fn separate_calls_do_not_share_ids() {
        let body = [0x01, 0x01, b'n', 0x05, b'U', b'I', b'n', b't', b'8', 0x07];
        let first = decode(&body, WireFormat::RowBinaryWithNamesAndTypes).unwrap();
        let second = decode(&body, WireFormat::RowBinaryWithNamesAndTypes).unwrap();
        assert_eq!(first, second);
    }
}
