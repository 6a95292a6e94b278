//! # RowBinaryWithNamesAndTypes Decoder
//!
//! Row-major format: a header describing the columns, then rows until the
//! buffer is exhausted. Every value is self-delimiting, so a row is decoded
//! by walking the column descriptors in order.
//!
//! ## Header Layout
//!
//! ```text
//! +----------------+------------------+------------------+
//! | varint N       | N name strings   | N type strings   |
//! +----------------+------------------+------------------+
//! ```
//!
//! Strings are `varint length` + bytes.
//!
//! ## Value Rules
//!
//! | Type | Wire shape |
//! |------|------------|
//! | Nullable(T) | u8 flag (non-zero = NULL), then T when present |
//! | Array(T), QBit(T, d) | varint length, then that many T |
//! | Map(K, V) | varint length, then (K, V) pairs |
//! | Tuple(...) | elements back to back |
//! | LowCardinality(T) | exactly T |
//! | Variant(...) | u8 discriminator (0xFF = NULL), then the selected type |
//! | Dynamic | binary type encoding, then a value of that type |
//! | JSON | varint path count, then (path string, value) pairs |
//! | Nested(...) | Array(Tuple(...)) |
//! | Geo shapes, Interval, SimpleAggregateFunction | their underlying type |
//! | Nothing | zero bytes |
//!
//! [`RowReader`] holds these rules. The Native decoder reuses it for the
//! places where Native embeds row-encoded values: aggregate states,
//! SharedVariant values and JSON shared data.

use std::collections::BTreeMap;

use eyre::{bail, Result, WrapErr};
use tracing::{debug, trace};

use crate::config::VARIANT_NULL_DISCRIMINATOR;
use crate::decoder::scalar::read_scalar;
use crate::decoder::{
    column_definition, insert_json_path, read_length_leaf, read_string_leaf, read_varint_leaf,
    tuple_value, DecodeContext, FormatDecoder, WireFormat,
};
use crate::encoding::ByteCursor;
use crate::error::DecodeError;
use crate::tree::{ByteRange, Header, Node, NodeId, ParsedResult, Payload, Row, Value};
use crate::types::{
    read_binary_type, AggregateSpec, DecimalSpec, JsonSpec, TupleElement, TypeDescriptor,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RowBinaryDecoder;

impl FormatDecoder for RowBinaryDecoder {
    fn format(&self) -> WireFormat {
        WireFormat::RowBinaryWithNamesAndTypes
    }

    fn decode(&self, buf: &[u8]) -> Result<ParsedResult> {
        let mut ctx = DecodeContext::new();
        let mut cursor = ByteCursor::new(buf);

        let header = read_header(&mut ctx, &mut cursor).wrap_err("failed to read header")?;
        debug!(columns = header.columns.len(), "read RowBinary header");

        if header.columns.is_empty() && !cursor.is_empty() {
            bail!(DecodeError::TrailingBytes {
                offset: cursor.position()
            });
        }

        let mut rows = Vec::new();
        while !cursor.is_empty() {
            let index = rows.len();
            let row = read_row(&mut ctx, &mut cursor, &header, index)
                .wrap_err_with(|| format!("failed to decode row {}", index))?;
            // Rows of zero-width columns cannot account for the bytes left.
            if row.range().is_empty() {
                bail!(DecodeError::TrailingBytes {
                    offset: cursor.position()
                });
            }
            trace!(row = index, range = %row.range(), "decoded row");
            rows.push(row);
        }

        debug!(rows = rows.len(), nodes = ctx.nodes_created(), "decoded RowBinary body");
        Ok(ParsedResult {
            format: WireFormat::RowBinaryWithNamesAndTypes,
            total_len: buf.len(),
            payload: Payload::Rows { header, rows },
        })
    }
}

fn read_header(ctx: &mut DecodeContext, cursor: &mut ByteCursor<'_>) -> Result<Header> {
    let id = ctx.reserve();
    let start = cursor.position();
    let (count, count_node) = read_varint_leaf(ctx, cursor, "column_count")?;

    let mut children = vec![count_node];
    let mut names = Vec::new();
    for _ in 0..count {
        let (name, node) = read_string_leaf(ctx, cursor, "name")?;
        names.push((name, node.range));
        children.push(node);
    }

    let mut columns = Vec::with_capacity(names.len());
    for (name, name_range) in names {
        let (type_string, node) = read_string_leaf(ctx, cursor, "type")?;
        let type_range = node.range;
        children.push(node);
        columns.push(column_definition(name, name_range, type_string, type_range)?);
    }

    let summary = columns
        .iter()
        .map(|c| (c.name.clone(), Value::String(c.type_string.clone())))
        .collect();
    let node = Node::container(
        id,
        "Header",
        cursor.since(start),
        Value::Record(summary),
        children,
    );
    Ok(Header { node, columns })
}

fn read_row(
    ctx: &mut DecodeContext,
    cursor: &mut ByteCursor<'_>,
    header: &Header,
    index: usize,
) -> Result<Row> {
    let id = ctx.reserve();
    let start = cursor.position();
    let mut reader = RowReader::new(cursor, ctx, WireFormat::RowBinaryWithNamesAndTypes);

    let mut children = Vec::with_capacity(header.columns.len());
    let mut fields = Vec::with_capacity(header.columns.len());
    for column in &header.columns {
        let node = reader
            .value(&column.descriptor)
            .wrap_err_with(|| format!("column `{}` ({})", column.name, column.type_string))?
            .with_label(column.name.clone());
        fields.push((column.name.clone(), node.value.clone()));
        children.push(node);
    }

    let node = Node::container(
        id,
        format!("Row {}", index),
        cursor.since(start),
        Value::Record(fields),
        children,
    );
    Ok(Row { index, node })
}

/// Decodes row-encoded values into nodes.
pub(crate) struct RowReader<'a, 'r> {
    cursor: &'r mut ByteCursor<'a>,
    ctx: &'r mut DecodeContext,
    format: WireFormat,
}

impl<'a, 'r> RowReader<'a, 'r> {
    pub(crate) fn new(
        cursor: &'r mut ByteCursor<'a>,
        ctx: &'r mut DecodeContext,
        format: WireFormat,
    ) -> Self {
        Self {
            cursor,
            ctx,
            format,
        }
    }

    pub(crate) fn value(&mut self, ty: &TypeDescriptor) -> Result<Node> {
        self.ctx.enter()?;
        let result = self.dispatch(ty);
        self.ctx.leave();
        result
    }

    fn dispatch(&mut self, ty: &TypeDescriptor) -> Result<Node> {
        use TypeDescriptor as T;

        // Types whose bytes are exactly another type's keep their declared
        // name on the node but do not get a node of their own.
        let alias = match ty {
            T::LowCardinality(inner) => Some((**inner).clone()),
            T::QBit { element, .. } => Some(TypeDescriptor::array((**element).clone())),
            _ => ty.desugar(),
        };
        if let Some(underlying) = alias {
            return Ok(self.value(&underlying)?.with_type_name(ty.to_string()));
        }

        let id = self.ctx.reserve();
        let start = self.cursor.position();
        match ty {
            T::UInt8
            | T::UInt16
            | T::UInt32
            | T::UInt64
            | T::UInt128
            | T::UInt256
            | T::Int8
            | T::Int16
            | T::Int32
            | T::Int64
            | T::Int128
            | T::Int256
            | T::Float32
            | T::Float64
            | T::BFloat16
            | T::Bool
            | T::String
            | T::FixedString(_)
            | T::Date
            | T::Date32
            | T::DateTime { .. }
            | T::DateTime64 { .. }
            | T::Time
            | T::Time64 { .. }
            | T::Uuid
            | T::IPv4
            | T::IPv6
            | T::Decimal(_)
            | T::Enum8(_)
            | T::Enum16(_)
            | T::Interval(_) => match read_scalar(self.cursor, ty)? {
                Some(scalar) => Ok(scalar.into_node(id, ty.to_string())),
                None => bail!(DecodeError::unsupported(ty, self.format.name())),
            },
            T::Nothing => Ok(Node::leaf(id, "Nothing", self.cursor.here(), Value::Null)),
            T::Nullable(inner) => self.nullable(id, start, ty, inner),
            T::Array(inner) => self.array(id, start, ty, inner),
            T::Map(key, value) => self.map(id, start, ty, key, value),
            T::Tuple(elements) => self.tuple(id, start, ty, elements),
            T::Variant(alternatives) => self.variant(id, start, ty, alternatives),
            T::Dynamic { .. } => self.dynamic_body(id, start, &ty.to_string()),
            T::Json(spec) => self.json(id, start, ty, spec),
            T::AggregateFunction(spec) => self.aggregate_state(id, start, ty, spec),
            T::LowCardinality(_)
            | T::QBit { .. }
            | T::Nested(_)
            | T::Point
            | T::Ring
            | T::LineString
            | T::Polygon
            | T::MultiLineString
            | T::MultiPolygon
            | T::Geometry
            | T::SimpleAggregateFunction { .. } => {
                bail!(DecodeError::unsupported(ty, self.format.name()))
            }
        }
    }

    fn nullable(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        inner: &TypeDescriptor,
    ) -> Result<Node> {
        let (flag, range) = self.cursor.read_u8()?;
        let flag_node = self
            .ctx
            .leaf("UInt8", range, Value::UInt(flag as u64))
            .with_label("null_flag");
        if flag != 0 {
            return Ok(Node::container(
                id,
                ty.to_string(),
                self.cursor.since(start),
                Value::Null,
                vec![flag_node],
            ));
        }
        let value_node = self.value(inner)?;
        Ok(wrap_single(
            id,
            ty.to_string(),
            self.cursor.since(start),
            flag_node,
            value_node,
        ))
    }

    fn array(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        inner: &TypeDescriptor,
    ) -> Result<Node> {
        let (len, len_node) = read_length_leaf(self.ctx, self.cursor, "length")?;
        let mut children = Vec::with_capacity(len + 1);
        let mut values = Vec::with_capacity(len);
        children.push(len_node);
        for _ in 0..len {
            let node = self.value(inner)?;
            values.push(node.value.clone());
            children.push(node);
        }
        Ok(Node::container(
            id,
            ty.to_string(),
            self.cursor.since(start),
            Value::Array(values),
            children,
        ))
    }

    fn map(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        key: &TypeDescriptor,
        value: &TypeDescriptor,
    ) -> Result<Node> {
        let (len, len_node) = read_length_leaf(self.ctx, self.cursor, "length")?;
        let entry_type = format!("Tuple({}, {})", key, value);
        let mut children = Vec::with_capacity(len + 1);
        let mut entries = Vec::with_capacity(len);
        children.push(len_node);
        for _ in 0..len {
            let entry_id = self.ctx.reserve();
            let entry_start = self.cursor.position();
            let key_node = self.value(key)?.with_label("key");
            let value_node = self.value(value)?.with_label("value");
            let pair = (key_node.value.clone(), value_node.value.clone());
            let display = format!("{}: {}", pair.0.to_nested_string(), pair.1.to_nested_string());
            children.push(
                Node::container(
                    entry_id,
                    entry_type.clone(),
                    self.cursor.since(entry_start),
                    Value::Tuple(vec![pair.0.clone(), pair.1.clone()]),
                    vec![key_node, value_node],
                )
                .with_display(display),
            );
            entries.push(pair);
        }
        Ok(Node::container(
            id,
            ty.to_string(),
            self.cursor.since(start),
            Value::Map(entries),
            children,
        ))
    }

    fn tuple(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        elements: &[TupleElement],
    ) -> Result<Node> {
        let mut children = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let label = element
                .name
                .clone()
                .unwrap_or_else(|| (index + 1).to_string());
            children.push(self.value(&element.ty)?.with_label(label));
        }
        let values = children.iter().map(|c| c.value.clone()).collect();
        Ok(Node::container(
            id,
            ty.to_string(),
            self.cursor.since(start),
            tuple_value(elements, values),
            children,
        ))
    }

    fn variant(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        alternatives: &[TypeDescriptor],
    ) -> Result<Node> {
        let (discriminator, range) = self.cursor.read_u8()?;
        let disc_node = self
            .ctx
            .leaf("UInt8", range, Value::UInt(discriminator as u64))
            .with_label("discriminator");
        if discriminator == VARIANT_NULL_DISCRIMINATOR {
            return Ok(Node::container(
                id,
                ty.to_string(),
                self.cursor.since(start),
                Value::Null,
                vec![disc_node],
            ));
        }
        let Some(selected) = alternatives.get(discriminator as usize) else {
            bail!(DecodeError::UnknownDiscriminant {
                offset: range.start,
                discriminant: discriminator as u64,
                type_name: ty.to_string(),
            });
        };
        let value_node = self.value(selected)?;
        Ok(wrap_single(
            id,
            ty.to_string(),
            self.cursor.since(start),
            disc_node,
            value_node,
        ))
    }

    /// Reads one binary-typed value: the type encoding, then the value.
    pub(crate) fn dynamic(&mut self, type_name: &str) -> Result<Node> {
        self.ctx.enter()?;
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let result = self.dynamic_body(id, start, type_name);
        self.ctx.leave();
        result
    }

    fn dynamic_body(&mut self, id: NodeId, start: usize, type_name: &str) -> Result<Node> {
        let type_start = self.cursor.position();
        let inner = read_binary_type(self.cursor)?;
        let type_node = self
            .ctx
            .leaf(
                "BinaryType",
                self.cursor.since(type_start),
                Value::String(inner.to_string()),
            )
            .with_label("type");
        if inner == TypeDescriptor::Nothing {
            return Ok(Node::container(
                id,
                type_name,
                self.cursor.since(start),
                Value::Null,
                vec![type_node],
            ));
        }
        let value_node = self.value(&inner)?;
        Ok(wrap_single(
            id,
            type_name,
            self.cursor.since(start),
            type_node,
            value_node,
        ))
    }

    fn json(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        spec: &JsonSpec,
    ) -> Result<Node> {
        let (count, count_node) = read_length_leaf(self.ctx, self.cursor, "path_count")?;
        let mut children = Vec::with_capacity(count + 1);
        let mut object = BTreeMap::new();
        children.push(count_node);

        for _ in 0..count {
            let pair_id = self.ctx.reserve();
            let pair_start = self.cursor.position();
            let (path, path_node) = read_string_leaf(self.ctx, self.cursor, "path")?;
            let value_node = match spec.typed_path(&path) {
                Some(declared) => {
                    let node = self.value(declared)?;
                    insert_json_path(&mut object, &path, node.value.clone());
                    node
                }
                None => {
                    let node = self.dynamic("Dynamic")?;
                    if !node.value.is_null() {
                        insert_json_path(&mut object, &path, node.value.clone());
                    }
                    node
                }
            };
            let pair = wrap_single(
                pair_id,
                "JSONPath",
                self.cursor.since(pair_start),
                path_node,
                value_node.with_label("value"),
            );
            children.push(pair.with_label(path));
        }

        Ok(Node::container(
            id,
            ty.to_string(),
            self.cursor.since(start),
            Value::Object(object),
            children,
        ))
    }

    /// Serialized aggregate-function state, as stored by `-State` combinators.
    fn aggregate_state(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        spec: &AggregateSpec,
    ) -> Result<Node> {
        let format = self.format.name();
        let unsupported = || DecodeError::unsupported(ty, format);
        let argument = spec.arguments.first().map(|a| a.non_nullable());
        let mut children = Vec::new();

        let value = match (spec.function.as_str(), argument) {
            ("count", _) => {
                let (count, node) = read_varint_leaf(self.ctx, self.cursor, "count")?;
                children.push(node);
                Value::UInt(count)
            }
            ("sum", Some(argument)) => {
                let accumulator = sum_accumulator(argument).ok_or_else(unsupported)?;
                let node = self.value(&accumulator)?.with_label("sum");
                let value = node.value.clone();
                children.push(node);
                value
            }
            ("avg", Some(argument)) => {
                let accumulator = sum_accumulator(argument).ok_or_else(unsupported)?;
                let sum = self.value(&accumulator)?.with_label("numerator");
                let (count, count_node) = read_varint_leaf(self.ctx, self.cursor, "denominator")?;
                let value = Value::Record(vec![
                    ("sum".to_string(), sum.value.clone()),
                    ("count".to_string(), Value::UInt(count)),
                ]);
                children.push(sum);
                children.push(count_node);
                value
            }
            ("min" | "max" | "any" | "anyLast", Some(argument))
                if argument.fixed_width().is_some() =>
            {
                let (present, range) = self.cursor.read_u8()?;
                children.push(
                    self.ctx
                        .leaf("UInt8", range, Value::UInt(present as u64))
                        .with_label("has_value"),
                );
                if present != 0 {
                    let node = self.value(argument)?.with_label("value");
                    let value = node.value.clone();
                    children.push(node);
                    value
                } else {
                    Value::Null
                }
            }
            _ => bail!(unsupported()),
        };

        Ok(Node::container(
            id,
            ty.to_string(),
            self.cursor.since(start),
            value,
            children,
        ))
    }
}

/// Container around a structural leaf and the value it introduces; takes
/// the value's logical value and display.
fn wrap_single(
    id: NodeId,
    type_name: impl Into<String>,
    range: ByteRange,
    marker: Node,
    value_node: Node,
) -> Node {
    let value = value_node.value.clone();
    let display = value_node.display.clone();
    Node::container(id, type_name, range, value, vec![marker, value_node]).with_display(display)
}

/// Accumulator type `sum`/`avg` states store for an argument type.
fn sum_accumulator(argument: &TypeDescriptor) -> Option<TypeDescriptor> {
    use TypeDescriptor as T;
    let accumulator = match argument {
        T::UInt8 | T::UInt16 | T::UInt32 | T::UInt64 | T::Bool => T::UInt64,
        T::UInt128 => T::UInt128,
        T::UInt256 => T::UInt256,
        T::Int8 | T::Int16 | T::Int32 | T::Int64 => T::Int64,
        T::Int128 => T::Int128,
        T::Int256 => T::Int256,
        T::Float32 | T::Float64 | T::BFloat16 => T::Float64,
        T::Decimal(spec) if spec.width() <= 16 => T::Decimal(DecimalSpec::sized(128, spec.scale)),
        T::Decimal(spec) => T::Decimal(DecimalSpec::sized(256, spec.scale)),
        _ => return None,
    };
    Some(accumulator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(columns: &[(&str, &str)]) -> Vec<u8> {
        let mut out = vec![columns.len() as u8];
        for (name, _) in columns {
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
        }
        for (_, ty) in columns {
            out.push(ty.len() as u8);
            out.extend_from_slice(ty.as_bytes());
        }
        out
    }

    fn decode_single(ty: &str, row: &[u8]) -> Result<ParsedResult> {
        let mut buf = header(&[("c", ty)]);
        buf.extend_from_slice(row);
        RowBinaryDecoder.decode(&buf)
    }

    fn single_value(ty: &str, row: &[u8]) -> Value {
        let result = decode_single(ty, row).unwrap();
        assert_eq!(result.rows().len(), 1);
        result.rows()[0].values()[0].value.clone()
    }

    fn error_kind(result: Result<ParsedResult>) -> &'static str {
        let err = result.unwrap_err();
        err.downcast_ref::<DecodeError>()
            .map(|e| e.kind())
            .unwrap_or("other")
    }

    #[test]
    fn header_then_num_and_str_row() {
        let mut buf = header(&[("num", "UInt32"), ("str", "String")]);
        buf.extend_from_slice(&[0x2a, 0x00, 0x00, 0x00]);
        buf.extend_from_slice(&[0x05, b'h', b'e', b'l', b'l', b'o']);

        let result = RowBinaryDecoder.decode(&buf).unwrap();
        let row = &result.rows()[0];
        assert_eq!(row.get("num").unwrap().value, Value::UInt(42));
        assert_eq!(
            row.get("str").unwrap().value,
            Value::String("hello".into())
        );
        assert_eq!(row.range().end, buf.len());
    }

    #[test]
    fn header_only_body_has_no_rows() {
        let buf = header(&[("a", "UInt8")]);
        let result = RowBinaryDecoder.decode(&buf).unwrap();
        assert!(result.rows().is_empty());
        assert_eq!(result.columns()[0].name, "a");
    }

    #[test]
    fn zero_columns_with_trailing_bytes_fail() {
        assert_eq!(
            error_kind(RowBinaryDecoder.decode(&[0x00, 0x01])),
            "TrailingBytes"
        );
    }

    #[test]
    fn zero_width_row_with_trailing_bytes_fails() {
        assert_eq!(error_kind(decode_single("Tuple()", &[0x00])), "TrailingBytes");
        assert_eq!(error_kind(decode_single("Nothing", &[0x07])), "TrailingBytes");
        let result = decode_single("Tuple()", &[]).unwrap();
        assert!(result.rows().is_empty());
    }

    #[test]
    fn truncated_row_is_eof() {
        assert_eq!(error_kind(decode_single("UInt32", &[1, 2])), "UnexpectedEof");
    }

    #[test]
    fn bad_type_string_fails_header() {
        assert_eq!(
            error_kind(decode_single("Map(String UInt8)", &[])),
            "MalformedTypeString"
        );
    }

    #[test]
    fn nullable_array_keeps_empty_string_apart_from_null() {
        let value = single_value("Array(Nullable(String))", &[0x02, 0x00, 0x00, 0x01]);
        assert_eq!(
            value,
            Value::Array(vec![Value::String(String::new()), Value::Null])
        );
    }

    #[test]
    fn map_reads_key_value_pairs() {
        let value = single_value("Map(String, UInt8)", &[0x01, 0x01, b'k', 0x09]);
        assert_eq!(
            value,
            Value::Map(vec![(Value::String("k".into()), Value::UInt(9))])
        );
    }

    #[test]
    fn named_tuple_becomes_record() {
        let value = single_value("Tuple(a UInt8, b Int8)", &[0x01, 0xFF]);
        assert_eq!(
            value,
            Value::Record(vec![
                ("a".into(), Value::UInt(1)),
                ("b".into(), Value::Int(-1)),
            ])
        );
    }

    #[test]
    fn variant_discriminator_zero_is_string() {
        let value = single_value("Variant(UInt64, String)", &[0x00, 0x02, b'h', b'i']);
        assert_eq!(value, Value::String("hi".into()));
        let value = single_value("Variant(UInt64, String)", &[0xFF]);
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn unknown_variant_discriminator_is_fatal() {
        assert_eq!(
            error_kind(decode_single("Variant(UInt64, String)", &[0x07])),
            "UnknownDiscriminant"
        );
    }

    #[test]
    fn low_cardinality_is_transparent() {
        let result = decode_single("LowCardinality(String)", &[0x01, b'x']).unwrap();
        let node = &result.rows()[0].values()[0];
        assert_eq!(node.type_name, "LowCardinality(String)");
        assert_eq!(node.value, Value::String("x".into()));
        assert!(!node.is_container());
    }

    #[test]
    fn dynamic_reads_binary_type_then_value() {
        // 0x1E Array, 0x02 UInt16 -> Array(UInt16) [1, 2]
        let value = single_value("Dynamic", &[0x1E, 0x02, 0x02, 0x01, 0x00, 0x02, 0x00]);
        assert_eq!(value, Value::Array(vec![Value::UInt(1), Value::UInt(2)]));
        assert_eq!(single_value("Dynamic", &[0x00]), Value::Null);
    }

    #[test]
    fn dynamic_tuple_has_no_extra_nesting() {
        // Tuple(UInt8, String) = (5, 'a')
        let result = decode_single("Dynamic", &[0x1F, 0x02, 0x01, 0x15, 0x05, 0x01, b'a']).unwrap();
        let node = &result.rows()[0].values()[0];
        assert_eq!(
            node.value,
            Value::Tuple(vec![Value::UInt(5), Value::String("a".into())])
        );
        let inner = &node.children()[1];
        assert_eq!(inner.type_name, "Tuple(UInt8, String)");
        assert_eq!(inner.children().len(), 2);
    }

    #[test]
    fn json_merges_dotted_paths() {
        let row = [
            0x02, // two paths
            0x03, b'a', b'.', b'b', 0x0A, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, // a.b: Int64 7
            0x01, b'c', 0x15, 0x01, b'z', // c: String 'z'
        ];
        let value = single_value("JSON", &row);
        let mut inner = BTreeMap::new();
        inner.insert("b".to_string(), Value::Int(7));
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Value::Object(inner));
        expected.insert("c".to_string(), Value::String("z".into()));
        assert_eq!(value, Value::Object(expected));
    }

    #[test]
    fn json_typed_path_uses_declared_type() {
        let row = [0x01, 0x01, b'n', 0x2A, 0x00];
        let value = single_value("JSON(n UInt16)", &row);
        let mut expected = BTreeMap::new();
        expected.insert("n".to_string(), Value::UInt(42));
        assert_eq!(value, Value::Object(expected));
    }

    #[test]
    fn nested_rows_are_records() {
        let value = single_value("Nested(x UInt8, y String)", &[0x01, 0x03, 0x01, b'q']);
        assert_eq!(
            value,
            Value::Array(vec![Value::Record(vec![
                ("x".into(), Value::UInt(3)),
                ("y".into(), Value::String("q".into())),
            ])])
        );
    }

    #[test]
    fn point_is_two_floats() {
        let mut row = 1.5f64.to_le_bytes().to_vec();
        row.extend_from_slice(&(-2.0f64).to_le_bytes());
        let result = decode_single("Point", &row).unwrap();
        let node = &result.rows()[0].values()[0];
        assert_eq!(node.type_name, "Point");
        assert_eq!(
            node.value,
            Value::Tuple(vec![Value::Float64(1.5), Value::Float64(-2.0)])
        );
    }

    #[test]
    fn aggregate_states() {
        assert_eq!(
            single_value("AggregateFunction(count)", &[0x05]),
            Value::UInt(5)
        );
        let mut row = 10u64.to_le_bytes().to_vec();
        assert_eq!(
            single_value("AggregateFunction(sum, UInt8)", &row),
            Value::UInt(10)
        );
        row.push(0x04);
        assert_eq!(
            single_value("AggregateFunction(avg, UInt32)", &row),
            Value::Record(vec![
                ("sum".into(), Value::UInt(10)),
                ("count".into(), Value::UInt(4)),
            ])
        );
        assert_eq!(
            single_value("AggregateFunction(max, Int16)", &[0x01, 0xFE, 0xFF]),
            Value::Int(-2)
        );
        assert_eq!(
            single_value("AggregateFunction(min, Int16)", &[0x00]),
            Value::Null
        );
    }

    #[test]
    fn unknown_aggregate_is_unsupported() {
        assert_eq!(
            error_kind(decode_single("AggregateFunction(uniq, UInt64)", &[0x00])),
            "UnsupportedType"
        );
    }

    #[test]
    fn nothing_consumes_no_bytes() {
        let value = single_value("Nullable(Nothing)", &[0x01]);
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn oversized_array_length_is_eof() {
        assert_eq!(
            error_kind(decode_single("Array(UInt8)", &[0xFF, 0xFF, 0x03])),
            "UnexpectedEof"
        );
    }
}
