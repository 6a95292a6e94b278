//! # Binary Type Encoding
//!
//! Dynamic values and shared-data entries carry their type inline, encoded
//! as a one-byte `BinaryTypeIndex` followed by type-specific parameters.
//!
//! ## Index Table
//!
//! | Byte | Type | Parameters |
//! |------|------|------------|
//! | 0x00 | Nothing | - |
//! | 0x01-0x06 | UInt8 .. UInt256 | - |
//! | 0x07-0x0C | Int8 .. Int256 | - |
//! | 0x0D / 0x0E | Float32 / Float64 | - |
//! | 0x0F / 0x10 | Date / Date32 | - |
//! | 0x11 / 0x12 | DateTime / DateTime(tz) | tz string |
//! | 0x13 / 0x14 | DateTime64(P) / DateTime64(P, tz) | u8 P, tz string |
//! | 0x15 / 0x16 | String / FixedString(N) | varint N |
//! | 0x17 / 0x18 | Enum8 / Enum16 | varint n, (name, i8/i16)* |
//! | 0x19-0x1C | Decimal32 .. Decimal256 | u8 P, u8 S |
//! | 0x1D | UUID | - |
//! | 0x1E | Array(T) | T |
//! | 0x1F / 0x20 | Tuple / named Tuple | varint n, ([name], T)* |
//! | 0x22 | Interval | u8 kind |
//! | 0x23 | Nullable(T) | T |
//! | 0x26 | LowCardinality(T) | T |
//! | 0x27 | Map(K, V) | K, V |
//! | 0x28 / 0x29 | IPv4 / IPv6 | - |
//! | 0x2A | Variant | varint n, T* |
//! | 0x2B | Dynamic | u8 max_types |
//! | 0x2C | Custom | type string |
//! | 0x2D | Bool | - |
//! | 0x2F | Nested | varint n, (name, T)* |
//! | 0x30 | JSON | see below |
//! | 0x31 | BFloat16 | - |
//! | 0x32 / 0x34 | Time / Time64(P) | u8 P |
//! | 0x36 | QBit | T, varint dim |
//!
//! JSON parameters: `u8 version, varint max_dynamic_paths,
//! u8 max_dynamic_types, varint n, (path, T)*, varint n, path*,
//! varint n, regexp*`.
//!
//! 0x21 (Set), 0x24 (Function), 0x25 (AggregateFunction) and 0x2E
//! (SimpleAggregateFunction) embed serialized parameter fields that cannot
//! be skipped safely and are rejected as unsupported.

use eyre::{bail, Result};

use crate::config::MAX_NESTING_DEPTH;
use crate::encoding::ByteCursor;
use crate::error::DecodeError;
use crate::types::descriptor::{
    DecimalSpec, EnumEntry, IntervalKind, JsonSpec, TupleElement, TypeDescriptor,
};
use crate::types::parser::parse_type;

/// Reads one binary-encoded type from the cursor.
pub fn read_binary_type(cursor: &mut ByteCursor<'_>) -> Result<TypeDescriptor> {
    read_at_depth(cursor, 0)
}

fn read_at_depth(cursor: &mut ByteCursor<'_>, depth: usize) -> Result<TypeDescriptor> {
    if depth >= MAX_NESTING_DEPTH {
        bail!(DecodeError::NestingTooDeep {
            limit: MAX_NESTING_DEPTH
        });
    }
    let offset = cursor.position();
    let (index, _) = cursor.read_u8()?;

    let ty = match index {
        0x00 => TypeDescriptor::Nothing,
        0x01 => TypeDescriptor::UInt8,
        0x02 => TypeDescriptor::UInt16,
        0x03 => TypeDescriptor::UInt32,
        0x04 => TypeDescriptor::UInt64,
        0x05 => TypeDescriptor::UInt128,
        0x06 => TypeDescriptor::UInt256,
        0x07 => TypeDescriptor::Int8,
        0x08 => TypeDescriptor::Int16,
        0x09 => TypeDescriptor::Int32,
        0x0A => TypeDescriptor::Int64,
        0x0B => TypeDescriptor::Int128,
        0x0C => TypeDescriptor::Int256,
        0x0D => TypeDescriptor::Float32,
        0x0E => TypeDescriptor::Float64,
        0x0F => TypeDescriptor::Date,
        0x10 => TypeDescriptor::Date32,
        0x11 => TypeDescriptor::DateTime { timezone: None },
        0x12 => TypeDescriptor::DateTime {
            timezone: Some(read_name(cursor)?),
        },
        0x13 => TypeDescriptor::DateTime64 {
            precision: cursor.read_u8()?.0,
            timezone: None,
        },
        0x14 => {
            let (precision, _) = cursor.read_u8()?;
            TypeDescriptor::DateTime64 {
                precision,
                timezone: Some(read_name(cursor)?),
            }
        }
        0x15 => TypeDescriptor::String,
        0x16 => TypeDescriptor::FixedString(cursor.read_varint()?.0 as usize),
        0x17 => TypeDescriptor::Enum8(read_enum_entries(cursor, false)?),
        0x18 => TypeDescriptor::Enum16(read_enum_entries(cursor, true)?),
        0x19..=0x1C => {
            let (precision, _) = cursor.read_u8()?;
            let (scale, _) = cursor.read_u8()?;
            TypeDescriptor::Decimal(DecimalSpec::new(precision, scale))
        }
        0x1D => TypeDescriptor::Uuid,
        0x1E => TypeDescriptor::array(read_at_depth(cursor, depth + 1)?),
        0x1F => {
            let (count, _) = cursor.read_varint()?;
            let mut elements = Vec::new();
            for _ in 0..count {
                elements.push(TupleElement::unnamed(read_at_depth(cursor, depth + 1)?));
            }
            TypeDescriptor::Tuple(elements)
        }
        0x20 => TypeDescriptor::Tuple(read_named_elements(cursor, depth)?),
        0x22 => {
            let (kind, range) = cursor.read_u8()?;
            match IntervalKind::from_index(kind) {
                Some(kind) => TypeDescriptor::Interval(kind),
                None => bail!(DecodeError::invalid(
                    range.start,
                    format!("unknown interval kind {}", kind)
                )),
            }
        }
        0x23 => TypeDescriptor::nullable(read_at_depth(cursor, depth + 1)?),
        0x26 => TypeDescriptor::LowCardinality(Box::new(read_at_depth(cursor, depth + 1)?)),
        0x27 => {
            let key = read_at_depth(cursor, depth + 1)?;
            let value = read_at_depth(cursor, depth + 1)?;
            TypeDescriptor::Map(Box::new(key), Box::new(value))
        }
        0x28 => TypeDescriptor::IPv4,
        0x29 => TypeDescriptor::IPv6,
        0x2A => {
            let (count, _) = cursor.read_varint()?;
            let mut alternatives = Vec::new();
            for _ in 0..count {
                alternatives.push(read_at_depth(cursor, depth + 1)?);
            }
            TypeDescriptor::variant(alternatives)
        }
        0x2B => TypeDescriptor::Dynamic {
            max_types: Some(cursor.read_u8()?.0 as u64),
        },
        0x2C => {
            let (text, _) = cursor.read_utf8()?;
            parse_type(text)?
        }
        0x2D => TypeDescriptor::Bool,
        0x2F => TypeDescriptor::Nested(read_named_elements(cursor, depth)?),
        0x30 => TypeDescriptor::Json(read_json_spec(cursor, depth)?),
        0x31 => TypeDescriptor::BFloat16,
        0x32 => TypeDescriptor::Time,
        0x34 => TypeDescriptor::Time64 {
            precision: cursor.read_u8()?.0,
        },
        0x36 => {
            let element = read_at_depth(cursor, depth + 1)?;
            let (dimension, _) = cursor.read_varint()?;
            TypeDescriptor::QBit {
                element: Box::new(element),
                dimension: dimension as usize,
            }
        }
        0x21 => bail!(DecodeError::unsupported("Set", "binary type encoding")),
        0x24 => bail!(DecodeError::unsupported("Function", "binary type encoding")),
        0x25 => bail!(DecodeError::unsupported(
            "AggregateFunction",
            "binary type encoding"
        )),
        0x2E => bail!(DecodeError::unsupported(
            "SimpleAggregateFunction",
            "binary type encoding"
        )),
        other => bail!(DecodeError::UnknownType {
            name: format!("binary type index 0x{:02X} at offset {}", other, offset),
        }),
    };
    Ok(ty)
}

fn read_name(cursor: &mut ByteCursor<'_>) -> Result<String> {
    Ok(cursor.read_utf8()?.0.to_string())
}

fn read_enum_entries(cursor: &mut ByteCursor<'_>, wide: bool) -> Result<Vec<EnumEntry>> {
    let (count, _) = cursor.read_varint()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let name = read_name(cursor)?;
        let value = if wide {
            cursor.read_i16()?.0
        } else {
            cursor.read_i8()?.0 as i16
        };
        entries.push(EnumEntry { name, value });
    }
    Ok(entries)
}

fn read_named_elements(cursor: &mut ByteCursor<'_>, depth: usize) -> Result<Vec<TupleElement>> {
    let (count, _) = cursor.read_varint()?;
    let mut elements = Vec::new();
    for _ in 0..count {
        let name = read_name(cursor)?;
        elements.push(TupleElement::named(name, read_at_depth(cursor, depth + 1)?));
    }
    Ok(elements)
}

fn read_json_spec(cursor: &mut ByteCursor<'_>, depth: usize) -> Result<JsonSpec> {
    let (_version, _) = cursor.read_u8()?;
    let (max_dynamic_paths, _) = cursor.read_varint()?;
    let (max_dynamic_types, _) = cursor.read_u8()?;

    let (typed_count, _) = cursor.read_varint()?;
    let mut typed_paths = Vec::new();
    for _ in 0..typed_count {
        let path = read_name(cursor)?;
        typed_paths.push((path, read_at_depth(cursor, depth + 1)?));
    }
    typed_paths.sort_by(|a, b| a.0.cmp(&b.0));

    let (skip_count, _) = cursor.read_varint()?;
    let mut skip_paths = Vec::new();
    for _ in 0..skip_count {
        skip_paths.push(read_name(cursor)?);
    }

    let (regexp_count, _) = cursor.read_varint()?;
    let mut skip_regexps = Vec::new();
    for _ in 0..regexp_count {
        skip_regexps.push(read_name(cursor)?);
    }

    Ok(JsonSpec {
        max_dynamic_paths: Some(max_dynamic_paths),
        max_dynamic_types: Some(max_dynamic_types as u64),
        typed_paths,
        skip_paths,
        skip_regexps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<(TypeDescriptor, usize)> {
        let mut cursor = ByteCursor::new(bytes);
        let ty = read_binary_type(&mut cursor)?;
        Ok((ty, cursor.position()))
    }

    #[test]
    fn primitive_indexes() {
        assert_eq!(decode(&[0x04]).unwrap().0, TypeDescriptor::UInt64);
        assert_eq!(decode(&[0x15]).unwrap().0, TypeDescriptor::String);
        assert_eq!(decode(&[0x2D]).unwrap().0, TypeDescriptor::Bool);
    }

    #[test]
    fn array_of_nullable_string() {
        let (ty, read) = decode(&[0x1E, 0x23, 0x15]).unwrap();
        assert_eq!(ty.to_string(), "Array(Nullable(String))");
        assert_eq!(read, 3);
    }

    #[test]
    fn datetime64_with_timezone() {
        let bytes = [0x14, 0x03, 0x03, b'U', b'T', b'C'];
        let (ty, read) = decode(&bytes).unwrap();
        assert_eq!(ty.to_string(), "DateTime64(3, 'UTC')");
        assert_eq!(read, bytes.len());
    }

    #[test]
    fn enum8_reads_signed_values() {
        let bytes = [0x17, 0x01, 0x01, b'a', 0xFF];
        let (ty, _) = decode(&bytes).unwrap();
        assert_eq!(ty.to_string(), "Enum8('a' = -1)");
    }

    #[test]
    fn named_tuple_and_map() {
        let bytes = [0x20, 0x01, 0x01, b'x', 0x27, 0x15, 0x09];
        let (ty, _) = decode(&bytes).unwrap();
        assert_eq!(ty.to_string(), "Tuple(x Map(String, Int32))");
    }

    #[test]
    fn custom_type_string_is_parsed() {
        let text = b"Point";
        let mut bytes = vec![0x2C, text.len() as u8];
        bytes.extend_from_slice(text);
        assert_eq!(decode(&bytes).unwrap().0, TypeDescriptor::Point);
    }

    #[test]
    fn decimal_uses_explicit_precision() {
        let (ty, _) = decode(&[0x1A, 0x12, 0x04]).unwrap();
        assert_eq!(ty.to_string(), "Decimal(18, 4)");
    }

    #[test]
    fn unknown_index_is_unknown_type() {
        let err = decode(&[0x7F]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::UnknownType { .. })
        ));
    }

    #[test]
    fn aggregate_function_is_unsupported() {
        let err = decode(&[0x25]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn truncated_parameters_are_eof() {
        let err = decode(&[0x16]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::UnexpectedEof { .. })
        ));
    }
}
