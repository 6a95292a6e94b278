//! End-to-end RowBinaryWithNamesAndTypes decoding through the public API.

mod common;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chwire::{decode, Value, WireFormat};
use common::{assert_structure, error_kind, Body};
use num_bigint::BigInt;

fn rowbinary(body: &[u8]) -> eyre::Result<chwire::ParsedResult> {
    decode(body, WireFormat::RowBinaryWithNamesAndTypes)
}

fn single(ty: &str, row: Body) -> Value {
    let body = Body::new().header(&[("c", ty)]).raw(&row.build()).build();
    let result = rowbinary(&body).unwrap();
    assert_structure(&result);
    assert_eq!(result.rows().len(), 1, "{} should decode to one row", ty);
    result.rows()[0].values()[0].value.clone()
}

#[test]
fn num_and_str_row_decodes_to_42_and_hello() {
    let body = Body::new()
        .header(&[("num", "UInt32"), ("str", "String")])
        .raw(&[0x2a, 0x00, 0x00, 0x00])
        .raw(&[0x05, 0x68, 0x65, 0x6c, 0x6c, 0x6f])
        .build();

    let result = rowbinary(&body).unwrap();
    assert_structure(&result);

    let header = result.header().unwrap();
    assert_eq!(header.columns[0].name, "num");
    assert_eq!(header.columns[1].type_string, "String");

    let row = &result.rows()[0];
    assert_eq!(row.get("num").unwrap().value, Value::UInt(42));
    assert_eq!(row.get("str").unwrap().display, "hello");
    assert_eq!(row.get("str").unwrap().range.end, body.len());
}

#[test]
fn rows_repeat_until_the_buffer_ends() {
    let body = Body::new()
        .header(&[("n", "UInt16")])
        .u16(1)
        .u16(2)
        .u16(3)
        .build();
    let result = rowbinary(&body).unwrap();
    assert_structure(&result);

    let values: Vec<Value> = result
        .rows()
        .iter()
        .map(|r| r.values()[0].value.clone())
        .collect();
    assert_eq!(values, vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]);
    assert_eq!(result.rows()[2].index, 2);
}

#[test]
fn uint64_max_reproduces_every_digit() {
    let value = single("UInt64", Body::new().u64(u64::MAX));
    assert_eq!(value, Value::UInt(u64::MAX));
    assert_eq!(value.to_string(), "18446744073709551615");
}

#[test]
fn wide_integers_apply_sign_only_when_signed() {
    let all_ones = [0xFFu8; 32];
    let unsigned_max = (BigInt::from(1) << 256) - 1;
    assert_eq!(
        single("UInt256", Body::new().raw(&all_ones)),
        Value::BigInt(unsigned_max)
    );
    assert_eq!(
        single("Int256", Body::new().raw(&all_ones)),
        Value::BigInt(BigInt::from(-1))
    );

    let mut most_negative = [0u8; 16];
    most_negative[15] = 0x80;
    assert_eq!(
        single("Int128", Body::new().raw(&most_negative)),
        Value::BigInt(-(BigInt::from(1i32) << 127usize))
    );
    assert_eq!(
        single("UInt128", Body::new().raw(&most_negative)),
        Value::BigInt(BigInt::from(1) << 127)
    );
}

#[test]
fn decimal128_keeps_all_digits() {
    let raw = (-1_234_567_890_123_456_789_012i128).to_le_bytes();
    let value = single("Decimal(38, 2)", Body::new().raw(&raw));
    assert_eq!(value.to_string(), "-12345678901234567890.12");
}

#[test]
fn array_of_nullable_strings_keeps_empty_apart_from_null() {
    let value = single(
        "Array(Nullable(String))",
        Body::new().varint(2).u8(0).string("").u8(1),
    );
    assert_eq!(
        value,
        Value::Array(vec![Value::String(String::new()), Value::Null])
    );
}

#[test]
fn variant_discriminators_follow_alphabetical_order() {
    for declared in ["Variant(String, UInt64)", "Variant(UInt64, String)"] {
        let value = single(declared, Body::new().u8(0).string("s"));
        assert_eq!(value, Value::String("s".into()), "{}", declared);
        let value = single(declared, Body::new().u8(1).u64(9));
        assert_eq!(value, Value::UInt(9), "{}", declared);
    }
}

#[test]
fn negative_enum8_values_resolve_to_names() {
    let value = single("Enum8('down' = -1, 'up' = 1)", Body::new().u8(0xFF));
    assert_eq!(value.to_string(), "down");
}

#[test]
fn low_cardinality_nullable_reads_like_nullable() {
    let value = single("LowCardinality(Nullable(String))", Body::new().u8(0).string("a"));
    assert_eq!(value, Value::String("a".into()));
}

#[test]
fn ring_is_an_array_of_points() {
    let value = single(
        "Ring",
        Body::new().varint(2).f64(0.0).f64(1.0).f64(2.0).f64(3.0),
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Tuple(vec![Value::Float64(0.0), Value::Float64(1.0)]),
            Value::Tuple(vec![Value::Float64(2.0), Value::Float64(3.0)]),
        ])
    );
}

#[test]
fn dynamic_array_of_arrays_has_no_extra_level() {
    // Array(Array(UInt8)) = [[1], [2, 3]]
    let value = single(
        "Dynamic",
        Body::new()
            .raw(&[0x1E, 0x1E, 0x01])
            .varint(2)
            .varint(1)
            .u8(1)
            .varint(2)
            .u8(2)
            .u8(3),
    );
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Array(vec![Value::UInt(1)]),
            Value::Array(vec![Value::UInt(2), Value::UInt(3)]),
        ])
    );
}

#[test]
fn dynamic_with_custom_type_string() {
    let value = single(
        "Dynamic",
        Body::new().u8(0x2C).string("Decimal(9, 3)").i32(-1500),
    );
    assert_eq!(value.to_string(), "-1.500");
}

#[test]
fn map_entries_are_located_by_offset() {
    let body = Body::new()
        .header(&[("m", "Map(String, UInt8)")])
        .varint(1)
        .string("key")
        .u8(7)
        .build();
    let result = rowbinary(&body).unwrap();
    assert_structure(&result);

    let last = body.len() - 1;
    let node = result.node_at(last).unwrap();
    assert_eq!(node.value, Value::UInt(7));
    assert_eq!(node.label.as_deref(), Some("value"));

    let map = &result.rows()[0].values()[0];
    assert_eq!(result.range_of(map.id), Some(map.range));
}

#[test]
fn structural_errors_abort_the_decode() {
    assert_eq!(error_kind(rowbinary(&[0xFF; 8])), "VarintOverflow");

    let unknown = Body::new().header(&[("x", "Foo")]).build();
    assert_eq!(error_kind(rowbinary(&unknown)), "UnknownType");

    let deep = format!("{}UInt8{}", "Array(".repeat(100), ")".repeat(100));
    let nested = Body::new().header(&[("x", &deep)]).build();
    assert_eq!(error_kind(rowbinary(&nested)), "NestingTooDeep");

    let truncated = Body::new().header(&[("x", "UInt64")]).u32(1).build();
    assert_eq!(error_kind(rowbinary(&truncated)), "UnexpectedEof");
}

#[test]
fn zero_width_columns_cannot_absorb_trailing_bytes() {
    for ty in ["Tuple()", "Nothing"] {
        let body = Body::new().header(&[("t", ty)]).u8(0).build();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(error_kind(rowbinary(&body)));
        });
        let kind = rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap_or_else(|_| panic!("{} body did not finish decoding", ty));
        assert_eq!(kind, "TrailingBytes", "{}", ty);
    }

    let header_only = Body::new().header(&[("t", "Tuple()")]).build();
    assert!(rowbinary(&header_only).unwrap().rows().is_empty());
}

#[test]
fn decoding_is_deterministic() {
    let body = Body::new()
        .header(&[("a", "Array(Tuple(UInt8, String))"), ("j", "JSON")])
        .varint(1)
        .u8(5)
        .string("x")
        .varint(1)
        .string("k")
        .u8(0x15)
        .string("v")
        .build();
    let first = rowbinary(&body).unwrap();
    let second = rowbinary(&body).unwrap();
    assert_structure(&first);
    assert_eq!(first, second);
}
