//! End-to-end Native decoding through the public API.

mod common;

use std::collections::BTreeMap;

use chwire::{decode, ParsedResult, Value, WireFormat};
use common::{assert_structure, error_kind, Body};

fn native(body: &[u8]) -> eyre::Result<ParsedResult> {
    decode(body, WireFormat::Native)
}

fn column_values(ty: &str, rows: u64, data: Body) -> Vec<Value> {
    let body = Body::new()
        .block(1, rows)
        .column("c", ty)
        .raw(&data.build())
        .build();
    let result = native(&body).unwrap();
    assert_structure(&result);
    assert_eq!(result.blocks().len(), 1);
    result.blocks()[0].columns[0].values.clone()
}

fn object(pairs: &[(&str, Value)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn array_offsets_rebuild_row_lengths() {
    let values = column_values(
        "Array(UInt8)",
        3,
        Body::new().u64(2).u64(3).u64(3).raw(&[10, 20, 30]),
    );
    assert_eq!(
        values,
        vec![
            Value::Array(vec![Value::UInt(10), Value::UInt(20)]),
            Value::Array(vec![Value::UInt(30)]),
            Value::Array(vec![]),
        ]
    );
}

#[test]
fn nullable_mask_precedes_every_value() {
    let values = column_values(
        "Nullable(String)",
        3,
        Body::new().raw(&[0, 1, 0]).string("").string("junk").string("z"),
    );
    assert_eq!(
        values,
        vec![Value::String(String::new()), Value::Null, Value::String("z".into())]
    );
}

#[test]
fn map_uses_array_offsets_over_key_and_value_runs() {
    let values = column_values(
        "Map(String, UInt16)",
        2,
        Body::new()
            .u64(1)
            .u64(3)
            .string("a")
            .string("b")
            .string("c")
            .u16(1)
            .u16(2)
            .u16(3),
    );
    assert_eq!(
        values[0],
        Value::Map(vec![(Value::String("a".into()), Value::UInt(1))])
    );
    match &values[1] {
        Value::Map(entries) => assert_eq!(entries.len(), 2),
        other => panic!("expected a map, got {:?}", other),
    }
}

#[test]
fn low_cardinality_dictionary_and_indices() {
    let values = column_values(
        "LowCardinality(String)",
        3,
        Body::new()
            .u64(1)
            .u64(chwire::config::LC_HAS_ADDITIONAL_KEYS)
            .u64(3)
            .string("")
            .string("red")
            .string("blue")
            .u64(3)
            .raw(&[2, 1, 2]),
    );
    let names: Vec<String> = values.iter().map(Value::to_string).collect();
    assert_eq!(names, ["blue", "red", "blue"]);
}

#[test]
fn variant_string_sorts_before_uint64() {
    let values = column_values(
        "Variant(UInt64, String)",
        3,
        Body::new()
            .u64(0)
            .raw(&[1, 0, 255])
            .string("first")
            .u64(77),
    );
    assert_eq!(
        values,
        vec![Value::UInt(77), Value::String("first".into()), Value::Null]
    );
}

#[test]
fn dynamic_column_with_shared_variant() {
    let values = column_values(
        "Dynamic",
        3,
        Body::new()
            .u64(2)
            .varint(1)
            .string("Float64")
            .u64(0)
            .raw(&[0, 1, 255])
            .f64(0.5)
            .string("\u{15}\u{2}hi"),
    );
    assert_eq!(
        values,
        vec![Value::Float64(0.5), Value::String("hi".into()), Value::Null]
    );
}

#[test]
fn json_dynamic_paths_and_shared_data_merge_per_row() {
    let values = column_values(
        "JSON",
        2,
        Body::new()
            // prefix: V2, one dynamic path `a` whose Dynamic holds Int64
            .u64(2)
            .varint(1)
            .string("a")
            .u64(2)
            .varint(1)
            .string("Int64")
            .u64(0)
            // path `a`: row 0 Int64 10, row 1 NULL
            .raw(&[0, 255])
            .i64(10)
            // shared data: row 1 has `b.c` = 'z'
            .u64(0)
            .u64(1)
            .string("b.c")
            .string("\u{15}\u{1}z"),
    );
    assert_eq!(values[0], object(&[("a", Value::Int(10))]));
    assert_eq!(
        values[1],
        object(&[("b", object(&[("c", Value::String("z".into()))]))])
    );
}

#[test]
fn json_string_mode_parses_documents() {
    let values = column_values(
        "JSON",
        2,
        Body::new().u64(1).string(r#"{"k": [1, 2]}"#).string("not json"),
    );
    assert!(matches!(values[0], Value::Object(_)));
    assert_eq!(values[1], Value::String("not json".into()));
}

#[test]
fn aggregate_states_reuse_row_rules() {
    let values = column_values(
        "AggregateFunction(count)",
        2,
        Body::new().varint(3).varint(300),
    );
    assert_eq!(values, vec![Value::UInt(3), Value::UInt(300)]);
}

#[test]
fn blocks_continue_past_zero_rows_and_stop_at_terminator() {
    let body = Body::new()
        .block(1, 0)
        .column("x", "UInt8")
        .block(1, 2)
        .column("x", "UInt8")
        .raw(&[4, 5])
        .block(0, 0)
        .build();
    let result = native(&body).unwrap();
    assert_structure(&result);
    let blocks = result.blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].row_count, 0);
    assert_eq!(blocks[1].columns[0].values, vec![Value::UInt(4), Value::UInt(5)]);
    assert!(blocks[2].is_terminator());

    let mut trailing = body.clone();
    trailing.push(0);
    assert_eq!(error_kind(native(&trailing)), "TrailingBytes");
}

#[test]
fn offsets_resolve_across_blocks() {
    let first = Body::new().block(1, 1).column("n", "UInt32").u32(1);
    let split = first.len();
    let body = first
        .block(1, 1)
        .column("n", "UInt32")
        .u32(2)
        .build();
    let result = native(&body).unwrap();
    assert_structure(&result);

    let last = result.node_at(body.len() - 1).unwrap();
    assert_eq!(last.value, Value::UInt(2));
    let counter = result.node_at(split).unwrap();
    assert_eq!(counter.label.as_deref(), Some("column_count"));
    assert!(result.node_at(body.len()).is_none());

    let column = &result.blocks()[1].columns[0].node;
    assert_eq!(result.range_of(column.id), Some(column.range));
}

#[test]
fn malformed_columns_abort_the_decode() {
    let decreasing = Body::new()
        .block(1, 2)
        .column("a", "Array(UInt8)")
        .u64(2)
        .u64(1)
        .raw(&[1, 2])
        .build();
    assert_eq!(error_kind(native(&decreasing)), "InvalidData");

    let truncated = Body::new().block(1, 3).column("a", "UInt16").u16(1).build();
    assert_eq!(error_kind(native(&truncated)), "UnexpectedEof");

    let bad_type = Body::new().block(1, 1).column("a", "Array(").build();
    assert_eq!(error_kind(native(&bad_type)), "MalformedTypeString");
}
