//! Fuzz testing for the wire format decoders.
//!
//! Feeds arbitrary bodies to both decoders, optionally behind a valid
//! header built from an arbitrary column type, and checks that decoding
//! never panics and that every successful decode tiles its buffer.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use chwire::{decode, ParsedResult, WireFormat};

#[derive(Debug, Arbitrary)]
struct DecoderInput {
    native: bool,
    column_type: Option<FuzzType>,
    rows: u8,
    data: Vec<u8>,
}

#[derive(Debug, Arbitrary, Clone, Copy)]
enum FuzzType {
    UInt8,
    Int256,
    String,
    NullableString,
    ArrayUInt16,
    MapStringInt32,
    LowCardinalityString,
    Variant,
    Dynamic,
    Json,
    Decimal,
    DateTime64,
    Enum8,
    Ring,
    QBit,
}

impl FuzzType {
    fn name(self) -> &'static str {
        match self {
            FuzzType::UInt8 => "UInt8",
            FuzzType::Int256 => "Int256",
            FuzzType::String => "String",
            FuzzType::NullableString => "Nullable(String)",
            FuzzType::ArrayUInt16 => "Array(UInt16)",
            FuzzType::MapStringInt32 => "Map(String, Int32)",
            FuzzType::LowCardinalityString => "LowCardinality(Nullable(String))",
            FuzzType::Variant => "Variant(String, UInt64, Array(UInt8))",
            FuzzType::Dynamic => "Dynamic",
            FuzzType::Json => "JSON(a UInt8)",
            FuzzType::Decimal => "Decimal(40, 5)",
            FuzzType::DateTime64 => "DateTime64(6, 'Europe/Berlin')",
            FuzzType::Enum8 => "Enum8('a' = -1, 'b' = 1)",
            FuzzType::Ring => "Ring",
            FuzzType::QBit => "QBit(Float32, 3)",
        }
    }
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

fn build(input: &DecoderInput) -> Vec<u8> {
    let Some(ty) = input.column_type else {
        return input.data.clone();
    };
    let mut out = Vec::new();
    if input.native {
        out.push(1);
        out.push(input.rows & 0x7F);
        push_string(&mut out, "c");
        push_string(&mut out, ty.name());
    } else {
        out.push(1);
        push_string(&mut out, "c");
        push_string(&mut out, ty.name());
    }
    out.extend_from_slice(&input.data);
    out
}

fn check_tiling(result: &ParsedResult) {
    let mut expected = 0;
    for leaf in result.leaves() {
        if leaf.range.is_empty() {
            continue;
        }
        assert_eq!(leaf.range.start, expected, "leaf #{} breaks tiling", leaf.id);
        expected = leaf.range.end;
    }
    assert_eq!(expected, result.total_len);
}

fuzz_target!(|input: DecoderInput| {
    let body = build(&input);
    let format = if input.native {
        WireFormat::Native
    } else {
        WireFormat::RowBinaryWithNamesAndTypes
    };
    if let Ok(result) = decode(&body, format) {
        check_tiling(&result);
        if let Some(last) = body.len().checked_sub(1) {
            assert!(result.node_at(last).is_some());
        }
    }
});
