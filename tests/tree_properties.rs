//! Structural properties every successful decode must satisfy, checked over
//! bodies that mix most type families in both formats.

mod common;

use std::thread;

use chwire::{decode, ParsedResult, WireFormat};
use common::{assert_structure, Body};

fn mixed_rowbinary() -> Vec<u8> {
    let columns = [
        ("id", "UInt64"),
        ("name", "LowCardinality(String)"),
        ("tags", "Array(Nullable(String))"),
        ("attrs", "Map(String, Int32)"),
        ("pos", "Tuple(x Float64, y Float64)"),
        ("v", "Variant(String, UInt64)"),
        ("d", "Dynamic"),
        ("price", "Decimal(18, 4)"),
        ("when", "DateTime64(3, 'UTC')"),
        ("big", "Int256"),
    ];
    let mut body = Body::new().header(&columns);
    for row in 0..3u64 {
        body = body
            .u64(u64::MAX - row)
            .string("name")
            .varint(2)
            .u8(0)
            .string("")
            .u8(1)
            .varint(1)
            .string("k")
            .i32(-(row as i32))
            .f64(1.5)
            .f64(-2.5)
            .u8(1)
            .u64(row)
            .raw(&[0x1E, 0x02])
            .varint(1)
            .u16(9)
            .i64(1_234_567)
            .i64(1_700_000_000_000)
            .raw(&[0xFF; 32]);
    }
    body.build()
}

fn mixed_native() -> Vec<u8> {
    Body::new()
        .block(4, 2)
        .column("n", "Nullable(UInt32)")
        .raw(&[1, 0])
        .u32(0)
        .u32(8)
        .column("arr", "Array(Array(UInt8))")
        .u64(1)
        .u64(3)
        .u64(2)
        .u64(2)
        .u64(3)
        .raw(&[1, 2, 3])
        .column("lc", "LowCardinality(Nullable(String))")
        .u64(1)
        .u64(chwire::config::LC_HAS_ADDITIONAL_KEYS)
        .u64(2)
        .string("")
        .string("x")
        .u64(2)
        .raw(&[1, 0])
        .column("v", "Variant(Int8, String)")
        .u64(0)
        .raw(&[1, 0])
        .u8(0xFE)
        .string("s")
        .build()
}

fn decoded(format: WireFormat) -> (Vec<u8>, ParsedResult) {
    let body = match format {
        WireFormat::RowBinaryWithNamesAndTypes => mixed_rowbinary(),
        WireFormat::Native => mixed_native(),
    };
    let result = decode(&body, format).unwrap();
    (body, result)
}

const FORMATS: [WireFormat; 2] = [WireFormat::RowBinaryWithNamesAndTypes, WireFormat::Native];

#[test]
fn leaves_tile_the_buffer_and_children_nest() {
    for format in FORMATS {
        let (body, result) = decoded(format);
        assert_eq!(result.total_len, body.len());
        assert_structure(&result);
    }
}

#[test]
fn every_offset_maps_to_a_covering_leaf() {
    for format in FORMATS {
        let (body, result) = decoded(format);
        for offset in 0..body.len() {
            let node = result
                .node_at(offset)
                .unwrap_or_else(|| panic!("{}: nothing at offset {}", format, offset));
            assert!(!node.is_container() || node.children().is_empty());
            assert!(node.range.contains(offset));
            assert_eq!(result.range_of(node.id), Some(node.range));
        }
        assert!(result.node_at(body.len()).is_none());
    }
}

#[test]
fn ids_are_unique() {
    for format in FORMATS {
        let (_, result) = decoded(format);
        let mut ids = Vec::new();
        for root in result.roots() {
            collect_ids(root, &mut ids);
        }
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total, "{} ids repeat", format);
        assert_eq!(result.node_count(), total);
    }
}

fn collect_ids(node: &chwire::Node, out: &mut Vec<usize>) {
    out.push(node.id);
    for child in node.children() {
        collect_ids(child, out);
    }
}

#[test]
fn repeated_and_concurrent_decodes_agree() {
    for format in FORMATS {
        let (body, first) = decoded(format);
        let results: Vec<ParsedResult> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| decode(&body, format).unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect()
        });
        for result in results {
            assert_eq!(result, first);
        }
    }
}

#[test]
fn json_export_mirrors_the_tree() {
    for format in FORMATS {
        let (body, result) = decoded(format);
        let json = result.to_json();
        assert_eq!(json["format"], format.name());
        assert_eq!(json["total_len"], body.len());
    }
}

#[test]
fn every_strict_prefix_fails_cleanly() {
    for format in FORMATS {
        let (body, _) = decoded(format);
        for cut in 1..body.len() {
            // A truncated body may still be a valid shorter body, but it
            // must never panic and a success must still tile the buffer.
            if let Ok(result) = decode(&body[..cut], format) {
                assert_structure(&result);
            }
        }
    }
}
