//! Shared helpers for the integration tests: a byte builder for response
//! bodies and structural checks over decoded trees.

#![allow(dead_code)]

use chwire::{DecodeError, Node, ParsedResult};

/// Little-endian body builder.
#[derive(Default)]
pub struct Body {
    bytes: Vec<u8>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varint(mut self, mut value: u64) -> Self {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.push(byte);
                return self;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    pub fn string(self, s: &str) -> Self {
        self.varint(s.len() as u64).raw(s.as_bytes())
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn u8(self, v: u8) -> Self {
        self.raw(&[v])
    }

    pub fn u16(self, v: u16) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn u32(self, v: u32) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn u64(self, v: u64) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn i32(self, v: i32) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn i64(self, v: i64) -> Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn f64(self, v: f64) -> Self {
        self.raw(&v.to_le_bytes())
    }

    /// RowBinaryWithNamesAndTypes header: count, all names, all types.
    pub fn header(self, columns: &[(&str, &str)]) -> Self {
        let mut body = self.varint(columns.len() as u64);
        for (name, _) in columns {
            body = body.string(name);
        }
        for (_, ty) in columns {
            body = body.string(ty);
        }
        body
    }

    /// Native block header: column count then row count.
    pub fn block(self, columns: u64, rows: u64) -> Self {
        self.varint(columns).varint(rows)
    }

    /// Native column header: name then type.
    pub fn column(self, name: &str, ty: &str) -> Self {
        self.string(name).string(ty)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn error_kind(result: eyre::Result<ParsedResult>) -> &'static str {
    match result {
        Ok(_) => panic!("expected a decode error"),
        Err(err) => err
            .downcast_ref::<DecodeError>()
            .map(|e| e.kind())
            .unwrap_or("other"),
    }
}

/// Non-empty leaves cover `[0, total_len)` back to back.
pub fn assert_tiles(result: &ParsedResult) {
    let mut expected = 0;
    for leaf in result.leaves() {
        if leaf.range.is_empty() {
            continue;
        }
        assert_eq!(
            leaf.range.start, expected,
            "gap or overlap before leaf #{} {} ({})",
            leaf.id, leaf.range, leaf.type_name
        );
        expected = leaf.range.end;
    }
    assert_eq!(expected, result.total_len, "leaves stop short of the buffer end");
}

/// Children lie inside their parent, in order, without overlapping; ids
/// increase in pre-order.
pub fn assert_well_formed(node: &Node) {
    let mut cursor = node.range.start;
    for child in node.children() {
        assert!(
            node.range.covers(&child.range),
            "#{} {} escapes parent #{} {}",
            child.id,
            child.range,
            node.id,
            node.range
        );
        assert!(
            child.range.start >= cursor,
            "#{} {} overlaps its previous sibling",
            child.id,
            child.range
        );
        assert!(child.id > node.id, "#{} is not after parent #{}", child.id, node.id);
        cursor = child.range.end;
        assert_well_formed(child);
    }
}

pub fn assert_structure(result: &ParsedResult) {
    assert_tiles(result);
    let mut previous_end = 0;
    for root in result.roots() {
        assert!(root.range.start >= previous_end, "roots overlap at #{}", root.id);
        previous_end = root.range.end;
        assert_well_formed(root);
    }
}
