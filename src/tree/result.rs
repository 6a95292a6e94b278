//! # Parsed Result
//!
//! The top-level container returned by [`crate::decode`]. It owns every node
//! produced by one decode call and answers the two queries an interactive
//! viewer needs, by walking the already-built tree:
//!
//! - [`ParsedResult::node_at`]: byte offset to the deepest node covering it
//! - [`ParsedResult::range_of`]: node id to its byte range
//!
//! ## Shape
//!
//! ```text
//! RowBinaryWithNamesAndTypes            Native
//! ──────────────────────────            ──────
//! Header                                Block 0
//!   column count                          column count
//!   name / type per column                row count
//! Row 0                                   ColumnBlock per column
//!   one node per column                     name, type
//! Row 1                                     prefix  (serialization state)
//! ...                                       data    (physical streams)
//!                                       Block 1 ...
//! ```
//!
//! The roots returned by [`ParsedResult::roots`] are disjoint and ordered by
//! offset; together with their descendants they tile the whole buffer.

use serde_json::json;

use crate::decoder::WireFormat;
use crate::tree::node::{ByteRange, Node, NodeId};
use crate::tree::value::Value;
use crate::types::TypeDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_string: String,
    pub descriptor: TypeDescriptor,
    pub name_range: ByteRange,
    pub type_range: ByteRange,
}

/// RowBinary header: a container node with the column count and the
/// name/type leaves, plus the parsed column definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub node: Node,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub index: usize,
    pub node: Node,
}

impl Row {
    /// One node per column, in column order.
    pub fn values(&self) -> &[Node] {
        self.node.children()
    }

    pub fn get(&self, column: &str) -> Option<&Node> {
        self.node.child_by_label(column)
    }

    pub fn range(&self) -> ByteRange {
        self.node.range
    }
}

/// One column of one Native block.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBlock {
    pub column: ColumnDefinition,
    /// Container holding the name and type leaves, then the optional
    /// `prefix` and `data` containers.
    pub node: Node,
    /// Logical per-row values reassembled from the physical streams.
    pub values: Vec<Value>,
}

impl ColumnBlock {
    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn prefix(&self) -> Option<&Node> {
        self.node.child_by_label("prefix")
    }

    pub fn data(&self) -> Option<&Node> {
        self.node.child_by_label("data")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub index: usize,
    pub range: ByteRange,
    pub row_count: usize,
    pub column_count_node: Node,
    pub row_count_node: Node,
    pub columns: Vec<ColumnBlock>,
}

impl Block {
    pub fn column(&self, name: &str) -> Option<&ColumnBlock> {
        self.columns.iter().find(|c| c.column.name == name)
    }

    pub fn is_terminator(&self) -> bool {
        self.columns.is_empty()
    }

    fn roots(&self) -> impl Iterator<Item = &Node> {
        [&self.column_count_node, &self.row_count_node]
            .into_iter()
            .chain(self.columns.iter().map(|c| &c.node))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Rows { header: Header, rows: Vec<Row> },
    Blocks(Vec<Block>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult {
    pub format: WireFormat,
    pub total_len: usize,
    pub payload: Payload,
}

impl ParsedResult {
    pub fn header(&self) -> Option<&Header> {
        match &self.payload {
            Payload::Rows { header, .. } => Some(header),
            Payload::Blocks(_) => None,
        }
    }

    pub fn rows(&self) -> &[Row] {
        match &self.payload {
            Payload::Rows { rows, .. } => rows,
            Payload::Blocks(_) => &[],
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match &self.payload {
            Payload::Blocks(blocks) => blocks,
            Payload::Rows { .. } => &[],
        }
    }

    /// Column definitions: the header's, or those of the first block.
    pub fn columns(&self) -> Vec<&ColumnDefinition> {
        match &self.payload {
            Payload::Rows { header, .. } => header.columns.iter().collect(),
            Payload::Blocks(blocks) => blocks
                .first()
                .map(|b| b.columns.iter().map(|c| &c.column).collect())
                .unwrap_or_default(),
        }
    }

    /// Top-level nodes in byte order.
    pub fn roots(&self) -> Vec<&Node> {
        match &self.payload {
            Payload::Rows { header, rows } => std::iter::once(&header.node)
                .chain(rows.iter().map(|r| &r.node))
                .collect(),
            Payload::Blocks(blocks) => blocks.iter().flat_map(Block::roots).collect(),
        }
    }

    /// Deepest node whose range contains `offset`.
    pub fn node_at(&self, offset: usize) -> Option<&Node> {
        if offset >= self.total_len {
            return None;
        }
        let roots = self.roots();
        let idx = roots.partition_point(|root| root.range.end <= offset);
        roots.get(idx).and_then(|root| root.deepest_at(offset))
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.roots().into_iter().find_map(|root| root.find(id))
    }

    pub fn range_of(&self, id: NodeId) -> Option<ByteRange> {
        self.find(id).map(|node| node.range)
    }

    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for root in self.roots() {
            root.collect_leaves(&mut out);
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.roots().into_iter().map(Node::count).sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match &self.payload {
            Payload::Rows { header, rows } => json!({
                "format": self.format.name(),
                "total_len": self.total_len,
                "header": header.node.to_json(),
                "rows": rows.iter().map(|r| r.node.to_json()).collect::<Vec<_>>(),
            }),
            Payload::Blocks(blocks) => json!({
                "format": self.format.name(),
                "total_len": self.total_len,
                "blocks": blocks
                    .iter()
                    .map(|block| json!({
                        "index": block.index,
                        "range": [block.range.start, block.range.end],
                        "row_count": block.row_count,
                        "column_count_node": block.column_count_node.to_json(),
                        "row_count_node": block.row_count_node.to_json(),
                        "columns": block
                            .columns
                            .iter()
                            .map(|c| json!({
                                "name": c.column.name,
                                "type": c.column.type_string,
                                "node": c.node.to_json(),
                                "values": c.values.iter().map(Value::to_json).collect::<Vec<_>>(),
                            }))
                            .collect::<Vec<_>>(),
                    }))
                    .collect::<Vec<_>>(),
            }),
        }
    }
}
