//! # Native Format Decoder
//!
//! Column-major format: a sequence of blocks, each carrying every column's
//! name, type and full run of values.
//!
//! ## Block Layout
//!
//! ```text
//! +-----------+--------+---------------------------------------------+
//! | varint C  | varint | C x ( name | type | prefix? | data streams ) |
//! | columns   | rows R |                                             |
//! +-----------+--------+---------------------------------------------+
//! ```
//!
//! When `R == 0` a column is only its name and type. A block with zero
//! columns ends the stream and must be the last thing in the buffer;
//! otherwise blocks continue to the end of the buffer.
//!
//! ## Two Phases per Column
//!
//! 1. `prefix`: read the serialization-state prefix of every stream the
//!    type uses (dictionary versions, Variant modes, Dynamic/JSON
//!    structure) into a `Prefix` tree.
//! 2. `column`: read the data streams, driven by that tree, and rebuild
//!    the logical row values.
//!
//! ## Node Shape
//!
//! ```text
//! Column (label = column name)
//! ├── name                 String
//! ├── type                 String
//! ├── prefix               Prefix container (only when the type has one)
//! └── data                 physical streams of the run
//! ```

mod column;
mod prefix;

use eyre::{bail, Result, WrapErr};
use tracing::debug;

use crate::decoder::native::column::ColumnReader;
use crate::decoder::{
    column_definition, read_string_leaf, read_varint_leaf, DecodeContext, FormatDecoder,
    WireFormat,
};
use crate::encoding::ByteCursor;
use crate::error::DecodeError;
use crate::tree::{Block, ColumnBlock, Node, ParsedResult, Payload, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDecoder;

impl FormatDecoder for NativeDecoder {
    fn format(&self) -> WireFormat {
        WireFormat::Native
    }

    fn decode(&self, buf: &[u8]) -> Result<ParsedResult> {
        let mut ctx = DecodeContext::new();
        let mut cursor = ByteCursor::new(buf);
        let mut blocks = Vec::new();

        while !cursor.is_empty() {
            let index = blocks.len();
            let block = read_block(&mut ctx, &mut cursor, index)
                .wrap_err_with(|| format!("failed to decode block {}", index))?;
            let terminator = block.is_terminator();
            blocks.push(block);
            if terminator {
                if !cursor.is_empty() {
                    bail!(DecodeError::TrailingBytes {
                        offset: cursor.position()
                    });
                }
                break;
            }
        }

        debug!(blocks = blocks.len(), nodes = ctx.nodes_created(), "decoded Native body");
        Ok(ParsedResult {
            format: WireFormat::Native,
            total_len: buf.len(),
            payload: Payload::Blocks(blocks),
        })
    }
}

fn read_block(ctx: &mut DecodeContext, cursor: &mut ByteCursor<'_>, index: usize) -> Result<Block> {
    let start = cursor.position();
    let (column_count, column_count_node) = read_varint_leaf(ctx, cursor, "column_count")?;
    let (row_count, row_count_node) = read_varint_leaf(ctx, cursor, "row_count")?;
    let rows = usize::try_from(row_count).map_err(|_| {
        DecodeError::invalid(row_count_node.range.start, "row count does not fit in memory")
    })?;

    let mut columns = Vec::new();
    for position in 0..column_count {
        let column = read_column_block(ctx, cursor, rows)
            .wrap_err_with(|| format!("column {} of block {}", position, index))?;
        columns.push(column);
    }

    debug!(
        block = index,
        columns = columns.len(),
        rows,
        range = %cursor.since(start),
        "decoded Native block"
    );
    Ok(Block {
        index,
        range: cursor.since(start),
        row_count: rows,
        column_count_node,
        row_count_node,
        columns,
    })
}

fn read_column_block(
    ctx: &mut DecodeContext,
    cursor: &mut ByteCursor<'_>,
    rows: usize,
) -> Result<ColumnBlock> {
    let id = ctx.reserve();
    let start = cursor.position();
    let (name, name_node) = read_string_leaf(ctx, cursor, "name")?;
    let (type_string, type_node) = read_string_leaf(ctx, cursor, "type")?;
    let column = column_definition(name, name_node.range, type_string, type_node.range)?;

    let mut children = vec![name_node, type_node];
    let mut values = Vec::new();
    if rows > 0 {
        let mut reader = ColumnReader::new(cursor, ctx);
        let (prefix, prefix_node) = reader.read_column_prefix(&column.descriptor)?;
        if let Some(node) = prefix_node {
            children.push(node.with_label("prefix"));
        }
        let run = reader.read_column(&column.descriptor, &prefix, rows)?;
        debug!(
            column = %column.name,
            ty = %column.type_string,
            rows,
            range = %run.node.range,
            "decoded column"
        );
        children.push(run.node.with_label("data"));
        values = run.values;
    }

    let node = Node::container(
        id,
        "Column",
        cursor.since(start),
        Value::Array(values.clone()),
        children,
    )
    .with_label(column.name.clone());
    Ok(ColumnBlock {
        column,
        node,
        values,
    })
}
