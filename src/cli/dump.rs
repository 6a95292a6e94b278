//! # Tree and Hex Dumps
//!
//! Plain-text renderings used by `--dump`, `.node`, `.at` and `.hex`.
//!
//! ## Tree Lines
//!
//! ```text
//! #0 [0, 10) Header = {n: 'UInt8'}
//!   #1 [0, 1) column_count: VarUInt = 1
//!   #2 [1, 3) name: String = n
//! ```
//!
//! ## Hex Lines
//!
//! ```text
//! 00000010  01 02 03 04 05 06 07 08  09 0a 0b 0c 0d 0e 0f 10  |................|
//! ```
//!
//! Hex lines are aligned to 16-byte rows; bytes outside the requested range
//! are left blank.

use std::fmt::Write;

use crate::tree::{Node, ParsedResult};

const HEX_ROW_WIDTH: usize = 16;
const MAX_DISPLAY_WIDTH: usize = 60;

/// One line describing `node` without its children.
pub fn node_line(node: &Node) -> String {
    let mut line = format!("#{} {} ", node.id, node.range);
    if let Some(label) = &node.label {
        line.push_str(label);
        line.push_str(": ");
    }
    line.push_str(&node.type_name);
    if !node.display.is_empty() {
        line.push_str(" = ");
        line.push_str(&shorten(&node.display));
    }
    line
}

/// Indented listing of `node` and every descendant.
pub fn tree_lines(node: &Node, depth: usize, out: &mut String) {
    let _ = writeln!(out, "{:indent$}{}", "", node_line(node), indent = depth * 2);
    for child in node.children() {
        tree_lines(child, depth + 1, out);
    }
}

pub fn dump_result(result: &ParsedResult) -> String {
    let mut out = format!(
        "{} body, {} bytes, {} nodes\n",
        result.format,
        result.total_len,
        result.node_count()
    );
    for root in result.roots() {
        tree_lines(root, 0, &mut out);
    }
    out
}

/// Hex dump of `bytes[start..end]`, labelled with absolute offsets.
pub fn hex_dump(bytes: &[u8], start: usize, end: usize) -> String {
    let end = end.min(bytes.len());
    let mut out = String::new();
    if start >= end {
        return out;
    }

    let mut row = start - start % HEX_ROW_WIDTH;
    while row < end {
        let _ = write!(out, "{:08x}  ", row);
        let mut ascii = String::with_capacity(HEX_ROW_WIDTH);
        for offset in row..row + HEX_ROW_WIDTH {
            if offset == row + HEX_ROW_WIDTH / 2 {
                out.push(' ');
            }
            if offset >= start && offset < end {
                let byte = bytes[offset];
                let _ = write!(out, "{:02x} ", byte);
                ascii.push(if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                });
            } else {
                out.push_str("   ");
                ascii.push(' ');
            }
        }
        let _ = writeln!(out, " |{}|", ascii);
        row += HEX_ROW_WIDTH;
    }
    out
}

fn shorten(display: &str) -> String {
    if display.chars().count() <= MAX_DISPLAY_WIDTH {
        return display.to_string();
    }
    let mut short: String = display.chars().take(MAX_DISPLAY_WIDTH - 3).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ByteRange, Value};

    #[test]
    fn node_line_shows_id_range_label_type_and_value() {
        let node =
            Node::leaf(4, "UInt8", ByteRange::new(9, 10), Value::UInt(7)).with_label("n");
        assert_eq!(node_line(&node), "#4 [9, 10) n: UInt8 = 7");
    }

    #[test]
    fn long_displays_are_shortened() {
        let text = "x".repeat(200);
        let node = Node::leaf(0, "String", ByteRange::new(0, 201), Value::String(text));
        let line = node_line(&node);
        assert!(line.ends_with("..."));
        assert!(line.len() < 100);
    }

    #[test]
    fn tree_lines_indent_children() {
        let child = Node::leaf(1, "UInt8", ByteRange::new(0, 1), Value::UInt(1));
        let parent = Node::container(
            0,
            "Tuple(UInt8)",
            ByteRange::new(0, 1),
            Value::Tuple(vec![Value::UInt(1)]),
            vec![child],
        );
        let mut out = String::new();
        tree_lines(&parent, 0, &mut out);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#0"));
        assert!(lines[1].starts_with("  #1"));
    }

    #[test]
    fn hex_dump_aligns_rows_and_blanks_outside_range() {
        let bytes: Vec<u8> = (0u8..40).collect();
        let dump = hex_dump(&bytes, 14, 18);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000"));
        assert!(lines[0].contains("0e 0f"));
        assert!(!lines[0].contains("0d"));
        assert!(lines[1].starts_with("00000010"));
        assert!(lines[1].contains("10 11"));
    }

    #[test]
    fn hex_dump_of_empty_range_is_empty() {
        assert!(hex_dump(&[1, 2, 3], 2, 2).is_empty());
        assert!(hex_dump(&[1, 2, 3], 5, 9).is_empty());
    }
}
