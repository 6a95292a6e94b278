//! # Annotated Nodes
//!
//! A [`Node`] is one decoded unit of the output tree: a scalar, a container,
//! or a structural piece of the wire layout (a length prefix, a null map, a
//! column header). Every node remembers the exact `[start, end)` byte range
//! it was decoded from.
//!
//! ## Invariants
//!
//! - `start <= end <= buffer.len()`
//! - children lie inside their parent's range, are pairwise disjoint and
//!   appear in non-decreasing start order
//! - containers always carry `Some(children)` (possibly empty); scalars
//!   carry `None`
//! - ids are unique within one decode call and assigned in pre-order

use serde_json::json;

use crate::tree::value::Value;

pub type NodeId = usize;

/// Half-open byte range `[start, end)` into the decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted byte range {}..{}", start, end);
        Self { start, end }
    }

    pub fn empty_at(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn covers(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub type_name: String,
    pub range: ByteRange,
    pub value: Value,
    pub display: String,
    pub label: Option<String>,
    pub children: Option<Vec<Node>>,
}

impl Node {
    pub fn leaf(id: NodeId, type_name: impl Into<String>, range: ByteRange, value: Value) -> Self {
        let display = value.to_string();
        Self {
            id,
            type_name: type_name.into(),
            range,
            value,
            display,
            label: None,
            children: None,
        }
    }

    pub fn container(
        id: NodeId,
        type_name: impl Into<String>,
        range: ByteRange,
        value: Value,
        children: Vec<Node>,
    ) -> Self {
        let display = value.to_string();
        Self {
            id,
            type_name: type_name.into(),
            range,
            value,
            display,
            label: None,
            children: Some(children),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn child_by_label(&self, label: &str) -> Option<&Node> {
        self.children()
            .iter()
            .find(|child| child.label.as_deref() == Some(label))
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Returns the deepest node in this subtree whose range contains `offset`.
    pub fn deepest_at(&self, offset: usize) -> Option<&Node> {
        if !self.range.contains(offset) {
            return None;
        }
        let deeper = self
            .children()
            .iter()
            .find_map(|child| child.deepest_at(offset));
        Some(deeper.unwrap_or(self))
    }

    /// Pushes every leaf of this subtree, in byte order, onto `out`.
    pub fn collect_leaves<'n>(&'n self, out: &mut Vec<&'n Node>) {
        match &self.children {
            None => out.push(self),
            Some(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    pub fn count(&self) -> usize {
        1 + self.children().iter().map(Node::count).sum::<usize>()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut object = json!({
            "id": self.id,
            "type": self.type_name,
            "range": [self.range.start, self.range.end],
            "value": self.value.to_json(),
            "display": self.display,
        });
        if let Some(label) = &self.label {
            object["label"] = json!(label);
        }
        if let Some(children) = &self.children {
            object["children"] = children.iter().map(Node::to_json).collect();
        }
        object
    }
}
