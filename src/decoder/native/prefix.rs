//! # Serialization State Prefixes
//!
//! Before any data of a Native column, ClickHouse writes the state prefix of
//! every stream the column's type uses, depth first. The prefix is parsed
//! into a [`Prefix`] tree that the column readers consume in the second
//! phase; the raw bytes become flat leaves under the column's `prefix`
//! container.
//!
//! | Type | Prefix bytes |
//! |------|--------------|
//! | LowCardinality | UInt64 keys version (1) |
//! | Variant | UInt64 mode (0 basic, 1 compact), then each branch's prefix |
//! | Dynamic | UInt64 version, [varint max types,] varint n, n type names, then the Variant prefix over the types plus SharedVariant |
//! | JSON | UInt64 version, [varint max paths,] varint n, n path names, typed path prefixes, dynamic path prefixes |
//! | Array, Nullable, Map, Tuple | prefixes of the nested types |
//!
//! Everything else has no prefix.

use eyre::{bail, Result, WrapErr};

use crate::config::{
    DYNAMIC_VERSION_V1, DYNAMIC_VERSION_V2, JSON_VERSION_STRING, JSON_VERSION_V1,
    JSON_VERSION_V2, LC_KEYS_VERSION, SHARED_VARIANT_NAME, VARIANT_MODE_BASIC,
    VARIANT_MODE_COMPACT,
};
use crate::decoder::native::column::ColumnReader;
use crate::decoder::{read_length_leaf, read_string_leaf, read_varint_leaf, stream_container};
use crate::error::DecodeError;
use crate::tree::{Node, Value};
use crate::types::{parse_type, JsonSpec, TypeDescriptor};

pub(crate) static EMPTY_PREFIX: Prefix = Prefix::Empty;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Prefix {
    Empty,
    /// Nested stream states in type order: Array/Nullable hold one, Map
    /// holds key and value, Tuple one per element.
    Composite(Vec<Prefix>),
    Variant {
        compact: bool,
        branches: Vec<Prefix>,
    },
    Dynamic {
        /// Sorted by rendered name; index = discriminator.
        alternatives: Vec<Alternative>,
        variant: Box<Prefix>,
    },
    Json(JsonPrefix),
}

impl Prefix {
    pub(crate) fn child(&self, index: usize) -> &Prefix {
        match self {
            Prefix::Composite(states) => states.get(index).unwrap_or(&EMPTY_PREFIX),
            _ => &EMPTY_PREFIX,
        }
    }
}

/// One branch of a Dynamic column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Alternative {
    Typed(TypeDescriptor),
    /// Values of types beyond the column's type cap, each stored as a
    /// String holding its binary type encoding and value.
    Shared,
}

impl Alternative {
    pub(crate) fn name(&self) -> String {
        match self {
            Alternative::Typed(ty) => ty.to_string(),
            Alternative::Shared => SHARED_VARIANT_NAME.to_string(),
        }
    }

    fn storage_type(&self) -> TypeDescriptor {
        match self {
            Alternative::Typed(ty) => ty.clone(),
            Alternative::Shared => TypeDescriptor::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct JsonPrefix {
    /// Rows are JSON text instead of path columns.
    pub string_mode: bool,
    pub dynamic_paths: Vec<String>,
    pub typed: Vec<Prefix>,
    pub dynamic: Vec<Prefix>,
}

/// True when a column of `ty` starts with at least one prefix byte.
pub(crate) fn has_prefix(ty: &TypeDescriptor) -> bool {
    use TypeDescriptor as T;
    match ty {
        T::LowCardinality(_) | T::Variant(_) | T::Dynamic { .. } | T::Json(_) | T::Geometry => true,
        T::Array(inner) | T::Nullable(inner) => has_prefix(inner),
        T::Map(key, value) => has_prefix(key) || has_prefix(value),
        T::Tuple(elements) | T::Nested(elements) => elements.iter().any(|e| has_prefix(&e.ty)),
        T::SimpleAggregateFunction { argument, .. } => has_prefix(argument),
        _ => false,
    }
}

impl<'a, 'r> ColumnReader<'a, 'r> {
    /// Reads the whole prefix of a column; the node is `None` for types
    /// without one.
    pub(crate) fn read_column_prefix(
        &mut self,
        ty: &TypeDescriptor,
    ) -> Result<(Prefix, Option<Node>)> {
        if !has_prefix(ty) {
            return Ok((Prefix::Empty, None));
        }
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let mut nodes = Vec::new();
        let prefix = self.read_prefix(ty, &mut nodes)?;
        let node = stream_container(id, "Prefix", start, self.cursor.position(), nodes);
        Ok((prefix, Some(node)))
    }

    fn read_prefix(&mut self, ty: &TypeDescriptor, nodes: &mut Vec<Node>) -> Result<Prefix> {
        self.ctx.enter()?;
        let result = self.prefix_for(ty, nodes);
        self.ctx.leave();
        result
    }

    fn prefix_for(&mut self, ty: &TypeDescriptor, nodes: &mut Vec<Node>) -> Result<Prefix> {
        use TypeDescriptor as T;
        if let Some(underlying) = ty.desugar() {
            return self.read_prefix(&underlying, nodes);
        }
        match ty {
            T::Array(inner) | T::Nullable(inner) => {
                Ok(Prefix::Composite(vec![self.read_prefix(inner, nodes)?]))
            }
            T::Map(key, value) => {
                let key = self.read_prefix(key, nodes)?;
                let value = self.read_prefix(value, nodes)?;
                Ok(Prefix::Composite(vec![key, value]))
            }
            T::Tuple(elements) => {
                let mut states = Vec::with_capacity(elements.len());
                for element in elements {
                    states.push(self.read_prefix(&element.ty, nodes)?);
                }
                Ok(Prefix::Composite(states))
            }
            T::LowCardinality(_) => {
                let offset = self.cursor.position();
                let version = self.prefix_u64("keys_version", nodes)?;
                if version != LC_KEYS_VERSION {
                    bail!(DecodeError::invalid(
                        offset,
                        format!("unknown LowCardinality keys version {}", version)
                    ));
                }
                Ok(Prefix::Empty)
            }
            T::Variant(alternatives) => self.variant_prefix(alternatives, nodes),
            T::Dynamic { .. } => self.dynamic_prefix(nodes),
            T::Json(spec) => self.json_prefix(spec, nodes),
            _ => Ok(Prefix::Empty),
        }
    }

    fn prefix_u64(&mut self, label: &str, nodes: &mut Vec<Node>) -> Result<u64> {
        let (value, range) = self.cursor.read_u64()?;
        nodes.push(
            self.ctx
                .leaf("UInt64", range, Value::UInt(value))
                .with_label(label),
        );
        Ok(value)
    }

    fn variant_prefix(
        &mut self,
        branch_types: &[TypeDescriptor],
        nodes: &mut Vec<Node>,
    ) -> Result<Prefix> {
        let offset = self.cursor.position();
        let compact = match self.prefix_u64("mode", nodes)? {
            VARIANT_MODE_BASIC => false,
            VARIANT_MODE_COMPACT => true,
            other => bail!(DecodeError::invalid(
                offset,
                format!("unknown Variant discriminators mode {}", other)
            )),
        };
        let mut branches = Vec::with_capacity(branch_types.len());
        for ty in branch_types {
            branches.push(self.read_prefix(ty, nodes)?);
        }
        Ok(Prefix::Variant { compact, branches })
    }

    fn dynamic_prefix(&mut self, nodes: &mut Vec<Node>) -> Result<Prefix> {
        let offset = self.cursor.position();
        match self.prefix_u64("version", nodes)? {
            DYNAMIC_VERSION_V1 => {
                let (_, node) = read_varint_leaf(self.ctx, self.cursor, "max_types")?;
                nodes.push(node);
            }
            DYNAMIC_VERSION_V2 => {}
            other => bail!(DecodeError::invalid(
                offset,
                format!("unknown Dynamic serialization version {}", other)
            )),
        }

        let (count, count_node) = read_length_leaf(self.ctx, self.cursor, "type_count")?;
        nodes.push(count_node);
        let mut alternatives = Vec::with_capacity(count + 1);
        for _ in 0..count {
            let (name, node) = read_string_leaf(self.ctx, self.cursor, "type")?;
            nodes.push(node);
            let ty = parse_type(&name)
                .wrap_err_with(|| format!("Dynamic column lists unreadable type `{}`", name))?;
            alternatives.push(Alternative::Typed(ty));
        }
        alternatives.push(Alternative::Shared);
        alternatives.sort_by_cached_key(Alternative::name);

        let branch_types: Vec<TypeDescriptor> =
            alternatives.iter().map(Alternative::storage_type).collect();
        let variant = self.variant_prefix(&branch_types, nodes)?;
        Ok(Prefix::Dynamic {
            alternatives,
            variant: Box::new(variant),
        })
    }

    fn json_prefix(&mut self, spec: &JsonSpec, nodes: &mut Vec<Node>) -> Result<Prefix> {
        let offset = self.cursor.position();
        match self.prefix_u64("version", nodes)? {
            JSON_VERSION_STRING => {
                return Ok(Prefix::Json(JsonPrefix {
                    string_mode: true,
                    ..JsonPrefix::default()
                }))
            }
            JSON_VERSION_V1 => {
                let (_, node) = read_varint_leaf(self.ctx, self.cursor, "max_dynamic_paths")?;
                nodes.push(node);
            }
            JSON_VERSION_V2 => {}
            other => bail!(DecodeError::invalid(
                offset,
                format!("unknown JSON serialization version {}", other)
            )),
        }

        let (count, count_node) = read_length_leaf(self.ctx, self.cursor, "path_count")?;
        nodes.push(count_node);
        let mut dynamic_paths = Vec::with_capacity(count);
        for _ in 0..count {
            let (path, node) = read_string_leaf(self.ctx, self.cursor, "path")?;
            nodes.push(node);
            dynamic_paths.push(path);
        }

        let mut typed = Vec::with_capacity(spec.typed_paths.len());
        for (_, ty) in &spec.typed_paths {
            typed.push(self.read_prefix(ty, nodes)?);
        }
        let dynamic_type = TypeDescriptor::Dynamic {
            max_types: spec.max_dynamic_types,
        };
        let mut dynamic = Vec::with_capacity(dynamic_paths.len());
        for _ in &dynamic_paths {
            dynamic.push(self.read_prefix(&dynamic_type, nodes)?);
        }

        Ok(Prefix::Json(JsonPrefix {
            string_mode: false,
            dynamic_paths,
            typed,
            dynamic,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeContext;
    use crate::encoding::ByteCursor;

    fn read(ty: &str, bytes: &[u8]) -> (Prefix, Option<Node>, usize) {
        let ty = parse_type(ty).unwrap();
        let mut ctx = DecodeContext::new();
        let mut cursor = ByteCursor::new(bytes);
        let mut reader = ColumnReader::new(&mut cursor, &mut ctx);
        let (prefix, node) = reader.read_column_prefix(&ty).unwrap();
        (prefix, node, cursor.position())
    }

    #[test]
    fn scalars_and_plain_composites_have_no_prefix() {
        for ty in ["UInt8", "Array(String)", "Tuple(a Int8, b Nullable(String))", "Point"] {
            let (prefix, node, consumed) = read(ty, &[]);
            assert_eq!(prefix, Prefix::Empty);
            assert!(node.is_none());
            assert_eq!(consumed, 0);
        }
    }

    #[test]
    fn low_cardinality_reads_keys_version() {
        let (prefix, node, consumed) = read("Array(LowCardinality(String))", &1u64.to_le_bytes());
        assert_eq!(prefix, Prefix::Composite(vec![Prefix::Empty]));
        assert_eq!(consumed, 8);
        assert_eq!(node.unwrap().children()[0].label.as_deref(), Some("keys_version"));
    }

    #[test]
    fn dynamic_sorts_types_with_shared_variant() {
        let mut bytes = 2u64.to_le_bytes().to_vec();
        bytes.push(2);
        bytes.push(6);
        bytes.extend_from_slice(b"UInt64");
        bytes.push(6);
        bytes.extend_from_slice(b"String");
        bytes.extend_from_slice(&0u64.to_le_bytes());

        let (prefix, _, consumed) = read("Dynamic", &bytes);
        assert_eq!(consumed, bytes.len());
        let Prefix::Dynamic { alternatives, variant } = prefix else {
            panic!("expected Dynamic prefix");
        };
        let names: Vec<String> = alternatives.iter().map(Alternative::name).collect();
        assert_eq!(names, ["SharedVariant", "String", "UInt64"]);
        assert!(matches!(*variant, Prefix::Variant { compact: false, .. }));
    }

    #[test]
    fn json_string_mode_stops_after_version() {
        let (prefix, _, consumed) = read("JSON", &1u64.to_le_bytes());
        assert_eq!(consumed, 8);
        let Prefix::Json(json) = prefix else {
            panic!("expected JSON prefix");
        };
        assert!(json.string_mode);
    }

    #[test]
    fn unknown_variant_mode_is_invalid() {
        let ty = parse_type("Variant(String, UInt8)").unwrap();
        let bytes = 7u64.to_le_bytes();
        let mut ctx = DecodeContext::new();
        let mut cursor = ByteCursor::new(&bytes);
        let mut reader = ColumnReader::new(&mut cursor, &mut ctx);
        let err = reader.read_column_prefix(&ty).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DecodeError>().map(|e| e.kind()),
            Some("InvalidData")
        );
    }
}
