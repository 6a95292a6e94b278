//! # Columnar Runs
//!
//! Second decode phase of a Native column: given the parsed [`Prefix`] and
//! the row count, read every data stream of the column and reassemble the
//! logical per-row values.
//!
//! ## Stream Order
//!
//! | Type | Streams, in wire order |
//! |------|------------------------|
//! | Nullable(T) | null map (1 byte per row), then T for every row |
//! | Array(T) | UInt64 cumulative offsets, then all elements |
//! | Map(K, V) | offsets, then all keys, then all values |
//! | Tuple(...) | each element's full run in turn |
//! | LowCardinality(T) | UInt64 index type, UInt64 dictionary size, dictionary, UInt64 index count, indices |
//! | Variant / Dynamic | discriminators, then one sparse run per branch |
//! | JSON | typed path runs, dynamic path runs, shared data |
//! | QBit(T, d) | bits(T) bit planes of ceil(d / 8) bytes per row |
//! | Nothing | 1 placeholder byte per row |
//!
//! A run with zero rows reads nothing. The node of a run mirrors the
//! physical streams, so ranges stay contiguous; [`ColumnRun::values`] holds
//! the logical view (nulls applied, arrays sliced, tuples zipped,
//! dictionary indices resolved, branches reassembled).

use std::collections::BTreeMap;

use eyre::{bail, eyre, Result};

use crate::config::{
    LC_HAS_ADDITIONAL_KEYS, LC_INDEX_WIDTH_MASK, LC_NEED_GLOBAL_DICTIONARY,
    SHARED_VARIANT_NAME, VARIANT_GRANULE_COMPACT, VARIANT_GRANULE_PLAIN,
    VARIANT_NULL_DISCRIMINATOR,
};
use crate::decoder::native::prefix::{Alternative, JsonPrefix, Prefix, EMPTY_PREFIX};
use crate::decoder::rowbinary::RowReader;
use crate::decoder::scalar::{is_scalar, read_scalar};
use crate::decoder::{
    insert_json_path, read_length_leaf, read_string_leaf, stream_container, tuple_value,
    DecodeContext, WireFormat,
};
use crate::encoding::ByteCursor;
use crate::error::DecodeError;
use crate::tree::{ByteRange, Node, NodeId, Value};
use crate::types::{JsonSpec, TupleElement, TypeDescriptor};

const FORMAT: &str = "Native";

/// Physical node of one column run plus its logical row values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnRun {
    pub node: Node,
    pub values: Vec<Value>,
}

impl ColumnRun {
    fn new(
        id: NodeId,
        type_name: impl Into<String>,
        range: ByteRange,
        children: Vec<Node>,
        values: Vec<Value>,
    ) -> Self {
        let node = Node::container(id, type_name, range, Value::Array(values.clone()), children);
        Self { node, values }
    }
}

/// A branch of a Variant-shaped column.
enum Branch<'t> {
    Typed(&'t TypeDescriptor),
    Shared,
}

impl Branch<'_> {
    fn label(&self) -> String {
        match self {
            Branch::Typed(ty) => ty.to_string(),
            Branch::Shared => SHARED_VARIANT_NAME.to_string(),
        }
    }
}

pub(crate) struct ColumnReader<'a, 'r> {
    pub(super) cursor: &'r mut ByteCursor<'a>,
    pub(super) ctx: &'r mut DecodeContext,
}

impl<'a, 'r> ColumnReader<'a, 'r> {
    pub(crate) fn new(cursor: &'r mut ByteCursor<'a>, ctx: &'r mut DecodeContext) -> Self {
        Self { cursor, ctx }
    }

    pub(crate) fn read_column(
        &mut self,
        ty: &TypeDescriptor,
        prefix: &Prefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        self.ctx.enter()?;
        let result = self.column_for(ty, prefix, rows);
        self.ctx.leave();
        result
    }

    fn column_for(&mut self, ty: &TypeDescriptor, prefix: &Prefix, rows: usize) -> Result<ColumnRun> {
        use TypeDescriptor as T;
        if let Some(underlying) = ty.desugar() {
            let run = self.read_column(&underlying, prefix, rows)?;
            return Ok(ColumnRun {
                node: run.node.with_type_name(ty.to_string()),
                values: run.values,
            });
        }

        let id = self.ctx.reserve();
        let start = self.cursor.position();
        if rows == 0 {
            return Ok(ColumnRun::new(id, ty.to_string(), self.cursor.here(), Vec::new(), Vec::new()));
        }
        // Every row of every column type takes at least one byte.
        if rows > self.cursor.remaining() {
            bail!(DecodeError::UnexpectedEof {
                offset: start,
                needed: rows,
                available: self.cursor.remaining(),
            });
        }

        match ty {
            _ if is_scalar(ty) => self.scalar_run(id, start, ty, rows),
            T::Nothing => self.nothing_run(id, start, rows),
            T::Nullable(inner) => self.nullable_run(id, start, ty, inner, prefix.child(0), rows),
            T::Array(inner) => self.array_run(id, start, ty, inner, prefix.child(0), rows),
            T::Map(key, value) => self.map_run(id, start, ty, key, value, prefix, rows),
            T::Tuple(elements) => self.tuple_run(id, start, ty, elements, prefix, rows),
            T::LowCardinality(inner) => self.low_cardinality_run(id, start, ty, inner, rows),
            T::Variant(alternatives) => {
                let branches: Vec<Branch> = alternatives.iter().map(Branch::Typed).collect();
                self.variant_run(id, start, ty.to_string(), &branches, prefix, rows)
            }
            T::Dynamic { .. } => {
                let Prefix::Dynamic {
                    alternatives,
                    variant,
                } = prefix
                else {
                    bail!(DecodeError::invalid(start, "Dynamic column without a structure prefix"));
                };
                let branches: Vec<Branch> = alternatives
                    .iter()
                    .map(|alternative| match alternative {
                        Alternative::Typed(ty) => Branch::Typed(ty),
                        Alternative::Shared => Branch::Shared,
                    })
                    .collect();
                self.variant_run(id, start, ty.to_string(), &branches, variant, rows)
            }
            T::Json(spec) => {
                let Prefix::Json(json) = prefix else {
                    bail!(DecodeError::invalid(start, "JSON column without a structure prefix"));
                };
                self.json_run(id, start, ty, spec, json, rows)
            }
            T::QBit { element, dimension } => {
                self.qbit_run(id, start, ty, element, *dimension, rows)
            }
            T::AggregateFunction(_) => self.aggregate_run(id, start, ty, rows),
            _ => bail!(DecodeError::unsupported(ty, FORMAT)),
        }
    }

    fn scalar_run(&mut self, id: NodeId, start: usize, ty: &TypeDescriptor, rows: usize) -> Result<ColumnRun> {
        let type_name = ty.to_string();
        let mut nodes = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for _ in 0..rows {
            let scalar = read_scalar(self.cursor, ty)?
                .ok_or_else(|| eyre!(DecodeError::unsupported(ty, FORMAT)))?;
            let node = scalar.into_node(self.ctx.reserve(), type_name.as_str());
            values.push(node.value.clone());
            nodes.push(node);
        }
        Ok(ColumnRun::new(id, type_name, self.cursor.since(start), nodes, values))
    }

    fn nothing_run(&mut self, id: NodeId, start: usize, rows: usize) -> Result<ColumnRun> {
        let mut nodes = Vec::with_capacity(rows);
        for _ in 0..rows {
            let (_, range) = self.cursor.read_u8()?;
            nodes.push(self.ctx.leaf("Nothing", range, Value::Null));
        }
        Ok(ColumnRun::new(id, "Nothing", self.cursor.since(start), nodes, vec![Value::Null; rows]))
    }

    fn nullable_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        inner: &TypeDescriptor,
        inner_prefix: &Prefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        let map_id = self.ctx.reserve();
        let map_start = self.cursor.position();
        let mut nulls = Vec::with_capacity(rows);
        let mut flags = Vec::with_capacity(rows);
        for _ in 0..rows {
            let (flag, range) = self.cursor.read_u8()?;
            flags.push(
                self.ctx
                    .leaf("UInt8", range, Value::UInt(flag as u64))
                    .with_label("null_flag"),
            );
            nulls.push(flag != 0);
        }
        let null_map = stream_container(map_id, "NullMap", map_start, self.cursor.position(), flags);

        // Null rows still carry a placeholder value that must be consumed.
        let ColumnRun {
            node: inner_node,
            values: inner_values,
        } = self.read_column(inner, inner_prefix, rows)?;
        let values = nulls
            .into_iter()
            .zip(inner_values)
            .map(|(null, value)| if null { Value::Null } else { value })
            .collect();
        Ok(ColumnRun::new(
            id,
            ty.to_string(),
            self.cursor.since(start),
            vec![null_map, inner_node.with_label("values")],
            values,
        ))
    }

    /// Reads `rows` cumulative UInt64 offsets, rejecting decreasing ones.
    fn read_offsets(&mut self, rows: usize) -> Result<(Vec<usize>, Node)> {
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let mut offsets = Vec::with_capacity(rows);
        let mut nodes = Vec::with_capacity(rows);
        let mut previous = 0u64;
        for _ in 0..rows {
            let (offset, range) = self.cursor.read_u64()?;
            if offset < previous {
                bail!(DecodeError::invalid(
                    range.start,
                    format!("array offset {} is below the previous offset {}", offset, previous)
                ));
            }
            let as_index = usize::try_from(offset).map_err(|_| {
                DecodeError::invalid(range.start, format!("array offset {} does not fit in memory", offset))
            })?;
            previous = offset;
            nodes.push(
                self.ctx
                    .leaf("UInt64", range, Value::UInt(offset))
                    .with_label("offset"),
            );
            offsets.push(as_index);
        }
        let node = stream_container(id, "Offsets", start, self.cursor.position(), nodes);
        Ok((offsets, node))
    }

    fn array_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        inner: &TypeDescriptor,
        inner_prefix: &Prefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        let (offsets, offsets_node) = self.read_offsets(rows)?;
        let total = offsets.last().copied().unwrap_or(0);
        let elements = self.read_column(inner, inner_prefix, total)?;
        let values = slice_by_offsets(&offsets, &elements.values)
            .map(|slice| Value::Array(slice.to_vec()))
            .collect();
        Ok(ColumnRun::new(
            id,
            ty.to_string(),
            self.cursor.since(start),
            vec![offsets_node, elements.node.with_label("elements")],
            values,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn map_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        key: &TypeDescriptor,
        value: &TypeDescriptor,
        prefix: &Prefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        let (offsets, offsets_node) = self.read_offsets(rows)?;
        let total = offsets.last().copied().unwrap_or(0);
        let entry_type = TypeDescriptor::Tuple(vec![
            TupleElement::named("keys", key.clone()),
            TupleElement::named("values", value.clone()),
        ]);
        let entries = self.read_column(&entry_type, prefix, total)?;
        let values = slice_by_offsets(&offsets, &entries.values)
            .map(|slice| Value::Map(slice.iter().map(entry_pair).collect()))
            .collect();
        Ok(ColumnRun::new(
            id,
            ty.to_string(),
            self.cursor.since(start),
            vec![offsets_node, entries.node.with_label("entries")],
            values,
        ))
    }

    fn tuple_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        elements: &[TupleElement],
        prefix: &Prefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        let mut children = Vec::with_capacity(elements.len());
        let mut element_values = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let run = self.read_column(&element.ty, prefix.child(index), rows)?;
            let label = element
                .name
                .clone()
                .unwrap_or_else(|| (index + 1).to_string());
            children.push(run.node.with_label(label));
            element_values.push(run.values.into_iter());
        }
        let values = (0..rows)
            .map(|_| {
                let row = element_values
                    .iter_mut()
                    .map(|column| column.next().unwrap_or(Value::Null))
                    .collect();
                tuple_value(elements, row)
            })
            .collect();
        Ok(ColumnRun::new(id, ty.to_string(), self.cursor.since(start), children, values))
    }

    fn low_cardinality_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        inner: &TypeDescriptor,
        rows: usize,
    ) -> Result<ColumnRun> {
        let (word, word_range) = self.cursor.read_u64()?;
        let word_node = self
            .ctx
            .leaf("UInt64", word_range, Value::UInt(word))
            .with_label("index_type");
        if word & LC_NEED_GLOBAL_DICTIONARY != 0 || word & LC_HAS_ADDITIONAL_KEYS == 0 {
            bail!(DecodeError::unsupported(
                format!("{} with a shared dictionary", ty),
                FORMAT
            ));
        }
        let width = match word & LC_INDEX_WIDTH_MASK {
            0 => 1,
            1 => 2,
            2 => 4,
            3 => 8,
            other => bail!(DecodeError::invalid(
                word_range.start,
                format!("unknown LowCardinality index width code {}", other)
            )),
        };

        let (dictionary_size, size_range) = self.cursor.read_u64()?;
        let size_node = self
            .ctx
            .leaf("UInt64", size_range, Value::UInt(dictionary_size))
            .with_label("dictionary_size");
        let dictionary_size = usize::try_from(dictionary_size).map_err(|_| {
            DecodeError::invalid(size_range.start, "dictionary size does not fit in memory")
        })?;
        let dictionary = self.read_column(inner.non_nullable(), &EMPTY_PREFIX, dictionary_size)?;

        let (index_count, count_range) = self.cursor.read_u64()?;
        let count_node = self
            .ctx
            .leaf("UInt64", count_range, Value::UInt(index_count))
            .with_label("index_count");
        if index_count != rows as u64 {
            bail!(DecodeError::invalid(
                count_range.start,
                format!("{} dictionary indices for {} rows", index_count, rows)
            ));
        }

        let indices_id = self.ctx.reserve();
        let indices_start = self.cursor.position();
        let index_type = match width {
            1 => "UInt8",
            2 => "UInt16",
            4 => "UInt32",
            _ => "UInt64",
        };
        let mut index_nodes = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for _ in 0..rows {
            let (index, range) = self.read_index(width)?;
            index_nodes.push(self.ctx.leaf(index_type, range, Value::UInt(index)));
            let value = if inner.is_nullable() && index == 0 {
                Value::Null
            } else {
                usize::try_from(index)
                    .ok()
                    .and_then(|i| dictionary.values.get(i))
                    .cloned()
                    .unwrap_or(Value::Unknown(index))
            };
            values.push(value);
        }
        let indices = stream_container(
            indices_id,
            "Indices",
            indices_start,
            self.cursor.position(),
            index_nodes,
        );

        Ok(ColumnRun::new(
            id,
            ty.to_string(),
            self.cursor.since(start),
            vec![
                word_node,
                size_node,
                dictionary.node.with_label("dictionary"),
                count_node,
                indices,
            ],
            values,
        ))
    }

    fn read_index(&mut self, width: usize) -> Result<(u64, ByteRange)> {
        Ok(match width {
            1 => {
                let (v, r) = self.cursor.read_u8()?;
                (v as u64, r)
            }
            2 => {
                let (v, r) = self.cursor.read_u16()?;
                (v as u64, r)
            }
            4 => {
                let (v, r) = self.cursor.read_u32()?;
                (v as u64, r)
            }
            _ => self.cursor.read_u64()?,
        })
    }

    fn variant_run(
        &mut self,
        id: NodeId,
        start: usize,
        type_name: String,
        branches: &[Branch<'_>],
        prefix: &Prefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        let Prefix::Variant {
            compact,
            branches: branch_prefixes,
        } = prefix
        else {
            bail!(DecodeError::invalid(start, "Variant column without a mode prefix"));
        };

        let (discriminators, discriminators_node) = self.read_discriminators(*compact, rows)?;
        let mut counts = vec![0usize; branches.len()];
        for &discriminator in &discriminators {
            if let Some(count) = counts.get_mut(discriminator as usize) {
                *count += 1;
            }
        }

        let mut children = vec![discriminators_node];
        let mut branch_values = Vec::with_capacity(branches.len());
        for (index, branch) in branches.iter().enumerate() {
            let count = counts[index];
            if count == 0 {
                branch_values.push(Vec::new().into_iter());
                continue;
            }
            let run = match branch {
                Branch::Typed(ty) => {
                    let prefix = branch_prefixes.get(index).unwrap_or(&EMPTY_PREFIX);
                    self.read_column(ty, prefix, count)?
                }
                Branch::Shared => self.shared_variant_run(count)?,
            };
            children.push(run.node.with_label(branch.label()));
            branch_values.push(run.values.into_iter());
        }

        let values = discriminators
            .iter()
            .map(|&discriminator| {
                if discriminator == VARIANT_NULL_DISCRIMINATOR {
                    return Value::Null;
                }
                match branch_values.get_mut(discriminator as usize) {
                    Some(branch) => branch.next().unwrap_or(Value::Null),
                    None => Value::Unknown(discriminator as u64),
                }
            })
            .collect();
        Ok(ColumnRun::new(id, type_name, self.cursor.since(start), children, values))
    }

    fn read_discriminators(&mut self, compact: bool, rows: usize) -> Result<(Vec<u8>, Node)> {
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let mut nodes = Vec::new();
        let discriminators = if compact {
            let (format, range) = self.cursor.read_u8()?;
            nodes.push(
                self.ctx
                    .leaf("UInt8", range, Value::UInt(format as u64))
                    .with_label("granule_format"),
            );
            match format {
                VARIANT_GRANULE_PLAIN => self.read_discriminator_list(rows, &mut nodes)?,
                VARIANT_GRANULE_COMPACT => {
                    let (discriminator, range) = self.cursor.read_u8()?;
                    nodes.push(
                        self.ctx
                            .leaf("UInt8", range, Value::UInt(discriminator as u64))
                            .with_label("discriminator"),
                    );
                    vec![discriminator; rows]
                }
                other => bail!(DecodeError::invalid(
                    range.start,
                    format!("unknown Variant granule format {}", other)
                )),
            }
        } else {
            self.read_discriminator_list(rows, &mut nodes)?
        };
        let node = stream_container(id, "Discriminators", start, self.cursor.position(), nodes);
        Ok((discriminators, node))
    }

    fn read_discriminator_list(&mut self, rows: usize, nodes: &mut Vec<Node>) -> Result<Vec<u8>> {
        let mut discriminators = Vec::with_capacity(rows);
        for _ in 0..rows {
            let (discriminator, range) = self.cursor.read_u8()?;
            nodes.push(
                self.ctx
                    .leaf("UInt8", range, Value::UInt(discriminator as u64))
                    .with_label("discriminator"),
            );
            discriminators.push(discriminator);
        }
        Ok(discriminators)
    }

    fn shared_variant_run(&mut self, rows: usize) -> Result<ColumnRun> {
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let mut nodes = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for _ in 0..rows {
            let node = self.embedded_value(SHARED_VARIANT_NAME)?;
            values.push(node.value.clone());
            nodes.push(node);
        }
        Ok(ColumnRun::new(id, SHARED_VARIANT_NAME, self.cursor.since(start), nodes, values))
    }

    /// A String whose payload is a binary type encoding followed by a
    /// row-encoded value of that type. The payload must be consumed exactly.
    fn embedded_value(&mut self, type_name: &str) -> Result<Node> {
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let (len, len_node) = read_length_leaf(self.ctx, self.cursor, "length")?;
        let body_start = self.cursor.position();
        let mut body = ByteCursor::bounded(self.cursor.buffer(), body_start, body_start + len);
        let inner = RowReader::new(&mut body, &mut *self.ctx, WireFormat::Native).dynamic("Dynamic")?;
        if !body.is_empty() {
            bail!(DecodeError::invalid(
                body.position(),
                format!("{} unread bytes inside {} value", body.remaining(), type_name)
            ));
        }
        self.cursor.skip(len)?;
        let value = inner.value.clone();
        let display = inner.display.clone();
        Ok(Node::container(
            id,
            type_name,
            self.cursor.since(start),
            value,
            vec![len_node, inner],
        )
        .with_display(display))
    }

    fn json_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        spec: &JsonSpec,
        prefix: &JsonPrefix,
        rows: usize,
    ) -> Result<ColumnRun> {
        if prefix.string_mode {
            return self.json_text_run(id, start, ty, rows);
        }

        let mut objects = vec![BTreeMap::new(); rows];
        let mut children = Vec::new();

        for (index, (path, path_type)) in spec.typed_paths.iter().enumerate() {
            let state = prefix.typed.get(index).unwrap_or(&EMPTY_PREFIX);
            let run = self.read_column(path_type, state, rows)?;
            for (object, value) in objects.iter_mut().zip(run.values) {
                insert_json_path(object, path, value);
            }
            children.push(run.node.with_label(path.clone()));
        }

        let dynamic_type = TypeDescriptor::Dynamic {
            max_types: spec.max_dynamic_types,
        };
        for (index, path) in prefix.dynamic_paths.iter().enumerate() {
            let state = prefix.dynamic.get(index).unwrap_or(&EMPTY_PREFIX);
            let run = self.read_column(&dynamic_type, state, rows)?;
            for (object, value) in objects.iter_mut().zip(run.values) {
                if !value.is_null() {
                    insert_json_path(object, path, value);
                }
            }
            children.push(run.node.with_label(path.clone()));
        }

        children.push(self.shared_data_run(rows, &mut objects)?);

        let values = objects.into_iter().map(Value::Object).collect();
        Ok(ColumnRun::new(id, ty.to_string(), self.cursor.since(start), children, values))
    }

    /// Paths beyond the dynamic path cap: `Array(Tuple(String, String))`.
    fn shared_data_run(
        &mut self,
        rows: usize,
        objects: &mut [BTreeMap<String, Value>],
    ) -> Result<Node> {
        let id = self.ctx.reserve();
        let start = self.cursor.position();
        let (offsets, offsets_node) = self.read_offsets(rows)?;
        let total = offsets.last().copied().unwrap_or(0);
        if total > self.cursor.remaining() {
            bail!(DecodeError::UnexpectedEof {
                offset: self.cursor.position(),
                needed: total,
                available: self.cursor.remaining(),
            });
        }

        let paths_id = self.ctx.reserve();
        let paths_start = self.cursor.position();
        let mut paths = Vec::with_capacity(total);
        let mut path_nodes = Vec::with_capacity(total);
        for _ in 0..total {
            let (path, node) = read_string_leaf(self.ctx, self.cursor, "path")?;
            paths.push(path);
            path_nodes.push(node);
        }
        let paths_node =
            stream_container(paths_id, "Paths", paths_start, self.cursor.position(), path_nodes);

        let values_id = self.ctx.reserve();
        let values_start = self.cursor.position();
        let mut value_nodes = Vec::with_capacity(total);
        for path in &paths {
            value_nodes.push(self.embedded_value("String")?.with_label(path.clone()));
        }
        let values_node = stream_container(
            values_id,
            "Values",
            values_start,
            self.cursor.position(),
            value_nodes,
        );

        let mut begin = 0;
        for (object, &end) in objects.iter_mut().zip(&offsets) {
            for (path, node) in paths[begin..end].iter().zip(values_node.children()[begin..end].iter()) {
                if !node.value.is_null() {
                    insert_json_path(object, path, node.value.clone());
                }
            }
            begin = end;
        }

        Ok(stream_container(
            id,
            "SharedData",
            start,
            self.cursor.position(),
            vec![offsets_node, paths_node, values_node],
        )
        .with_label("shared_data"))
    }

    /// JSON serialized as one text document per row.
    fn json_text_run(&mut self, id: NodeId, start: usize, ty: &TypeDescriptor, rows: usize) -> Result<ColumnRun> {
        let mut nodes = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for _ in 0..rows {
            let (bytes, range) = self.cursor.read_string()?;
            let text = String::from_utf8_lossy(bytes);
            let node = match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(document) => self.ctx.leaf("JSON", range, Value::from(&document)),
                Err(e) => {
                    let display = format!("{} (invalid JSON: {})", text, e);
                    self.ctx
                        .leaf("String", range, Value::String(text.into_owned()))
                        .with_display(display)
                }
            };
            values.push(node.value.clone());
            nodes.push(node);
        }
        Ok(ColumnRun::new(id, ty.to_string(), self.cursor.since(start), nodes, values))
    }

    /// Bit-transposed float vectors: plane `p` holds bit `bits - 1 - p` of
    /// every element, element `k` at bit `k % 8` of byte `k / 8`.
    fn qbit_run(
        &mut self,
        id: NodeId,
        start: usize,
        ty: &TypeDescriptor,
        element: &TypeDescriptor,
        dimension: usize,
        rows: usize,
    ) -> Result<ColumnRun> {
        let bits: usize = match element {
            TypeDescriptor::BFloat16 => 16,
            TypeDescriptor::Float32 => 32,
            TypeDescriptor::Float64 => 64,
            _ => bail!(DecodeError::unsupported(ty, FORMAT)),
        };
        let width = dimension.div_ceil(8);
        let needed = width.saturating_mul(bits).saturating_mul(rows);
        if needed > self.cursor.remaining() {
            bail!(DecodeError::UnexpectedEof {
                offset: start,
                needed,
                available: self.cursor.remaining(),
            });
        }

        let plane_type = format!("FixedString({})", width);
        let mut words = vec![vec![0u64; dimension]; rows];
        let mut children = Vec::with_capacity(bits);
        for plane in 0..bits {
            let plane_id = self.ctx.reserve();
            let plane_start = self.cursor.position();
            let mut nodes = Vec::with_capacity(rows);
            for row in words.iter_mut() {
                let (bytes, range) = self.cursor.read_bytes(width)?;
                for (k, word) in row.iter_mut().enumerate() {
                    if (bytes[k / 8] >> (k % 8)) & 1 == 1 {
                        *word |= 1u64 << (bits - 1 - plane);
                    }
                }
                nodes.push(
                    self.ctx
                        .leaf(plane_type.as_str(), range, Value::Bytes(bytes.to_vec())),
                );
            }
            children.push(
                stream_container(plane_id, "BitPlane", plane_start, self.cursor.position(), nodes)
                    .with_label(plane.to_string()),
            );
        }

        let values = words
            .into_iter()
            .map(|row| {
                Value::Array(
                    row.into_iter()
                        .map(|word| match bits {
                            16 => Value::Float32(f32::from_bits((word as u32) << 16)),
                            32 => Value::Float32(f32::from_bits(word as u32)),
                            _ => Value::Float64(f64::from_bits(word)),
                        })
                        .collect(),
                )
            })
            .collect();
        Ok(ColumnRun::new(id, ty.to_string(), self.cursor.since(start), children, values))
    }

    /// Aggregate states are written one after another in their row form.
    fn aggregate_run(&mut self, id: NodeId, start: usize, ty: &TypeDescriptor, rows: usize) -> Result<ColumnRun> {
        let mut nodes = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);
        for _ in 0..rows {
            let node = RowReader::new(&mut *self.cursor, &mut *self.ctx, WireFormat::Native).value(ty)?;
            values.push(node.value.clone());
            nodes.push(node);
        }
        Ok(ColumnRun::new(id, ty.to_string(), self.cursor.since(start), nodes, values))
    }
}

fn slice_by_offsets<'v>(offsets: &'v [usize], values: &'v [Value]) -> impl Iterator<Item = &'v [Value]> {
    let mut begin = 0;
    offsets.iter().map(move |&end| {
        let slice = values.get(begin..end).unwrap_or(&[]);
        begin = end;
        slice
    })
}

fn entry_pair(entry: &Value) -> (Value, Value) {
    match entry {
        Value::Record(fields) if fields.len() == 2 => (fields[0].1.clone(), fields[1].1.clone()),
        other => (other.clone(), Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_type;

    fn run(ty: &str, rows: usize, bytes: &[u8]) -> Result<(ColumnRun, usize)> {
        let ty = parse_type(ty).unwrap();
        let mut ctx = DecodeContext::new();
        let mut cursor = ByteCursor::new(bytes);
        let mut reader = ColumnReader::new(&mut cursor, &mut ctx);
        let (prefix, _) = reader.read_column_prefix(&ty)?;
        let run = reader.read_column(&ty, &prefix, rows)?;
        Ok((run, cursor.position()))
    }

    fn u64s(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn array_offsets_slice_rows() {
        let mut bytes = u64s(&[2, 3, 3]);
        bytes.extend_from_slice(&[10, 20, 30]);
        let (run, consumed) = run("Array(UInt8)", 3, &bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        let lengths: Vec<usize> = run
            .values
            .iter()
            .map(|v| v.as_array().map(|a| a.len()).unwrap_or(usize::MAX))
            .collect();
        assert_eq!(lengths, [2, 1, 0]);
    }

    #[test]
    fn decreasing_offsets_are_invalid() {
        let mut bytes = u64s(&[2, 1]);
        bytes.extend_from_slice(&[1, 2]);
        let err = run("Array(UInt8)", 2, &bytes).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DecodeError>().map(|e| e.kind()),
            Some("InvalidData")
        );
    }

    #[test]
    fn nullable_consumes_placeholder_values() {
        let bytes = [0x00, 0x01, 0x07, 0x00];
        let (run, consumed) = run("Nullable(UInt8)", 2, &bytes).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(run.values, vec![Value::UInt(7), Value::Null]);
    }

    #[test]
    fn tuple_elements_are_sequential_runs() {
        let bytes = [1, 2, 0x01, b'a', 0x01, b'b'];
        let (run, _) = run("Tuple(UInt8, String)", 2, &bytes).unwrap();
        assert_eq!(
            run.values[1],
            Value::Tuple(vec![Value::UInt(2), Value::String("b".into())])
        );
    }

    #[test]
    fn low_cardinality_nullable_index_zero_is_null() {
        let mut bytes = 1u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&u64s(&[LC_HAS_ADDITIONAL_KEYS, 2]));
        bytes.extend_from_slice(&[0x00, 0x02, b'h', b'i']);
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(&[1, 0, 1]);
        let (run, consumed) = run("LowCardinality(Nullable(String))", 3, &bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(
            run.values,
            vec![Value::String("hi".into()), Value::Null, Value::String("hi".into())]
        );
    }

    #[test]
    fn global_dictionary_is_unsupported() {
        let mut bytes = 1u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&u64s(&[LC_NEED_GLOBAL_DICTIONARY, 0]));
        let err = run("LowCardinality(String)", 1, &bytes).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DecodeError>().map(|e| e.kind()),
            Some("UnsupportedType")
        );
    }

    #[test]
    fn variant_reassembles_sparse_branches() {
        // Variant(String, UInt8): rows 'x', NULL, 5, 9 (branch 7 unknown)
        let mut bytes = 0u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0, 255, 1, 7]);
        bytes.extend_from_slice(&[0x01, b'x']);
        bytes.push(5);
        let (run, consumed) = run("Variant(UInt8, String)", 4, &bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(
            run.values,
            vec![
                Value::String("x".into()),
                Value::Null,
                Value::UInt(5),
                Value::Unknown(7)
            ]
        );
    }

    #[test]
    fn compact_variant_granule_uses_single_discriminator() {
        let mut bytes = 1u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[VARIANT_GRANULE_COMPACT, 1, 4, 5]);
        let (run, _) = run("Variant(UInt8, String)", 2, &bytes).unwrap();
        assert_eq!(run.values, vec![Value::UInt(4), Value::UInt(5)]);
    }

    #[test]
    fn dynamic_shared_variant_decodes_embedded_value() {
        let mut bytes = 2u64.to_le_bytes().to_vec();
        bytes.push(1);
        bytes.push(5);
        bytes.extend_from_slice(b"Int64");
        bytes.extend_from_slice(&0u64.to_le_bytes());
        // alternatives: Int64 (0), SharedVariant (1)
        bytes.extend_from_slice(&[0, 1]);
        bytes.extend_from_slice(&(-3i64).to_le_bytes());
        // shared: String 'ok' as binary type 0x15 + value
        bytes.extend_from_slice(&[0x04, 0x15, 0x02, b'o', b'k']);
        let (run, consumed) = run("Dynamic", 2, &bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(run.values, vec![Value::Int(-3), Value::String("ok".into())]);
    }

    #[test]
    fn nothing_takes_one_byte_per_row() {
        let (run, consumed) = run("Nullable(Nothing)", 2, &[1, 1, 0, 0]).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(run.values, vec![Value::Null, Value::Null]);
    }

    #[test]
    fn qbit_transposes_bit_planes() {
        // QBit(BFloat16, 1): value 1.0 = bf16 0x3F80
        let word: u16 = 0x3F80;
        let bytes: Vec<u8> = (0..16).map(|plane| ((word >> (15 - plane)) & 1) as u8).collect();
        let (run, consumed) = run("QBit(BFloat16, 1)", 1, &bytes).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(run.values, vec![Value::Array(vec![Value::Float32(1.0)])]);
    }

    #[test]
    fn rows_beyond_buffer_fail_fast() {
        let err = run("UInt8", 1 << 20, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DecodeError>().map(|e| e.kind()),
            Some("UnexpectedEof")
        );
    }
}
