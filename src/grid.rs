//! Node sets with named scalar fields.
//!
//! A [`Grid`] stores node ids and positions in insertion order plus one value
//! column per field. Insertion order is the canonical order: `coordinates()`
//! and `node_ids()` always line up index for index.

use std::collections::BTreeMap;

use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::error::{Result, TransferError};
use crate::geometry::Aabb;

/// Stable node identifier, unique within one grid.
pub type NodeId = u64;

/// Unstructured 3D node set carrying named scalar fields.
///
/// A field value is `None` until assigned. An assigned NaN is the missing-value
/// sentinel and is distinct from "never assigned".
#[derive(Debug, Clone, Default)]
pub struct Grid {
    ids: Vec<NodeId>,
    positions: Vec<DVec3>,
    lookup: FxHashMap<NodeId, usize>,
    fields: BTreeMap<String, Vec<Option<f64>>>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            lookup: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            fields: BTreeMap::new(),
        }
    }

    /// Build a grid from `(id, position)` pairs, keeping their order.
    pub fn from_nodes<I, P>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, P)>,
        P: Into<DVec3>,
    {
        let nodes = nodes.into_iter();
        let mut grid = Self::with_capacity(nodes.size_hint().0);
        for (id, position) in nodes {
            grid.insert_node(id, position)?;
        }
        Ok(grid)
    }

    /// Append a node. Existing fields get an unassigned slot for it.
    pub fn insert_node(&mut self, id: NodeId, position: impl Into<DVec3>) -> Result<()> {
        let position = position.into();
        if !position.is_finite() {
            return Err(TransferError::InvalidInput(format!(
                "node {} has a non-finite position {:?}",
                id, position
            )));
        }
        if self.lookup.contains_key(&id) {
            return Err(TransferError::DuplicateNode(id));
        }
        self.lookup.insert(id, self.ids.len());
        self.ids.push(id);
        self.positions.push(position);
        for column in self.fields.values_mut() {
            column.push(None);
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Canonical position of `id` in `node_ids()` / `coordinates()`.
    #[inline]
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    pub fn position(&self, id: NodeId) -> Option<DVec3> {
        self.index_of(id).map(|i| self.positions[i])
    }

    /// Node positions in canonical order.
    #[inline]
    pub fn coordinates(&self) -> &[DVec3] {
        &self.positions
    }

    /// Node ids in canonical order, aligned with `coordinates()`.
    #[inline]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.positions)
    }

    /// Fields holding at least one assigned value.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, column)| is_assigned(column))
            .map(|(name, _)| name.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|column| is_assigned(column))
    }

    /// Values of `name`, or `UnknownField` if it was never assigned on any node.
    ///
    /// A field whose assigned values are all NaN is still returned.
    pub fn get_field(&self, name: &str) -> Result<FieldView<'_>> {
        let (name, values) = self
            .fields
            .get_key_value(name)
            .filter(|(_, column)| is_assigned(column))
            .ok_or_else(|| TransferError::UnknownField(name.to_string()))?;
        Ok(FieldView {
            name: name.as_str(),
            ids: &self.ids,
            lookup: &self.lookup,
            values: values.as_slice(),
        })
    }

    /// Value of `field` at `id`; `None` if unassigned, unknown field or unknown node.
    pub fn value(&self, id: NodeId, field: &str) -> Option<f64> {
        let i = self.index_of(id)?;
        self.fields.get(field)?[i]
    }

    /// Assign or overwrite one value. NaN is accepted as the missing sentinel.
    pub fn set_value(&mut self, id: NodeId, field: &str, value: f64) -> Result<()> {
        let i = self.index_of(id).ok_or(TransferError::UnknownNode(id))?;
        self.column_mut(field)[i] = Some(value);
        Ok(())
    }

    /// Assign many values of one field.
    ///
    /// All ids are resolved first: on `UnknownNode` the grid is left untouched.
    /// An empty `values` assigns nothing and does not create the field.
    pub fn set_field<I>(&mut self, field: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (NodeId, f64)>,
    {
        let resolved = values
            .into_iter()
            .map(|(id, value)| {
                self.index_of(id)
                    .map(|i| (i, value))
                    .ok_or(TransferError::UnknownNode(id))
            })
            .collect::<Result<Vec<(usize, f64)>>>()?;
        if resolved.is_empty() {
            return Ok(());
        }

        let column = self.column_mut(field);
        for (i, value) in resolved {
            column[i] = Some(value);
        }
        Ok(())
    }

    /// Verify every node has some value (NaN included) for `field`.
    pub fn check_completeness(&self, field: &str) -> Result<()> {
        let view = self.get_field(field)?;
        let unassigned: Vec<NodeId> = view
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(id, _)| id)
            .collect();
        if unassigned.is_empty() {
            Ok(())
        } else {
            Err(TransferError::IncompleteAssignment {
                field: field.to_string(),
                nodes: unassigned,
            })
        }
    }

    /// Column for `field`, created unassigned if absent.
    pub(crate) fn column_mut(&mut self, field: &str) -> &mut Vec<Option<f64>> {
        let len = self.ids.len();
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| vec![None; len])
    }

    /// Clone of the raw column, for snapshot/restore around destructive work.
    pub(crate) fn snapshot_field(&self, field: &str) -> Option<Vec<Option<f64>>> {
        self.fields.get(field).cloned()
    }

    /// Put back a column taken with `snapshot_field`. `None` drops the field.
    pub(crate) fn restore_field(&mut self, field: &str, snapshot: Option<Vec<Option<f64>>>) {
        match snapshot {
            Some(values) if values.len() == self.ids.len() => {
                self.fields.insert(field.to_string(), values);
            }
            Some(_) => log::warn!("Discarding snapshot of '{}': node count changed", field),
            None => {
                self.fields.remove(field);
            }
        }
    }
}

#[inline]
fn is_assigned(column: &[Option<f64>]) -> bool {
    column.iter().any(Option::is_some)
}

/// Read-only view of one field, in grid order.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    name: &'a str,
    ids: &'a [NodeId],
    lookup: &'a FxHashMap<NodeId, usize>,
    values: &'a [Option<f64>],
}

impl<'a> FieldView<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw values aligned with the grid's `node_ids()`.
    pub fn values(&self) -> &'a [Option<f64>] {
        self.values
    }

    /// Position of `id` in `values()`.
    #[inline]
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    pub fn get(&self, id: NodeId) -> Option<f64> {
        self.lookup.get(&id).and_then(|&i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Option<f64>)> + 'a {
        self.ids.iter().copied().zip(self.values.iter().copied())
    }

    /// Values with unassigned slots read as NaN.
    pub fn to_dense(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    /// Nodes that are unassigned or hold the NaN sentinel.
    pub fn missing_count(&self) -> usize {
        self.values
            .iter()
            .filter(|v| v.map_or(true, f64::is_nan))
            .count()
    }
}
