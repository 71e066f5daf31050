// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The surface's mirror of model cells.
//!
//! The model owns cells; the surface only keeps the handful of attributes
//! scheduling needs (kind, stacking value, layer assignment, bounds) and
//! updates them when the model reports a change.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

/// Identity of a model cell.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub u64);

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({})", self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CellId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Scheduling-relevant attributes of a model cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Identity of the cell.
    pub id: CellId,
    /// Name of the view type that renders this cell.
    pub kind: String,
    /// Relative stacking value; higher is drawn later.
    pub z: i64,
    /// Explicit layer assignment. `None` places the view in the default
    /// cells layer.
    pub layer: Option<String>,
    /// Bounding box in surface coordinates, if known.
    pub bounds: Option<Rect>,
}

impl Cell {
    /// Creates a cell of the given kind with `z = 0`, no layer and no bounds.
    #[must_use]
    pub fn new(id: impl Into<CellId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            z: 0,
            layer: None,
            bounds: None,
        }
    }

    /// Sets the stacking value.
    #[must_use]
    pub fn with_z(mut self, z: i64) -> Self {
        self.z = z;
        self
    }

    /// Assigns the cell to a named layer.
    #[must_use]
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Sets the bounding box.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

#[derive(Clone, Debug)]
struct Entry {
    cell: Cell,
    seq: u64,
}

/// The set of live cells, with insertion order and z bounds.
#[derive(Clone, Debug, Default)]
pub struct CellStore {
    cells: BTreeMap<CellId, Entry>,
    next_seq: u64,
}

impl CellStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a cell, returning its insertion sequence number.
    ///
    /// A replaced cell gets a fresh sequence number, as if it had been
    /// removed and added again.
    pub fn insert(&mut self, cell: Cell) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.cells.insert(cell.id, Entry { cell, seq });
        seq
    }

    /// Removes a cell.
    pub fn remove(&mut self, id: CellId) -> Option<Cell> {
        self.cells.remove(&id).map(|e| e.cell)
    }

    /// Returns a cell by id.
    #[must_use]
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id).map(|e| &e.cell)
    }

    /// Returns a mutable reference to a cell by id.
    pub fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(&id).map(|e| &mut e.cell)
    }

    /// Returns the insertion sequence number of a cell.
    #[must_use]
    pub fn seq(&self, id: CellId) -> Option<u64> {
        self.cells.get(&id).map(|e| e.seq)
    }

    /// Returns whether a cell exists.
    #[must_use]
    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    /// Returns the number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Removes every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Returns the ids of all cells in insertion order.
    #[must_use]
    pub fn ids_in_order(&self) -> Vec<CellId> {
        let mut ids: Vec<(u64, CellId)> =
            self.cells.values().map(|e| (e.seq, e.cell.id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Counts the cells placed in the named layer.
    ///
    /// Cells without a layer attribute count toward `default`.
    #[must_use]
    pub fn count_in_layer(&self, layer: &str, default: &str) -> usize {
        self.cells
            .values()
            .filter(|e| e.cell.layer.as_deref().unwrap_or(default) == layer)
            .count()
    }

    /// Returns the lowest stacking value, or 0 when there are no cells.
    #[must_use]
    pub fn min_z_index(&self) -> i64 {
        self.cells.values().map(|e| e.cell.z).min().unwrap_or(0)
    }

    /// Returns the highest stacking value, or 0 when there are no cells.
    #[must_use]
    pub fn max_z_index(&self) -> i64 {
        self.cells.values().map(|e| e.cell.z).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_bounds_default_to_zero() {
        let store = CellStore::new();
        assert_eq!(store.min_z_index(), 0);
        assert_eq!(store.max_z_index(), 0);
    }

    #[test]
    fn z_bounds_track_cells() {
        let mut store = CellStore::new();
        store.insert(Cell::new(1, "rect").with_z(5));
        store.insert(Cell::new(2, "rect").with_z(-3));
        store.insert(Cell::new(3, "rect").with_z(2));
        assert_eq!(store.min_z_index(), -3);
        assert_eq!(store.max_z_index(), 5);

        store.remove(CellId(1));
        assert_eq!(store.max_z_index(), 2);
    }

    #[test]
    fn insertion_order_survives_id_order() {
        let mut store = CellStore::new();
        store.insert(Cell::new(9, "rect"));
        store.insert(Cell::new(1, "rect"));
        store.insert(Cell::new(5, "rect"));
        assert_eq!(store.ids_in_order(), [CellId(9), CellId(1), CellId(5)]);
    }

    #[test]
    fn replacing_a_cell_moves_it_to_the_end() {
        let mut store = CellStore::new();
        store.insert(Cell::new(1, "rect"));
        store.insert(Cell::new(2, "rect"));
        store.insert(Cell::new(1, "ellipse"));
        assert_eq!(store.ids_in_order(), [CellId(2), CellId(1)]);
        assert_eq!(
            store.get(CellId(1)).map(|c| c.kind.as_str()),
            Some("ellipse")
        );
    }

    #[test]
    fn layer_counts() {
        let mut store = CellStore::new();
        store.insert(Cell::new(1, "rect").with_layer("front"));
        store.insert(Cell::new(2, "rect"));
        assert_eq!(store.count_in_layer("front", "cells"), 1);
        assert_eq!(store.count_in_layer("cells", "cells"), 1);
        assert_eq!(store.count_in_layer("back", "cells"), 0);
    }
}
