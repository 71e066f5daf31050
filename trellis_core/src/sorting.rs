// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stacking order of view nodes within a layer.
//!
//! Every view node carries a sort key `(z, seq)` in the [`NodeStore`], where
//! `seq` is the insertion order of its cell. The [`Sorting`] strategy decides
//! how much of that key is honored when a node is placed:
//!
//! - [`Sorting::None`] appends and ignores `z`.
//! - [`Sorting::Approx`] inserts before a per-`z` pivot node. Nodes with
//!   equal `z` are grouped, but a `z` change only re-places the node that
//!   changed.
//! - [`Sorting::Exact`] inserts at the sorted position and resorts whole
//!   layers when a `z` changes.

use alloc::vec::Vec;

use crate::layer::Layer;
use crate::node::{NodeId, NodeKind, NodeStore};

/// How view nodes are ordered within a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Sorting {
    /// Insertion order; `z` is ignored.
    None,
    /// Grouped by `z` through pivot nodes, without full resorts.
    #[default]
    Approx,
    /// Fully sorted by `(z, insertion order)`.
    Exact,
}

/// Pivots sort after every view with the same `z`.
const PIVOT_SEQ: u64 = u64::MAX;

/// Attaches `node` to `layer` at the position the strategy dictates.
///
/// The node must be detached and its sort key must be current.
pub(crate) fn place(nodes: &mut NodeStore, layer: &mut Layer, node: NodeId, sorting: Sorting) {
    match sorting {
        Sorting::None => nodes.append_child(layer.node(), node),
        Sorting::Approx => {
            let (z, _) = nodes.sort_key(node);
            let pivot = ensure_pivot(nodes, layer, z);
            nodes.insert_before(node, pivot);
        }
        Sorting::Exact => {
            let key = nodes.sort_key(node);
            let next = nodes
                .children(layer.node())
                .find(|&child| nodes.sort_key(child) > key);
            match next {
                Some(next) => nodes.insert_before(node, next),
                None => nodes.append_child(layer.node(), node),
            }
        }
    }
}

/// Returns the pivot node for `z`, creating it if needed.
///
/// A new pivot goes directly after the pivot with the nearest lower `z`, or
/// first in the layer if there is none.
pub(crate) fn ensure_pivot(nodes: &mut NodeStore, layer: &mut Layer, z: i64) -> NodeId {
    if let Some(&pivot) = layer.pivots.get(&z) {
        return pivot;
    }
    let pivot = nodes.create_node(NodeKind::Pivot);
    nodes.set_sort_key(pivot, z, PIVOT_SEQ);
    let lower = layer.pivots.range(..z).next_back().map(|(_, &p)| p);
    match (lower, nodes.first_child(layer.node())) {
        (Some(lower), _) => nodes.insert_after(pivot, lower),
        (None, Some(first)) => nodes.insert_before(pivot, first),
        (None, None) => nodes.append_child(layer.node(), pivot),
    }
    layer.pivots.insert(z, pivot);
    pivot
}

/// Stably sorts the children of `layer` by their sort keys.
///
/// Returns whether the order changed.
pub(crate) fn sort_children(nodes: &mut NodeStore, layer: NodeId) -> bool {
    let current: Vec<NodeId> = nodes.children(layer).collect();
    let mut sorted = current.clone();
    sorted.sort_by_key(|&child| nodes.sort_key(child));
    if sorted == current {
        return false;
    }
    nodes.reorder_children(layer, &sorted);
    true
}
