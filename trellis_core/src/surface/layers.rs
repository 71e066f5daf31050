// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer management and stacking.

use alloc::string::ToString;
use alloc::vec::Vec;

use super::Surface;
use crate::cell::CellId;
use crate::error::SurfaceError;
use crate::layer::{CELLS_LAYER, Layer, LayerPosition, LayerRef};
use crate::node::{NodeId, NodeKind, NodeStore};
use crate::sorting::{self, Sorting};
#[cfg(feature = "trace-rich")]
use crate::trace::LayerChangeKind as LayerEventKind;

/// Stand-in so call sites read the same with and without `trace-rich`.
#[cfg(not(feature = "trace-rich"))]
#[derive(Clone, Copy)]
enum LayerEventKind {
    Added,
    Removed,
    Moved,
    Sorted,
}

impl Surface {
    /// The node tree owned by the surface.
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    /// The root node all layers hang off.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.layers.root()
    }

    /// Creates a detached layer node, ready for [`add_layer`](Self::add_layer).
    pub fn create_layer_node(&mut self) -> NodeId {
        self.assert_alive();
        self.nodes.create_node(NodeKind::Layer)
    }

    /// Registers a layer.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or taken, if `node` is not a detached
    /// layer node, or if a `Before` target is unknown.
    pub fn add_layer(
        &mut self,
        name: &str,
        node: NodeId,
        position: LayerPosition<'_>,
    ) -> Result<(), SurfaceError> {
        self.assert_alive();
        self.layers.add(&mut self.nodes, name, node, position)?;
        let index = self.layers.index_of(name);
        self.trace_layer(index, LayerEventKind::Added);
        Ok(())
    }

    /// Unregisters a layer and detaches its node.
    ///
    /// # Errors
    ///
    /// Fails if the layer is unknown, holds view nodes, or has cells
    /// assigned to it.
    pub fn remove_layer(&mut self, layer: LayerRef<'_>) -> Result<(), SurfaceError> {
        self.assert_alive();
        let name = match layer {
            LayerRef::Name(name) => self.layers.get(name).map(Layer::name),
            LayerRef::Node(node) => self.layers.by_node(node).map(Layer::name),
        }
        .map(ToString::to_string);
        let Some(name) = name else {
            return Err(match layer {
                LayerRef::Name(name) => SurfaceError::UnknownLayer(name.to_string()),
                LayerRef::Node(node) => SurfaceError::InvalidLayerNode(node),
            });
        };
        let cells = self.cells.count_in_layer(&name, CELLS_LAYER);
        if cells > 0 {
            let views = self
                .layers
                .get(&name)
                .map_or(0, |l| self.nodes.child_count(l.node(), Some(NodeKind::View)));
            return Err(SurfaceError::LayerNotEmpty { name, views, cells });
        }
        let index = self.layers.index_of(&name);
        self.layers.remove(&mut self.nodes, LayerRef::Name(&name))?;
        self.trace_layer(index, LayerEventKind::Removed);
        Ok(())
    }

    /// Moves a layer to a new position in the layer order.
    ///
    /// # Errors
    ///
    /// Fails if the layer or a `Before` target is unknown.
    pub fn move_layer(&mut self, name: &str, position: LayerPosition<'_>) -> Result<(), SurfaceError> {
        self.assert_alive();
        self.layers.move_to(&mut self.nodes, name, position)?;
        let index = self.layers.index_of(name);
        self.trace_layer(index, LayerEventKind::Moved);
        Ok(())
    }

    /// Returns a layer by name.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Returns whether a layer with this name exists.
    #[must_use]
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.has(name)
    }

    /// Layer names, back to front.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.names()
    }

    /// The cells whose views are attached to a layer, back to front.
    ///
    /// Returns an empty list for unknown layers.
    #[must_use]
    pub fn layer_cells(&self, name: &str) -> Vec<CellId> {
        let Some(layer) = self.layers.get(name) else {
            return Vec::new();
        };
        self.nodes
            .children(layer.node())
            .filter(|&child| self.nodes.kind(child) == NodeKind::View)
            .filter_map(|child| self.view_nodes.get(&child.index()))
            .filter_map(|&idx| self.views.slot(idx).map(|slot| slot.cell))
            .collect()
    }

    /// Drains the layers whose stacking changed since the last call.
    ///
    /// A layer appears once no matter how many views were attached,
    /// detached, or reordered under it. Renderers use this to limit repaints
    /// to the touched layers.
    pub fn take_layer_changes(&mut self) -> Vec<NodeId> {
        let changed = self.nodes.take_topology_changes();
        changed
            .into_iter()
            .filter(|&node| self.nodes.kind(node) == NodeKind::Layer)
            .collect()
    }

    /// Resorts every layer by `(z, insertion order)`.
    ///
    /// Only meaningful under [`Sorting::Exact`]; other strategies keep the
    /// order they produced at insertion. Postponed until unfreeze if frozen.
    pub fn sort_layers(&mut self) {
        self.assert_alive();
        if self.config.sorting != Sorting::Exact {
            return;
        }
        for layer in self.layers.iter() {
            self.nodes.mark_unsorted(layer.node());
        }
        self.resort_marked();
    }

    /// Resorts the layers marked as unsorted.
    pub(super) fn resort_marked(&mut self) {
        if self.config.sorting != Sorting::Exact {
            return;
        }
        if self.freeze.is_frozen() {
            self.sort_pending = true;
            return;
        }
        self.sort_pending = false;
        for layer in self.nodes.take_unsorted() {
            if !self.nodes.is_alive(layer) {
                continue;
            }
            if sorting::sort_children(&mut self.nodes, layer) {
                let index = self.layers.iter().position(|l| l.node() == layer);
                self.trace_layer(index, LayerEventKind::Sorted);
            }
        }
    }

    #[cfg(feature = "trace-rich")]
    fn trace_layer(&mut self, index: Option<usize>, kind: LayerEventKind) {
        let Some(index) = index else {
            return;
        };
        let e = crate::trace::LayerEvent {
            layer_index: u32::try_from(index).unwrap_or(u32::MAX),
            kind,
        };
        super::tracer(&mut self.sink).layer(&e);
    }

    #[cfg(not(feature = "trace-rich"))]
    #[inline]
    fn trace_layer(&mut self, index: Option<usize>, kind: LayerEventKind) {
        _ = (index, kind);
    }
}
