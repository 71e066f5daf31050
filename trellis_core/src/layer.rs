// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named layers.
//!
//! A [`LayerManager`] keeps an ordered list of [`Layer`]s whose nodes are the
//! children of the surface root, in the same order. View nodes are attached
//! to layers, never to the root directly.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::SurfaceError;
use crate::node::{NodeId, NodeKind, NodeStore};

/// Layer for the background grid.
pub const GRID_LAYER: &str = "grid";
/// Layer drawn behind all cells.
pub const BACK_LAYER: &str = "back";
/// Default layer for cell views.
pub const CELLS_LAYER: &str = "cells";
/// Layer for link labels.
pub const LABELS_LAYER: &str = "labels";
/// Layer drawn in front of all cells.
pub const FRONT_LAYER: &str = "front";
/// Layer for interactive tools.
pub const TOOLS_LAYER: &str = "tools";

/// Layers every surface starts with, back to front.
pub const IMPLICIT_LAYERS: [&str; 6] = [
    GRID_LAYER,
    BACK_LAYER,
    CELLS_LAYER,
    LABELS_LAYER,
    FRONT_LAYER,
    TOOLS_LAYER,
];

/// Where a layer goes in the layer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerPosition<'a> {
    /// After every other layer.
    End,
    /// Directly before the named layer.
    Before(&'a str),
    /// At the given index, clamped to the number of layers.
    Index(usize),
}

/// A layer, addressed by name or by node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerRef<'a> {
    /// By registered name.
    Name(&'a str),
    /// By layer node.
    Node(NodeId),
}

impl<'a> From<&'a str> for LayerRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl From<NodeId> for LayerRef<'_> {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

/// A registered layer.
#[derive(Clone, Debug)]
pub struct Layer {
    name: String,
    node: NodeId,
    /// z value → pivot node, used by approximate sorting.
    pub(crate) pivots: BTreeMap<i64, NodeId>,
}

impl Layer {
    /// The layer's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The layer's node.
    #[inline]
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Ordered registry of named layers under one root node.
#[derive(Clone, Debug)]
pub struct LayerManager {
    root: NodeId,
    layers: Vec<Layer>,
}

impl LayerManager {
    /// Creates a manager with a fresh root node and no layers.
    pub fn new(nodes: &mut NodeStore) -> Self {
        Self {
            root: nodes.create_node(NodeKind::Root),
            layers: Vec::new(),
        }
    }

    /// Creates a manager holding the [`IMPLICIT_LAYERS`].
    pub fn with_implicit_layers(nodes: &mut NodeStore) -> Self {
        let mut manager = Self::new(nodes);
        for name in IMPLICIT_LAYERS {
            let node = nodes.create_node(NodeKind::Layer);
            nodes.append_child(manager.root, node);
            manager.layers.push(Layer {
                name: name.to_string(),
                node,
                pivots: BTreeMap::new(),
            });
        }
        manager
    }

    /// The root node all layers are attached to.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Registers `node` as a layer named `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or taken, if `node` is not a live detached
    /// [`NodeKind::Layer`] node, or if a `Before` target is unknown.
    pub fn add(
        &mut self,
        nodes: &mut NodeStore,
        name: &str,
        node: NodeId,
        position: LayerPosition<'_>,
    ) -> Result<&Layer, SurfaceError> {
        if name.is_empty() {
            return Err(SurfaceError::MissingLayerName);
        }
        if !nodes.is_alive(node) || nodes.kind(node) != NodeKind::Layer || nodes.parent(node).is_some()
        {
            return Err(SurfaceError::InvalidLayerNode(node));
        }
        if self.has(name) {
            return Err(SurfaceError::DuplicateLayer(name.to_string()));
        }
        let index = self.resolve_position(position)?;
        self.link_at(nodes, node, index);
        self.layers.insert(
            index,
            Layer {
                name: name.to_string(),
                node,
                pivots: BTreeMap::new(),
            },
        );
        Ok(&self.layers[index])
    }

    /// Unregisters a layer and detaches its node from the root.
    ///
    /// Pivot nodes are destroyed with the layer. The layer node itself stays
    /// alive so the caller may reuse it.
    ///
    /// # Errors
    ///
    /// Fails if the layer is unknown or still holds view nodes.
    pub fn remove(
        &mut self,
        nodes: &mut NodeStore,
        layer: LayerRef<'_>,
    ) -> Result<Layer, SurfaceError> {
        let index = self.index_of_ref(layer)?;
        let node = self.layers[index].node;
        let views = nodes.child_count(node, Some(NodeKind::View));
        if views > 0 {
            return Err(SurfaceError::LayerNotEmpty {
                name: self.layers[index].name.clone(),
                views,
                cells: 0,
            });
        }
        let removed = self.layers.remove(index);
        for pivot in removed.pivots.values() {
            nodes.destroy_node(*pivot);
        }
        nodes.detach(node);
        Ok(removed)
    }

    /// Moves a layer to a new position.
    ///
    /// Moving a layer before itself succeeds without changes.
    ///
    /// # Errors
    ///
    /// Fails if the layer or a `Before` target is unknown.
    pub fn move_to(
        &mut self,
        nodes: &mut NodeStore,
        name: &str,
        position: LayerPosition<'_>,
    ) -> Result<(), SurfaceError> {
        let from = self
            .index_of(name)
            .ok_or_else(|| SurfaceError::UnknownLayer(name.to_string()))?;
        if position == LayerPosition::Before(name) {
            return Ok(());
        }
        // Validate the target before touching anything.
        self.resolve_position(position)?;

        let layer = self.layers.remove(from);
        nodes.detach(layer.node);
        let index = match self.resolve_position(position) {
            Ok(index) => index,
            Err(e) => {
                // Unreachable after validation, but keep the registry whole.
                self.layers.insert(from, layer);
                return Err(e);
            }
        };
        self.link_at(nodes, layer.node, index);
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Returns a layer by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    /// Returns the layer that owns `node`.
    #[must_use]
    pub fn by_node(&self, node: NodeId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.node == node)
    }

    /// Returns whether a layer with this name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Returns the position of a layer in the order.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// Returns all layer names, back to front.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    /// Iterates layers back to front.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }

    /// Drops every layer, destroying pivots and detaching layer nodes.
    pub(crate) fn clear(&mut self, nodes: &mut NodeStore) {
        for layer in self.layers.drain(..) {
            for pivot in layer.pivots.values() {
                nodes.destroy_node(*pivot);
            }
            nodes.detach(layer.node);
        }
    }

    fn index_of_ref(&self, layer: LayerRef<'_>) -> Result<usize, SurfaceError> {
        match layer {
            LayerRef::Name(name) => self
                .index_of(name)
                .ok_or_else(|| SurfaceError::UnknownLayer(name.to_string())),
            LayerRef::Node(node) => self
                .layers
                .iter()
                .position(|l| l.node == node)
                .ok_or_else(|| SurfaceError::UnknownLayer(format!("{node:?}"))),
        }
    }

    fn resolve_position(&self, position: LayerPosition<'_>) -> Result<usize, SurfaceError> {
        match position {
            LayerPosition::End => Ok(self.layers.len()),
            LayerPosition::Before(target) => self
                .index_of(target)
                .ok_or_else(|| SurfaceError::UnknownLayer(target.to_string())),
            LayerPosition::Index(i) => Ok(i.min(self.layers.len())),
        }
    }

    /// Attaches `node` under the root so it ends up at `index` in the order.
    fn link_at(&self, nodes: &mut NodeStore, node: NodeId, index: usize) {
        match self.layers.get(index) {
            Some(next) => nodes.insert_before(node, next.node),
            None => nodes.append_child(self.root, node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (NodeStore, LayerManager) {
        let mut nodes = NodeStore::new();
        let layers = LayerManager::with_implicit_layers(&mut nodes);
        (nodes, layers)
    }

    fn node_order(nodes: &NodeStore, layers: &LayerManager) -> Vec<NodeId> {
        nodes.children(layers.root()).collect()
    }

    fn registry_order(layers: &LayerManager) -> Vec<NodeId> {
        layers.iter().map(Layer::node).collect()
    }

    #[test]
    fn implicit_layers_in_order() {
        let (nodes, layers) = setup();
        assert_eq!(layers.names(), IMPLICIT_LAYERS);
        assert_eq!(node_order(&nodes, &layers), registry_order(&layers));
    }

    #[test]
    fn add_before_and_at_end() {
        let (mut nodes, mut layers) = setup();
        let a = nodes.create_node(NodeKind::Layer);
        let b = nodes.create_node(NodeKind::Layer);
        layers
            .add(&mut nodes, "overlay", a, LayerPosition::End)
            .unwrap();
        layers
            .add(&mut nodes, "shadows", b, LayerPosition::Before(CELLS_LAYER))
            .unwrap();
        assert_eq!(
            layers.names(),
            ["grid", "back", "shadows", "cells", "labels", "front", "tools", "overlay"]
        );
        assert_eq!(node_order(&nodes, &layers), registry_order(&layers));
    }

    #[test]
    fn add_rejects_bad_input() {
        let (mut nodes, mut layers) = setup();
        let good = nodes.create_node(NodeKind::Layer);
        let view = nodes.create_node(NodeKind::View);

        assert_eq!(
            layers.add(&mut nodes, "", good, LayerPosition::End).err(),
            Some(SurfaceError::MissingLayerName)
        );
        assert_eq!(
            layers.add(&mut nodes, "x", view, LayerPosition::End).err(),
            Some(SurfaceError::InvalidLayerNode(view))
        );
        assert_eq!(
            layers.add(&mut nodes, CELLS_LAYER, good, LayerPosition::End).err(),
            Some(SurfaceError::DuplicateLayer(CELLS_LAYER.into()))
        );
        assert_eq!(
            layers
                .add(&mut nodes, "x", good, LayerPosition::Before("nope"))
                .err(),
            Some(SurfaceError::UnknownLayer("nope".into()))
        );
        // An attached node is not accepted twice.
        let cells = layers.get(CELLS_LAYER).unwrap().node();
        assert_eq!(
            layers.add(&mut nodes, "again", cells, LayerPosition::End).err(),
            Some(SurfaceError::InvalidLayerNode(cells))
        );
    }

    #[test]
    fn remove_guards_views() {
        let (mut nodes, mut layers) = setup();
        let cells = layers.get(CELLS_LAYER).unwrap().node();
        let v = nodes.create_node(NodeKind::View);
        nodes.append_child(cells, v);

        let err = layers.remove(&mut nodes, CELLS_LAYER.into()).unwrap_err();
        assert!(matches!(err, SurfaceError::LayerNotEmpty { views: 1, .. }));

        nodes.remove_from_parent(v);
        let removed = layers.remove(&mut nodes, cells.into()).unwrap();
        assert_eq!(removed.name(), CELLS_LAYER);
        assert!(!layers.has(CELLS_LAYER));
        assert_eq!(nodes.parent(cells), None);
        assert_eq!(node_order(&nodes, &layers), registry_order(&layers));
    }

    #[test]
    fn remove_ignores_and_destroys_pivots() {
        let (mut nodes, mut layers) = setup();
        let cells = layers.get(CELLS_LAYER).unwrap().node();
        let pivot = nodes.create_node(NodeKind::Pivot);
        nodes.append_child(cells, pivot);
        layers.get_mut(CELLS_LAYER).unwrap().pivots.insert(3, pivot);

        layers.remove(&mut nodes, CELLS_LAYER.into()).unwrap();
        assert!(!nodes.is_alive(pivot));
    }

    #[test]
    fn remove_unknown_fails() {
        let (mut nodes, mut layers) = setup();
        assert_eq!(
            layers.remove(&mut nodes, "nope".into()).err(),
            Some(SurfaceError::UnknownLayer("nope".into()))
        );
    }

    #[test]
    fn move_layer_positions() {
        let (mut nodes, mut layers) = setup();
        layers
            .move_to(&mut nodes, GRID_LAYER, LayerPosition::End)
            .unwrap();
        assert_eq!(
            layers.names(),
            ["back", "cells", "labels", "front", "tools", "grid"]
        );
        layers
            .move_to(&mut nodes, TOOLS_LAYER, LayerPosition::Before(BACK_LAYER))
            .unwrap();
        assert_eq!(
            layers.names(),
            ["tools", "back", "cells", "labels", "front", "grid"]
        );
        layers
            .move_to(&mut nodes, GRID_LAYER, LayerPosition::Index(0))
            .unwrap();
        assert_eq!(
            layers.names(),
            ["grid", "tools", "back", "cells", "labels", "front"]
        );
        assert_eq!(node_order(&nodes, &layers), registry_order(&layers));
    }

    #[test]
    fn move_before_itself_is_noop() {
        let (mut nodes, mut layers) = setup();
        layers
            .move_to(&mut nodes, CELLS_LAYER, LayerPosition::Before(CELLS_LAYER))
            .unwrap();
        assert_eq!(layers.names(), IMPLICIT_LAYERS);
    }

    #[test]
    fn move_unknown_fails_without_changes() {
        let (mut nodes, mut layers) = setup();
        assert!(layers
            .move_to(&mut nodes, "nope", LayerPosition::End)
            .is_err());
        assert!(layers
            .move_to(&mut nodes, CELLS_LAYER, LayerPosition::Before("nope"))
            .is_err());
        assert_eq!(layers.names(), IMPLICIT_LAYERS);
        assert_eq!(node_order(&nodes, &layers), registry_order(&layers));
    }
}
