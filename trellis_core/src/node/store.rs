// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with allocation, topology, and sort keys.

use alloc::vec::Vec;

use understory_dirty::{CycleHandling, DirtyTracker};

use super::id::{INVALID, NodeId, NodeKind};
use super::traverse::Children;
use crate::dirty;

/// Struct-of-arrays storage for every node of a surface.
///
/// Nodes are addressed by [`NodeId`] handles. Internally, each node occupies
/// a slot in parallel arrays. Destroyed nodes are recycled via a free list,
/// and generation counters prevent stale handle access.
#[derive(Debug)]
pub struct NodeStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) last_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Per-node data --
    pub(crate) kind: Vec<NodeKind>,
    pub(crate) z: Vec<i64>,
    pub(crate) seq: Vec<u64>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    /// Creates an empty node store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            last_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            kind: Vec::new(),
            z: Vec::new(),
            seq: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        }
    }

    // -- Allocation API --

    /// Creates a detached node of the given kind and returns its handle.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.last_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.kind[i] = kind;
            self.z[i] = 0;
            self.seq[i] = 0;
            self.alive[i] = true;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.last_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.kind.push(kind);
            self.z.push(0);
            self.seq.push(0);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };

        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a node, freeing its slot for reuse.
    ///
    /// A node that is still attached is unlinked from its parent first.
    ///
    /// # Panics
    ///
    /// Panics if the node has children or if the handle is stale.
    pub fn destroy_node(&mut self, id: NodeId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy node with children"
        );

        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }

        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.alive[idx as usize] = false;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && self.alive[id.idx as usize]
    }

    /// Returns the kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.validate(id);
        self.kind[id.idx as usize]
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        self.link_last(p, c);
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or `sibling`
    /// has no parent.
    pub fn insert_before(&mut self, child: NodeId, sibling: NodeId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Inserts `child` directly after `sibling` in the sibling list.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or `sibling`
    /// has no parent.
    pub fn insert_after(&mut self, child: NodeId, sibling: NodeId) {
        self.validate(child);
        self.validate(sibling);
        let next = self.next_sibling[sibling.idx as usize];
        if next == INVALID {
            let p = self.parent[sibling.idx as usize];
            assert!(p != INVALID, "sibling has no parent");
            assert!(
                self.parent[child.idx as usize] == INVALID,
                "child already has a parent"
            );
            self.link_last(p, child.idx);
            self.dirty.mark(p, dirty::TOPOLOGY);
        } else {
            self.insert_before(child, self.handle(next));
        }
    }

    /// Removes `child` from its current parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the node has no parent.
    pub fn remove_from_parent(&mut self, child: NodeId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "node has no parent");

        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Removes `child` from its parent if it has one.
    ///
    /// Returns whether the node was attached.
    pub fn detach(&mut self, child: NodeId) -> bool {
        self.validate(child);
        if self.parent[child.idx as usize] == INVALID {
            return false;
        }
        self.remove_from_parent(child);
        true
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.handle(p))
    }

    /// Returns the first child of a node, if any.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let c = self.first_child[id.idx as usize];
        (c != INVALID).then(|| self.handle(c))
    }

    /// Returns the sibling following a node, if any.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let n = self.next_sibling[id.idx as usize];
        (n != INVALID).then(|| self.handle(n))
    }

    /// Returns the sibling preceding a node, if any.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let n = self.prev_sibling[id.idx as usize];
        (n != INVALID).then(|| self.handle(n))
    }

    /// Returns an iterator over the direct children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::new(self, id.idx)
    }

    /// Counts the direct children of `id`, optionally restricted to one kind.
    #[must_use]
    pub fn child_count(&self, id: NodeId, kind: Option<NodeKind>) -> usize {
        self.children(id)
            .filter(|c| kind.is_none_or(|k| self.kind[c.idx as usize] == k))
            .count()
    }

    // -- Sort keys --

    /// Sets the stacking key of a node.
    ///
    /// `seq` breaks ties between equal `z` values (lower first).
    pub fn set_sort_key(&mut self, id: NodeId, z: i64, seq: u64) {
        self.validate(id);
        self.z[id.idx as usize] = z;
        self.seq[id.idx as usize] = seq;
    }

    /// Returns the stacking key of a node as `(z, seq)`.
    #[must_use]
    pub fn sort_key(&self, id: NodeId) -> (i64, u64) {
        self.validate(id);
        (self.z[id.idx as usize], self.seq[id.idx as usize])
    }

    /// Flags a layer node as needing a full resort.
    pub(crate) fn mark_unsorted(&mut self, layer: NodeId) {
        self.validate(layer);
        self.dirty.mark(layer.idx, dirty::SORT);
    }

    /// Drains the set of layer nodes flagged by [`mark_unsorted`](Self::mark_unsorted).
    ///
    /// Nodes destroyed since they were flagged are skipped.
    pub(crate) fn take_unsorted(&mut self) -> Vec<NodeId> {
        let raw: Vec<u32> = self
            .dirty
            .drain(dirty::SORT)
            .deterministic()
            .run()
            .collect();
        raw.into_iter()
            .filter(|&idx| idx < self.len && self.alive[idx as usize])
            .map(|idx| self.handle(idx))
            .collect()
    }

    /// Drains the nodes whose child lists changed since the last call.
    pub fn take_topology_changes(&mut self) -> Vec<NodeId> {
        let raw: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        raw.into_iter()
            .filter(|&idx| idx < self.len && self.alive[idx as usize])
            .map(|idx| self.handle(idx))
            .collect()
    }

    /// Relinks the children of `parent` in the given order.
    ///
    /// `order` must be a permutation of the current children.
    pub(crate) fn reorder_children(&mut self, parent: NodeId, order: &[NodeId]) {
        self.validate(parent);
        let p = parent.idx;
        debug_assert_eq!(
            order.len(),
            self.children(parent).count(),
            "reorder must be a permutation of the children"
        );
        self.first_child[p as usize] = INVALID;
        self.last_child[p as usize] = INVALID;
        for &child in order {
            let c = child.idx;
            self.parent[c as usize] = INVALID;
            self.link_last(p, c);
        }
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    // -- Internal helpers --

    pub(crate) fn handle(&self, idx: u32) -> NodeId {
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    fn validate(&self, id: NodeId) {
        assert!(
            id.idx < self.len
                && self.generation[id.idx as usize] == id.generation
                && self.alive[id.idx as usize],
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Appends `c` after the last child of `p` without touching dirty state.
    fn link_last(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = INVALID;
        let last = self.last_child[p as usize];
        self.prev_sibling[c as usize] = last;
        if last == INVALID {
            self.first_child[p as usize] = c;
        } else {
            self.next_sibling[last as usize] = c;
        }
        self.last_child[p as usize] = c;
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        } else {
            self.last_child[p as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn create_and_destroy() {
        let mut store = NodeStore::new();
        let id = store.create_node(NodeKind::View);
        assert!(store.is_alive(id));
        store.destroy_node(id);
        assert!(!store.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = NodeStore::new();
        let id1 = store.create_node(NodeKind::View);
        store.destroy_node(id1);
        let id2 = store.create_node(NodeKind::Pivot);
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
        assert_eq!(store.kind(id2), NodeKind::Pivot);
    }

    #[test]
    fn append_and_query() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        let b = store.create_node(NodeKind::View);

        store.append_child(layer, a);
        store.append_child(layer, b);

        assert_eq!(store.parent(a), Some(layer));
        let kids: Vec<_> = store.children(layer).collect();
        assert_eq!(kids, vec![a, b]);
        assert_eq!(store.first_child(layer), Some(a));
        assert_eq!(store.next_sibling(a), Some(b));
        assert_eq!(store.prev_sibling(b), Some(a));
    }

    #[test]
    fn insert_before_and_after() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        let b = store.create_node(NodeKind::View);
        let c = store.create_node(NodeKind::View);
        let d = store.create_node(NodeKind::View);

        store.append_child(layer, b);
        store.insert_before(a, b);
        store.insert_after(d, b);
        store.insert_after(c, b);

        let kids: Vec<_> = store.children(layer).collect();
        assert_eq!(kids, vec![a, b, c, d]);

        // The tail pointer stays correct after inserting at the end.
        let e = store.create_node(NodeKind::View);
        store.append_child(layer, e);
        assert_eq!(store.children(layer).last(), Some(e));
    }

    #[test]
    fn remove_keeps_tail_consistent() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        let b = store.create_node(NodeKind::View);
        store.append_child(layer, a);
        store.append_child(layer, b);

        store.remove_from_parent(b);
        assert_eq!(store.parent(b), None);
        let c = store.create_node(NodeKind::View);
        store.append_child(layer, c);
        let kids: Vec<_> = store.children(layer).collect();
        assert_eq!(kids, vec![a, c]);

        assert!(store.detach(a));
        assert!(!store.detach(a));
    }

    #[test]
    fn children_walk_from_both_ends() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        let b = store.create_node(NodeKind::View);
        let c = store.create_node(NodeKind::View);
        store.append_child(layer, a);
        store.append_child(layer, b);
        store.append_child(layer, c);
        assert_eq!(store.children(layer).rev().collect::<Vec<_>>(), vec![c, b, a]);

        let mut it = store.children(layer);
        assert_eq!(it.next(), Some(a));
        assert_eq!(it.next_back(), Some(c));
        assert_eq!(it.next(), Some(b));
        assert_eq!(it.next_back(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn child_count_filters_by_kind() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let pivot = store.create_node(NodeKind::Pivot);
        let view = store.create_node(NodeKind::View);
        store.append_child(layer, pivot);
        store.append_child(layer, view);

        assert_eq!(store.child_count(layer, None), 2);
        assert_eq!(store.child_count(layer, Some(NodeKind::View)), 1);
        assert_eq!(store.child_count(layer, Some(NodeKind::Layer)), 0);
    }

    #[test]
    fn destroy_attached_node_unlinks_it() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        store.append_child(layer, a);
        store.destroy_node(a);
        assert_eq!(store.children(layer).count(), 0);
    }

    #[test]
    fn reorder_children_relinks() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        let b = store.create_node(NodeKind::View);
        let c = store.create_node(NodeKind::View);
        store.append_child(layer, a);
        store.append_child(layer, b);
        store.append_child(layer, c);

        store.reorder_children(layer, &[c, a, b]);
        let kids: Vec<_> = store.children(layer).collect();
        assert_eq!(kids, vec![c, a, b]);
        assert_eq!(store.prev_sibling(c), None);
        assert_eq!(store.next_sibling(b), None);
    }

    #[test]
    fn topology_and_sort_channels_drain() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        store.append_child(layer, a);

        assert_eq!(store.take_topology_changes(), vec![layer]);
        assert!(store.take_topology_changes().is_empty());

        store.mark_unsorted(layer);
        assert_eq!(store.take_unsorted(), vec![layer]);
        assert!(store.take_unsorted().is_empty());
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn stale_handle_panics() {
        let mut store = NodeStore::new();
        let id = store.create_node(NodeKind::View);
        store.destroy_node(id);
        let _ = store.kind(id);
    }

    #[test]
    #[should_panic(expected = "cannot destroy node with children")]
    fn destroy_with_children_panics() {
        let mut store = NodeStore::new();
        let layer = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        store.append_child(layer, a);
        store.destroy_node(layer);
    }

    #[test]
    #[should_panic(expected = "child already has a parent")]
    fn double_attach_panics() {
        let mut store = NodeStore::new();
        let l1 = store.create_node(NodeKind::Layer);
        let l2 = store.create_node(NodeKind::Layer);
        let a = store.create_node(NodeKind::View);
        store.append_child(l1, a);
        store.append_child(l2, a);
    }
}
