// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sibling-list traversal.

use super::id::{INVALID, NodeId};
use super::store::NodeStore;

/// An iterator over the direct children of a node.
///
/// Yields back to front (paint order); `.rev()` walks front to back.
/// Created by [`NodeStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a NodeStore,
    front: u32,
    back: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a NodeStore, parent: u32) -> Self {
        Self {
            store,
            front: store.first_child[parent as usize],
            back: store.last_child[parent as usize],
        }
    }

    /// Called once the cursors meet on the last remaining child.
    fn exhaust(&mut self) {
        self.front = INVALID;
        self.back = INVALID;
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.front == INVALID {
            return None;
        }
        let idx = self.front;
        if idx == self.back {
            self.exhaust();
        } else {
            self.front = self.store.next_sibling[idx as usize];
        }
        Some(self.store.handle(idx))
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<NodeId> {
        if self.back == INVALID {
            return None;
        }
        let idx = self.back;
        if idx == self.front {
            self.exhaust();
        } else {
            self.back = self.store.prev_sibling[idx as usize];
        }
        Some(self.store.handle(idx))
    }
}
