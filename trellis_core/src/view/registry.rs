// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cell-to-view mapping and the mounted/unmounted bookkeeping.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use super::list::SlotList;
use super::{CellView, ViewId, ViewState};
use crate::cell::CellId;
use crate::flags::UpdateFlags;
use crate::node::NodeId;

/// Everything the surface knows about one view.
pub(crate) struct ViewSlot {
    pub(crate) cell: CellId,
    pub(crate) state: ViewState,
    pub(crate) instance: Option<Box<dyn CellView>>,
    pub(crate) node: Option<NodeId>,
    pub(crate) priority: u32,
}

impl fmt::Debug for ViewSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSlot")
            .field("cell", &self.cell)
            .field("state", &self.state)
            .field("node", &self.node)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Slot storage for views plus the two visibility lists.
///
/// Every live view is in exactly one of `mounted` (registered as visible)
/// and `unmounted` (registered as hidden, carrying the flags it will need
/// when it becomes visible again). Registration in `mounted` precedes the
/// actual node attachment, which happens when the view's update is flushed.
#[derive(Debug)]
pub(crate) struct ViewRegistry {
    slots: Vec<Option<ViewSlot>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    by_cell: BTreeMap<CellId, u32>,
    pub(crate) mounted: SlotList<()>,
    pub(crate) unmounted: SlotList<UpdateFlags>,
}

impl ViewRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            by_cell: BTreeMap::new(),
            mounted: SlotList::new(),
            unmounted: SlotList::new(),
        }
    }

    /// Allocates a placeholder slot for `cell`.
    ///
    /// # Panics
    ///
    /// Panics if the cell already has a view.
    pub(crate) fn register(&mut self, cell: CellId, priority: u32) -> ViewId {
        assert!(
            !self.by_cell.contains_key(&cell),
            "cell {cell} already has a view"
        );
        let slot = ViewSlot {
            cell,
            state: ViewState::Uninitialized,
            instance: None,
            node: None,
            priority,
        };
        let idx = if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(slot);
            idx
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "view slots are addressed with u32 indices"
            )]
            let idx = self.slots.len() as u32;
            self.slots.push(Some(slot));
            self.generation.push(0);
            idx
        };
        self.by_cell.insert(cell, idx);
        self.handle(idx)
    }

    /// Frees a slot and forgets its cell mapping and list memberships.
    ///
    /// Returns the slot so the caller can drop the instance and node.
    pub(crate) fn release(&mut self, idx: u32) -> Option<ViewSlot> {
        let slot = self.slots.get_mut(idx as usize)?.take()?;
        self.by_cell.remove(&slot.cell);
        self.mounted.remove(idx);
        self.unmounted.remove(idx);
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
        Some(slot)
    }

    /// Gives a slot a new identity, invalidating outstanding handles.
    pub(crate) fn renew(&mut self, idx: u32) -> ViewId {
        self.generation[idx as usize] += 1;
        self.handle(idx)
    }

    pub(crate) fn handle(&self, idx: u32) -> ViewId {
        ViewId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Resolves a handle to its slot index if it is current.
    pub(crate) fn resolve(&self, view: ViewId) -> Option<u32> {
        let live = self
            .slots
            .get(view.idx as usize)
            .is_some_and(Option::is_some);
        (live && self.generation[view.idx as usize] == view.generation).then_some(view.idx)
    }

    /// Resolves a handle, panicking if it is stale.
    pub(crate) fn validate(&self, view: ViewId) -> u32 {
        match self.resolve(view) {
            Some(idx) => idx,
            None => panic!(
                "stale ViewId: {view:?} (current gen: {})",
                self.generation
                    .get(view.idx as usize)
                    .copied()
                    .unwrap_or(u32::MAX)
            ),
        }
    }

    pub(crate) fn find(&self, cell: CellId) -> Option<u32> {
        self.by_cell.get(&cell).copied()
    }

    pub(crate) fn slot(&self, idx: u32) -> Option<&ViewSlot> {
        self.slots.get(idx as usize).and_then(Option::as_ref)
    }

    pub(crate) fn slot_mut(&mut self, idx: u32) -> Option<&mut ViewSlot> {
        self.slots.get_mut(idx as usize).and_then(Option::as_mut)
    }

    /// Live slot indices, in slot order.
    pub(crate) fn live(&self) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .filter_map(|(i, _)| u32::try_from(i).ok())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_cell.len()
    }

    /// Moves a view into the mounted list.
    ///
    /// Returns the flags it accumulated while unmounted, or empty flags if it
    /// was already registered as mounted.
    pub(crate) fn register_mounted(&mut self, idx: u32) -> UpdateFlags {
        if self.mounted.contains(idx) {
            return UpdateFlags::empty();
        }
        let flags = self.unmounted.remove(idx).unwrap_or(UpdateFlags::empty());
        self.mounted.push_tail(idx, ());
        flags
    }

    /// Moves a view into the unmounted list.
    ///
    /// Returns [`UpdateFlags::INSERT`] when the view changed lists, or empty
    /// flags if it was already registered as unmounted.
    pub(crate) fn register_unmounted(&mut self, idx: u32) -> UpdateFlags {
        if self.unmounted.contains(idx) {
            return UpdateFlags::empty();
        }
        self.mounted.remove(idx);
        self.unmounted.push_tail(idx, UpdateFlags::INSERT);
        UpdateFlags::INSERT
    }

    /// ORs `flags` into the pending flags of an unmounted view.
    pub(crate) fn merge_unmounted(&mut self, idx: u32, flags: UpdateFlags) {
        if let Some(current) = self.unmounted.get(idx) {
            self.unmounted.set(idx, current.coalesce(flags));
        }
    }

    pub(crate) fn clear(&mut self) -> Vec<ViewSlot> {
        let slots: Vec<ViewSlot> = self.slots.drain(..).flatten().collect();
        self.generation.iter_mut().for_each(|g| *g += 1);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "view slots are addressed with u32 indices"
        )]
        let len = self.generation.len() as u32;
        self.free_list = (0..len).rev().collect();
        self.slots.resize_with(self.generation.len(), || None);
        self.by_cell.clear();
        self.mounted.clear();
        self.unmounted.clear();
        slots
    }
}
