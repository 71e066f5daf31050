// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The coalescing priority queue of pending view updates.
//!
//! Entries are ordered by `(priority, sequence)`: lower priorities first,
//! FIFO within a priority. Each view has at most one entry. Scheduling a view
//! that is already queued merges the flags and keeps the more urgent
//! priority; moving to a more urgent priority places the entry at the back
//! of that priority.

use alloc::collections::BTreeMap;
use core::ops::Bound;

use crate::flags::UpdateFlags;

/// Position of an entry in the queue.
pub(crate) type QueueKey = (u32, u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    key: QueueKey,
    flags: UpdateFlags,
}

/// Pending updates keyed by view slot index.
#[derive(Debug, Default)]
pub(crate) struct UpdateQueue {
    order: BTreeMap<QueueKey, u32>,
    entries: BTreeMap<u32, Entry>,
    next_seq: u64,
}

impl UpdateQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts or merges an update for `idx`.
    ///
    /// Returns whether a new entry was created.
    pub(crate) fn schedule(&mut self, idx: u32, flags: UpdateFlags, priority: u32) -> bool {
        if let Some(entry) = self.entries.get_mut(&idx) {
            entry.flags = entry.flags.coalesce(flags);
            if priority < entry.key.0 {
                self.order.remove(&entry.key);
                entry.key = (priority, self.next_seq);
                self.next_seq += 1;
                self.order.insert(entry.key, idx);
            }
            return false;
        }
        let key = (priority, self.next_seq);
        self.next_seq += 1;
        self.order.insert(key, idx);
        self.entries.insert(idx, Entry { key, flags });
        true
    }

    /// Replaces the flags of a queued entry, keeping its position.
    pub(crate) fn set_flags(&mut self, idx: u32, flags: UpdateFlags) {
        if let Some(entry) = self.entries.get_mut(&idx) {
            entry.flags = flags;
        }
    }

    /// Removes the entry for `idx` and returns its flags.
    pub(crate) fn take(&mut self, idx: u32) -> Option<UpdateFlags> {
        let entry = self.entries.remove(&idx)?;
        self.order.remove(&entry.key);
        Some(entry.flags)
    }

    pub(crate) fn flags(&self, idx: u32) -> Option<UpdateFlags> {
        self.entries.get(&idx).map(|e| e.flags)
    }

    pub(crate) fn contains(&self, idx: u32) -> bool {
        self.entries.contains_key(&idx)
    }

    /// The first entry in flush order strictly after `after`, as a
    /// `(key, idx)` pair. `None` starts from the front.
    ///
    /// Walking with the returned key as the next cursor visits each entry
    /// once even while earlier entries are taken.
    pub(crate) fn next_after(&self, after: Option<QueueKey>) -> Option<(QueueKey, u32)> {
        let start = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.order
            .range((start, Bound::Unbounded))
            .next()
            .map(|(&key, &idx)| (key, idx))
    }

    /// The most urgent queued priority.
    pub(crate) fn min_priority(&self) -> Option<u32> {
        self.order.keys().next().map(|&(priority, _)| priority)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::vec::Vec;

    fn order(q: &UpdateQueue) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cursor = None;
        while let Some((key, idx)) = q.next_after(cursor) {
            out.push(idx);
            cursor = Some(key);
        }
        out
    }

    #[test]
    fn orders_by_priority_then_fifo() {
        let mut q = UpdateQueue::new();
        q.schedule(0, UpdateFlags::RENDER, 50);
        q.schedule(1, UpdateFlags::RENDER, 21);
        q.schedule(2, UpdateFlags::RENDER, 22);
        q.schedule(3, UpdateFlags::RENDER, 21);
        assert_eq!(order(&q), [1, 3, 2, 0]);
        assert_eq!(q.min_priority(), Some(21));
    }

    #[test]
    fn merges_into_one_entry() {
        let mut q = UpdateQueue::new();
        assert!(q.schedule(7, UpdateFlags::RENDER, 5));
        assert!(!q.schedule(7, UpdateFlags::INSERT, 9));
        assert_eq!(q.len(), 1);
        assert_eq!(q.flags(7), Some(UpdateFlags::RENDER | UpdateFlags::INSERT));
        // The less urgent priority did not demote it.
        assert_eq!(q.min_priority(), Some(5));
    }

    #[test]
    fn promotion_moves_to_back_of_new_priority() {
        let mut q = UpdateQueue::new();
        q.schedule(0, UpdateFlags::RENDER, 1);
        q.schedule(1, UpdateFlags::RENDER, 3);
        q.schedule(1, UpdateFlags::RENDER, 1);
        assert_eq!(order(&q), [0, 1]);
        q.schedule(2, UpdateFlags::RENDER, 1);
        assert_eq!(order(&q), [0, 1, 2]);
    }

    #[test]
    fn remove_cancels_insert() {
        let mut q = UpdateQueue::new();
        q.schedule(0, UpdateFlags::INSERT | UpdateFlags::RENDER, 0);
        q.schedule(0, UpdateFlags::REMOVE, 0);
        let flags = q.flags(0).unwrap();
        assert!(flags.contains(UpdateFlags::REMOVE));
        assert!(!flags.contains(UpdateFlags::INSERT));
    }

    #[test]
    fn cursor_walk_survives_taking_entries() {
        let mut q = UpdateQueue::new();
        for idx in 0..4 {
            q.schedule(idx, UpdateFlags::RENDER, 0);
        }
        let (first, idx) = q.next_after(None).unwrap();
        assert_eq!(idx, 0);
        // Taking the current and a later entry does not disturb the walk.
        q.take(0);
        q.take(2);
        let (second, idx) = q.next_after(Some(first)).unwrap();
        assert_eq!(idx, 1);
        let (third, idx) = q.next_after(Some(second)).unwrap();
        assert_eq!(idx, 3);
        assert_eq!(q.next_after(Some(third)), None);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.next_after(None), None);
    }
}
