// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyed deque over view slots.

use alloc::vec::Vec;

use crate::node::INVALID;

/// An intrusive doubly linked list keyed by view slot index.
///
/// Every slot is in the list at most once and carries a value. Membership,
/// lookup, removal and moving an entry to the head are all O(1), which is
/// what the mount/unmount sweeps need to rotate through thousands of views.
#[derive(Clone, Debug)]
pub(crate) struct SlotList<V> {
    head: u32,
    tail: u32,
    len: usize,
    prev: Vec<u32>,
    next: Vec<u32>,
    value: Vec<Option<V>>,
}

impl<V: Copy> SlotList<V> {
    pub(crate) fn new() -> Self {
        Self {
            head: INVALID,
            tail: INVALID,
            len: 0,
            prev: Vec::new(),
            next: Vec::new(),
            value: Vec::new(),
        }
    }

    fn grow(&mut self, idx: u32) {
        let want = idx as usize + 1;
        if self.value.len() < want {
            self.prev.resize(want, INVALID);
            self.next.resize(want, INVALID);
            self.value.resize(want, None);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn contains(&self, idx: u32) -> bool {
        self.value.get(idx as usize).is_some_and(Option::is_some)
    }

    pub(crate) fn get(&self, idx: u32) -> Option<V> {
        self.value.get(idx as usize).copied().flatten()
    }

    /// Replaces the value of a member. Returns `false` for non-members.
    pub(crate) fn set(&mut self, idx: u32, v: V) -> bool {
        match self.value.get_mut(idx as usize) {
            Some(slot @ Some(_)) => {
                *slot = Some(v);
                true
            }
            _ => false,
        }
    }

    /// Appends `idx` at the tail.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is already a member.
    pub(crate) fn push_tail(&mut self, idx: u32, v: V) {
        assert!(!self.contains(idx), "slot {idx} is already listed");
        self.grow(idx);
        let i = idx as usize;
        self.value[i] = Some(v);
        self.next[i] = INVALID;
        self.prev[i] = self.tail;
        if self.tail == INVALID {
            self.head = idx;
        } else {
            self.next[self.tail as usize] = idx;
        }
        self.tail = idx;
        self.len += 1;
    }

    fn push_head(&mut self, idx: u32, v: V) {
        self.grow(idx);
        let i = idx as usize;
        self.value[i] = Some(v);
        self.prev[i] = INVALID;
        self.next[i] = self.head;
        if self.head == INVALID {
            self.tail = idx;
        } else {
            self.prev[self.head as usize] = idx;
        }
        self.head = idx;
        self.len += 1;
    }

    /// Unlinks `idx`, returning its value if it was a member.
    pub(crate) fn remove(&mut self, idx: u32) -> Option<V> {
        let v = self.get(idx)?;
        let i = idx as usize;
        let (prev, next) = (self.prev[i], self.next[i]);
        if prev == INVALID {
            self.head = next;
        } else {
            self.next[prev as usize] = next;
        }
        if next == INVALID {
            self.tail = prev;
        } else {
            self.prev[next as usize] = prev;
        }
        self.prev[i] = INVALID;
        self.next[i] = INVALID;
        self.value[i] = None;
        self.len -= 1;
        Some(v)
    }

    pub(crate) fn peek_head(&self) -> Option<u32> {
        (self.head != INVALID).then_some(self.head)
    }

    pub(crate) fn pop_head(&mut self) -> Option<(u32, V)> {
        let idx = self.peek_head()?;
        self.remove(idx).map(|v| (idx, v))
    }

    /// Moves the head entry to the tail.
    pub(crate) fn rotate(&mut self) {
        if self.len < 2 {
            return;
        }
        if let Some((idx, v)) = self.pop_head() {
            self.push_tail(idx, v);
        }
    }

    /// Moves a member to the head. Returns `false` for non-members.
    pub(crate) fn move_to_head(&mut self, idx: u32) -> bool {
        match self.remove(idx) {
            Some(v) => {
                self.push_head(idx, v);
                true
            }
            None => false,
        }
    }

    /// Iterates member slots from head to tail.
    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let mut cur = self.head;
        core::iter::from_fn(move || {
            if cur == INVALID {
                return None;
            }
            let idx = cur;
            cur = self.next[idx as usize];
            Some(idx)
        })
    }

    pub(crate) fn clear(&mut self) {
        self.head = INVALID;
        self.tail = INVALID;
        self.len = 0;
        self.prev.clear();
        self.next.clear();
        self.value.clear();
    }
}
