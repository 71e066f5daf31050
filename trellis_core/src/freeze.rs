// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted freeze gating.
//!
//! The scheduler is paused while the unkeyed depth is non-zero or any keyed
//! freeze is outstanding.
//!
//! - An unkeyed freeze increments the depth; an unkeyed unfreeze decrements
//!   it. Reaching depth zero also releases keyed freezes taken while the
//!   depth was held.
//! - A keyed freeze pushes an entry; a keyed unfreeze pops the most recent
//!   entry with that key. A key with no outstanding freeze is ignored.

use alloc::string::String;
use alloc::vec::Vec;

#[derive(Clone, Debug, PartialEq, Eq)]
struct KeyedFreeze {
    key: String,
    /// Whether the unkeyed depth was non-zero when this entry was taken.
    nested: bool,
}

/// Freeze depth and keyed freeze stack.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreezeState {
    depth: u32,
    keyed: Vec<KeyedFreeze>,
}

impl FreezeState {
    /// An unfrozen state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: 0,
            keyed: Vec::new(),
        }
    }

    /// A state holding one unkeyed freeze.
    #[must_use]
    pub const fn frozen() -> Self {
        Self {
            depth: 1,
            keyed: Vec::new(),
        }
    }

    /// Returns whether anything holds a freeze.
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.depth > 0 || !self.keyed.is_empty()
    }

    /// The unkeyed freeze depth.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns whether a freeze with `key` is outstanding.
    #[must_use]
    pub fn holds_key(&self, key: &str) -> bool {
        self.keyed.iter().any(|k| k.key == key)
    }

    /// Takes a freeze.
    pub fn freeze(&mut self, key: Option<&str>) {
        match key {
            Some(key) => self.keyed.push(KeyedFreeze {
                key: key.into(),
                nested: self.depth > 0,
            }),
            None => self.depth += 1,
        }
    }

    /// Releases a freeze.
    ///
    /// Returns whether the state changed.
    pub fn unfreeze(&mut self, key: Option<&str>) -> bool {
        match key {
            Some(key) => match self.keyed.iter().rposition(|k| k.key == key) {
                Some(pos) => {
                    self.keyed.remove(pos);
                    true
                }
                None => false,
            },
            None => {
                if self.depth == 0 {
                    return false;
                }
                self.depth -= 1;
                if self.depth == 0 {
                    self.keyed.retain(|k| !k.nested);
                }
                true
            }
        }
    }

    /// Drops every freeze.
    pub fn clear(&mut self) {
        self.depth = 0;
        self.keyed.clear();
    }
}
