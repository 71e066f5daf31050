// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending-update bitmasks.
//!
//! An [`UpdateFlags`] value describes which aspects of a view need work. The
//! three high bits are reserved for the scheduler itself; every lower bit is
//! free for the rendering collaborator to assign its own meaning (attribute
//! groups, ports, labels, and so on) via
//! [`from_bits_retain`](UpdateFlags::from_bits_retain).

bitflags::bitflags! {
    /// Which aspects of a view are pending.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u32 {
        /// The view must be (re)rendered from scratch.
        ///
        /// Handled by [`CellView::render`](crate::view::CellView::render)
        /// before any remaining bits are passed to `confirm_update`.
        const RENDER = 1 << 0;
        /// The view is being constructed; the next mount is its first.
        const INIT = 1 << 28;
        /// The view must be removed and its instance dropped.
        const REMOVE = 1 << 29;
        /// The view node must be (re)inserted into its layer.
        const INSERT = 1 << 30;

        const _ = !0;
    }
}

impl UpdateFlags {
    /// Bits owned by the scheduler.
    pub const SCHEDULER: Self = Self::INIT.union(Self::REMOVE).union(Self::INSERT);

    /// Merges `incoming` into `self` using queue coalescing rules.
    ///
    /// Bits are OR'ed, except that a removal cancels a pending insertion and
    /// an insertion cancels a pending removal.
    #[must_use]
    pub fn coalesce(self, incoming: Self) -> Self {
        let mut merged = self;
        if incoming.contains(Self::REMOVE) {
            merged.remove(Self::INSERT);
        }
        if incoming.contains(Self::INSERT) {
            merged.remove(Self::REMOVE);
        }
        merged | incoming
    }

    /// Returns the bits that belong to the rendering collaborator.
    #[inline]
    #[must_use]
    pub fn renderer_bits(self) -> Self {
        self.difference(Self::SCHEDULER)
    }
}
