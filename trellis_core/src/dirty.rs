// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The node tree uses multi-channel dirty tracking (via [`understory_dirty`])
//! keyed by raw node slot. Neither channel propagates: only the explicitly
//! marked node appears in the drain output.
//!
//! - [`TOPOLOGY`] is marked on the parent whenever a child list changes
//!   (append, insert, remove, reorder). Draining it through
//!   [`Surface::take_layer_changes`](crate::surface::Surface::take_layer_changes)
//!   reports which layers were touched.
//! - [`SORT`] is marked on a layer node when a view's stacking value changed
//!   under exact sorting. Draining it yields the layers that need a full
//!   resort; while the surface is frozen the marks simply accumulate.

use understory_dirty::Channel;

/// A node's child list changed.
pub const TOPOLOGY: Channel = Channel::new(0);

/// A layer's children are out of z order and need a full resort.
pub const SORT: Channel = Channel::new(1);
