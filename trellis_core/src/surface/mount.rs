// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! View lifecycle and visibility sweeps.

use alloc::vec::Vec;

use super::{Surface, tracer};
use crate::cell::CellId;
use crate::flags::UpdateFlags;
use crate::node::NodeKind;
use crate::scheduler::{RenderOptions, RenderStats, SurfaceEvent, VisibilityStats};
use crate::sorting;
use crate::trace::{SweepEvent, ViewTransition};
use crate::view::{ViewId, ViewState};

impl Surface {
    // -- Public visibility API --

    /// Returns the view of `cell`, constructed, attached, and up to date.
    ///
    /// Flushes that view's pending update synchronously, ignoring freezes
    /// and the visibility policy. Returns `None` for unknown cells.
    pub fn require_view(&mut self, cell: CellId) -> Option<ViewId> {
        self.assert_alive();
        let idx = self.live_view_of(cell)?;
        self.dump_view(idx, RenderOptions::new());
        Some(self.views.handle(idx))
    }

    /// Re-evaluates one cell's visibility and applies the result now.
    ///
    /// A view that became hidden is detached or disposed; a view that became
    /// visible is mounted and updated.
    pub fn update_visibility(&mut self, cell: CellId, opts: RenderOptions<'_>) -> VisibilityStats {
        self.assert_alive();
        let Some(idx) = self.live_view_of(cell) else {
            return VisibilityStats::default();
        };
        let mut stats = VisibilityStats::default();
        let mounted = self.views.mounted.contains(idx);
        let visible = self.evaluate_visibility(idx, mounted);
        if mounted && !visible {
            if !self.views.register_unmounted(idx).is_empty() {
                self.hide_view(idx);
            }
            stats.unmounted = 1;
        } else if !mounted && visible {
            stats.mounted = 1;
            self.dump_view(idx, opts);
        }
        stats
    }

    /// Re-evaluates every view's visibility and applies the result now.
    ///
    /// Sweeps both lists without caps (unless `opts` sets them) and then
    /// flushes the resulting updates without evaluating the policy again.
    pub fn update_all_visibility(&mut self, opts: RenderOptions<'_>) -> VisibilityStats {
        self.assert_alive();
        let stats = self.check_visibility(opts);
        self.update_views_with(opts, true);
        stats
    }

    /// Runs one visibility sweep and schedules the resulting insertions.
    ///
    /// Hidden views are detached or disposed right away. Caps come from
    /// `opts` and are unbounded otherwise.
    pub fn check_visibility(&mut self, opts: RenderOptions<'_>) -> VisibilityStats {
        self.assert_alive();
        self.sweep(
            opts.mount_batch_size.unwrap_or(usize::MAX),
            opts.unmount_batch_size.unwrap_or(usize::MAX),
        )
    }

    /// Moves a hidden view to the front of the mount sweep.
    ///
    /// Returns `false` if the cell has no view waiting to be mounted.
    pub fn prioritize_mount(&mut self, cell: CellId) -> bool {
        self.views
            .find(cell)
            .is_some_and(|idx| self.views.unmounted.move_to_head(idx))
    }

    /// Moves a visible view to the front of the unmount sweep.
    ///
    /// Returns `false` if the cell has no mounted view.
    pub fn prioritize_unmount(&mut self, cell: CellId) -> bool {
        self.views
            .find(cell)
            .is_some_and(|idx| self.views.mounted.move_to_head(idx))
    }

    /// Disposes every hidden view that still holds an instance.
    ///
    /// Views with attachments are kept. Returns the number disposed.
    pub fn dispose_hidden_views(&mut self) -> usize {
        self.assert_alive();
        let hidden: Vec<u32> = self.views.unmounted.iter().collect();
        hidden
            .into_iter()
            .filter(|&idx| self.dispose_view(idx))
            .count()
    }

    // -- Sweeps --

    /// Unmounts hidden views, then mounts visible ones.
    pub(super) fn sweep(&mut self, mount_cap: usize, unmount_cap: usize) -> VisibilityStats {
        let unmounted = self.check_mounted(unmount_cap);
        let mut mount_cap = mount_cap;
        if unmounted > 0 {
            // Skip the views that were just pushed to the tail.
            mount_cap = mount_cap.min(self.views.unmounted.len().saturating_sub(unmounted));
        }
        let mounted = self.check_unmounted(mount_cap);
        let stats = VisibilityStats { mounted, unmounted };
        if mounted > 0 || unmounted > 0 {
            let e = SweepEvent {
                timestamp: self.now(),
                stats,
            };
            tracer(&mut self.sink).sweep(&e);
        }
        stats
    }

    fn check_mounted(&mut self, cap: usize) -> usize {
        if !self.config.visibility.is_constrained() {
            return 0;
        }
        let mut count = 0;
        for _ in 0..self.views.mounted.len().min(cap) {
            let Some(idx) = self.views.mounted.peek_head() else {
                break;
            };
            if self.evaluate_visibility(idx, true) {
                self.views.mounted.rotate();
                continue;
            }
            self.views.register_unmounted(idx);
            self.hide_view(idx);
            count += 1;
        }
        count
    }

    fn check_unmounted(&mut self, cap: usize) -> usize {
        let mut count = 0;
        for _ in 0..self.views.unmounted.len().min(cap) {
            let Some(idx) = self.views.unmounted.peek_head() else {
                break;
            };
            if !self.evaluate_visibility(idx, false) {
                self.views.unmounted.rotate();
                continue;
            }
            count += 1;
            let flags = self.views.register_mounted(idx);
            if !flags.is_empty() {
                let priority = self.slot_priority(idx);
                self.schedule_idx(idx, flags, priority);
            }
        }
        count
    }

    pub(super) fn evaluate_visibility(&self, idx: u32, mounted: bool) -> bool {
        let policy = &self.config.visibility;
        if !policy.is_constrained() {
            return true;
        }
        let Some(slot) = self.views.slot(idx) else {
            return false;
        };
        let Some(cell) = self.cells.get(slot.cell) else {
            return false;
        };
        policy.is_visible(
            self.views.handle(idx),
            slot.instance.as_deref(),
            cell,
            mounted,
            &self.visibility_cx,
        )
    }

    // -- Lifecycle --

    /// Flushes one view right now, mounting it if needed.
    fn dump_view(&mut self, idx: u32, opts: RenderOptions<'_>) {
        let mut flags =
            self.views.register_mounted(idx) | self.queue.take(idx).unwrap_or(UpdateFlags::empty());
        let Some(state) = self.slot_state(idx) else {
            return;
        };
        if !state.is_constructed() {
            flags |= self.construct(idx);
        }
        if self.slot_state(idx) != Some(ViewState::Mounted) {
            flags |= UpdateFlags::INSERT;
        }
        if flags.is_empty() {
            return;
        }
        if !opts.silent {
            if let Some(f) = self.hooks.before_render.as_mut() {
                f();
            }
        }
        let leftover = self.update_view(idx, flags);
        if !leftover.is_empty() {
            let priority = self.slot_priority(idx);
            self.schedule_idx(idx, leftover, priority);
        }
        self.apply_deferred();
        if !opts.silent {
            let stats = RenderStats {
                updated: 1,
                batches: 1,
                priority: self.queue.min_priority(),
                processed: 1,
                empty: self.queue.is_empty(),
                ..RenderStats::default()
            };
            if let Some(f) = self.hooks.after_render.as_mut() {
                f(&stats);
            }
            self.events.push(SurfaceEvent::RenderDone(stats));
        }
    }

    /// Builds the instance and node of a placeholder view.
    ///
    /// Returns the flags a fresh view needs.
    pub(super) fn construct(&mut self, idx: u32) -> UpdateFlags {
        let view = self.views.handle(idx);
        let Some(slot) = self.views.slot_mut(idx) else {
            return UpdateFlags::empty();
        };
        let cell_id = slot.cell;
        let Some(cell) = self.cells.get(cell_id) else {
            panic!("view {view:?} outlived its cell {cell_id}");
        };
        let Some(ty) = self.types.resolve(&cell.kind) else {
            panic!("no view type for kind \"{}\" of cell {cell_id}", cell.kind);
        };
        let instance = ty.construct(cell);
        let flags = UpdateFlags::INIT | instance.init_flags();
        let node = self.nodes.create_node(NodeKind::View);
        slot.instance = Some(instance);
        slot.node = Some(node);
        slot.state = ViewState::Detached;
        self.view_nodes.insert(node.index(), idx);
        self.trace_view(view, cell_id, ViewTransition::Constructed);
        flags
    }

    /// Attaches a view's node to its layer at its stacking position.
    ///
    /// A view that is already attached is re-placed without another
    /// [`on_mount`](crate::view::CellView::on_mount).
    pub(super) fn insert_view(&mut self, idx: u32, first: bool) {
        if self
            .slot_state(idx)
            .is_some_and(|state| !state.is_constructed())
        {
            self.construct(idx);
        }
        let view = self.views.handle(idx);
        let Some(slot) = self.views.slot_mut(idx) else {
            return;
        };
        let Some(node) = slot.node else {
            return;
        };
        let cell_id = slot.cell;
        let Some(cell) = self.cells.get(cell_id) else {
            panic!("view {view:?} outlived its cell {cell_id}");
        };
        let layer_name = Self::layer_name_of(cell);
        let Some(layer) = self.layers.get_mut(layer_name) else {
            panic!("cell {cell_id} is assigned to unknown layer \"{layer_name}\"");
        };
        let seq = self.cells.seq(cell_id).unwrap_or(0);
        self.nodes.detach(node);
        self.nodes.set_sort_key(node, cell.z, seq);
        sorting::place(&mut self.nodes, layer, node, self.config.sorting);

        let was_mounted = slot.state == ViewState::Mounted;
        slot.state = ViewState::Mounted;
        if was_mounted {
            return;
        }
        if let Some(instance) = slot.instance.as_mut() {
            instance.on_mount(first);
        }
        self.trace_view(view, cell_id, ViewTransition::Mounted { first });
    }

    /// Takes a view out of the visible tree.
    ///
    /// Disposes it when configured to and possible; detaches it otherwise.
    pub(super) fn hide_view(&mut self, idx: u32) {
        if !self
            .slot_state(idx)
            .is_some_and(ViewState::is_constructed)
        {
            return;
        }
        if self.config.view_management.dispose_hidden && self.dispose_view(idx) {
            return;
        }
        self.detach_view(idx);
    }

    fn detach_view(&mut self, idx: u32) {
        let view = self.views.handle(idx);
        let Some(slot) = self.views.slot_mut(idx) else {
            return;
        };
        if slot.state != ViewState::Mounted {
            return;
        }
        if let Some(node) = slot.node {
            self.nodes.detach(node);
        }
        slot.state = ViewState::Detached;
        if let Some(instance) = slot.instance.as_mut() {
            instance.on_detach();
        }
        let cell = slot.cell;
        self.trace_view(view, cell, ViewTransition::Detached);
    }

    /// Drops a view's instance and node, keeping the cell registered.
    ///
    /// The view gets a new [`ViewId`]. Views with attachments are not
    /// disposed. Returns whether the view was disposed.
    pub(super) fn dispose_view(&mut self, idx: u32) -> bool {
        let view = self.views.handle(idx);
        let Some(slot) = self.views.slot_mut(idx) else {
            return false;
        };
        if !slot.state.is_constructed() {
            return false;
        }
        if slot.instance.as_ref().is_some_and(|v| v.has_attachments()) {
            return false;
        }
        if let Some(mut instance) = slot.instance.take() {
            instance.on_remove();
        }
        if let Some(node) = slot.node.take() {
            self.nodes.detach(node);
            self.view_nodes.remove(&node.index());
            self.nodes.destroy_node(node);
        }
        slot.state = ViewState::Disposed;
        let cell = slot.cell;
        self.views.renew(idx);
        self.trace_view(view, cell, ViewTransition::Disposed);
        true
    }

    /// Removes a view for good and frees its slot.
    pub(super) fn remove_view(&mut self, idx: u32) {
        let view = self.views.handle(idx);
        self.queue.take(idx);
        let Some(mut slot) = self.views.release(idx) else {
            return;
        };
        if let Some(mut instance) = slot.instance.take() {
            instance.on_remove();
        }
        if let Some(node) = slot.node.take() {
            self.nodes.detach(node);
            self.view_nodes.remove(&node.index());
            self.nodes.destroy_node(node);
        }
        self.trace_view(view, slot.cell, ViewTransition::Removed);
    }
}
