// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scheduling, batching, freezing, and deferred stepping.

use super::{Surface, tracer};
use crate::flags::UpdateFlags;
use crate::scheduler::{
    MOUNT_BATCH_SIZE, Progress, RenderMode, RenderOptions, RenderStats, SurfaceEvent,
};
use crate::time::{Clock, HostTime};
use crate::trace::{BatchEvent, FreezeEvent, IdleEvent};
use crate::view::{UpdateContext, ViewId};

impl Surface {
    // -- Queueing --

    /// Enqueues an update without flushing.
    ///
    /// Requests for a view that is already queued merge into its entry.
    ///
    /// # Panics
    ///
    /// Panics if `view` is stale or the surface was torn down.
    pub fn schedule_view_update(&mut self, view: ViewId, flags: UpdateFlags, priority: u32) {
        self.assert_alive();
        let idx = self.views.validate(view);
        self.schedule_idx(idx, flags, priority);
    }

    /// Enqueues an update and flushes it unless frozen.
    ///
    /// In synchronous mode the queue is flushed before returning; in
    /// deferred mode a frame is requested.
    ///
    /// # Panics
    ///
    /// Panics if `view` is stale or the surface was torn down.
    pub fn request_view_update(
        &mut self,
        view: ViewId,
        flags: UpdateFlags,
        priority: u32,
        opts: RenderOptions<'_>,
    ) {
        self.assert_alive();
        let idx = self.views.validate(view);
        self.request_idx(idx, flags, priority, opts);
    }

    /// Returns whether any update is queued.
    #[must_use]
    pub fn has_scheduled_updates(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Returns whether nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns whether a frame is outstanding.
    #[inline]
    #[must_use]
    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub(super) fn schedule_idx(&mut self, idx: u32, flags: UpdateFlags, priority: u32) {
        let created = self.queue.schedule(idx, flags, priority);
        if created {
            self.cycle.total += 1;
        }
        self.idle_notified = false;
        #[cfg(feature = "trace-rich")]
        {
            let e = crate::trace::UpdateScheduledEvent {
                view: self.views.handle(idx),
                flags: flags.bits(),
                priority,
                coalesced: !created,
            };
            tracer(&mut self.sink).update_scheduled(&e);
        }
    }

    pub(super) fn request_idx(
        &mut self,
        idx: u32,
        flags: UpdateFlags,
        priority: u32,
        opts: RenderOptions<'_>,
    ) {
        self.schedule_idx(idx, flags, priority);
        if self.freeze.is_frozen() {
            return;
        }
        match self.config.mode {
            RenderMode::Sync => {
                self.update_views(opts);
            }
            RenderMode::Async => self.request_frame(),
        }
    }

    // -- Freezing --

    /// Returns whether scheduling is paused.
    #[inline]
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.freeze.is_frozen()
    }

    /// Pauses flushing. Queued updates accumulate until unfrozen.
    ///
    /// Cancels an outstanding frame.
    pub fn freeze(&mut self, opts: RenderOptions<'_>) {
        self.assert_alive();
        self.freeze.freeze(opts.key);
        self.cancel_frame();
        self.trace_freeze(opts.key.is_some());
    }

    /// Releases a freeze.
    ///
    /// Once nothing holds a freeze, a synchronous surface sweeps visibility
    /// and flushes everything, while a deferred surface starts a new render
    /// cycle. Layer resorts postponed while frozen run afterwards.
    pub fn unfreeze(&mut self, opts: RenderOptions<'_>) {
        self.assert_alive();
        let changed = self.freeze.unfreeze(opts.key);
        self.trace_freeze(opts.key.is_some());
        if self.freeze.is_frozen() {
            return;
        }
        if changed {
            self.idle_notified = false;
        }
        self.cycle = super::Cycle::default();
        match self.config.mode {
            RenderMode::Sync => {
                let mount_cap = opts
                    .mount_batch_size
                    .or(self.config.mount_batch_size)
                    .unwrap_or(usize::MAX);
                let unmount_cap = opts
                    .unmount_batch_size
                    .or(self.config.unmount_batch_size)
                    .unwrap_or(usize::MAX);
                self.sweep(mount_cap, unmount_cap);
                self.update_views(opts);
            }
            RenderMode::Async => {
                self.cycle.batch_size = opts.batch_size;
                self.cycle.mount_batch_size = opts.mount_batch_size;
                self.cycle.unmount_batch_size = opts.unmount_batch_size;
                self.request_frame();
            }
        }
        if self.sort_pending {
            self.resort_marked();
        }
    }

    fn trace_freeze(&mut self, keyed: bool) {
        let e = FreezeEvent {
            frozen: self.freeze.is_frozen(),
            depth: self.freeze.depth(),
            keyed,
            timestamp: self.now(),
        };
        tracer(&mut self.sink).freeze(&e);
    }

    // -- Flushing --

    /// Runs one batch of at most `batch_size` view updates.
    ///
    /// Runs even while frozen; freezing only stops automatic flushing.
    pub fn flush(&mut self, opts: RenderOptions<'_>) -> RenderStats {
        self.assert_alive();
        let batch_size = self.batch_size(opts);
        let stats = self.run_hooked_batch(batch_size, false);
        self.notify_idle_if_settled();
        stats
    }

    /// Runs batches until the queue is empty or no batch makes progress.
    pub fn update_views(&mut self, opts: RenderOptions<'_>) -> RenderStats {
        self.assert_alive();
        self.update_views_with(opts, false)
    }

    pub(super) fn update_views_with(
        &mut self,
        opts: RenderOptions<'_>,
        keep_current: bool,
    ) -> RenderStats {
        if !opts.silent {
            if let Some(f) = self.hooks.before_render.as_mut() {
                f();
            }
        }
        let batch_size = self.batch_size(opts);
        let mut total = RenderStats::default();
        self.last_batch = RenderStats::default();
        loop {
            let stats = self.run_hooked_batch(batch_size, keep_current);
            total.updated += stats.updated;
            total.mounted += stats.mounted;
            total.unmounted += stats.unmounted;
            total.postponed += stats.postponed;
            total.batches += 1;
            let progressed = stats.updated > 0 || stats.mounted > 0 || stats.unmounted > 0;
            if stats.empty || !progressed {
                break;
            }
        }
        total.processed = total.updated + total.unmounted;
        total.empty = self.queue.is_empty();
        total.priority = self.queue.min_priority();
        if !opts.silent {
            if let Some(f) = self.hooks.after_render.as_mut() {
                f(&total);
            }
            self.events.push(SurfaceEvent::RenderDone(total));
        }
        self.notify_idle_if_settled();
        total
    }

    fn run_hooked_batch(&mut self, batch_size: usize, keep_current: bool) -> RenderStats {
        if let Some(f) = self.hooks.before_each_batch.as_mut() {
            f(&self.last_batch);
        }
        let stats = self.run_batch(batch_size, keep_current);
        self.last_batch = stats;
        if let Some(f) = self.hooks.after_each_batch.as_mut() {
            f(&stats);
        }
        stats
    }

    /// Processes queued entries in priority order.
    ///
    /// With `keep_current`, views keep their registered visibility instead
    /// of re-evaluating the policy.
    fn run_batch(&mut self, batch_size: usize, keep_current: bool) -> RenderStats {
        let mut stats = RenderStats {
            batches: 1,
            ..RenderStats::default()
        };
        let mut cursor = None;
        while stats.updated < batch_size {
            let Some((key, idx)) = self.queue.next_after(cursor) else {
                break;
            };
            cursor = Some(key);
            let Some(mut flags) = self.queue.flags(idx) else {
                continue;
            };
            let Some(state) = self.slot_state(idx) else {
                self.queue.take(idx);
                continue;
            };
            if !flags.contains(UpdateFlags::REMOVE) {
                let is_mounted = !self.views.unmounted.contains(idx);
                let visible = if keep_current {
                    is_mounted
                } else {
                    self.evaluate_visibility(idx, is_mounted)
                };
                if !visible {
                    if is_mounted {
                        self.views.register_unmounted(idx);
                        self.hide_view(idx);
                    }
                    self.views.merge_unmounted(idx, flags);
                    self.queue.take(idx);
                    stats.unmounted += 1;
                    continue;
                }
                if !state.is_constructed() {
                    flags |= self.construct(idx);
                }
                if !is_mounted {
                    flags |= UpdateFlags::INSERT;
                    stats.mounted += 1;
                }
                flags |= self.views.register_mounted(idx);
            }
            let leftover = self.update_view(idx, flags);
            if !leftover.is_empty() {
                self.queue.set_flags(idx, leftover);
                stats.postponed += 1;
                continue;
            }
            stats.updated += 1;
            self.queue.take(idx);
        }
        self.apply_deferred();
        stats.empty = self.queue.is_empty();
        stats.priority = self.queue.min_priority();

        let e = BatchEvent {
            batch_index: self.batch_index,
            timestamp: self.now(),
            stats,
        };
        self.batch_index += 1;
        tracer(&mut self.sink).batch(&e);
        stats
    }

    /// Applies the pending flags of one view.
    ///
    /// Returns the flags the view could not handle yet.
    pub(super) fn update_view(&mut self, idx: u32, mut flags: UpdateFlags) -> UpdateFlags {
        if flags.contains(UpdateFlags::REMOVE) {
            self.remove_view(idx);
            return UpdateFlags::empty();
        }
        if flags.contains(UpdateFlags::INSERT) {
            self.insert_view(idx, flags.contains(UpdateFlags::INIT));
        }
        flags = flags.renderer_bits();
        if flags.is_empty() {
            return UpdateFlags::empty();
        }
        self.confirm_view(idx, flags)
    }

    fn confirm_view(&mut self, idx: u32, mut flags: UpdateFlags) -> UpdateFlags {
        let view = self.views.handle(idx);
        let Some(slot) = self.views.slot_mut(idx) else {
            return UpdateFlags::empty();
        };
        let Some(instance) = slot.instance.as_mut() else {
            return UpdateFlags::empty();
        };
        let Some(cell) = self.cells.get(slot.cell) else {
            panic!("view {view:?} outlived its cell {}", slot.cell);
        };
        let mut cx = UpdateContext {
            view,
            cell,
            deferred: &mut self.deferred,
        };
        if flags.contains(UpdateFlags::RENDER) {
            instance.render(&mut cx);
            flags.remove(UpdateFlags::RENDER);
        }
        if flags.is_empty() {
            return UpdateFlags::empty();
        }
        instance.confirm_update(flags, &mut cx).renderer_bits()
    }

    /// Enqueues requests views made during the last updates.
    pub(super) fn apply_deferred(&mut self) {
        for request in core::mem::take(&mut self.deferred) {
            if let Some(idx) = self.views.resolve(request.view) {
                self.schedule_idx(idx, request.flags, request.priority);
            }
        }
    }

    fn batch_size(&self, opts: RenderOptions<'_>) -> usize {
        opts.batch_size
            .or(self.config.batch_size)
            .unwrap_or(usize::MAX)
            .max(1)
    }

    fn notify_idle_if_settled(&mut self) {
        if self.queue.is_empty() && !self.freeze.is_frozen() {
            self.notify_idle();
        }
    }

    fn notify_idle(&mut self) {
        if self.idle_notified {
            return;
        }
        self.idle_notified = true;
        self.events.push(SurfaceEvent::Idle);
        let e = IdleEvent {
            timestamp: self.now(),
        };
        tracer(&mut self.sink).idle(&e);
    }

    // -- Deferred mode --

    /// Runs one frame: one batch plus one bounded visibility sweep.
    ///
    /// Returns whether more work remains; if so, another frame has been
    /// requested. Does nothing while frozen.
    pub fn step(&mut self) -> bool {
        self.assert_alive();
        self.frame_pending = false;
        if self.freeze.is_frozen() {
            return false;
        }
        if !self.cycle.started && !self.queue.is_empty() {
            self.cycle.started = true;
            self.last_batch = RenderStats::default();
            if let Some(f) = self.hooks.before_render.as_mut() {
                f();
            }
        }
        let batch_size = self
            .cycle
            .batch_size
            .or(self.config.batch_size)
            .unwrap_or(usize::MAX)
            .max(1);
        let mut stats = self.run_hooked_batch(batch_size, false);

        let mount_cap = self
            .cycle
            .mount_batch_size
            .or(self.config.mount_batch_size)
            .unwrap_or(MOUNT_BATCH_SIZE)
            .saturating_sub(stats.mounted);
        let unmount_cap = self
            .cycle
            .unmount_batch_size
            .or(self.config.unmount_batch_size)
            .unwrap_or(MOUNT_BATCH_SIZE)
            .saturating_sub(stats.unmounted);
        let sweep = self.sweep(mount_cap, unmount_cap);

        let processed = if stats.updated > 0 {
            self.cycle.processed += stats.updated + stats.unmounted;
            stats.processed = self.cycle.processed;
            stats.processed
        } else {
            self.cycle.processed
        };
        let cycle_done = stats.updated > 0 && stats.empty && sweep.mounted == 0;
        if cycle_done {
            stats.mounted += sweep.mounted;
            stats.unmounted += sweep.unmounted;
            stats.empty = self.queue.is_empty();
            if let Some(f) = self.hooks.after_render.as_mut() {
                f(&stats);
            }
            self.events.push(SurfaceEvent::RenderDone(stats));
        }
        if sweep.mounted > 0 || sweep.unmounted > 0 {
            self.cycle.checked_unmounted = 0;
            self.cycle.checked_mounted = 0;
        } else {
            self.cycle.checked_unmounted += mount_cap;
            self.cycle.checked_mounted += unmount_cap;
        }
        let total = self.cycle.total;
        if total > 0 {
            if let Some(f) = self.hooks.progress.as_mut() {
                f(&Progress {
                    done: stats.empty,
                    processed,
                    total,
                    stats,
                });
            }
        }
        if cycle_done {
            self.cycle.started = false;
            self.cycle.processed = 0;
            self.cycle.total = 0;
        }

        if self.is_settled() {
            self.notify_idle();
            return false;
        }
        self.request_frame();
        true
    }

    /// Runs frames until the surface settles or `deadline` passes.
    ///
    /// Returns whether more work remains.
    pub fn step_until(&mut self, clock: &dyn Clock, deadline: HostTime) -> bool {
        loop {
            let more = self.step();
            if !more || clock.now() >= deadline {
                return more;
            }
        }
    }

    /// Runs frames while one is outstanding. Returns the number of frames
    /// run.
    ///
    /// A view that postpones its update forever keeps this looping.
    pub fn run_until_idle(&mut self) -> usize {
        let mut frames = 0;
        while self.frame_pending && !self.freeze.is_frozen() {
            self.step();
            frames += 1;
        }
        frames
    }

    /// Restarts the frame loop of a deferred surface after it went idle.
    pub fn wake_up(&mut self) {
        if self.config.mode != RenderMode::Async || self.freeze.is_frozen() || self.torn_down {
            return;
        }
        self.cycle.checked_unmounted = 0;
        self.cycle.checked_mounted = 0;
        self.idle_notified = false;
        self.request_frame();
    }

    /// Whether the queue is empty and every visibility list was examined
    /// since the last change.
    fn is_settled(&self) -> bool {
        if !self.queue.is_empty() {
            return false;
        }
        let mounted_covered = !self.config.visibility.is_constrained()
            || self.cycle.checked_mounted >= self.views.mounted.len();
        mounted_covered && self.cycle.checked_unmounted >= self.views.unmounted.len()
    }

    pub(super) fn request_frame(&mut self) {
        if self.frame_pending {
            return;
        }
        self.frame_pending = true;
        if let Some(frames) = self.frames.as_mut() {
            frames.request_frame();
        }
    }

    pub(super) fn cancel_frame(&mut self) {
        if !self.frame_pending {
            return;
        }
        self.frame_pending = false;
        if let Some(frames) = self.frames.as_mut() {
            frames.cancel_frame();
        }
    }
}
