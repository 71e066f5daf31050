// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scheduler configuration, per-call options, statistics, and notifications.
//!
//! A [`SurfaceConfig`] fixes how a [`Surface`](crate::surface::Surface)
//! schedules work for its whole lifetime: synchronous or deferred flushing,
//! the sorting strategy, the visibility policy, view management, and batch
//! sizes. [`RenderOptions`] override the batch sizes for a single call.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::fmt;

use crate::sorting::Sorting;
use crate::time::Clock;
use crate::visibility::VisibilityPolicy;

/// Default cap on mounts and unmounts per deferred step.
pub const MOUNT_BATCH_SIZE: usize = 1000;

/// When queued updates are flushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Every request flushes before returning (unless frozen).
    #[default]
    Sync,
    /// Requests schedule a frame through the surface's
    /// [`FrameSource`](crate::backend::FrameSource); each frame runs one
    /// bounded batch.
    Async,
}

/// How view instances are created and discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewManagement {
    /// Defer constructing an instance until the view is first required.
    pub lazy_initialize: bool,
    /// Construct instances eagerly even while invisible. Nodes are still only
    /// attached once visible.
    pub initialize_unmounted: bool,
    /// Dispose views that become invisible instead of detaching them.
    pub dispose_hidden: bool,
}

impl ViewManagement {
    /// Lazy initialization, nothing else.
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            lazy_initialize: true,
            initialize_unmounted: false,
            dispose_hidden: false,
        }
    }

    /// Every view is constructed as soon as its cell is added.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            lazy_initialize: false,
            initialize_unmounted: false,
            dispose_hidden: false,
        }
    }

    /// Sets [`initialize_unmounted`](Self::initialize_unmounted).
    #[must_use]
    pub const fn with_initialize_unmounted(mut self, on: bool) -> Self {
        self.initialize_unmounted = on;
        self
    }

    /// Sets [`dispose_hidden`](Self::dispose_hidden).
    #[must_use]
    pub const fn with_dispose_hidden(mut self, on: bool) -> Self {
        self.dispose_hidden = on;
        self
    }
}

impl Default for ViewManagement {
    fn default() -> Self {
        Self::enabled()
    }
}

/// Configuration of a [`Surface`](crate::surface::Surface).
#[derive(Clone)]
pub struct SurfaceConfig {
    /// Synchronous or deferred flushing.
    pub mode: RenderMode,
    /// Start with one unkeyed freeze held.
    pub frozen: bool,
    /// Stacking strategy within layers.
    pub sorting: Sorting,
    /// Which cells are visible.
    pub visibility: VisibilityPolicy,
    /// View construction and disposal.
    pub view_management: ViewManagement,
    /// Maximum view updates per batch. `None` is unbounded.
    pub batch_size: Option<usize>,
    /// Maximum mounts per visibility sweep. `None` uses the mode default.
    pub mount_batch_size: Option<usize>,
    /// Maximum unmounts per visibility sweep. `None` uses the mode default.
    pub unmount_batch_size: Option<usize>,
    /// Source of trace timestamps.
    pub clock: Option<Rc<dyn Clock>>,
}

impl fmt::Debug for SurfaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceConfig")
            .field("mode", &self.mode)
            .field("frozen", &self.frozen)
            .field("sorting", &self.sorting)
            .field("visibility", &self.visibility)
            .field("view_management", &self.view_management)
            .field("batch_size", &self.batch_size)
            .field("mount_batch_size", &self.mount_batch_size)
            .field("unmount_batch_size", &self.unmount_batch_size)
            .finish_non_exhaustive()
    }
}

impl SurfaceConfig {
    /// Synchronous flushing, approximate sorting, everything visible.
    #[must_use]
    pub const fn synchronous() -> Self {
        Self {
            mode: RenderMode::Sync,
            frozen: false,
            sorting: Sorting::Approx,
            visibility: VisibilityPolicy::always(),
            view_management: ViewManagement::enabled(),
            batch_size: None,
            mount_batch_size: None,
            unmount_batch_size: None,
            clock: None,
        }
    }

    /// Deferred flushing with the default sweep caps.
    #[must_use]
    pub const fn deferred() -> Self {
        Self {
            mode: RenderMode::Async,
            frozen: false,
            sorting: Sorting::Approx,
            visibility: VisibilityPolicy::always(),
            view_management: ViewManagement::enabled(),
            batch_size: None,
            mount_batch_size: None,
            unmount_batch_size: None,
            clock: None,
        }
    }

    /// Sets the sorting strategy.
    #[must_use]
    pub fn with_sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = sorting;
        self
    }

    /// Sets the visibility policy.
    #[must_use]
    pub fn with_visibility(mut self, visibility: VisibilityPolicy) -> Self {
        self.visibility = visibility;
        self
    }

    /// Sets view management.
    #[must_use]
    pub fn with_view_management(mut self, view_management: ViewManagement) -> Self {
        self.view_management = view_management;
        self
    }

    /// Starts the surface frozen.
    #[must_use]
    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    /// Sets the update batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Sets the mount batch size.
    #[must_use]
    pub fn with_mount_batch_size(mut self, size: usize) -> Self {
        self.mount_batch_size = Some(size);
        self
    }

    /// Sets the unmount batch size.
    #[must_use]
    pub fn with_unmount_batch_size(mut self, size: usize) -> Self {
        self.unmount_batch_size = Some(size);
        self
    }

    /// Sets the trace clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::synchronous()
    }
}

/// Per-call overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions<'a> {
    /// Freeze key for [`freeze`](crate::surface::Surface::freeze) and
    /// [`unfreeze`](crate::surface::Surface::unfreeze).
    pub key: Option<&'a str>,
    /// Overrides the configured update batch size.
    pub batch_size: Option<usize>,
    /// Overrides the configured mount batch size.
    pub mount_batch_size: Option<usize>,
    /// Overrides the configured unmount batch size.
    pub unmount_batch_size: Option<usize>,
    /// Suppresses render hooks and notifications.
    pub silent: bool,
}

impl<'a> RenderOptions<'a> {
    /// No overrides.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key: None,
            batch_size: None,
            mount_batch_size: None,
            unmount_batch_size: None,
            silent: false,
        }
    }

    /// Sets the freeze key.
    #[must_use]
    pub const fn with_key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets the update batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the mount batch size.
    #[must_use]
    pub const fn with_mount_batch_size(mut self, size: usize) -> Self {
        self.mount_batch_size = Some(size);
        self
    }

    /// Sets the unmount batch size.
    #[must_use]
    pub const fn with_unmount_batch_size(mut self, size: usize) -> Self {
        self.unmount_batch_size = Some(size);
        self
    }

    /// Suppresses render hooks and notifications.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Outcome of one or more flushed batches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Views whose pending updates were fully applied.
    pub updated: usize,
    /// Number of batches run.
    pub batches: usize,
    /// Most urgent priority still queued afterwards, if any.
    pub priority: Option<u32>,
    /// Updates processed in the current render cycle (deferred mode).
    pub processed: usize,
    /// Whether the queue was empty afterwards.
    pub empty: bool,
    /// Views registered as mounted.
    pub mounted: usize,
    /// Views registered as unmounted.
    pub unmounted: usize,
    /// Views that left flags behind and stay queued.
    pub postponed: usize,
}

/// Outcome of a visibility sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibilityStats {
    /// Views that became visible and were scheduled for insertion.
    pub mounted: usize,
    /// Views that became invisible and were detached or disposed.
    pub unmounted: usize,
}

/// Progress of a deferred render cycle, passed to the progress hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Whether the queue was emptied by this step.
    pub done: bool,
    /// Updates processed so far in this cycle.
    pub processed: usize,
    /// Updates scheduled since the cycle started.
    pub total: usize,
    /// Statistics of this step.
    pub stats: RenderStats,
}

/// Notifications observable through
/// [`take_events`](crate::surface::Surface::take_events).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A requested render completed.
    RenderDone(RenderStats),
    /// The queue emptied with nothing frozen.
    Idle,
}

type Hook = Box<dyn FnMut()>;
type StatsHook = Box<dyn FnMut(&RenderStats)>;
type ProgressHook = Box<dyn FnMut(&Progress)>;

/// Callbacks around rendering.
#[derive(Default)]
pub struct RenderHooks {
    pub(crate) before_render: Option<Hook>,
    pub(crate) after_render: Option<StatsHook>,
    pub(crate) before_each_batch: Option<StatsHook>,
    pub(crate) after_each_batch: Option<StatsHook>,
    pub(crate) progress: Option<ProgressHook>,
}

impl fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHooks")
            .field("before_render", &self.before_render.is_some())
            .field("after_render", &self.after_render.is_some())
            .field("before_each_batch", &self.before_each_batch.is_some())
            .field("after_each_batch", &self.after_each_batch.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl RenderHooks {
    /// No hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before the first batch of a render.
    #[must_use]
    pub fn before_render(mut self, f: impl FnMut() + 'static) -> Self {
        self.before_render = Some(Box::new(f));
        self
    }

    /// Called once a render completes.
    #[must_use]
    pub fn after_render(mut self, f: impl FnMut(&RenderStats) + 'static) -> Self {
        self.after_render = Some(Box::new(f));
        self
    }

    /// Called before every batch with the stats of the previous batch of
    /// the same render, or default stats before the first one.
    #[must_use]
    pub fn before_each_batch(mut self, f: impl FnMut(&RenderStats) + 'static) -> Self {
        self.before_each_batch = Some(Box::new(f));
        self
    }

    /// Called after every batch.
    #[must_use]
    pub fn after_each_batch(mut self, f: impl FnMut(&RenderStats) + 'static) -> Self {
        self.after_each_batch = Some(Box::new(f));
        self
    }

    /// Called after every deferred step that had scheduled work.
    #[must_use]
    pub fn progress(mut self, f: impl FnMut(&Progress) + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let sync = SurfaceConfig::synchronous();
        assert_eq!(sync.mode, RenderMode::Sync);
        assert!(!sync.frozen);
        assert!(!sync.visibility.is_constrained());

        let deferred = SurfaceConfig::deferred();
        assert_eq!(deferred.mode, RenderMode::Async);
        assert_eq!(deferred.batch_size, None);
        assert_eq!(deferred.sorting, Sorting::Approx);
    }

    #[test]
    fn view_management_presets() {
        assert!(ViewManagement::enabled().lazy_initialize);
        assert!(!ViewManagement::disabled().lazy_initialize);
        let vm = ViewManagement::enabled().with_dispose_hidden(true);
        assert!(vm.dispose_hidden && !vm.initialize_unmounted);
    }

    #[test]
    fn options_builder() {
        let opts = RenderOptions::new()
            .with_key("reset")
            .with_batch_size(2)
            .silent();
        assert_eq!(opts.key, Some("reset"));
        assert_eq!(opts.batch_size, Some(2));
        assert!(opts.silent);
        assert_eq!(RenderOptions::default(), RenderOptions::new());
    }

    #[test]
    fn hooks_debug_reports_presence() {
        let hooks = RenderHooks::new().after_render(|_| {});
        let text = alloc::format!("{hooks:?}");
        assert!(text.contains("after_render: true"), "got: {text}");
        assert!(text.contains("before_render: false"), "got: {text}");
    }
}
