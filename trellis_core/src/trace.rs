// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the scheduler.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! surface calls as it flushes batches, sweeps visibility, and moves views
//! through their lifecycle. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! Timestamps come from the surface's [`Clock`](crate::time::Clock), or are
//! zero when no clock is configured.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) gates [`UpdateScheduledEvent`] and
//!   [`LayerEvent`] plus the corresponding `TraceSink` methods.

use crate::cell::CellId;
use crate::scheduler::{RenderStats, VisibilityStats};
use crate::time::HostTime;
use crate::view::ViewId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which lifecycle transition a view went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewTransition {
    /// An instance was constructed.
    Constructed,
    /// The node was attached to a layer.
    Mounted {
        /// Whether this was the first attachment of this instance.
        first: bool,
    },
    /// The node was pulled out of the visible tree; the instance was kept.
    Detached,
    /// The instance and node were discarded; the cell stays known.
    Disposed,
    /// The view was removed together with its cell.
    Removed,
}

/// Which structural change happened to a layer.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerChangeKind {
    /// The layer was registered.
    Added,
    /// The layer was unregistered.
    Removed,
    /// The layer moved in the layer order.
    Moved,
    /// The layer's view nodes were resorted.
    Sorted,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted after every flushed batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchEvent {
    /// Batch counter since the surface was created.
    pub batch_index: u64,
    /// Host time at the end of the batch.
    pub timestamp: HostTime,
    /// Statistics of this batch.
    pub stats: RenderStats,
}

/// Emitted after a visibility sweep that changed at least one view.
#[derive(Clone, Copy, Debug)]
pub struct SweepEvent {
    /// Host time at the end of the sweep.
    pub timestamp: HostTime,
    /// Mount and unmount counts.
    pub stats: VisibilityStats,
}

/// Emitted when a view changes lifecycle state.
#[derive(Clone, Copy, Debug)]
pub struct ViewEvent {
    /// The view, as identified before the transition.
    pub view: ViewId,
    /// The cell the view represents.
    pub cell: CellId,
    /// What happened.
    pub transition: ViewTransition,
    /// Host time of the transition.
    pub timestamp: HostTime,
}

/// Emitted when a freeze is taken or released.
#[derive(Clone, Copy, Debug)]
pub struct FreezeEvent {
    /// Whether the surface is frozen afterwards.
    pub frozen: bool,
    /// Unkeyed freeze depth afterwards.
    pub depth: u32,
    /// Whether the call carried a key.
    pub keyed: bool,
    /// Host time of the call.
    pub timestamp: HostTime,
}

/// Emitted once per transition into the idle state.
#[derive(Clone, Copy, Debug)]
pub struct IdleEvent {
    /// Host time the surface went idle.
    pub timestamp: HostTime,
}

/// Emitted for every scheduled view update.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct UpdateScheduledEvent {
    /// The view.
    pub view: ViewId,
    /// Raw bits of the requested flags.
    pub flags: u32,
    /// Requested priority.
    pub priority: u32,
    /// Whether the request merged into an existing entry.
    pub coalesced: bool,
}

/// Emitted for every structural layer change.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct LayerEvent {
    /// Position of the layer in the layer order (before removal, for
    /// removals).
    pub layer_index: u32,
    /// What happened.
    pub kind: LayerChangeKind,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the surface.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called after every flushed batch.
    fn on_batch(&mut self, e: &BatchEvent) {
        _ = e;
    }

    /// Called after a visibility sweep that changed views.
    fn on_sweep(&mut self, e: &SweepEvent) {
        _ = e;
    }

    /// Called on every view lifecycle transition.
    fn on_view(&mut self, e: &ViewEvent) {
        _ = e;
    }

    /// Called when a freeze is taken or released.
    fn on_freeze(&mut self, e: &FreezeEvent) {
        _ = e;
    }

    /// Called when the surface goes idle.
    fn on_idle(&mut self, e: &IdleEvent) {
        _ = e;
    }

    /// Called for every scheduled update (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_update_scheduled(&mut self, e: &UpdateScheduledEvent) {
        _ = e;
    }

    /// Called for every layer change (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_layer(&mut self, e: &LayerEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`BatchEvent`].
    #[inline]
    pub fn batch(&mut self, e: &BatchEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_batch(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SweepEvent`].
    #[inline]
    pub fn sweep(&mut self, e: &SweepEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_sweep(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ViewEvent`].
    #[inline]
    pub fn view(&mut self, e: &ViewEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_view(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FreezeEvent`].
    #[inline]
    pub fn freeze(&mut self, e: &FreezeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_freeze(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`IdleEvent`].
    #[inline]
    pub fn idle(&mut self, e: &IdleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_idle(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`UpdateScheduledEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn update_scheduled(&mut self, e: &UpdateScheduledEvent) {
        if let Some(s) = &mut self.sink {
            s.on_update_scheduled(e);
        }
    }

    /// Emits a [`LayerEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn layer(&mut self, e: &LayerEvent) {
        if let Some(s) = &mut self.sink {
            s.on_layer(e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view_event() -> ViewEvent {
        ViewEvent {
            view: ViewId {
                idx: 3,
                generation: 1,
            },
            cell: CellId(9),
            transition: ViewTransition::Mounted { first: true },
            timestamp: HostTime(1_000),
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_view(&sample_view_event());
        sink.on_batch(&BatchEvent {
            batch_index: 0,
            timestamp: HostTime(0),
            stats: RenderStats::default(),
        });
        sink.on_idle(&IdleEvent {
            timestamp: HostTime(0),
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.view(&sample_view_event());
        tracer.freeze(&FreezeEvent {
            frozen: true,
            depth: 1,
            keyed: false,
            timestamp: HostTime(0),
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            cells: Vec<CellId>,
        }
        impl TraceSink for RecordingSink {
            fn on_view(&mut self, e: &ViewEvent) {
                self.cells.push(e.cell);
            }
        }

        let mut sink = RecordingSink { cells: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.view(&sample_view_event());
        drop(tracer);
        assert_eq!(sink.cells, &[CellId(9)]);
    }
}
