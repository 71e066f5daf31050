// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host integration contract for deferred rendering.
//!
//! In [`RenderMode::Async`](crate::scheduler::RenderMode::Async) the surface
//! never runs batches on its own. It asks a [`FrameSource`] for a frame and
//! the host answers by calling [`Surface::step`] when the frame arrives:
//!
//! ```rust,ignore
//! fn on_animation_frame(surface: &mut Surface) {
//!     // One bounded batch plus one bounded visibility sweep.
//!     let more = surface.step();
//!     if !more {
//!         // Idle: nothing is queued and every view is in the right list.
//!     }
//! }
//! ```
//!
//! The surface requests at most one frame at a time and cancels it when it
//! is frozen, so a host may map both calls straight onto
//! `requestAnimationFrame` / `cancelAnimationFrame` or a timer.
//!
//! [`Surface::step`]: crate::surface::Surface::step

use alloc::rc::Rc;
use core::cell::Cell;

/// Schedules future calls to [`Surface::step`](crate::surface::Surface::step).
pub trait FrameSource {
    /// Asks the host to call `step` once, at a time of its choosing.
    fn request_frame(&mut self);

    /// Withdraws the outstanding request, if any.
    fn cancel_frame(&mut self);
}

/// A [`FrameSource`] driven by hand, for tests and headless hosts.
///
/// Clones share state, so one clone can be handed to the surface while
/// another observes the requests.
#[derive(Clone, Debug, Default)]
pub struct ManualFrames {
    state: Rc<FrameState>,
}

#[derive(Debug, Default)]
struct FrameState {
    pending: Cell<bool>,
    requested: Cell<u64>,
    cancelled: Cell<u64>,
}

impl ManualFrames {
    /// A source with no outstanding request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a frame is outstanding.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.pending.get()
    }

    /// Consumes the outstanding request.
    ///
    /// Returns whether there was one; the host should call `step` if so.
    pub fn take(&self) -> bool {
        self.state.pending.replace(false)
    }

    /// Total number of requests made.
    #[must_use]
    pub fn requested(&self) -> u64 {
        self.state.requested.get()
    }

    /// Total number of cancellations made.
    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.state.cancelled.get()
    }
}

impl FrameSource for ManualFrames {
    fn request_frame(&mut self) {
        self.state.pending.set(true);
        self.state.requested.set(self.state.requested.get() + 1);
    }

    fn cancel_frame(&mut self) {
        if self.state.pending.replace(false) {
            self.state.cancelled.set(self.state.cancelled.get() + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_requests() {
        let observer = ManualFrames::new();
        let mut source = observer.clone();
        source.request_frame();
        assert!(observer.is_pending());
        assert!(observer.take());
        assert!(!observer.take());
        assert_eq!(observer.requested(), 1);
    }

    #[test]
    fn cancel_counts_only_outstanding() {
        let mut source = ManualFrames::new();
        source.cancel_frame();
        assert_eq!(source.cancelled(), 0);
        source.request_frame();
        source.cancel_frame();
        assert_eq!(source.cancelled(), 1);
        assert!(!source.is_pending());
    }
}
