// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host time and clocks.
//!
//! The surface never reads a platform clock on its own. Deadlines for
//! [`Surface::step_until`](crate::surface::Surface::step_until) and trace
//! timestamps come from an injected [`Clock`], expressed as [`HostTime`]
//! ticks. Tooling turns ticks into wall units with a [`Timebase`].

use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

/// A point in time expressed as host-native monotonic ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// Conversion factor from ticks to nanoseconds, `ticks * numer / denom`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// Ticks are nanoseconds.
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Ticks are microseconds.
    pub const MICROS: Self = Self {
        numer: 1000,
        denom: 1,
    };

    /// Ticks are milliseconds, as with a `performance.now()` style clock
    /// rounded to whole milliseconds.
    pub const MILLIS: Self = Self {
        numer: 1_000_000,
        denom: 1,
    };

    /// Creates a timebase.
    ///
    /// # Panics
    ///
    /// Panics if `denom` is zero.
    #[inline]
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(denom != 0, "timebase denominator must not be zero");
        Self { numer, denom }
    }

    /// Converts a tick count to nanoseconds, saturating at `u64::MAX`.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the u128 intermediate is clamped to u64::MAX before narrowing"
    )]
    pub const fn ticks_to_nanos(self, ticks: u64) -> u64 {
        let wide = ticks as u128 * self.numer as u128 / self.denom as u128;
        if wide > u64::MAX as u128 {
            u64::MAX
        } else {
            wide as u64
        }
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Returns the current host time.
    fn now(&self) -> HostTime;
}

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same underlying time, so one copy can be handed to a
/// surface while another is advanced by the driver or a test.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    ticks: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub fn new(start: HostTime) -> Self {
        Self {
            ticks: Rc::new(Cell::new(start.0)),
        }
    }

    /// Moves the clock forward by `ticks`.
    pub fn advance(&self, ticks: u64) {
        self.ticks.set(self.ticks.get().saturating_add(ticks));
    }

    /// Jumps the clock to `to`.
    pub fn set(&self, to: HostTime) {
        self.ticks.set(to.0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.ticks.get())
    }
}
