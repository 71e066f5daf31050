// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use trellis_core::time::{HostTime, Timebase};
use trellis_core::trace::{
    BatchEvent, FreezeEvent, IdleEvent, LayerChangeKind, LayerEvent, SweepEvent, TraceSink,
    UpdateScheduledEvent, ViewEvent, ViewTransition,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn us(&self, t: HostTime) -> f64 {
        self.timebase.ticks_to_nanos(t.ticks()) as f64 / 1000.0
    }
}

fn transition_name(t: ViewTransition) -> &'static str {
    match t {
        ViewTransition::Constructed => "constructed",
        ViewTransition::Mounted { first: true } => "mounted(first)",
        ViewTransition::Mounted { first: false } => "mounted",
        ViewTransition::Detached => "detached",
        ViewTransition::Disposed => "disposed",
        ViewTransition::Removed => "removed",
    }
}

fn layer_change_name(kind: LayerChangeKind) -> &'static str {
    match kind {
        LayerChangeKind::Added => "added",
        LayerChangeKind::Removed => "removed",
        LayerChangeKind::Moved => "moved",
        LayerChangeKind::Sorted => "sorted",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_batch(&mut self, e: &BatchEvent) {
        let s = &e.stats;
        let priority = s.priority.map_or_else(|| "-".to_owned(), |p| p.to_string());
        let _ = writeln!(
            self.writer,
            "[batch] #{} at {:.1}µs updated={} processed={} postponed={} \
             mounted={} unmounted={} empty={} priority={priority}",
            e.batch_index,
            self.us(e.timestamp),
            s.updated,
            s.processed,
            s.postponed,
            s.mounted,
            s.unmounted,
            s.empty,
        );
    }

    fn on_sweep(&mut self, e: &SweepEvent) {
        let _ = writeln!(
            self.writer,
            "[sweep] at {:.1}µs mounted={} unmounted={}",
            self.us(e.timestamp),
            e.stats.mounted,
            e.stats.unmounted,
        );
    }

    fn on_view(&mut self, e: &ViewEvent) {
        let _ = writeln!(
            self.writer,
            "[view] {:?} cell={} {} at {:.1}µs",
            e.view,
            e.cell,
            transition_name(e.transition),
            self.us(e.timestamp),
        );
    }

    fn on_freeze(&mut self, e: &FreezeEvent) {
        let state = if e.frozen { "frozen" } else { "thawed" };
        let keyed = if e.keyed { " keyed" } else { "" };
        let _ = writeln!(
            self.writer,
            "[freeze] {state} depth={}{keyed} at {:.1}µs",
            e.depth,
            self.us(e.timestamp),
        );
    }

    fn on_idle(&mut self, e: &IdleEvent) {
        let _ = writeln!(self.writer, "[idle] at {:.1}µs", self.us(e.timestamp));
    }

    fn on_update_scheduled(&mut self, e: &UpdateScheduledEvent) {
        let merged = if e.coalesced { " (merged)" } else { "" };
        let _ = writeln!(
            self.writer,
            "[schedule] {:?} flags={:#x} priority={}{merged}",
            e.view, e.flags, e.priority,
        );
    }

    fn on_layer(&mut self, e: &LayerEvent) {
        let _ = writeln!(
            self.writer,
            "[layer] index={} {}",
            e.layer_index,
            layer_change_name(e.kind),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::cell::CellId;
    use trellis_core::scheduler::VisibilityStats;
    use trellis_core::view::ViewId;

    fn sink() -> PrettyPrintSink<Vec<u8>> {
        PrettyPrintSink::with_writer(Vec::new(), Timebase::NANOS)
    }

    #[test]
    fn pretty_print_view_transition() {
        let mut sink = sink();
        sink.on_view(&ViewEvent {
            view: ViewId::from_raw(2, 0),
            cell: CellId(7),
            transition: ViewTransition::Mounted { first: true },
            timestamp: HostTime(3_000),
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.starts_with("[view]"), "got: {output}");
        assert!(output.contains("mounted(first)"), "got: {output}");
        assert!(output.contains("3.0µs"), "got: {output}");
    }

    #[test]
    fn one_line_per_event() {
        let mut sink = sink();
        sink.on_sweep(&SweepEvent {
            timestamp: HostTime(0),
            stats: VisibilityStats {
                mounted: 2,
                unmounted: 1,
            },
        });
        sink.on_freeze(&FreezeEvent {
            frozen: true,
            depth: 1,
            keyed: true,
            timestamp: HostTime(0),
        });
        sink.on_idle(&IdleEvent {
            timestamp: HostTime(0),
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 3, "got: {output}");
        assert!(lines[0].contains("mounted=2 unmounted=1"), "got: {output}");
        assert!(lines[1].contains("frozen depth=1 keyed"), "got: {output}");
        assert!(lines[2].starts_with("[idle]"), "got: {output}");
    }
}
