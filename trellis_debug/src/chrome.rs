// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Batches, sweeps, and idle transitions become global instants. View
//! lifecycle transitions become thread-scoped instants on a track per cell.
//! Freeze depth is exported as a counter. Scheduling and layer events carry
//! no timestamp of their own and are placed at the last seen timestamp.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use trellis_core::time::{HostTime, Timebase};
use trellis_core::trace::ViewTransition;

use crate::recorder::{RecordedEvent, decode};

/// Track for surface-wide events.
const SURFACE_TID: u64 = 0;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last = HostTime(0);

    for recorded in decode(bytes) {
        if let Some(t) = recorded.timestamp() {
            last = t;
        }
        let ts = ticks_to_us(last.ticks(), timebase);
        match recorded {
            RecordedEvent::Batch(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Batch",
                    "cat": "Scheduler",
                    "ts": ts,
                    "pid": 0,
                    "tid": SURFACE_TID,
                    "s": "g",
                    "args": {
                        "batch_index": e.batch_index,
                        "updated": e.stats.updated,
                        "processed": e.stats.processed,
                        "postponed": e.stats.postponed,
                        "mounted": e.stats.mounted,
                        "unmounted": e.stats.unmounted,
                        "priority": e.stats.priority,
                        "empty": e.stats.empty,
                    }
                }));
            }
            RecordedEvent::Sweep(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Sweep",
                    "cat": "Visibility",
                    "ts": ts,
                    "pid": 0,
                    "tid": SURFACE_TID,
                    "s": "g",
                    "args": {
                        "mounted": e.stats.mounted,
                        "unmounted": e.stats.unmounted,
                    }
                }));
            }
            RecordedEvent::View(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": transition_name(e.transition),
                    "cat": "View",
                    "ts": ts,
                    "pid": 0,
                    // Cell ids start at zero; keep them clear of the surface track.
                    "tid": e.cell.0.saturating_add(1),
                    "s": "t",
                    "args": {
                        "cell": e.cell.0,
                        "view": e.view.index(),
                        "generation": e.view.generation(),
                    }
                }));
            }
            RecordedEvent::Freeze(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "FreezeDepth",
                    "cat": "Scheduler",
                    "ts": ts,
                    "pid": 0,
                    "args": {
                        "depth": e.depth,
                        "frozen": u8::from(e.frozen),
                    }
                }));
            }
            RecordedEvent::Idle(_) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Idle",
                    "cat": "Scheduler",
                    "ts": ts,
                    "pid": 0,
                    "tid": SURFACE_TID,
                    "s": "g",
                }));
            }
            RecordedEvent::UpdateScheduled(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "UpdateScheduled",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": SURFACE_TID,
                    "s": "p",
                    "args": {
                        "view": e.view.index(),
                        "flags": e.flags,
                        "priority": e.priority,
                        "coalesced": e.coalesced,
                    }
                }));
            }
            RecordedEvent::Layer(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Layer",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": SURFACE_TID,
                    "s": "p",
                    "args": {
                        "layer_index": e.layer_index,
                        "kind": format!("{:?}", e.kind),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn transition_name(t: ViewTransition) -> &'static str {
    match t {
        ViewTransition::Constructed => "Constructed",
        ViewTransition::Mounted { first: true } => "FirstMount",
        ViewTransition::Mounted { first: false } => "Mounted",
        ViewTransition::Detached => "Detached",
        ViewTransition::Disposed => "Disposed",
        ViewTransition::Removed => "Removed",
    }
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use trellis_core::cell::CellId;
    use trellis_core::trace::{FreezeEvent, LayerChangeKind, LayerEvent, TraceSink, ViewEvent};
    use trellis_core::view::ViewId;

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_freeze(&FreezeEvent {
            frozen: true,
            depth: 1,
            keyed: false,
            timestamp: HostTime(1_000),
        });
        rec.on_view(&ViewEvent {
            view: ViewId::from_raw(0, 0),
            cell: CellId(3),
            transition: ViewTransition::Mounted { first: true },
            timestamp: HostTime(2_000),
        });
        rec.on_layer(&LayerEvent {
            layer_index: 1,
            kind: LayerChangeKind::Sorted,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), Timebase::NANOS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "C");
        assert_eq!(parsed[0]["args"]["depth"], 1);

        assert_eq!(parsed[1]["ph"], "i");
        assert_eq!(parsed[1]["name"], "FirstMount");
        assert_eq!(parsed[1]["tid"], 4);
        assert_eq!(parsed[1]["ts"], 2.0);

        // Untimed events borrow the previous timestamp.
        assert_eq!(parsed[2]["name"], "Layer");
        assert_eq!(parsed[2]["ts"], 2.0);
        assert_eq!(parsed[2]["args"]["kind"], "Sorted");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], Timebase::NANOS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
