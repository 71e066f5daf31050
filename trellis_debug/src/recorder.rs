// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each starting with a
//! one-byte tag. [`decode`] reads them back as an iterator of
//! [`RecordedEvent`]. Counters are widened to `u64` on the wire.

use trellis_core::cell::CellId;
use trellis_core::scheduler::{RenderStats, VisibilityStats};
use trellis_core::time::HostTime;
use trellis_core::trace::{
    BatchEvent, FreezeEvent, IdleEvent, LayerChangeKind, LayerEvent, SweepEvent, TraceSink,
    UpdateScheduledEvent, ViewEvent, ViewTransition,
};
use trellis_core::view::ViewId;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_BATCH: u8 = 1;
const TAG_SWEEP: u8 = 2;
const TAG_VIEW: u8 = 3;
const TAG_FREEZE: u8 = 4;
const TAG_IDLE: u8 = 5;
const TAG_UPDATE_SCHEDULED: u8 = 6;
const TAG_LAYER: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, v: usize) {
        self.write_u64(u64::try_from(v).unwrap_or(u64::MAX));
    }

    fn write_option_u32(&mut self, v: Option<u32>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u32(val);
            }
            None => {
                self.write_u8(0);
                self.write_u32(0);
            }
        }
    }

    fn write_view(&mut self, view: ViewId) {
        self.write_u32(view.index());
        self.write_u32(view.generation());
    }

    fn write_transition(&mut self, t: ViewTransition) {
        self.write_u8(match t {
            ViewTransition::Constructed => 0,
            ViewTransition::Mounted { first: true } => 1,
            ViewTransition::Mounted { first: false } => 2,
            ViewTransition::Detached => 3,
            ViewTransition::Disposed => 4,
            ViewTransition::Removed => 5,
        });
    }

    fn write_layer_change(&mut self, kind: LayerChangeKind) {
        self.write_u8(match kind {
            LayerChangeKind::Added => 0,
            LayerChangeKind::Removed => 1,
            LayerChangeKind::Moved => 2,
            LayerChangeKind::Sorted => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_batch(&mut self, e: &BatchEvent) {
        let s = &e.stats;
        self.write_u8(TAG_BATCH);
        self.write_u64(e.batch_index);
        self.write_u64(e.timestamp.ticks());
        self.write_count(s.updated);
        self.write_count(s.batches);
        self.write_option_u32(s.priority);
        self.write_count(s.processed);
        self.write_bool(s.empty);
        self.write_count(s.mounted);
        self.write_count(s.unmounted);
        self.write_count(s.postponed);
    }

    fn on_sweep(&mut self, e: &SweepEvent) {
        self.write_u8(TAG_SWEEP);
        self.write_u64(e.timestamp.ticks());
        self.write_count(e.stats.mounted);
        self.write_count(e.stats.unmounted);
    }

    fn on_view(&mut self, e: &ViewEvent) {
        self.write_u8(TAG_VIEW);
        self.write_view(e.view);
        self.write_u64(e.cell.0);
        self.write_transition(e.transition);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_freeze(&mut self, e: &FreezeEvent) {
        self.write_u8(TAG_FREEZE);
        self.write_bool(e.frozen);
        self.write_u32(e.depth);
        self.write_bool(e.keyed);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_idle(&mut self, e: &IdleEvent) {
        self.write_u8(TAG_IDLE);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_update_scheduled(&mut self, e: &UpdateScheduledEvent) {
        self.write_u8(TAG_UPDATE_SCHEDULED);
        self.write_view(e.view);
        self.write_u32(e.flags);
        self.write_u32(e.priority);
        self.write_bool(e.coalesced);
    }

    fn on_layer(&mut self, e: &LayerEvent) {
        self.write_u8(TAG_LAYER);
        self.write_u32(e.layer_index);
        self.write_layer_change(e.kind);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`BatchEvent`].
    Batch(BatchEvent),
    /// A [`SweepEvent`].
    Sweep(SweepEvent),
    /// A [`ViewEvent`].
    View(ViewEvent),
    /// A [`FreezeEvent`].
    Freeze(FreezeEvent),
    /// An [`IdleEvent`].
    Idle(IdleEvent),
    /// An [`UpdateScheduledEvent`].
    UpdateScheduled(UpdateScheduledEvent),
    /// A [`LayerEvent`].
    Layer(LayerEvent),
}

impl RecordedEvent {
    /// Host time of the event, for events that carry one.
    #[must_use]
    pub fn timestamp(&self) -> Option<HostTime> {
        match self {
            Self::Batch(e) => Some(e.timestamp),
            Self::Sweep(e) => Some(e.timestamp),
            Self::View(e) => Some(e.timestamp),
            Self::Freeze(e) => Some(e.timestamp),
            Self::Idle(e) => Some(e.timestamp),
            Self::UpdateScheduled(_) | Self::Layer(_) => None,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|b| b != 0)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    fn read_count(&mut self) -> Option<usize> {
        Some(usize::try_from(self.read_u64()?).unwrap_or(usize::MAX))
    }

    fn read_option_u32(&mut self) -> Option<Option<u32>> {
        let present = self.read_u8()?;
        let val = self.read_u32()?;
        Some((present != 0).then_some(val))
    }

    fn read_view(&mut self) -> Option<ViewId> {
        let idx = self.read_u32()?;
        let generation = self.read_u32()?;
        Some(ViewId::from_raw(idx, generation))
    }

    fn read_transition(&mut self) -> Option<ViewTransition> {
        Some(match self.read_u8()? {
            0 => ViewTransition::Constructed,
            1 => ViewTransition::Mounted { first: true },
            2 => ViewTransition::Mounted { first: false },
            3 => ViewTransition::Detached,
            4 => ViewTransition::Disposed,
            5 => ViewTransition::Removed,
            _ => return None,
        })
    }

    fn read_layer_change(&mut self) -> Option<LayerChangeKind> {
        Some(match self.read_u8()? {
            0 => LayerChangeKind::Added,
            1 => LayerChangeKind::Removed,
            2 => LayerChangeKind::Moved,
            3 => LayerChangeKind::Sorted,
            _ => return None,
        })
    }

    fn decode_batch(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Batch(BatchEvent {
            batch_index: self.read_u64()?,
            timestamp: HostTime(self.read_u64()?),
            stats: RenderStats {
                updated: self.read_count()?,
                batches: self.read_count()?,
                priority: self.read_option_u32()?,
                processed: self.read_count()?,
                empty: self.read_bool()?,
                mounted: self.read_count()?,
                unmounted: self.read_count()?,
                postponed: self.read_count()?,
            },
        }))
    }

    fn decode_sweep(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Sweep(SweepEvent {
            timestamp: HostTime(self.read_u64()?),
            stats: VisibilityStats {
                mounted: self.read_count()?,
                unmounted: self.read_count()?,
            },
        }))
    }

    fn decode_view(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::View(ViewEvent {
            view: self.read_view()?,
            cell: CellId(self.read_u64()?),
            transition: self.read_transition()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_freeze(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Freeze(FreezeEvent {
            frozen: self.read_bool()?,
            depth: self.read_u32()?,
            keyed: self.read_bool()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_idle(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Idle(IdleEvent {
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_update_scheduled(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateScheduled(UpdateScheduledEvent {
            view: self.read_view()?,
            flags: self.read_u32()?,
            priority: self.read_u32()?,
            coalesced: self.read_bool()?,
        }))
    }

    fn decode_layer(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Layer(LayerEvent {
            layer_index: self.read_u32()?,
            kind: self.read_layer_change()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_BATCH => self.decode_batch(),
            TAG_SWEEP => self.decode_sweep(),
            TAG_VIEW => self.decode_view(),
            TAG_FREEZE => self.decode_freeze(),
            TAG_IDLE => self.decode_idle(),
            TAG_UPDATE_SCHEDULED => self.decode_update_scheduled(),
            TAG_LAYER => self.decode_layer(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> BatchEvent {
        BatchEvent {
            batch_index: 4,
            timestamp: HostTime(16_000),
            stats: RenderStats {
                updated: 12,
                batches: 1,
                priority: Some(2),
                processed: 14,
                empty: false,
                mounted: 3,
                unmounted: 1,
                postponed: 2,
            },
        }
    }

    fn sample_view(transition: ViewTransition) -> ViewEvent {
        ViewEvent {
            view: ViewId::from_raw(5, 2),
            cell: CellId(41),
            transition,
            timestamp: HostTime(17_500),
        }
    }

    #[test]
    fn batch_stats_survive_recording() {
        let mut rec = RecorderSink::new();
        let orig = sample_batch();
        rec.on_batch(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Batch(e) => {
                assert_eq!(e.batch_index, orig.batch_index);
                assert_eq!(e.timestamp, orig.timestamp);
                assert_eq!(e.stats, orig.stats);
            }
            other => panic!("expected Batch, got {other:?}"),
        }
    }

    #[test]
    fn view_handles_keep_their_generation() {
        let mut rec = RecorderSink::new();
        rec.on_view(&sample_view(ViewTransition::Disposed));
        rec.on_view(&sample_view(ViewTransition::Mounted { first: false }));

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        let RecordedEvent::View(first) = &events[0] else {
            panic!("expected View, got {:?}", events[0]);
        };
        assert_eq!(first.view, ViewId::from_raw(5, 2));
        assert_eq!(first.cell, CellId(41));
        assert_eq!(first.transition, ViewTransition::Disposed);
        let RecordedEvent::View(second) = &events[1] else {
            panic!("expected View, got {:?}", events[1]);
        };
        assert_eq!(second.transition, ViewTransition::Mounted { first: false });
    }

    #[test]
    fn mixed_stream_keeps_order() {
        let mut rec = RecorderSink::new();
        rec.on_freeze(&FreezeEvent {
            frozen: true,
            depth: 1,
            keyed: false,
            timestamp: HostTime(1),
        });
        rec.on_update_scheduled(&UpdateScheduledEvent {
            view: ViewId::from_raw(0, 0),
            flags: 1,
            priority: 0,
            coalesced: true,
        });
        rec.on_layer(&LayerEvent {
            layer_index: 2,
            kind: LayerChangeKind::Sorted,
        });
        rec.on_sweep(&SweepEvent {
            timestamp: HostTime(2),
            stats: VisibilityStats::default(),
        });
        rec.on_batch(&sample_batch());
        rec.on_idle(&IdleEvent {
            timestamp: HostTime(3),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], RecordedEvent::Freeze(FreezeEvent { depth: 1, .. })));
        assert!(matches!(
            events[1],
            RecordedEvent::UpdateScheduled(UpdateScheduledEvent {
                coalesced: true,
                ..
            })
        ));
        assert!(matches!(
            events[2],
            RecordedEvent::Layer(LayerEvent {
                layer_index: 2,
                kind: LayerChangeKind::Sorted
            })
        ));
        assert!(matches!(events[3], RecordedEvent::Sweep(_)));
        assert!(matches!(events[4], RecordedEvent::Batch(_)));
        assert_eq!(events[5].timestamp(), Some(HostTime(3)));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_idle(&IdleEvent {
            timestamp: HostTime(9),
        });
        rec.on_batch(&sample_batch());
        let bytes = rec.into_bytes();

        let events: Vec<_> = decode(&bytes[..bytes.len() - 3]).collect();
        assert_eq!(events.len(), 1, "only the complete record decodes");
        assert!(matches!(events[0], RecordedEvent::Idle(_)));
    }
}
