// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! View scheduling, visibility culling, and layer management for diagram
//! surfaces.
//!
//! `trellis_core` decides *when* the views of a diagram are constructed,
//! updated, attached to the visible tree, detached, and disposed. It does not
//! draw anything: views implement [`CellView`](view::CellView) and the
//! surface calls them at the right time. The crate is `no_std` compatible
//! (with `alloc`) and keeps its node tree in struct-of-arrays storage with
//! generational handles.
//!
//! # Architecture
//!
//! ```text
//!   model notifications (on_cell_added / changed / removed)
//!       │
//!       ▼
//!   UpdateQueue ◄──── request_view_update ◄──── views (deferred requests)
//!       │
//!       ▼  sync: flushed before returning      async: FrameSource ─► step()
//!   batch: visibility check ─► construct ─► insert into layer ─► render
//!       │                                          │
//!       ▼                                          ▼
//!   mounted / unmounted lists ◄── sweeps     LayerManager + Sorting
//! ```
//!
//! **[`surface`]**: The [`Surface`](surface::Surface), owner of everything
//! below and the only mutation entry point.
//!
//! **[`scheduler`]**: Configuration, per-call render options, statistics,
//! hooks, and the notifications a surface emits.
//!
//! **[`view`]**: The [`CellView`](view::CellView) trait, view handles, and
//! the registry of view types.
//!
//! **[`visibility`]**: Visibility predicates combined into a
//! [`VisibilityPolicy`](visibility::VisibilityPolicy).
//!
//! **[`layer`]**: Named layers under the surface root.
//!
//! **[`sorting`]**: How view nodes are stacked within a layer.
//!
//! **[`node`]**: Struct-of-arrays node tree with generational handles.
//!
//! **[`dirty`]**: Dirty channels of the node tree via `understory_dirty`.
//!
//! **[`freeze`]**: Nested and keyed freeze bookkeeping.
//!
//! **[`backend`]**: The [`FrameSource`](backend::FrameSource) contract for
//! deferred rendering.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::cell::Cell;
//! use trellis_core::scheduler::SurfaceConfig;
//! use trellis_core::surface::Surface;
//! use trellis_core::view::{CellView, UpdateContext, ViewType, ViewTypes};
//!
//! struct Rect;
//!
//! impl CellView for Rect {
//!     fn render(&mut self, _cx: &mut UpdateContext<'_>) {}
//! }
//!
//! let types = ViewTypes::new().with("rect", ViewType::element(|_| Box::new(Rect)));
//! let mut surface = Surface::new(SurfaceConfig::synchronous(), types);
//! let view = surface.on_cell_added(Cell::new(1, "rect")).unwrap();
//! assert!(surface.is_view_mounted(view));
//! ```
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-update
//!   and per-layer events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod cell;
pub mod dirty;
pub mod error;
pub mod flags;
pub mod freeze;
pub mod layer;
pub mod node;
pub(crate) mod queue;
pub mod scheduler;
pub mod sorting;
pub mod surface;
pub mod time;
pub mod trace;
pub mod view;
pub mod visibility;
