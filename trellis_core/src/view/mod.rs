// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cell views and the registry of view types.
//!
//! The surface does not know what a view draws. It only talks to views
//! through the [`CellView`] trait: constructing them from a [`ViewTypes`]
//! registry, rendering them, confirming pending updates, and reporting
//! lifecycle transitions.
//!
//! # Lifecycle
//!
//! ```text
//!                  construct            mount
//!   Uninitialized ──────────► Detached ◄──────► Mounted
//!         ▲                      │      detach      │
//!         │        dispose       ▼                  │
//!         └──────────────── Disposed ◄──────────────┘
//! ```
//!
//! Every transition into `Mounted` calls [`CellView::on_mount`], every
//! transition out of it that keeps the instance calls
//! [`CellView::on_detach`], and dropping the instance (disposal or removal)
//! calls [`CellView::on_remove`].

mod id;
pub(crate) mod list;
pub(crate) mod registry;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::cell::Cell;
use crate::flags::UpdateFlags;

pub use id::ViewId;

/// Update priority of element (node) views.
pub const ELEMENT_PRIORITY: u32 = 0;
/// Update priority of link (connector) views.
pub const LINK_PRIORITY: u32 = 1;
/// Update priority of highlighter overlays.
pub const HIGHLIGHTER_PRIORITY: u32 = 3;

/// Lifecycle state of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// A placeholder: the cell is known but no instance was constructed yet.
    Uninitialized,
    /// The instance exists and its node is attached to a layer.
    Mounted,
    /// The instance exists but its node is not in the visible tree.
    Detached,
    /// The instance was discarded; the cell will get a fresh view when it
    /// becomes visible again.
    Disposed,
}

impl ViewState {
    /// Returns whether a view instance exists in this state.
    #[inline]
    #[must_use]
    pub const fn is_constructed(self) -> bool {
        matches!(self, Self::Mounted | Self::Detached)
    }
}

/// The renderable representation of a cell.
///
/// Every method except [`render`](Self::render) has a default, so a minimal
/// view only needs to know how to draw itself.
pub trait CellView {
    /// Renders the view from scratch.
    ///
    /// Called when the pending flags contain [`UpdateFlags::RENDER`], before
    /// any remaining flags are confirmed.
    fn render(&mut self, cx: &mut UpdateContext<'_>);

    /// Applies the pending renderer-defined flags.
    ///
    /// Returns the flags that could not be handled yet. A non-empty result
    /// keeps those flags queued and counts the view as postponed.
    fn confirm_update(&mut self, flags: UpdateFlags, cx: &mut UpdateContext<'_>) -> UpdateFlags {
        _ = (flags, cx);
        UpdateFlags::empty()
    }

    /// The flags scheduled when the view is first constructed.
    fn init_flags(&self) -> UpdateFlags {
        UpdateFlags::RENDER
    }

    /// Called after the view's node was attached to its layer.
    fn on_mount(&mut self, first_mount: bool) {
        _ = first_mount;
    }

    /// Called after the view's node was pulled out of the visible tree.
    fn on_detach(&mut self) {}

    /// Called right before the instance is dropped.
    fn on_remove(&mut self) {}

    /// Returns whether overlays (highlighters, tools) are attached.
    ///
    /// Views with attachments are detached rather than disposed when they
    /// become hidden, so the overlays survive.
    fn has_attachments(&self) -> bool {
        false
    }
}

/// A request made by a view during an update, applied after the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DeferredUpdate {
    pub(crate) view: ViewId,
    pub(crate) flags: UpdateFlags,
    pub(crate) priority: u32,
}

/// What a view can see and do while it is being updated.
pub struct UpdateContext<'a> {
    pub(crate) view: ViewId,
    pub(crate) cell: &'a Cell,
    pub(crate) deferred: &'a mut Vec<DeferredUpdate>,
}

impl fmt::Debug for UpdateContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateContext")
            .field("view", &self.view)
            .field("cell", &self.cell.id)
            .finish_non_exhaustive()
    }
}

impl UpdateContext<'_> {
    /// The view being updated.
    #[inline]
    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// The cell the view represents.
    #[inline]
    #[must_use]
    pub fn cell(&self) -> &Cell {
        self.cell
    }

    /// Requests a further update of any view.
    ///
    /// The request is not applied immediately: it is enqueued once the
    /// current batch finishes, so it runs in the next batch at the earliest.
    /// Requests for views that no longer exist by then are dropped.
    pub fn request_update(&mut self, view: ViewId, flags: UpdateFlags, priority: u32) {
        self.deferred.push(DeferredUpdate {
            view,
            flags,
            priority,
        });
    }
}

/// Builds a view instance for a cell.
pub type ViewConstructor = dyn Fn(&Cell) -> Box<dyn CellView>;

/// A registered view type: its update priority and its constructor.
pub struct ViewType {
    priority: u32,
    construct: Box<ViewConstructor>,
}

impl fmt::Debug for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewType")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl ViewType {
    /// Creates a view type with the given update priority.
    pub fn new(priority: u32, construct: impl Fn(&Cell) -> Box<dyn CellView> + 'static) -> Self {
        Self {
            priority,
            construct: Box::new(construct),
        }
    }

    /// Shorthand for an element view type ([`ELEMENT_PRIORITY`]).
    pub fn element(construct: impl Fn(&Cell) -> Box<dyn CellView> + 'static) -> Self {
        Self::new(ELEMENT_PRIORITY, construct)
    }

    /// Shorthand for a link view type ([`LINK_PRIORITY`]).
    pub fn link(construct: impl Fn(&Cell) -> Box<dyn CellView> + 'static) -> Self {
        Self::new(LINK_PRIORITY, construct)
    }

    /// The update priority of views of this type.
    #[inline]
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Constructs a view for `cell`.
    #[must_use]
    pub fn construct(&self, cell: &Cell) -> Box<dyn CellView> {
        (self.construct)(cell)
    }
}

/// Mapping from cell kind to view type, passed to the surface at
/// construction.
///
/// Kinds without an explicit entry use the fallback type if one is set.
#[derive(Debug, Default)]
pub struct ViewTypes {
    types: BTreeMap<String, ViewType>,
    fallback: Option<ViewType>,
}

impl ViewTypes {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a view type for `kind` and returns the registry.
    #[must_use]
    pub fn with(mut self, kind: impl Into<String>, ty: ViewType) -> Self {
        self.register(kind, ty);
        self
    }

    /// Sets the fallback type and returns the registry.
    #[must_use]
    pub fn with_fallback(mut self, ty: ViewType) -> Self {
        self.fallback = Some(ty);
        self
    }

    /// Registers a view type for `kind`, returning the one it replaced.
    pub fn register(&mut self, kind: impl Into<String>, ty: ViewType) -> Option<ViewType> {
        self.types.insert(kind.into(), ty)
    }

    /// Sets the fallback type, returning the previous one.
    pub fn set_fallback(&mut self, ty: ViewType) -> Option<ViewType> {
        self.fallback.replace(ty)
    }

    /// Looks up the type for `kind`, falling back if needed.
    #[must_use]
    pub fn resolve(&self, kind: &str) -> Option<&ViewType> {
        self.types.get(kind).or(self.fallback.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl CellView for Blank {
        fn render(&mut self, _cx: &mut UpdateContext<'_>) {}
    }

    fn blank(_: &Cell) -> Box<dyn CellView> {
        Box::new(Blank)
    }

    #[test]
    fn resolve_prefers_exact_kind() {
        let types = ViewTypes::new()
            .with("link", ViewType::link(blank))
            .with_fallback(ViewType::element(blank));
        assert_eq!(types.resolve("link").map(ViewType::priority), Some(LINK_PRIORITY));
        assert_eq!(
            types.resolve("rect").map(ViewType::priority),
            Some(ELEMENT_PRIORITY)
        );
    }

    #[test]
    fn resolve_without_fallback_fails() {
        let types = ViewTypes::new().with("rect", ViewType::element(blank));
        assert!(types.resolve("ellipse").is_none());
    }

    #[test]
    fn context_defers_requests() {
        let cell = Cell::new(1, "rect");
        let mut deferred = Vec::new();
        let view = ViewId {
            idx: 0,
            generation: 0,
        };
        let mut cx = UpdateContext {
            view,
            cell: &cell,
            deferred: &mut deferred,
        };
        cx.request_update(view, UpdateFlags::RENDER, HIGHLIGHTER_PRIORITY);
        assert_eq!(cx.cell().id, cell.id);
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].priority, HIGHLIGHTER_PRIORITY);
    }

    #[test]
    fn default_hooks_are_inert() {
        let mut view = Blank;
        assert_eq!(view.init_flags(), UpdateFlags::RENDER);
        assert!(!view.has_attachments());
        view.on_mount(true);
        view.on_detach();
        view.on_remove();
    }
}
