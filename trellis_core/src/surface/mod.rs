// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The surface: owner of the node tree, layers, views, and the scheduler.
//!
//! A [`Surface`] mirrors the cells of a model (through the `on_cell_*`
//! notifications), keeps one view per cell, and decides when each view is
//! constructed, updated, attached, detached, and disposed. It is the only
//! mutation entry point for everything it owns.
//!
//! The implementation is split by concern:
//!
//! - `flush`: the update queue, batches, freezing, deferred stepping.
//! - `mount`: view lifecycle and the visibility sweeps.
//! - `layers`: layer management and stacking.

mod flush;
mod layers;
mod mount;


use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::backend::FrameSource;
use crate::cell::{Cell, CellId, CellStore};
use crate::error::SurfaceError;
use crate::flags::UpdateFlags;
use crate::freeze::FreezeState;
use crate::layer::{CELLS_LAYER, LayerManager};
use crate::node::{NodeId, NodeStore};
use crate::queue::UpdateQueue;
use crate::scheduler::{
    RenderHooks, RenderMode, RenderOptions, RenderStats, SurfaceConfig, SurfaceEvent,
    ViewManagement,
};
use crate::sorting::Sorting;
use crate::time::HostTime;
use crate::trace::{TraceSink, Tracer, ViewEvent, ViewTransition};
use crate::view::registry::ViewRegistry;
use crate::view::{CellView, DeferredUpdate, ViewId, ViewState, ViewTypes};
use crate::visibility::{VisibilityContext, VisibilityPolicy};

/// Bookkeeping of the current deferred render cycle.
#[derive(Clone, Copy, Debug, Default)]
struct Cycle {
    /// Whether `before_render` ran for this cycle.
    started: bool,
    /// Updates (and unmounts) processed in this cycle.
    processed: usize,
    /// Updates scheduled since the cycle started.
    total: usize,
    /// Mount candidates examined since the last visibility change.
    checked_unmounted: usize,
    /// Unmount candidates examined since the last visibility change.
    checked_mounted: usize,
    /// Caps passed to the `unfreeze` that started the frame loop.
    batch_size: Option<usize>,
    mount_batch_size: Option<usize>,
    unmount_batch_size: Option<usize>,
}

/// A diagram surface.
///
/// See the [module docs](self) for an overview.
pub struct Surface {
    nodes: NodeStore,
    layers: LayerManager,
    cells: CellStore,
    views: ViewRegistry,
    /// View node index → view slot index.
    view_nodes: BTreeMap<u32, u32>,
    types: ViewTypes,
    queue: UpdateQueue,
    freeze: FreezeState,
    config: SurfaceConfig,
    visibility_cx: VisibilityContext,
    hooks: RenderHooks,
    frames: Option<Box<dyn FrameSource>>,
    frame_pending: bool,
    cycle: Cycle,
    /// Stats of the previous batch of the current render.
    last_batch: RenderStats,
    events: Vec<SurfaceEvent>,
    idle_notified: bool,
    sort_pending: bool,
    deferred: Vec<DeferredUpdate>,
    sink: Option<Box<dyn TraceSink>>,
    batch_index: u64,
    torn_down: bool,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("mode", &self.config.mode)
            .field("sorting", &self.config.sorting)
            .field("cells", &self.cells.len())
            .field("views", &self.views.len())
            .field("queued", &self.queue.len())
            .field("freeze", &self.freeze)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl Surface {
    /// Creates a surface with the implicit layers and no cells.
    #[must_use]
    pub fn new(config: SurfaceConfig, types: ViewTypes) -> Self {
        let mut nodes = NodeStore::new();
        let layers = LayerManager::with_implicit_layers(&mut nodes);
        let freeze = if config.frozen {
            FreezeState::frozen()
        } else {
            FreezeState::new()
        };
        Self {
            nodes,
            layers,
            cells: CellStore::new(),
            views: ViewRegistry::new(),
            view_nodes: BTreeMap::new(),
            types,
            queue: UpdateQueue::new(),
            freeze,
            config,
            visibility_cx: VisibilityContext::default(),
            hooks: RenderHooks::default(),
            frames: None,
            frame_pending: false,
            cycle: Cycle::default(),
            last_batch: RenderStats::default(),
            events: Vec::new(),
            idle_notified: false,
            sort_pending: false,
            deferred: Vec::new(),
            sink: None,
            batch_index: 0,
            torn_down: false,
        }
    }

    /// Sets the frame source used in deferred mode, returning the surface.
    #[must_use]
    pub fn with_frame_source(mut self, frames: Box<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Replaces the frame source used in deferred mode.
    pub fn set_frame_source(&mut self, frames: Option<Box<dyn FrameSource>>) {
        self.frames = frames;
    }

    /// Replaces the render hooks.
    pub fn set_hooks(&mut self, hooks: RenderHooks) {
        self.hooks = hooks;
    }

    /// Replaces the trace sink, returning the previous one.
    pub fn set_trace_sink(
        &mut self,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Option<Box<dyn TraceSink>> {
        core::mem::replace(&mut self.sink, sink)
    }

    /// Drains the notifications emitted since the last call.
    pub fn take_events(&mut self) -> Vec<SurfaceEvent> {
        core::mem::take(&mut self.events)
    }

    // -- Configuration --

    /// The flushing mode.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> RenderMode {
        self.config.mode
    }

    /// Returns whether the surface flushes through frames.
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.config.mode == RenderMode::Async
    }

    /// The sorting strategy.
    #[inline]
    #[must_use]
    pub fn sorting(&self) -> Sorting {
        self.config.sorting
    }

    /// The view management options.
    #[inline]
    #[must_use]
    pub fn view_management(&self) -> ViewManagement {
        self.config.view_management
    }

    /// The visibility policy.
    #[must_use]
    pub fn visibility_policy(&self) -> &VisibilityPolicy {
        &self.config.visibility
    }

    /// Replaces the visibility policy.
    ///
    /// Nothing is re-evaluated synchronously; deferred surfaces wake up and
    /// pick the change up in their next sweep.
    pub fn set_visibility_policy(&mut self, policy: VisibilityPolicy) {
        self.config.visibility = policy;
        self.wake_up();
    }

    /// The context passed to visibility predicates.
    #[must_use]
    pub fn visibility_context(&self) -> &VisibilityContext {
        &self.visibility_cx
    }

    /// Sets the visible area passed to visibility predicates.
    pub fn set_visible_area(&mut self, area: Option<Rect>) {
        self.visibility_cx.visible_area = area;
        self.wake_up();
    }

    // -- Model mirror --

    /// The mirrored cells.
    #[must_use]
    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    /// Returns a mirrored cell.
    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    /// The lowest `z` across all cells, 0 when there are none.
    #[must_use]
    pub fn min_z_index(&self) -> i64 {
        self.cells.min_z_index()
    }

    /// The highest `z` across all cells, 0 when there are none.
    #[must_use]
    pub fn max_z_index(&self) -> i64 {
        self.cells.max_z_index()
    }

    /// Mirrors a cell added to the model and registers its view.
    ///
    /// A cell whose id already has a view replaces it; the old view is
    /// removed synchronously.
    ///
    /// # Errors
    ///
    /// Fails if the cell names an unknown layer or no view type handles its
    /// kind. Nothing changes in that case.
    pub fn on_cell_added(&mut self, cell: Cell) -> Result<ViewId, SurfaceError> {
        self.assert_alive();
        self.check_cell(&cell)?;
        let priority = self
            .types
            .resolve(&cell.kind)
            .map_or(0, |ty| ty.priority());
        if let Some(old) = self.views.find(cell.id) {
            self.remove_view(old);
        }
        let id = cell.id;
        self.cells.insert(cell);
        let idx = self.views.register(id, priority).idx;

        let vm = self.config.view_management;
        let mut flags = self.views.register_unmounted(idx);
        if !vm.lazy_initialize || vm.initialize_unmounted {
            flags |= self.construct(idx);
        }
        if vm.initialize_unmounted {
            self.views.merge_unmounted(idx, flags);
            // The sweep mounts it, which needs a running frame loop.
            self.wake_up();
        } else {
            self.request_idx(idx, flags, priority, RenderOptions::new());
        }
        Ok(self.views.handle(idx))
    }

    /// Mirrors a cell removed from the model.
    ///
    /// A view that was never constructed is dropped immediately; otherwise
    /// the removal is queued like any other update. Returns whether the cell
    /// was known.
    pub fn on_cell_removed(&mut self, id: CellId) -> bool {
        self.assert_alive();
        if self.cells.remove(id).is_none() {
            return false;
        }
        let Some(idx) = self.views.find(id) else {
            return true;
        };
        let Some(slot) = self.views.slot(idx) else {
            return true;
        };
        if !slot.state.is_constructed() {
            self.remove_view(idx);
            return true;
        }
        let priority = slot.priority;
        self.views.mounted.remove(idx);
        self.views.unmounted.remove(idx);
        self.request_idx(idx, UpdateFlags::REMOVE, priority, RenderOptions::new());
        true
    }

    /// Requests an update of a cell's view after a model change.
    ///
    /// Returns whether the cell has a view.
    pub fn on_cell_changed(&mut self, id: CellId, flags: UpdateFlags) -> bool {
        self.assert_alive();
        let Some(idx) = self.live_view_of(id) else {
            return false;
        };
        let priority = self.slot_priority(idx);
        self.request_idx(idx, flags, priority, RenderOptions::new());
        true
    }

    /// Changes a cell's stacking value.
    ///
    /// Under [`Sorting::Exact`] the cell's layer is resorted (after unfreeze
    /// if frozen). Under [`Sorting::Approx`] only this view is re-placed.
    /// Returns whether the cell is known.
    pub fn set_cell_z(&mut self, id: CellId, z: i64) -> bool {
        self.assert_alive();
        let Some(cell) = self.cells.get_mut(id) else {
            return false;
        };
        cell.z = z;
        let seq = self.cells.seq(id).unwrap_or(0);
        let Some(idx) = self.views.find(id) else {
            return true;
        };
        let (state, node, priority) = match self.views.slot(idx) {
            Some(slot) => (slot.state, slot.node, slot.priority),
            None => return true,
        };
        if state != ViewState::Mounted {
            // The next insertion reads the current value.
            return true;
        }
        match self.config.sorting {
            Sorting::None => {}
            Sorting::Approx => {
                self.request_idx(idx, UpdateFlags::INSERT, priority, RenderOptions::new());
            }
            Sorting::Exact => {
                if let Some(node) = node {
                    self.nodes.set_sort_key(node, z, seq);
                    if let Some(layer) = self.nodes.parent(node) {
                        self.nodes.mark_unsorted(layer);
                    }
                    self.resort_marked();
                }
            }
        }
        true
    }

    /// Moves a cell to another layer (`None` for the default layer).
    ///
    /// # Errors
    ///
    /// Fails if the cell or the layer is unknown.
    pub fn set_cell_layer(&mut self, id: CellId, layer: Option<&str>) -> Result<(), SurfaceError> {
        self.assert_alive();
        if let Some(name) = layer {
            if !self.layers.has(name) {
                return Err(SurfaceError::UnknownCellLayer {
                    cell: id,
                    layer: name.into(),
                });
            }
        }
        let cell = self
            .cells
            .get_mut(id)
            .ok_or(SurfaceError::UnknownCell(id))?;
        cell.layer = layer.map(Into::into);
        if let Some(idx) = self.views.find(id) {
            if self.slot_state(idx) == Some(ViewState::Mounted) {
                let priority = self.slot_priority(idx);
                self.request_idx(idx, UpdateFlags::INSERT, priority, RenderOptions::new());
            }
        }
        Ok(())
    }

    /// Changes a cell's bounds.
    ///
    /// Returns whether the cell is known. Visibility is re-evaluated by the
    /// next sweep.
    pub fn set_cell_bounds(&mut self, id: CellId, bounds: Option<Rect>) -> bool {
        self.assert_alive();
        let Some(cell) = self.cells.get_mut(id) else {
            return false;
        };
        cell.bounds = bounds;
        self.wake_up();
        true
    }

    /// Replaces every cell.
    ///
    /// All views are removed, the new cells are registered under a `reset`
    /// freeze, and layers are resorted afterwards.
    ///
    /// # Errors
    ///
    /// Fails without changes if any cell names an unknown layer or kind.
    pub fn reset_cells(&mut self, cells: Vec<Cell>) -> Result<(), SurfaceError> {
        self.assert_alive();
        for cell in &cells {
            self.check_cell(cell)?;
        }
        let opts = RenderOptions::new().with_key("reset");
        self.freeze(opts);
        for idx in self.views.live() {
            self.remove_view(idx);
        }
        self.cells.clear();
        self.queue.clear();
        for cell in cells {
            self.on_cell_added(cell)?;
        }
        self.unfreeze(opts);
        self.sort_layers();
        Ok(())
    }

    // -- Views --

    /// Returns the view of a cell, if the cell is known.
    #[must_use]
    pub fn find_view(&self, cell: CellId) -> Option<ViewId> {
        self.views.find(cell).map(|idx| self.views.handle(idx))
    }

    /// Returns the lifecycle state of a view, or `None` if the handle is
    /// stale.
    #[must_use]
    pub fn view_state(&self, view: ViewId) -> Option<ViewState> {
        let idx = self.views.resolve(view)?;
        self.slot_state(idx)
    }

    /// Returns whether the view's node is attached to a layer.
    #[must_use]
    pub fn is_view_mounted(&self, view: ViewId) -> bool {
        self.view_state(view) == Some(ViewState::Mounted)
    }

    /// Returns whether a cell's view is registered as visible.
    #[must_use]
    pub fn is_cell_visible(&self, cell: CellId) -> bool {
        self.views
            .find(cell)
            .is_some_and(|idx| self.views.mounted.contains(idx))
    }

    /// Returns the instance of a view, if constructed.
    #[must_use]
    pub fn view(&self, view: ViewId) -> Option<&(dyn CellView + 'static)> {
        let idx = self.views.resolve(view)?;
        self.views.slot(idx)?.instance.as_deref()
    }

    /// Returns the instance of a view mutably, if constructed.
    pub fn view_mut(&mut self, view: ViewId) -> Option<&mut (dyn CellView + 'static)> {
        let idx = self.views.resolve(view)?;
        self.views.slot_mut(idx)?.instance.as_deref_mut()
    }

    /// Returns the node of a view, if constructed.
    #[must_use]
    pub fn view_node(&self, view: ViewId) -> Option<NodeId> {
        let idx = self.views.resolve(view)?;
        self.views.slot(idx)?.node
    }

    /// Views registered as visible, oldest first.
    #[must_use]
    pub fn mounted_views(&self) -> Vec<ViewId> {
        self.views
            .mounted
            .iter()
            .map(|idx| self.views.handle(idx))
            .collect()
    }

    /// Views registered as hidden, in sweep order.
    #[must_use]
    pub fn unmounted_views(&self) -> Vec<ViewId> {
        self.views
            .unmounted
            .iter()
            .map(|idx| self.views.handle(idx))
            .collect()
    }

    // -- Teardown --

    /// Removes every view and layer and stops scheduling.
    ///
    /// Every view gets [`CellView::on_remove`]. Scheduling operations panic
    /// afterwards.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.freeze.freeze(None);
        self.cancel_frame();
        self.queue.clear();
        for idx in self.views.live() {
            self.remove_view(idx);
        }
        self.layers.clear(&mut self.nodes);
        self.torn_down = true;
    }

    /// Returns whether [`teardown`](Self::teardown) ran.
    #[inline]
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // -- Internal helpers --

    fn assert_alive(&self) {
        assert!(!self.torn_down, "surface has been torn down");
    }

    fn check_cell(&self, cell: &Cell) -> Result<(), SurfaceError> {
        if let Some(layer) = &cell.layer {
            if !self.layers.has(layer) {
                return Err(SurfaceError::UnknownCellLayer {
                    cell: cell.id,
                    layer: layer.clone(),
                });
            }
        }
        if self.types.resolve(&cell.kind).is_none() {
            return Err(SurfaceError::UnknownViewKind {
                cell: cell.id,
                kind: cell.kind.clone(),
            });
        }
        Ok(())
    }

    /// The view of a cell that is still part of the model.
    fn live_view_of(&self, cell: CellId) -> Option<u32> {
        if !self.cells.contains(cell) {
            return None;
        }
        self.views.find(cell)
    }

    fn slot_state(&self, idx: u32) -> Option<ViewState> {
        self.views.slot(idx).map(|s| s.state)
    }

    fn slot_priority(&self, idx: u32) -> u32 {
        self.views.slot(idx).map_or(0, |s| s.priority)
    }

    /// The layer a cell's view belongs in.
    fn layer_name_of(cell: &Cell) -> &str {
        cell.layer.as_deref().unwrap_or(CELLS_LAYER)
    }

    fn now(&self) -> HostTime {
        self.config
            .clock
            .as_ref()
            .map_or(HostTime(0), |clock| clock.now())
    }

    fn trace_view(&mut self, view: ViewId, cell: CellId, transition: ViewTransition) {
        let e = ViewEvent {
            view,
            cell,
            transition,
            timestamp: self.now(),
        };
        tracer(&mut self.sink).view(&e);
    }
}

/// Borrows the sink as a [`Tracer`].
fn tracer(sink: &mut Option<Box<dyn TraceSink>>) -> Tracer<'_> {
    match sink {
        Some(sink) => Tracer::new(sink.as_mut()),
        None => Tracer::none(),
    }
}
