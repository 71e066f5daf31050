// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Randomized operation sequences checked against the mount invariants.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use proptest::prelude::*;
use trellis_core::backend::ManualFrames;
use trellis_core::cell::{Cell, CellId};
use trellis_core::flags::UpdateFlags;
use trellis_core::layer::{CELLS_LAYER, FRONT_LAYER};
use trellis_core::scheduler::{RenderOptions, SurfaceConfig, ViewManagement};
use trellis_core::sorting::Sorting;
use trellis_core::surface::Surface;
use trellis_core::view::{CellView, UpdateContext, ViewType, ViewTypes};
use trellis_core::visibility::VisibilityPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Mount,
    Detach,
    Remove,
}

type Log = Rc<RefCell<Vec<(u64, Lifecycle)>>>;

struct Tracked {
    cell: u64,
    log: Log,
}

impl CellView for Tracked {
    fn render(&mut self, _cx: &mut UpdateContext<'_>) {}

    fn on_mount(&mut self, _first_mount: bool) {
        self.log.borrow_mut().push((self.cell, Lifecycle::Mount));
    }

    fn on_detach(&mut self) {
        self.log.borrow_mut().push((self.cell, Lifecycle::Detach));
    }

    fn on_remove(&mut self) {
        self.log.borrow_mut().push((self.cell, Lifecycle::Remove));
    }
}

#[derive(Clone, Debug)]
enum Op {
    Add { id: u64, link: bool },
    Remove(u64),
    Change(u64),
    Hide(u64),
    Show(u64),
    SetZ(u64, i64),
    SetLayer(u64, bool),
    Freeze,
    Unfreeze,
    Sweep,
    Step,
}

fn op() -> impl Strategy<Value = Op> {
    let id = 0_u64..8;
    prop_oneof![
        3 => (id.clone(), any::<bool>()).prop_map(|(id, link)| Op::Add { id, link }),
        1 => id.clone().prop_map(Op::Remove),
        2 => id.clone().prop_map(Op::Change),
        2 => id.clone().prop_map(Op::Hide),
        2 => id.clone().prop_map(Op::Show),
        2 => (id.clone(), -3_i64..4).prop_map(|(id, z)| Op::SetZ(id, z)),
        1 => (id, any::<bool>()).prop_map(|(id, front)| Op::SetLayer(id, front)),
        1 => Just(Op::Freeze),
        1 => Just(Op::Unfreeze),
        1 => Just(Op::Sweep),
        1 => Just(Op::Step),
    ]
}

struct Harness {
    surface: Surface,
    log: Log,
    hidden: Rc<RefCell<BTreeSet<u64>>>,
    frames: ManualFrames,
}

impl Harness {
    fn new(deferred: bool, sorting: Sorting, dispose_hidden: bool) -> Self {
        let log = Log::default();
        let hidden = Rc::new(RefCell::new(BTreeSet::new()));
        let set = hidden.clone();
        let policy = VisibilityPolicy::always()
            .with_cell_visibility(move |cell, _, _| !set.borrow().contains(&cell.id.0));
        let base = if deferred {
            SurfaceConfig::deferred()
        } else {
            SurfaceConfig::synchronous()
        };
        let config = base
            .with_sorting(sorting)
            .with_visibility(policy)
            .with_view_management(ViewManagement::enabled().with_dispose_hidden(dispose_hidden));
        let constructor_log = log.clone();
        let construct = move |cell: &Cell| -> Box<dyn CellView> {
            Box::new(Tracked {
                cell: cell.id.0,
                log: constructor_log.clone(),
            })
        };
        let types = ViewTypes::new()
            .with("rect", ViewType::element(construct.clone()))
            .with("link", ViewType::link(construct));
        let frames = ManualFrames::new();
        let surface = Surface::new(config, types).with_frame_source(Box::new(frames.clone()));
        Self {
            surface,
            log,
            hidden,
            frames,
        }
    }

    fn apply(&mut self, op: &Op) {
        let s = &mut self.surface;
        match *op {
            Op::Add { id, link } => {
                let kind = if link { "link" } else { "rect" };
                s.on_cell_added(Cell::new(id, kind).with_z(0))
                    .expect("valid cell");
            }
            Op::Remove(id) => {
                s.on_cell_removed(CellId(id));
            }
            Op::Change(id) => {
                s.on_cell_changed(CellId(id), UpdateFlags::RENDER);
            }
            Op::Hide(id) => {
                self.hidden.borrow_mut().insert(id);
                s.wake_up();
            }
            Op::Show(id) => {
                self.hidden.borrow_mut().remove(&id);
                s.wake_up();
            }
            Op::SetZ(id, z) => {
                s.set_cell_z(CellId(id), z);
            }
            Op::SetLayer(id, front) => {
                let layer = front.then_some(FRONT_LAYER);
                let _ = s.set_cell_layer(CellId(id), layer);
            }
            Op::Freeze => s.freeze(RenderOptions::new()),
            Op::Unfreeze => s.unfreeze(RenderOptions::new()),
            Op::Sweep => {
                s.update_all_visibility(RenderOptions::new());
            }
            Op::Step => {
                if self.frames.take() {
                    s.step();
                }
            }
        }
    }

    /// Releases every freeze and reconciles visibility.
    fn settle(&mut self) {
        let s = &mut self.surface;
        while s.is_frozen() {
            s.unfreeze(RenderOptions::new());
        }
        s.update_all_visibility(RenderOptions::new());
        s.run_until_idle();
    }

    fn check(&self) {
        let s = &self.surface;
        assert!(!s.has_scheduled_updates(), "queue drained after settling");

        let mut placed = BTreeMap::new();
        for name in s.layer_names() {
            for cell in s.layer_cells(name) {
                let previous = placed.insert(cell, name);
                assert!(previous.is_none(), "{cell:?} is in two layers");
            }
        }

        for id in s.cells().ids_in_order() {
            let cell = s.cell(id).expect("listed cell");
            let view = s.find_view(id).expect("every cell has a view");
            let visible = !self.hidden.borrow().contains(&id.0);
            assert_eq!(s.is_view_mounted(view), visible, "{id:?} mount state");
            assert_eq!(s.is_cell_visible(id), visible, "{id:?} registration");
            let expected = cell.layer.as_deref().unwrap_or(CELLS_LAYER);
            if visible {
                assert_eq!(placed.get(&id).copied(), Some(expected), "{id:?} layer");
            } else {
                assert!(!placed.contains_key(&id), "{id:?} hidden but attached");
            }
        }
        assert_eq!(
            placed.len(),
            s.cells()
                .ids_in_order()
                .iter()
                .filter(|id| !self.hidden.borrow().contains(&id.0))
                .count(),
            "only known cells are attached"
        );
    }

    /// Mounts and detaches alternate for every view instance.
    fn check_lifecycle(&self) {
        let mut attached: BTreeMap<u64, bool> = BTreeMap::new();
        for &(cell, event) in self.log.borrow().iter() {
            let state = attached.entry(cell).or_default();
            match event {
                Lifecycle::Mount => {
                    assert!(!*state, "cell {cell} mounted twice");
                    *state = true;
                }
                Lifecycle::Detach => {
                    assert!(*state, "cell {cell} detached while not mounted");
                    *state = false;
                }
                Lifecycle::Remove => *state = false,
            }
        }
    }
}

fn sorting() -> impl Strategy<Value = Sorting> {
    prop_oneof![Just(Sorting::None), Just(Sorting::Approx), Just(Sorting::Exact)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn settled_surface_matches_policy(
        ops in prop::collection::vec(op(), 1..60),
        deferred in any::<bool>(),
        dispose_hidden in any::<bool>(),
        sorting in sorting(),
    ) {
        let mut h = Harness::new(deferred, sorting, dispose_hidden);
        for op in &ops {
            h.apply(op);
            h.check_lifecycle();
        }
        h.settle();
        h.check();
        h.check_lifecycle();
    }

    #[test]
    fn reconciliation_is_idempotent(
        ops in prop::collection::vec(op(), 1..40),
        sorting in sorting(),
    ) {
        let mut h = Harness::new(false, sorting, false);
        for op in &ops {
            h.apply(op);
        }
        h.settle();
        let before = h.log.borrow().len();
        let stats = h.surface.update_all_visibility(RenderOptions::new());
        prop_assert_eq!((stats.mounted, stats.unmounted), (0, 0));
        prop_assert_eq!(h.log.borrow().len(), before);
    }

    #[test]
    fn exact_layers_stay_sorted(
        zs in prop::collection::vec(-5_i64..5, 1..12),
        changes in prop::collection::vec((0_usize..12, -5_i64..5), 0..12),
    ) {
        let mut h = Harness::new(false, Sorting::Exact, false);
        for (i, &z) in zs.iter().enumerate() {
            h.surface
                .on_cell_added(Cell::new(i as u64, "rect").with_z(z))
                .expect("valid cell");
        }
        for &(i, z) in &changes {
            h.surface.set_cell_z(CellId((i % zs.len()) as u64), z);
        }
        let order = h.surface.layer_cells(CELLS_LAYER);
        let keys: Vec<i64> = order
            .iter()
            .map(|&id| h.surface.cell(id).expect("known").z)
            .collect();
        prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]), "unsorted: {:?}", keys);
        prop_assert_eq!(order.len(), zs.len());
    }
}

#[test]
fn deferred_and_sync_agree_on_visibility() {
    let ops = [
        Op::Add { id: 1, link: false },
        Op::Add { id: 2, link: true },
        Op::Hide(1),
        Op::Freeze,
        Op::Add { id: 3, link: false },
        Op::SetLayer(3, true),
        Op::Unfreeze,
        Op::Show(1),
        Op::Hide(2),
    ];
    let mut sync = Harness::new(false, Sorting::Approx, false);
    let mut deferred = Harness::new(true, Sorting::Approx, false);
    for op in &ops {
        sync.apply(op);
        deferred.apply(op);
    }
    sync.settle();
    deferred.settle();
    sync.check();
    deferred.check();
    assert_eq!(
        sync.surface.layer_cells(FRONT_LAYER),
        deferred.surface.layer_cells(FRONT_LAYER)
    );
}
