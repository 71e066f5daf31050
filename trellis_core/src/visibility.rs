// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visibility predicates.
//!
//! A [`VisibilityPolicy`] decides whether a cell's view belongs in the
//! visible tree. It combines up to two independent predicates:
//!
//! - a *viewport* predicate keyed by the view ([`ViewportFn`]);
//! - a *cell visibility* predicate keyed by the cell ([`CellVisibilityFn`]).
//!
//! When both are set a cell is visible only if both agree; when neither is
//! set every cell is visible. Predicates receive whether the view is
//! currently mounted, which lets them add hysteresis (for example a larger
//! margin for views that are already on screen).
//!
//! Evaluation is pure and can run at any time. A panicking predicate is not
//! caught.

use alloc::rc::Rc;
use core::fmt;

use kurbo::Rect;

use crate::cell::Cell;
use crate::view::{CellView, ViewId};

/// Surface state visible to predicates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisibilityContext {
    /// The area of the surface currently shown to the user, if known.
    pub visible_area: Option<Rect>,
}

/// Viewport predicate: `(view, instance, currently_mounted, context) -> visible`.
///
/// The instance is `None` while the view is a placeholder or disposed.
pub type ViewportFn = dyn Fn(ViewId, Option<&dyn CellView>, bool, &VisibilityContext) -> bool;

/// Cell visibility predicate: `(cell, currently_mounted, context) -> visible`.
pub type CellVisibilityFn = dyn Fn(&Cell, bool, &VisibilityContext) -> bool;

/// The combined visibility predicates of a surface.
///
/// Cloning is cheap; predicates are reference counted.
#[derive(Clone, Default)]
pub struct VisibilityPolicy {
    viewport: Option<Rc<ViewportFn>>,
    cell_visibility: Option<Rc<CellVisibilityFn>>,
}

impl fmt::Debug for VisibilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityPolicy")
            .field("viewport", &self.viewport.is_some())
            .field("cell_visibility", &self.cell_visibility.is_some())
            .finish()
    }
}

impl VisibilityPolicy {
    /// A policy under which every cell is visible.
    #[must_use]
    pub const fn always() -> Self {
        Self {
            viewport: None,
            cell_visibility: None,
        }
    }

    /// Sets the viewport predicate.
    #[must_use]
    pub fn with_viewport(
        mut self,
        f: impl Fn(ViewId, Option<&dyn CellView>, bool, &VisibilityContext) -> bool + 'static,
    ) -> Self {
        self.viewport = Some(Rc::new(f));
        self
    }

    /// Sets the cell visibility predicate.
    #[must_use]
    pub fn with_cell_visibility(
        mut self,
        f: impl Fn(&Cell, bool, &VisibilityContext) -> bool + 'static,
    ) -> Self {
        self.cell_visibility = Some(Rc::new(f));
        self
    }

    /// Sets the cell visibility predicate from a shared function.
    #[must_use]
    pub fn with_shared_cell_visibility(mut self, f: Rc<CellVisibilityFn>) -> Self {
        self.cell_visibility = Some(f);
        self
    }

    /// Returns whether any predicate is set.
    ///
    /// Without predicates, mounted views never need to be re-checked.
    #[inline]
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.viewport.is_some() || self.cell_visibility.is_some()
    }

    /// Evaluates the policy for one view.
    #[must_use]
    pub fn is_visible(
        &self,
        view: ViewId,
        instance: Option<&dyn CellView>,
        cell: &Cell,
        currently_mounted: bool,
        cx: &VisibilityContext,
    ) -> bool {
        if let Some(viewport) = &self.viewport {
            if !viewport(view, instance, currently_mounted, cx) {
                return false;
            }
        }
        if let Some(cell_visibility) = &self.cell_visibility {
            if !cell_visibility(cell, currently_mounted, cx) {
                return false;
            }
        }
        true
    }
}

/// Builds a cell predicate that shows cells overlapping the visible area.
///
/// The area is grown by `margin` on every side. Cells without bounds and
/// surfaces without a visible area are always visible.
#[must_use]
pub fn within_area(margin: f64) -> Rc<CellVisibilityFn> {
    Rc::new(move |cell: &Cell, _mounted: bool, cx: &VisibilityContext| {
        match (cell.bounds, cx.visible_area) {
            (Some(bounds), Some(area)) => overlaps(bounds, area.inflate(margin, margin)),
            _ => true,
        }
    })
}

/// Returns whether two rectangles share any point, edges included.
#[must_use]
pub fn overlaps(a: Rect, b: Rect) -> bool {
    let (a, b) = (a.abs(), b.abs());
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: ViewId = ViewId {
        idx: 0,
        generation: 0,
    };

    #[test]
    fn unconstrained_policy_shows_everything() {
        let policy = VisibilityPolicy::always();
        assert!(!policy.is_constrained());
        let cell = Cell::new(1, "rect");
        assert!(policy.is_visible(VIEW, None, &cell, false, &VisibilityContext::default()));
    }

    #[test]
    fn both_predicates_must_agree() {
        let policy = VisibilityPolicy::always()
            .with_viewport(|_, _, _, _| true)
            .with_cell_visibility(|cell, _, _| cell.z >= 0);
        let cx = VisibilityContext::default();
        assert!(policy.is_visible(VIEW, None, &Cell::new(1, "rect").with_z(1), false, &cx));
        assert!(!policy.is_visible(VIEW, None, &Cell::new(2, "rect").with_z(-1), false, &cx));

        let closed = policy.with_viewport(|_, _, _, _| false);
        assert!(!closed.is_visible(VIEW, None, &Cell::new(1, "rect").with_z(1), false, &cx));
    }

    #[test]
    fn mounted_state_is_passed_through() {
        let policy = VisibilityPolicy::always().with_cell_visibility(|_, mounted, _| mounted);
        let cell = Cell::new(1, "rect");
        let cx = VisibilityContext::default();
        assert!(policy.is_visible(VIEW, None, &cell, true, &cx));
        assert!(!policy.is_visible(VIEW, None, &cell, false, &cx));
    }

    #[test]
    fn viewport_sees_the_view_instance() {
        struct Badge;
        impl CellView for Badge {
            fn render(&mut self, _cx: &mut crate::view::UpdateContext<'_>) {}
            fn has_attachments(&self) -> bool {
                true
            }
        }

        // Keep only constructed views that carry overlays.
        let policy = VisibilityPolicy::always()
            .with_viewport(|_, view, _, _| view.is_some_and(|v| v.has_attachments()));
        let cell = Cell::new(1, "rect");
        let cx = VisibilityContext::default();
        assert!(policy.is_visible(VIEW, Some(&Badge), &cell, false, &cx));
        assert!(!policy.is_visible(VIEW, None, &cell, false, &cx));
    }

    #[test]
    fn within_area_culls_distant_cells() {
        let pred = within_area(10.0);
        let cx = VisibilityContext {
            visible_area: Some(Rect::new(0.0, 0.0, 100.0, 100.0)),
        };
        let near = Cell::new(1, "rect").with_bounds(Rect::new(105.0, 0.0, 120.0, 10.0));
        let far = Cell::new(2, "rect").with_bounds(Rect::new(500.0, 500.0, 510.0, 510.0));
        let unplaced = Cell::new(3, "rect");
        assert!(pred(&near, false, &cx));
        assert!(!pred(&far, false, &cx));
        assert!(pred(&unplaced, false, &cx));
        assert!(pred(&far, false, &VisibilityContext::default()));
    }

    #[test]
    fn overlap_includes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(overlaps(a, Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!overlaps(a, Rect::new(10.5, 0.0, 20.0, 10.0)));
    }

    #[test]
    #[should_panic(expected = "predicate failure")]
    fn predicate_panics_propagate() {
        let policy =
            VisibilityPolicy::always().with_cell_visibility(|_, _, _| panic!("predicate failure"));
        let _ = policy.is_visible(
            VIEW,
            None,
            &Cell::new(1, "rect"),
            false,
            &VisibilityContext::default(),
        );
    }
}
