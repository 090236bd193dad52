#![forbid(unsafe_code)]

//! Scroll position arithmetic for the virtualized viewport.
//!
//! The host pretends to hold every row in one tall scroll area of
//! [`ViewportGeometry::scroll_height`] pixels. This module maps the pixel
//! offset into that area onto row indices and back, and clamps every move
//! into `[0, scroll_max]`. It does **not** own any row content.
//!
//! # Design
//!
//! - [`ScrollController`] holds the pixel offset and the `is_scrolled_end`
//!   flag. Every mutator reports whether the offset actually moved, so the
//!   caller only schedules a reconciliation pass when something changed.
//! - [`ScrollState`] is the per-pass snapshot handed to the reconciler.

use serde::{Deserialize, Serialize};

use crate::geometry::ViewportGeometry;

/// Offsets closer than this are the same offset.
const OFFSET_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Scroll state derived for one reconciliation pass. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollState {
    /// Index of the first visible row.
    pub top_row_index: usize,
    /// Number of whole rows that fit in the viewport.
    pub visible_row_count: usize,
    /// Whether the window currently includes the last logical row.
    pub is_scrolled_end: bool,
}

impl ScrollState {
    /// Index of the last visible row (may exceed the row count).
    #[must_use]
    pub fn bottom_row_index(&self) -> usize {
        bottom_row_index(self.top_row_index, self.visible_row_count)
    }
}

/// `top + visible_row_count - 1`, saturating for an empty viewport.
#[must_use]
pub fn bottom_row_index(top: usize, visible_row_count: usize) -> usize {
    (top + visible_row_count).saturating_sub(1)
}

/// Percentage of the scrollable range above the top row, 0–100.
#[must_use]
pub fn percent_scrolled(top: usize, row_count: usize, visible_row_count: usize) -> u8 {
    let denominator = row_count.saturating_sub(visible_row_count).max(1);
    let percent = (100.0 * top as f64 / denominator as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Mutable scroll position for one scroll port.
#[derive(Debug, Clone, Default)]
pub struct ScrollController {
    /// Pixel offset from the top of the scroll area.
    offset: f64,
    is_scrolled_end: bool,
}

impl ScrollController {
    /// A controller scrolled to the very top.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current pixel offset.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub fn is_scrolled_end(&self) -> bool {
        self.is_scrolled_end
    }

    /// `round(offset / cell_height)`.
    #[must_use]
    pub fn top_row_index(&self, geo: &ViewportGeometry) -> usize {
        let height = geo.cell().height;
        if height <= 0.0 {
            return 0;
        }
        (self.offset / height).round().max(0.0) as usize
    }

    /// Index of the last visible row for a given top row.
    #[must_use]
    pub fn bottom_row_index(&self, top: usize, geo: &ViewportGeometry) -> usize {
        bottom_row_index(top, geo.visible_row_count())
    }

    /// Total scrollable extent minus the viewport height, never negative.
    #[must_use]
    pub fn scroll_max(&self, geo: &ViewportGeometry, row_count: usize) -> f64 {
        (geo.scroll_height(row_count) - geo.screen().height).max(0.0)
    }

    /// Put row `index` at the top of the viewport.
    ///
    /// Returns `false` when the clamped offset equals the current one, in
    /// which case no pass is needed.
    pub fn scroll_row_to_top(
        &mut self,
        index: usize,
        geo: &ViewportGeometry,
        row_count: usize,
    ) -> bool {
        self.is_scrolled_end = index + geo.visible_row_count() >= row_count;
        let target = index as f64 * geo.cell().height + geo.top_margin();
        self.move_to(target, geo, row_count)
    }

    /// Put row `index` at the bottom of the viewport.
    ///
    /// Same clamping and no-op rules as [`Self::scroll_row_to_top`].
    pub fn scroll_row_to_bottom(
        &mut self,
        index: usize,
        geo: &ViewportGeometry,
        row_count: usize,
    ) -> bool {
        self.is_scrolled_end = index + 1 >= row_count;
        let rows_above = (index + 1) as f64 - geo.visible_row_count() as f64;
        let target = rows_above * geo.cell().height + geo.top_margin();
        self.move_to(target, geo, row_count)
    }

    /// Move the offset by `delta` pixels; positive moves toward later rows.
    pub fn scroll_by(&mut self, delta: f64, geo: &ViewportGeometry, row_count: usize) -> bool {
        if delta == 0.0 || !delta.is_finite() {
            return false;
        }
        self.move_to(self.offset + delta, geo, row_count)
    }

    /// Adopt an offset reported by the host (native scrolling).
    pub fn set_offset(&mut self, offset: f64, geo: &ViewportGeometry, row_count: usize) -> bool {
        if !offset.is_finite() {
            return false;
        }
        self.move_to(offset, geo, row_count)
    }

    /// Scroll up by one page, keeping one row of overlap.
    ///
    /// No-op when the top row is already 0.
    pub fn page_up(&mut self, geo: &ViewportGeometry, row_count: usize) -> bool {
        let top = self.top_row_index(geo);
        if top == 0 {
            return false;
        }
        let target = (top + 1).saturating_sub(geo.visible_row_count());
        self.scroll_row_to_top(target, geo, row_count)
    }

    /// Scroll down by one page, keeping one row of overlap.
    ///
    /// No-op when the window already includes the last row.
    pub fn page_down(&mut self, geo: &ViewportGeometry, row_count: usize) -> bool {
        if self.is_scrolled_end {
            return false;
        }
        let top = self.top_row_index(geo);
        let step = geo.visible_row_count().saturating_sub(1);
        self.scroll_row_to_top(top + step, geo, row_count)
    }

    /// Recompute `is_scrolled_end` from the current offset.
    pub fn sync_scrolled_end(&mut self, geo: &ViewportGeometry, row_count: usize) {
        self.is_scrolled_end = self.top_row_index(geo) + geo.visible_row_count() >= row_count;
    }

    /// Re-clamp after the row count or geometry changed.
    pub fn clamp(&mut self, geo: &ViewportGeometry, row_count: usize) -> bool {
        self.move_to(self.offset, geo, row_count)
    }

    /// Snapshot for the next reconciliation pass.
    #[must_use]
    pub fn snapshot(&self, geo: &ViewportGeometry) -> ScrollState {
        ScrollState {
            top_row_index: self.top_row_index(geo),
            visible_row_count: geo.visible_row_count(),
            is_scrolled_end: self.is_scrolled_end,
        }
    }

    fn move_to(&mut self, target: f64, geo: &ViewportGeometry, row_count: usize) -> bool {
        let clamped = target.clamp(0.0, self.scroll_max(geo, row_count));
        if (clamped - self.offset).abs() < OFFSET_EPSILON {
            return false;
        }
        self.offset = clamped;
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CellSize, ScreenSize};
    use proptest::prelude::*;

    fn geo(rows: usize) -> ViewportGeometry {
        ViewportGeometry::new(
            ScreenSize::new(640.0, rows as f64 * 16.0),
            CellSize::new(8.0, 16.0),
        )
    }

    // -- basic mapping --

    #[test]
    fn initial_state_is_at_top() {
        let ctl = ScrollController::new();
        assert_eq!(ctl.offset(), 0.0);
        assert_eq!(ctl.top_row_index(&geo(25)), 0);
        assert!(!ctl.is_scrolled_end());
    }

    #[test]
    fn top_row_rounds_offset() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        ctl.set_offset(16.0 * 10.0 + 7.0, &g, 1000);
        assert_eq!(ctl.top_row_index(&g), 10);
        ctl.set_offset(16.0 * 10.0 + 9.0, &g, 1000);
        assert_eq!(ctl.top_row_index(&g), 11);
    }

    #[test]
    fn bottom_row_index_spans_window() {
        let g = geo(25);
        let ctl = ScrollController::new();
        assert_eq!(ctl.bottom_row_index(500, &g), 524);
        assert_eq!(bottom_row_index(0, 0), 0);
    }

    #[test]
    fn scroll_max_accounts_for_margins() {
        let g = ViewportGeometry::new(ScreenSize::new(640.0, 410.0), CellSize::new(8.0, 16.0));
        let ctl = ScrollController::new();
        // 1000 rows * 16 + 10 margin - 410 screen = (1000 - 25) * 16
        assert!((ctl.scroll_max(&g, 1000) - 975.0 * 16.0).abs() < 1e-9);
        assert_eq!(ctl.scroll_max(&g, 3), 0.0);
    }

    // -- scroll_row_to_top / bottom --

    #[test]
    fn scroll_row_to_top_clamps_past_end() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(ctl.scroll_row_to_top(990, &g, 1000));
        assert_eq!(ctl.top_row_index(&g), 975);
        assert!(ctl.is_scrolled_end());
    }

    #[test]
    fn scroll_row_to_top_noop_when_unchanged() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(ctl.scroll_row_to_top(40, &g, 1000));
        assert!(!ctl.scroll_row_to_top(40, &g, 1000));
        assert!(!ctl.is_scrolled_end());
    }

    #[test]
    fn scroll_row_to_bottom_makes_row_last_visible() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(ctl.scroll_row_to_bottom(100, &g, 1000));
        let top = ctl.top_row_index(&g);
        assert_eq!(ctl.bottom_row_index(top, &g), 100);
        assert!(!ctl.is_scrolled_end());

        ctl.scroll_row_to_bottom(999, &g, 1000);
        assert_eq!(ctl.top_row_index(&g), 975);
        assert!(ctl.is_scrolled_end());
    }

    #[test]
    fn scroll_row_to_bottom_clamps_at_zero() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        ctl.set_offset(320.0, &g, 1000);
        assert!(ctl.scroll_row_to_bottom(3, &g, 1000));
        assert_eq!(ctl.offset(), 0.0);
    }

    // -- deltas --

    #[test]
    fn positive_delta_scrolls_down() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(ctl.scroll_by(48.0, &g, 1000));
        assert_eq!(ctl.offset(), 48.0);
        assert_eq!(ctl.top_row_index(&g), 3);
    }

    #[test]
    fn delta_clamps_into_range() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(!ctl.scroll_by(-100.0, &g, 1000));
        assert_eq!(ctl.offset(), 0.0);
        assert!(ctl.scroll_by(1.0e9, &g, 1000));
        assert_eq!(ctl.offset(), ctl.scroll_max(&g, 1000));
    }

    #[test]
    fn non_finite_inputs_are_ignored() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(!ctl.scroll_by(f64::NAN, &g, 1000));
        assert!(!ctl.set_offset(f64::INFINITY, &g, 1000));
        assert_eq!(ctl.offset(), 0.0);
    }

    // -- paging --

    #[test]
    fn page_down_keeps_one_row_overlap() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(ctl.page_down(&g, 1000));
        assert_eq!(ctl.top_row_index(&g), 24);
        assert!(ctl.page_up(&g, 1000));
        assert_eq!(ctl.top_row_index(&g), 0);
    }

    #[test]
    fn paging_is_noop_at_boundaries() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        assert!(!ctl.page_up(&g, 1000));
        ctl.scroll_row_to_top(975, &g, 1000);
        assert!(ctl.is_scrolled_end());
        assert!(!ctl.page_down(&g, 1000));
    }

    #[test]
    fn page_up_from_partial_page_lands_on_zero() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        ctl.scroll_row_to_top(10, &g, 1000);
        assert!(ctl.page_up(&g, 1000));
        assert_eq!(ctl.top_row_index(&g), 0);
    }

    // -- derived values --

    #[test]
    fn percent_scrolled_is_bounded() {
        assert_eq!(percent_scrolled(0, 1000, 25), 0);
        assert_eq!(percent_scrolled(975, 1000, 25), 100);
        assert_eq!(percent_scrolled(487, 1000, 25), 50);
        assert_eq!(percent_scrolled(0, 10, 25), 0);
        assert_eq!(percent_scrolled(5000, 1000, 25), 100);
    }

    #[test]
    fn snapshot_reflects_controller() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        ctl.scroll_row_to_top(500, &g, 1000);
        let snap = ctl.snapshot(&g);
        assert_eq!(snap.top_row_index, 500);
        assert_eq!(snap.visible_row_count, 25);
        assert_eq!(snap.bottom_row_index(), 524);
        assert!(!snap.is_scrolled_end);
    }

    #[test]
    fn clamp_after_shrink() {
        let g = geo(25);
        let mut ctl = ScrollController::new();
        ctl.scroll_row_to_top(900, &g, 1000);
        assert!(ctl.clamp(&g, 100));
        assert_eq!(ctl.top_row_index(&g), 75);
        ctl.sync_scrolled_end(&g, 100);
        assert!(ctl.is_scrolled_end());
    }

    /// Sweep a 100k-row scrollback to check the mapping stays exact at scale.
    #[test]
    fn stress_100k_rows_round_trip() {
        let g = geo(24);
        let mut ctl = ScrollController::new();
        for &row in &[0usize, 100, 1_000, 10_000, 50_000, 99_976, 99_999] {
            ctl.scroll_row_to_top(row, &g, 100_000);
            assert_eq!(ctl.top_row_index(&g), row.min(100_000 - 24));
        }
    }

    proptest! {
        #[test]
        fn scroll_row_to_top_lands_on_clamped_row(
            n in 1usize..5_000,
            v in 1usize..80,
            i in 0usize..6_000,
        ) {
            prop_assume!(v <= n);
            let g = geo(v);
            let mut ctl = ScrollController::new();
            ctl.scroll_row_to_top(i, &g, n);
            prop_assert_eq!(ctl.top_row_index(&g), i.min(n - v));
        }

        #[test]
        fn offset_never_leaves_range(deltas in prop::collection::vec(-5_000.0f64..5_000.0, 1..64)) {
            let g = geo(25);
            let mut ctl = ScrollController::new();
            for delta in deltas {
                ctl.scroll_by(delta, &g, 1000);
                prop_assert!(ctl.offset() >= 0.0);
                prop_assert!(ctl.offset() <= ctl.scroll_max(&g, 1000));
            }
        }
    }
}
