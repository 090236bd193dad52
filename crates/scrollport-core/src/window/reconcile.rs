#![forbid(unsafe_code)]

//! The reconciliation pass.
//!
//! One pass moves the slot sequence from whatever the previous pass left
//! behind to the window described by a [`WindowTarget`]:
//!
//! 1. place the top fold, trimming anything in front of a pinned start row;
//! 2. place the bottom fold, trimming anything after a pinned end row;
//! 3. walk the slots after the top fold, keeping rows that already hold the
//!    right index and fetching (cache first, then source) the rest;
//! 4. discard whatever the walk left in front of the bottom fold;
//! 5. hide pinned rows that lie outside the window from assistive tech;
//! 6. rotate the cache generations and release unreachable rows.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::{NodeFlags, NodeId, RowWindow, Slot};
use crate::error::{ExcisionFailure, Result, ScrollPortError};
use crate::scroll::{ScrollState, bottom_row_index};
use crate::selection::{ContentPosition, HostSelection, RowPin, SelectionRange};
use crate::source::RowSource;

/// Rows a pass should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTarget {
    pub top_row: usize,
    pub bottom_row: usize,
    pub visible_row_count: usize,
}

impl WindowTarget {
    #[must_use]
    pub fn new(top_row: usize, visible_row_count: usize) -> Self {
        Self {
            top_row,
            bottom_row: bottom_row_index(top_row, visible_row_count),
            visible_row_count,
        }
    }
}

impl From<ScrollState> for WindowTarget {
    fn from(state: ScrollState) -> Self {
        Self::new(state.top_row_index, state.visible_row_count)
    }
}

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Rows already in the right slot.
    pub kept: usize,
    /// Rows taken from the previous cache generation.
    pub reused: usize,
    /// Rows materialized from the source.
    pub fetched: usize,
    /// Row slots removed.
    pub removed: usize,
    /// Slot insertions, removals and moves, folds included.
    pub mutations: usize,
    /// First row index the source could not supply.
    pub truncated_at: Option<usize>,
}

impl PassReport {
    /// Share of filled rows that did not need the source.
    #[must_use]
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.kept + self.reused + self.fetched;
        if total == 0 {
            return 1.0;
        }
        (self.kept + self.reused) as f64 / total as f64
    }
}

/// Selection rows that are live and attached, as seen by one pass.
#[derive(Debug, Clone, Copy, Default)]
struct Pins {
    start: Option<RowPin>,
    end: Option<RowPin>,
    multiline: bool,
}

impl Pins {
    fn is_pin(&self, node: NodeId) -> bool {
        [self.start, self.end]
            .into_iter()
            .flatten()
            .any(|pin| pin.node == node)
    }
}

impl RowWindow {
    /// Run one reconciliation pass.
    ///
    /// A row the source cannot supply stops the fill and is reported through
    /// [`PassReport::truncated_at`].
    ///
    /// # Errors
    ///
    /// [`ScrollPortError::SlotExcision`] when a pinned row that falls inside
    /// the window cannot be reached from the fill position.
    pub fn reconcile<S: RowSource + ?Sized>(
        &mut self,
        source: &mut S,
        target: WindowTarget,
        selection: &SelectionRange,
    ) -> Result<PassReport> {
        let mut report = PassReport::default();
        let pins = self.attached_pins(selection);

        self.reset_select_bags();
        self.cache.begin_pass();

        self.draw_top_fold(target.top_row, &pins, &mut report);
        self.draw_bottom_fold(target.bottom_row, &pins, &mut report);
        self.draw_visible_rows(source, target, &pins, &mut report)?;
        self.hide_offscreen_selection_rows(&pins);

        self.cache.finish_pass();
        let released = self.collect_garbage(&selection.pinned());

        debug!(
            target: "scrollport::reconcile",
            top = target.top_row,
            bottom = target.bottom_row,
            kept = report.kept,
            reused = report.reused,
            fetched = report.fetched,
            removed = report.removed,
            mutations = report.mutations,
            released,
            truncated_at = ?report.truncated_at,
            "pass complete"
        );
        Ok(report)
    }

    fn attached_pins(&self, selection: &SelectionRange) -> Pins {
        let attached = |pin: Option<RowPin>| {
            pin.filter(|p| self.tree.flags(p.node).contains(NodeFlags::ATTACHED))
        };
        let start = attached(selection.start_row);
        let end = attached(selection.end_row);
        Pins {
            start,
            end,
            multiline: selection.is_multiline && start.is_some() && end.is_some(),
        }
    }

    // -----------------------------------------------------------------------
    // Folds
    // -----------------------------------------------------------------------

    fn draw_top_fold(&mut self, top: usize, pins: &Pins, report: &mut PassReport) {
        let Some(start) = pins.start.filter(|p| p.index < top) else {
            if self.position(Slot::TopFold) != Some(0) {
                self.move_slot_to(Slot::TopFold, 0, report);
            }
            return;
        };

        match pins.end {
            Some(end) if pins.multiline && end.index < top => {
                self.place_after(Slot::TopFold, Slot::Row(end.node), report);
                self.remove_between(start.node, end.node, report);
            }
            _ => self.place_after(Slot::TopFold, Slot::Row(start.node), report),
        }

        while self.slots.first().is_some_and(|s| *s != Slot::Row(start.node)) {
            self.remove_counted(0, report);
        }
    }

    fn draw_bottom_fold(&mut self, bottom: usize, pins: &Pins, report: &mut PassReport) {
        let Some(end) = pins.end.filter(|p| p.index > bottom) else {
            if self.slots.last() != Some(&Slot::BottomFold) {
                let len = self.slots.len();
                let target = if self.position(Slot::BottomFold).is_some() { len - 1 } else { len };
                self.move_slot_to(Slot::BottomFold, target, report);
            }
            return;
        };

        match pins.start {
            Some(start) if pins.multiline && start.index > bottom => {
                self.place_before(Slot::BottomFold, Slot::Row(start.node), report);
                self.remove_between(start.node, end.node, report);
            }
            _ => self.place_before(Slot::BottomFold, Slot::Row(end.node), report),
        }

        while self.slots.last().is_some_and(|s| *s != Slot::Row(end.node)) {
            self.remove_counted(self.slots.len() - 1, report);
        }
    }

    /// Move (or insert, if absent) `slot` so it ends up at `pos`.
    fn move_slot_to(&mut self, slot: Slot, pos: usize, report: &mut PassReport) {
        if let Some(current) = self.position(slot) {
            self.remove_at(current);
        }
        let pos = pos.min(self.slots.len());
        self.insert_at(pos, slot);
        report.mutations += 1;
    }

    fn place_after(&mut self, slot: Slot, anchor: Slot, report: &mut PassReport) {
        let (Some(anchor_pos), current) = (self.position(anchor), self.position(slot)) else {
            return;
        };
        if current == Some(anchor_pos + 1) {
            return;
        }
        if let Some(current) = current {
            self.remove_at(current);
        }
        let anchor_pos = self.position(anchor).unwrap_or(anchor_pos);
        self.insert_at(anchor_pos + 1, slot);
        report.mutations += 1;
    }

    fn place_before(&mut self, slot: Slot, anchor: Slot, report: &mut PassReport) {
        let (Some(anchor_pos), current) = (self.position(anchor), self.position(slot)) else {
            return;
        };
        if anchor_pos > 0 && current == Some(anchor_pos - 1) {
            return;
        }
        if let Some(current) = current {
            self.remove_at(current);
        }
        let anchor_pos = self.position(anchor).unwrap_or(anchor_pos);
        self.insert_at(anchor_pos, slot);
        report.mutations += 1;
    }

    /// Remove every slot strictly between the rows `first` and `last`.
    fn remove_between(&mut self, first: NodeId, last: NodeId, report: &mut PassReport) {
        let Some(first_pos) = self.position(Slot::Row(first)) else {
            return;
        };
        let next = first_pos + 1;
        while self.slots.get(next).is_some_and(|s| *s != Slot::Row(last)) {
            self.remove_counted(next, report);
        }
    }

    fn remove_counted(&mut self, pos: usize, report: &mut PassReport) {
        if let Slot::Row(_) = self.remove_at(pos) {
            report.removed += 1;
        }
        report.mutations += 1;
    }

    // -----------------------------------------------------------------------
    // Fill
    // -----------------------------------------------------------------------

    fn draw_visible_rows<S: RowSource + ?Sized>(
        &mut self,
        source: &mut S,
        target: WindowTarget,
        pins: &Pins,
        report: &mut PassReport,
    ) -> Result<()> {
        let fill = target.visible_row_count.min(source.row_count());
        let mut cursor = self.position(Slot::TopFold).map_or(0, |p| p + 1);

        for k in 0..fill {
            let index = target.top_row + k;
            let at = self.slots.get(cursor).copied();

            let current = match at {
                None | Some(Slot::BottomFold) => None,
                Some(slot) => Some(slot),
            };
            let Some(current) = current else {
                let Some(node) = self.fetch_row(source, index, report) else {
                    warn!(target: "scrollport::reconcile", row = index, "row source could not supply row");
                    report.truncated_at = Some(index);
                    break;
                };
                cursor = self.insert_row_at(cursor, node) + 1;
                report.mutations += 1;
                continue;
            };

            if let Slot::Row(node) = current {
                if self.tree.row_index(node) == Some(index) {
                    self.cache.record(index, node);
                    report.kept += 1;
                    cursor += 1;
                    continue;
                }
            }

            let due_pin = [pins.start, pins.end]
                .into_iter()
                .flatten()
                .find(|pin| pin.index == index);
            if let Some(pin) = due_pin {
                cursor = self.remove_until(cursor, pin, report)?;
                self.cache.record(index, pin.node);
                report.kept += 1;
                cursor += 1;
                continue;
            }

            let Some(node) = self.fetch_row(source, index, report) else {
                warn!(target: "scrollport::reconcile", row = index, "row source could not supply row");
                report.truncated_at = Some(index);
                break;
            };

            match current {
                Slot::Row(existing) if pins.is_pin(existing) => {
                    cursor = self.insert_row_at(cursor, node) + 1;
                    report.mutations += 1;
                }
                Slot::Row(existing) if existing == node => cursor += 1,
                _ => {
                    let pos = self.insert_row_at(cursor, node);
                    self.remove_counted(pos + 1, report);
                    report.mutations += 1;
                    cursor = pos + 1;
                }
            }
        }

        // A truncated fill can leave pinned rows unreached; they move past
        // the bottom fold instead of being discarded.
        let mut stranded: SmallVec<[NodeId; 2]> = SmallVec::new();
        while let Some(slot) = self.slots.get(cursor).copied() {
            match slot {
                Slot::BottomFold => break,
                Slot::Row(node) if pins.is_pin(node) => {
                    self.remove_at(cursor);
                    stranded.push(node);
                }
                _ => self.remove_counted(cursor, report),
            }
        }
        if !stranded.is_empty() {
            let (_, bottom) = self.fold_positions();
            for (offset, node) in stranded.into_iter().enumerate() {
                let pos = (bottom + 1 + offset).min(self.slots.len());
                self.insert_at(pos, Slot::Row(node));
                report.mutations += 1;
            }
        }
        Ok(())
    }

    /// Remove slots from `cursor` until the pinned row is reached. Returns
    /// the pinned row's position.
    fn remove_until(&mut self, cursor: usize, pin: RowPin, report: &mut PassReport) -> Result<usize> {
        loop {
            match self.slots.get(cursor) {
                Some(Slot::Row(node)) if *node == pin.node => return Ok(cursor),
                Some(Slot::BottomFold) => {
                    return Err(ScrollPortError::SlotExcision {
                        target_row: pin.index,
                        reason: ExcisionFailure::HitBottomFold,
                    });
                }
                None => {
                    return Err(ScrollPortError::SlotExcision {
                        target_row: pin.index,
                        reason: ExcisionFailure::EndOfSlots,
                    });
                }
                Some(_) => self.remove_counted(cursor, report),
            }
        }
    }

    /// Previous generation first, then the source. Records into the current
    /// generation.
    fn fetch_row<S: RowSource + ?Sized>(
        &mut self,
        source: &mut S,
        index: usize,
        report: &mut PassReport,
    ) -> Option<NodeId> {
        let (node, from_cache) = self.materialize(source, index)?;
        if from_cache {
            report.reused += 1;
        } else {
            report.fetched += 1;
        }
        self.cache.record(index, node);
        Some(node)
    }

    fn materialize<S: RowSource + ?Sized>(
        &mut self,
        source: &mut S,
        index: usize,
    ) -> Option<(NodeId, bool)> {
        if let Some(node) = self.cache.lookup_previous(index) {
            if self.tree.row_index(node) == Some(index) {
                return Some((node, true));
            }
        }
        let mut row = source.row_node(index)?;
        row.index = index;
        Some((self.tree.mount(row), false))
    }

    /// Pins outside the folds are hidden, whatever their index.
    fn hide_offscreen_selection_rows(&mut self, pins: &Pins) {
        for node in self.visible_rows() {
            self.tree.set_flag(node, NodeFlags::ARIA_HIDDEN, false);
        }
        let (top, bottom) = self.fold_positions();
        for pin in [pins.start, pins.end].into_iter().flatten() {
            let between_folds = self
                .position(Slot::Row(pin.node))
                .is_some_and(|pos| pos > top && pos < bottom);
            self.tree.set_flag(pin.node, NodeFlags::ARIA_HIDDEN, !between_folds);
        }
    }

    // -----------------------------------------------------------------------
    // Outside a pass
    // -----------------------------------------------------------------------

    /// Drop every unpinned rendered row and the previous cache generation so
    /// the next pass re-fetches the whole window. Returns the rows released.
    pub fn invalidate(&mut self, selection: &SelectionRange) -> usize {
        self.reset_select_bags();
        let (top, _) = self.fold_positions();
        let mut pos = top + 1;
        let mut released = 0;
        while let Some(slot) = self.slots.get(pos).copied() {
            match slot {
                Slot::BottomFold => break,
                Slot::Row(node) if selection.is_pinned(node) => pos += 1,
                _ => {
                    self.remove_at(pos);
                    if let Slot::Row(node) = slot {
                        self.tree.release(node);
                        released += 1;
                    }
                }
            }
        }
        self.cache.discard_previous();
        debug!(target: "scrollport::reconcile", released, "window invalidated");
        released
    }

    /// Pin the first and last logical rows outside the folds and return a
    /// host selection spanning everything. `None` for an empty source.
    pub fn select_all<S: RowSource + ?Sized>(&mut self, source: &mut S) -> Option<HostSelection> {
        let row_count = source.row_count();
        if row_count == 0 {
            return None;
        }

        let (top, _) = self.fold_positions();
        let first = match self.slots.get(top + 1) {
            Some(Slot::Row(node)) if self.tree.row_index(*node) == Some(0) => *node,
            _ => {
                while self.position(Slot::TopFold).is_some_and(|p| p > 0) {
                    self.remove_at(0);
                }
                let (node, _) = self.materialize(source, 0)?;
                self.insert_row_at(0, node);
                node
            }
        };

        let last_index = row_count - 1;
        let (_, bottom) = self.fold_positions();
        let before_bottom = bottom.checked_sub(1).and_then(|p| self.slots.get(p)).copied();
        let last = match before_bottom {
            Some(Slot::Row(node)) if self.tree.row_index(node) == Some(last_index) => node,
            _ if last_index == 0 => first,
            _ => {
                while self.slots.last().is_some_and(|s| *s != Slot::BottomFold) {
                    self.remove_at(self.slots.len() - 1);
                }
                let (node, _) = self.materialize(source, last_index)?;
                let end = self.slots.len();
                self.insert_row_at(end, node);
                node
            }
        };

        let focus_offset = self.tree.children(last).len();
        debug!(target: "scrollport::reconcile", last_row = last_index, "select all");
        Some(HostSelection::new(
            ContentPosition::new(first, 0),
            ContentPosition::new(last, focus_offset),
        ))
    }

    // -----------------------------------------------------------------------
    // Copy
    // -----------------------------------------------------------------------

    /// Fill the select bags with the text of selected rows that are not
    /// materialized, so a copy of the slot sequence yields the full text.
    pub fn fill_select_bags<S: RowSource + ?Sized>(
        &mut self,
        source: &S,
        selection: &SelectionRange,
        target: WindowTarget,
    ) {
        self.reset_select_bags();
        let (Some(start), Some(end)) = (selection.start_row, selection.end_row) else {
            return;
        };
        if selection.is_collapsed || end.index.saturating_sub(start.index) < 2 {
            return;
        }

        if start.index < target.top_row {
            let end_backfill = if end.index < target.top_row {
                end.index
            } else {
                self.visible_row_indices().first().copied().unwrap_or(target.top_row)
            };
            if let Some(pos) = self.position(Slot::Row(start.node)) {
                self.top_bag = if end_backfill > start.index + 1 {
                    source.rows_text(start.index + 1, end_backfill - 1)
                } else {
                    String::new()
                };
                self.insert_at(pos + 1, Slot::TopSelectBag);
            }
        }

        if end.index > target.bottom_row {
            let start_backfill = if start.index > target.bottom_row {
                start.index + 1
            } else {
                self.visible_row_indices()
                    .last()
                    .map_or(target.bottom_row + 1, |last| last + 1)
            };
            if let Some(pos) = self.position(Slot::Row(end.node)) {
                self.bottom_bag = if end.index > start_backfill {
                    source.rows_text(start_backfill, end.index - 1)
                } else {
                    String::new()
                };
                self.insert_at(pos, Slot::BottomSelectBag);
            }
        }
    }

    /// Plain text of the selection as laid out in the slot sequence. Select
    /// bag text stands in for rows that are not materialized.
    #[must_use]
    pub fn selection_text(&self, selection: &SelectionRange) -> String {
        let (Some(start_row), Some(end_row), Some(start), Some(end)) =
            (selection.start_row, selection.end_row, selection.start, selection.end)
        else {
            return String::new();
        };
        if selection.is_collapsed {
            return String::new();
        }

        let start_text = self.tree.text_content(start_row.node);
        let from = self.tree.char_offset_in_row(start_row.node, start).unwrap_or(0);
        if start_row.node == end_row.node {
            let to = self
                .tree
                .char_offset_in_row(end_row.node, end)
                .unwrap_or_else(|| start_text.chars().count());
            return char_slice(&start_text, from, to);
        }

        let (Some(start_pos), Some(end_pos)) = (
            self.position(Slot::Row(start_row.node)),
            self.position(Slot::Row(end_row.node)),
        ) else {
            return String::new();
        };
        if end_pos < start_pos {
            return String::new();
        }

        let mut lines = vec![char_slice(&start_text, from, usize::MAX)];
        for slot in &self.slots[start_pos + 1..end_pos] {
            match slot {
                Slot::Row(node) => lines.push(self.tree.text_content(*node)),
                Slot::TopSelectBag if !self.top_bag.is_empty() => lines.push(self.top_bag.clone()),
                Slot::BottomSelectBag if !self.bottom_bag.is_empty() => {
                    lines.push(self.bottom_bag.clone());
                }
                _ => {}
            }
        }
        let end_text = self.tree.text_content(end_row.node);
        let to = self
            .tree
            .char_offset_in_row(end_row.node, end)
            .unwrap_or_else(|| end_text.chars().count());
        lines.push(char_slice(&end_text, 0, to));
        lines.join("\n")
    }
}

fn char_slice(text: &str, from: usize, to: usize) -> String {
    text.chars().skip(from).take(to.saturating_sub(from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionTracker;
    use crate::source::VecRowSource;

    fn pass(window: &mut RowWindow, source: &mut VecRowSource, top: usize, v: usize) -> PassReport {
        window
            .reconcile(source, WindowTarget::new(top, v), &SelectionRange::cleared())
            .unwrap()
    }

    fn indices(window: &RowWindow, rows: &[NodeId]) -> Vec<usize> {
        rows.iter().filter_map(|id| window.tree().row_index(*id)).collect()
    }

    fn text_pos(window: &RowWindow, index: usize, offset: usize) -> ContentPosition {
        let row = window
            .slots()
            .iter()
            .find_map(|slot| match slot {
                Slot::Row(id) if window.tree().row_index(*id) == Some(index) => Some(*id),
                _ => None,
            })
            .unwrap();
        ContentPosition::new(window.tree().children(row)[0], offset)
    }

    fn selection(
        window: &RowWindow,
        tracker: &mut SelectionTracker,
        anchor: (usize, usize),
        focus: (usize, usize),
    ) -> SelectionRange {
        let host = HostSelection::new(
            text_pos(window, anchor.0, anchor.1),
            text_pos(window, focus.0, focus.1),
        );
        tracker.sync(Some(&host), window.tree()).unwrap().clone()
    }

    /// A source that cannot supply one chosen row.
    struct GappySource {
        inner: VecRowSource,
        missing: Option<usize>,
    }

    impl RowSource for GappySource {
        fn row_count(&self) -> usize {
            self.inner.row_count()
        }

        fn row_node(&mut self, index: usize) -> Option<crate::source::RowNode> {
            if self.missing == Some(index) {
                return None;
            }
            self.inner.row_node(index)
        }

        fn rows_text(&self, start: usize, end_inclusive: usize) -> String {
            self.inner.rows_text(start, end_inclusive)
        }
    }

    // -- filling --

    #[test]
    fn first_pass_fetches_window() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        let report = pass(&mut window, &mut source, 10, 5);
        assert_eq!(window.visible_row_indices(), vec![10, 11, 12, 13, 14]);
        assert_eq!(report.fetched, 5);
        assert_eq!(report.truncated_at, None);
        assert_eq!(source.fetches(), 5);
    }

    #[test]
    fn fill_count_is_capped_by_row_count() {
        let mut source = VecRowSource::numbered(3);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 0, 25);
        assert_eq!(window.visible_row_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 40, 10);
        source.reset_fetches();
        let report = pass(&mut window, &mut source, 40, 10);
        assert_eq!(report.mutations, 0);
        assert_eq!(report.fetched, 0);
        assert_eq!(report.kept, 10);
        assert!((report.cache_hit_ratio() - 1.0).abs() < f64::EPSILON);
        assert_eq!(source.fetches(), 0);
    }

    #[test]
    fn scrolling_one_row_reuses_overlap() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 0, 10);
        source.reset_fetches();
        let report = pass(&mut window, &mut source, 1, 10);
        assert_eq!(window.visible_row_indices(), (1..11).collect::<Vec<_>>());
        assert_eq!(source.fetches(), 1);
        assert_eq!(report.reused + report.kept, 9);
    }

    #[test]
    fn scrolling_up_reuses_overlap() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 50, 10);
        source.reset_fetches();
        pass(&mut window, &mut source, 45, 10);
        assert_eq!(window.visible_row_indices(), (45..55).collect::<Vec<_>>());
        assert_eq!(source.fetches(), 5);
    }

    #[test]
    fn missing_row_truncates_without_error() {
        let mut source = VecRowSource::numbered(10);
        let mut window = RowWindow::new();
        let report = window
            .reconcile(&mut source, WindowTarget::new(8, 5), &SelectionRange::cleared())
            .unwrap();
        assert_eq!(report.truncated_at, Some(10));
        assert_eq!(window.visible_row_indices(), vec![8, 9]);
    }

    #[test]
    fn unreachable_rows_are_released() {
        let mut source = VecRowSource::numbered(1000);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 0, 10);
        pass(&mut window, &mut source, 500, 10);
        assert_eq!(window.tree().rows().count(), 10);
    }

    #[test]
    fn invalidate_refetches_every_row() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 20, 10);
        let before = window.visible_row_indices();
        assert_eq!(window.invalidate(&SelectionRange::cleared()), 10);
        source.reset_fetches();
        pass(&mut window, &mut source, 20, 10);
        assert_eq!(source.fetches(), 10);
        assert_eq!(window.visible_row_indices(), before);
    }

    // -- pinning --

    #[test]
    fn selection_rows_stay_pinned_outside_the_folds() {
        let mut source = VecRowSource::numbered(3000);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        pass(&mut window, &mut source, 0, 25);
        let sel = selection(&window, &mut tracker, (2, 0), (2, 3));
        window.reconcile(&mut source, WindowTarget::new(1990, 25), &sel).unwrap();
        assert_eq!(indices(&window, &window.rows_above_fold()), vec![2]);

        let anchor = sel.start.unwrap();
        let host = HostSelection::new(anchor, text_pos(&window, 2000, 4));
        let sel = tracker.sync(Some(&host), window.tree()).unwrap().clone();
        assert!(sel.is_multiline);

        window.reconcile(&mut source, WindowTarget::new(500, 25), &sel).unwrap();
        assert_eq!(indices(&window, &window.rows_above_fold()), vec![2]);
        assert_eq!(indices(&window, &window.rows_below_fold()), vec![2000]);
        assert_eq!(window.visible_row_indices(), (500..525).collect::<Vec<_>>());

        let pinned = sel.start_row.unwrap().node;
        assert!(window.tree().flags(pinned).contains(NodeFlags::ARIA_HIDDEN));

        let again = window.reconcile(&mut source, WindowTarget::new(500, 25), &sel).unwrap();
        assert_eq!(again.mutations, 0);
        assert_eq!(again.fetched, 0);
    }

    #[test]
    fn pinned_row_is_adopted_when_scrolled_back_into_view() {
        let mut source = VecRowSource::numbered(200);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        pass(&mut window, &mut source, 0, 10);
        let sel = selection(&window, &mut tracker, (3, 0), (3, 2));
        let pinned = sel.start_row.unwrap().node;
        window.reconcile(&mut source, WindowTarget::new(100, 10), &sel).unwrap();
        assert_eq!(window.rows_above_fold(), vec![pinned]);

        window.reconcile(&mut source, WindowTarget::new(0, 10), &sel).unwrap();
        assert!(window.rows_above_fold().is_empty());
        assert_eq!(window.visible_rows()[3], pinned);
        assert_eq!(window.visible_row_indices(), (0..10).collect::<Vec<_>>());
        assert!(!window.tree().flags(pinned).contains(NodeFlags::ARIA_HIDDEN));
    }

    #[test]
    fn invalidate_keeps_pinned_rows() {
        let mut source = VecRowSource::numbered(50);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();
        pass(&mut window, &mut source, 0, 10);
        let sel = selection(&window, &mut tracker, (4, 0), (6, 1));
        assert_eq!(window.invalidate(&sel), 8);
        window.reconcile(&mut source, WindowTarget::new(0, 10), &sel).unwrap();
        assert_eq!(window.visible_row_indices(), (0..10).collect::<Vec<_>>());
        assert_eq!(window.visible_rows()[4], sel.start_row.unwrap().node);
    }

    #[test]
    fn truncated_fill_keeps_unreached_pin() {
        let mut source = GappySource {
            inner: VecRowSource::numbered(100),
            missing: None,
        };
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        window
            .reconcile(&mut source, WindowTarget::new(0, 10), &SelectionRange::cleared())
            .unwrap();
        let host = HostSelection::new(text_pos(&window, 8, 0), text_pos(&window, 8, 3));
        let sel = tracker.sync(Some(&host), window.tree()).unwrap().clone();
        let pinned = sel.start_row.unwrap().node;
        window.reconcile(&mut source, WindowTarget::new(50, 10), &sel).unwrap();
        assert_eq!(window.rows_above_fold(), vec![pinned]);

        source.missing = Some(3);
        let report = window.reconcile(&mut source, WindowTarget::new(0, 10), &sel).unwrap();
        assert_eq!(report.truncated_at, Some(3));
        assert_eq!(window.visible_row_indices(), vec![0, 1, 2]);
        assert_eq!(window.rows_below_fold(), vec![pinned]);
        let flags = window.tree().flags(pinned);
        assert!(flags.contains(NodeFlags::ATTACHED | NodeFlags::ARIA_HIDDEN));

        window.reconcile(&mut source, WindowTarget::new(0, 10), &sel).unwrap();
        assert!(window.tree().contains(pinned));
        assert!(tracker.sync(Some(&host), window.tree()).unwrap().is_active());

        source.missing = None;
        window.reconcile(&mut source, WindowTarget::new(0, 10), &sel).unwrap();
        assert_eq!(window.visible_row_indices(), (0..10).collect::<Vec<_>>());
        assert_eq!(window.visible_rows()[8], pinned);
        assert!(window.rows_below_fold().is_empty());
        assert!(!window.tree().flags(pinned).contains(NodeFlags::ARIA_HIDDEN));
    }

    #[test]
    fn detached_pin_survives_garbage_collection() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        pass(&mut window, &mut source, 0, 10);
        let sel = selection(&window, &mut tracker, (4, 0), (4, 2));
        let pinned = sel.start_row.unwrap().node;
        let pos = window.position(Slot::Row(pinned)).unwrap();
        window.remove_at(pos);

        window.reconcile(&mut source, WindowTarget::new(60, 10), &sel).unwrap();
        window.reconcile(&mut source, WindowTarget::new(80, 10), &sel).unwrap();
        assert!(window.tree().contains(pinned));

        pass(&mut window, &mut source, 80, 10);
        pass(&mut window, &mut source, 90, 10);
        assert!(!window.tree().contains(pinned));
    }

    #[test]
    fn unreachable_due_pin_is_fatal() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        pass(&mut window, &mut source, 0, 10);
        let sel = selection(&window, &mut tracker, (2, 0), (8, 1));
        let start = sel.start_row.unwrap().node;
        let end = sel.end_row.unwrap().node;
        // [end, start, TopFold, ...]: trimming in front of the start pin
        // detaches the end pin, which the fill then cannot reach.
        window.insert_row_at(0, start);
        window.insert_row_at(0, end);

        let err = window
            .reconcile(&mut source, WindowTarget::new(3, 10), &sel)
            .unwrap_err();
        assert_eq!(
            err,
            ScrollPortError::SlotExcision {
                target_row: 8,
                reason: ExcisionFailure::HitBottomFold,
            }
        );
        assert!(err.is_fatal());
    }

    // -- select all and copy --

    #[test]
    fn select_all_pins_first_and_last_rows() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        pass(&mut window, &mut source, 40, 10);

        let host = window.select_all(&mut source).unwrap();
        assert_eq!(indices(&window, &window.rows_above_fold()), vec![0]);
        assert_eq!(indices(&window, &window.rows_below_fold()), vec![99]);
        assert_eq!(host.anchor.offset, 0);
        assert_eq!(host.focus.offset, 1);

        let mut tracker = SelectionTracker::new();
        let sel = tracker.sync(Some(&host), window.tree()).unwrap().clone();
        window.reconcile(&mut source, WindowTarget::new(40, 10), &sel).unwrap();
        assert_eq!(indices(&window, &window.rows_above_fold()), vec![0]);
        assert_eq!(indices(&window, &window.rows_below_fold()), vec![99]);
    }

    #[test]
    fn select_all_on_empty_source_is_none() {
        let mut source = VecRowSource::numbered(0);
        let mut window = RowWindow::new();
        assert!(window.select_all(&mut source).is_none());
    }

    #[test]
    fn copy_backfills_unrendered_rows() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        pass(&mut window, &mut source, 0, 5);
        let sel = selection(&window, &mut tracker, (1, 2), (1, 3));
        let anchor = sel.start.unwrap();
        window.reconcile(&mut source, WindowTarget::new(50, 5), &sel).unwrap();

        let host = HostSelection::new(anchor, text_pos(&window, 52, 3));
        let sel = tracker.sync(Some(&host), window.tree()).unwrap().clone();
        window.reconcile(&mut source, WindowTarget::new(50, 5), &sel).unwrap();
        window.fill_select_bags(&source, &sel, WindowTarget::new(50, 5));

        assert_eq!(window.top_bag_text(), source.rows_text(2, 49));
        assert!(window.bottom_bag_text().is_empty());
        let mut expected = vec!["w 1".to_string()];
        expected.extend((2..52).map(|i| format!("row {i}")));
        expected.push("row".to_string());
        assert_eq!(window.selection_text(&sel), expected.join("\n"));

        window.reconcile(&mut source, WindowTarget::new(50, 5), &sel).unwrap();
        assert!(window.top_bag_text().is_empty());
        assert!(!window.slots().contains(&Slot::TopSelectBag));
    }

    #[test]
    fn copy_backfills_below_the_window() {
        let mut source = VecRowSource::numbered(100);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();

        pass(&mut window, &mut source, 60, 5);
        let sel = selection(&window, &mut tracker, (62, 0), (62, 1));
        let anchor = sel.start.unwrap();
        window.reconcile(&mut source, WindowTarget::new(10, 5), &sel).unwrap();

        let host = HostSelection::new(text_pos(&window, 12, 0), anchor);
        let sel = tracker.sync(Some(&host), window.tree()).unwrap().clone();
        window.fill_select_bags(&source, &sel, WindowTarget::new(10, 5));
        assert_eq!(window.bottom_bag_text(), source.rows_text(15, 61));
        assert!(window.top_bag_text().is_empty());
    }

    #[test]
    fn adjacent_rows_need_no_backfill() {
        let mut source = VecRowSource::numbered(20);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();
        pass(&mut window, &mut source, 0, 5);
        let sel = selection(&window, &mut tracker, (3, 0), (4, 2));
        window.fill_select_bags(&source, &sel, WindowTarget::new(0, 5));
        assert!(!window.slots().contains(&Slot::TopSelectBag));
        assert_eq!(window.selection_text(&sel), "row 3\nro");
    }

    #[test]
    fn single_row_selection_text() {
        let mut source = VecRowSource::numbered(5);
        let mut window = RowWindow::new();
        let mut tracker = SelectionTracker::new();
        pass(&mut window, &mut source, 0, 5);
        let sel = selection(&window, &mut tracker, (2, 5), (2, 1));
        assert_eq!(window.selection_text(&sel), "ow 2");
    }
}
