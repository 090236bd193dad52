#![forbid(unsafe_code)]

//! The materialized row window.
//!
//! A [`RowWindow`] owns an ordered slot sequence:
//!
//! ```text
//! [pinned start?] [top bag?] TopFold  row top .. row bottom  BottomFold [bottom bag?] [pinned end?]
//! ```
//!
//! Only the rows between the two folds are rendered. Rows outside the folds
//! exist solely because they anchor the live selection. The
//! [`reconcile`](RowWindow::reconcile) pass rewrites the sequence with the
//! fewest slot mutations it can manage.

mod cache;
mod reconcile;
mod tree;

use ahash::AHashSet;
use tracing::trace;

pub use cache::NodeCache;
pub use reconcile::{PassReport, WindowTarget};
pub use tree::{NodeFlags, NodeId, NodeKind, NodeTree};

/// One entry in the slot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    TopFold,
    BottomFold,
    Row(NodeId),
    /// Copy backfill for unrendered rows above the window.
    TopSelectBag,
    /// Copy backfill for unrendered rows below the window.
    BottomSelectBag,
}

/// Slot sequence, node arena, and cache generations.
#[derive(Debug, Clone)]
pub struct RowWindow {
    tree: NodeTree,
    slots: Vec<Slot>,
    cache: NodeCache,
    top_bag: String,
    bottom_bag: String,
}

impl Default for RowWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RowWindow {
    /// An empty window: just the two folds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: NodeTree::new(),
            slots: vec![Slot::TopFold, Slot::BottomFold],
            cache: NodeCache::new(),
            top_bag: String::new(),
            bottom_bag: String::new(),
        }
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[must_use]
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    #[must_use]
    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    #[must_use]
    pub fn top_bag_text(&self) -> &str {
        &self.top_bag
    }

    #[must_use]
    pub fn bottom_bag_text(&self) -> &str {
        &self.bottom_bag
    }

    /// Rendered rows, in order.
    #[must_use]
    pub fn visible_rows(&self) -> Vec<NodeId> {
        let (top, bottom) = self.fold_positions();
        self.rows_in(top + 1, bottom)
    }

    /// Row indices of the rendered rows, in order.
    #[must_use]
    pub fn visible_row_indices(&self) -> Vec<usize> {
        self.visible_rows()
            .into_iter()
            .filter_map(|id| self.tree.row_index(id))
            .collect()
    }

    /// Pinned rows in front of the top fold.
    #[must_use]
    pub fn rows_above_fold(&self) -> Vec<NodeId> {
        let (top, _) = self.fold_positions();
        self.rows_in(0, top)
    }

    /// Pinned rows after the bottom fold.
    #[must_use]
    pub fn rows_below_fold(&self) -> Vec<NodeId> {
        let (_, bottom) = self.fold_positions();
        self.rows_in(bottom + 1, self.slots.len())
    }

    fn rows_in(&self, from: usize, to: usize) -> Vec<NodeId> {
        self.slots
            .get(from..to.max(from).min(self.slots.len()))
            .unwrap_or_default()
            .iter()
            .filter_map(|slot| match slot {
                Slot::Row(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Slot primitives
    // -----------------------------------------------------------------------

    fn position(&self, slot: Slot) -> Option<usize> {
        self.slots.iter().position(|s| *s == slot)
    }

    /// Positions of the two folds. Both are present between passes; during a
    /// pass the bottom fold may be briefly absent and reads as the end.
    fn fold_positions(&self) -> (usize, usize) {
        let top = self.position(Slot::TopFold).unwrap_or(0);
        let bottom = self.position(Slot::BottomFold).unwrap_or(self.slots.len());
        (top, bottom)
    }

    fn insert_at(&mut self, pos: usize, slot: Slot) {
        if let Slot::Row(id) = slot {
            self.tree.set_flag(id, NodeFlags::ATTACHED, true);
        }
        trace!(target: "scrollport::reconcile", op = "insert", position = pos, slot = ?slot);
        self.slots.insert(pos, slot);
    }

    fn remove_at(&mut self, pos: usize) -> Slot {
        let slot = self.slots.remove(pos);
        if let Slot::Row(id) = slot {
            self.tree.set_flag(id, NodeFlags::ATTACHED, false);
        }
        trace!(target: "scrollport::reconcile", op = "remove", position = pos, slot = ?slot);
        slot
    }

    /// Attach `node` at `pos`, moving it if it is already attached. Returns
    /// the position it ends up at.
    fn insert_row_at(&mut self, pos: usize, node: NodeId) -> usize {
        let mut pos = pos;
        if let Some(current) = self.position(Slot::Row(node)) {
            self.remove_at(current);
            if current < pos {
                pos -= 1;
            }
        }
        self.insert_at(pos, Slot::Row(node));
        pos
    }

    /// Drop the select bags and their text.
    pub fn reset_select_bags(&mut self) {
        for bag in [Slot::TopSelectBag, Slot::BottomSelectBag] {
            if let Some(pos) = self.position(bag) {
                self.remove_at(pos);
            }
        }
        self.top_bag.clear();
        self.bottom_bag.clear();
    }

    /// Release every row that is neither attached, pinned, nor cached.
    fn collect_garbage(&mut self, pinned: &[NodeId]) -> usize {
        let cached: AHashSet<NodeId> = self.cache.retained().collect();
        let doomed: Vec<NodeId> = self
            .tree
            .rows()
            .filter(|id| {
                !self.tree.flags(*id).contains(NodeFlags::ATTACHED)
                    && !pinned.contains(id)
                    && !cached.contains(id)
            })
            .collect();
        for id in &doomed {
            self.tree.release(*id);
        }
        doomed.len()
    }
}
