#![forbid(unsafe_code)]

//! Row-range view of the host selection.
//!
//! The host owns the actual selection (anchor and focus positions inside the
//! node tree). Before every reconciliation pass the [`SelectionTracker`]
//! resolves both positions to their containing rows and orders them, so the
//! reconciler knows which rows must stay pinned outside the rendered window.

use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Result, ScrollPortError};
use crate::window::{NodeId, NodeTree};

/// A position inside the node tree.
///
/// For a text node `offset` counts characters; for any other node it counts
/// children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentPosition {
    pub node: NodeId,
    pub offset: usize,
}

impl ContentPosition {
    #[must_use]
    pub const fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The host's selection: where it started and where it currently ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostSelection {
    pub anchor: ContentPosition,
    pub focus: ContentPosition,
}

impl HostSelection {
    #[must_use]
    pub const fn new(anchor: ContentPosition, focus: ContentPosition) -> Self {
        Self { anchor, focus }
    }

    /// A collapsed selection (a caret) at `pos`.
    #[must_use]
    pub const fn caret(pos: ContentPosition) -> Self {
        Self {
            anchor: pos,
            focus: pos,
        }
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A resolved selection endpoint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowPin {
    pub node: NodeId,
    pub index: usize,
}

/// Ordered selection rows, valid for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange {
    pub start_row: Option<RowPin>,
    pub end_row: Option<RowPin>,
    /// Document-order first position.
    pub start: Option<ContentPosition>,
    /// Document-order last position.
    pub end: Option<ContentPosition>,
    pub is_multiline: bool,
    pub is_collapsed: bool,
}

impl Default for SelectionRange {
    fn default() -> Self {
        Self::cleared()
    }
}

impl SelectionRange {
    /// No selection.
    #[must_use]
    pub const fn cleared() -> Self {
        Self {
            start_row: None,
            end_row: None,
            start: None,
            end: None,
            is_multiline: false,
            is_collapsed: true,
        }
    }

    /// Whether both endpoint rows resolved.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.start_row.is_some() && self.end_row.is_some()
    }

    /// Row nodes that must survive the next pass.
    #[must_use]
    pub fn pinned(&self) -> SmallVec<[NodeId; 2]> {
        let mut out = SmallVec::new();
        for pin in [self.start_row, self.end_row].into_iter().flatten() {
            if !out.contains(&pin.node) {
                out.push(pin.node);
            }
        }
        out
    }

    #[must_use]
    pub fn is_pinned(&self, node: NodeId) -> bool {
        [self.start_row, self.end_row]
            .into_iter()
            .flatten()
            .any(|pin| pin.node == node)
    }
}

/// Keeps the [`SelectionRange`] in step with the host selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    range: SelectionRange,
    assistive_reading: bool,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn range(&self) -> &SelectionRange {
        &self.range
    }

    /// With assistive reading on, a collapsed selection (the reading caret)
    /// still pins its row.
    pub fn set_assistive_reading(&mut self, enabled: bool) {
        self.assistive_reading = enabled;
    }

    #[must_use]
    pub fn assistive_reading(&self) -> bool {
        self.assistive_reading
    }

    pub fn clear(&mut self) {
        self.range = SelectionRange::cleared();
    }

    /// Re-derive the range from the host selection.
    ///
    /// # Errors
    ///
    /// [`ScrollPortError::SelectionOrder`] when both positions sit in the
    /// same row but neither node can be found under it.
    pub fn sync(&mut self, host: Option<&HostSelection>, tree: &NodeTree) -> Result<&SelectionRange> {
        self.range = SelectionRange::cleared();

        let Some(host) = host else {
            return Ok(&self.range);
        };
        if host.is_collapsed() && !self.assistive_reading {
            return Ok(&self.range);
        }

        let anchor_row = tree.containing_row(host.anchor.node);
        let focus_row = tree.containing_row(host.focus.node);
        let (Some(anchor_row), Some(focus_row)) = (anchor_row, focus_row) else {
            trace!(
                target: "scrollport::selection",
                anchor_resolved = anchor_row.is_some(),
                focus_resolved = focus_row.is_some(),
                "selection endpoint outside any row; cleared"
            );
            return Ok(&self.range);
        };
        let (Some(anchor_index), Some(focus_index)) =
            (tree.row_index(anchor_row), tree.row_index(focus_row))
        else {
            return Ok(&self.range);
        };

        let anchor_first = if anchor_index != focus_index {
            anchor_index < focus_index
        } else if host.anchor.node == host.focus.node {
            host.anchor.offset <= host.focus.offset
        } else {
            match tree.first_in_document_order(anchor_row, host.anchor.node, host.focus.node) {
                Some(first) => first == host.anchor.node,
                None => return Err(ScrollPortError::SelectionOrder { row: anchor_index }),
            }
        };

        let anchor_pin = RowPin {
            node: anchor_row,
            index: anchor_index,
        };
        let focus_pin = RowPin {
            node: focus_row,
            index: focus_index,
        };
        let (start_row, end_row, start, end) = if anchor_first {
            (anchor_pin, focus_pin, host.anchor, host.focus)
        } else {
            (focus_pin, anchor_pin, host.focus, host.anchor)
        };

        self.range = SelectionRange {
            start_row: Some(start_row),
            end_row: Some(end_row),
            start: Some(start),
            end: Some(end),
            is_multiline: start_row.index != end_row.index,
            is_collapsed: host.is_collapsed(),
        };
        trace!(
            target: "scrollport::selection",
            start = start_row.index,
            end = end_row.index,
            multiline = self.range.is_multiline,
            "selection synced"
        );
        Ok(&self.range)
    }
}
