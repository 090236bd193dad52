#![forbid(unsafe_code)]

//! Generational arena holding the materialized row content.
//!
//! Every row the reconciler mounts becomes a small tree: one
//! [`NodeKind::Row`] boundary node with [`NodeKind::Span`] and
//! [`NodeKind::Text`] descendants. Nodes are addressed by [`NodeId`], a
//! copyable handle that stops resolving once its node is released, so a host
//! selection that outlives a row is detected rather than dereferenced.

use bitflags::bitflags;

use crate::selection::ContentPosition;
use crate::source::{Content, RowNode};

/// Stable handle to a node in a [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

bitflags! {
    /// Per-node state bits.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The row currently occupies a slot in the window.
        const ATTACHED    = 0b01;
        /// The row is hidden from assistive technology.
        const ARIA_HIDDEN = 0b10;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Row boundary marker; the root of every mounted row.
    Row { index: usize },
    Span,
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    flags: NodeFlags,
}

#[derive(Debug, Clone)]
struct Entry {
    generation: u32,
    data: Option<NodeData>,
}

/// Arena of row content nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl NodeTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes (all kinds).
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Mount a row produced by the source and return its row node.
    pub fn mount(&mut self, row: RowNode) -> NodeId {
        let root = self.alloc(NodeKind::Row { index: row.index }, None);
        for child in row.children {
            self.mount_content(child, root);
        }
        root
    }

    fn mount_content(&mut self, content: Content, parent: NodeId) {
        match content {
            Content::Text(text) => {
                self.alloc(NodeKind::Text(text), Some(parent));
            }
            Content::Span(children) => {
                let span = self.alloc(NodeKind::Span, Some(parent));
                for child in children {
                    self.mount_content(child, span);
                }
            }
        }
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let data = NodeData {
            kind,
            parent,
            children: Vec::new(),
            flags: NodeFlags::empty(),
        };
        let id = if let Some(slot) = self.free.pop() {
            let entry = &mut self.entries[slot as usize];
            entry.data = Some(data);
            NodeId {
                slot,
                generation: entry.generation,
            }
        } else {
            let slot = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
            self.entries.push(Entry {
                generation: 0,
                data: Some(data),
            });
            NodeId {
                slot,
                generation: 0,
            }
        };
        if let Some(parent) = parent.and_then(|p| self.data_mut(p)) {
            parent.children.push(id);
        }
        self.live += 1;
        id
    }

    /// Release a node and its whole subtree. Handles to them stop resolving.
    pub fn release(&mut self, id: NodeId) {
        let Some(data) = self.take(id) else {
            return;
        };
        if let Some(parent) = data.parent.and_then(|p| self.data_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut stack = data.children;
        while let Some(child) = stack.pop() {
            if let Some(child_data) = self.take(child) {
                stack.extend(child_data.children);
            }
        }
    }

    fn take(&mut self, id: NodeId) -> Option<NodeData> {
        let entry = self.entries.get_mut(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let data = entry.data.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.live -= 1;
        Some(data)
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        let entry = self.entries.get(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.data.as_ref()
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let entry = self.entries.get_mut(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.data.as_mut()
    }

    /// Whether `id` still resolves to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|d| &d.kind)
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).and_then(|d| d.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id).map_or(&[], |d| d.children.as_slice())
    }

    #[must_use]
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.data(id).map_or(NodeFlags::empty(), |d| d.flags)
    }

    pub fn set_flag(&mut self, id: NodeId, flag: NodeFlags, on: bool) {
        if let Some(data) = self.data_mut(id) {
            data.flags.set(flag, on);
        }
    }

    /// Row index of a row node; `None` for other kinds or dead handles.
    #[must_use]
    pub fn row_index(&self, id: NodeId) -> Option<usize> {
        match self.kind(id)? {
            NodeKind::Row { index } => Some(*index),
            NodeKind::Span | NodeKind::Text(_) => None,
        }
    }

    /// Ascend parent links until a row boundary is found.
    #[must_use]
    pub fn containing_row(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.row_index(node).is_some() {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Depth-first, document-order search under `root` for whichever of
    /// `a` or `b` appears first. `root` itself is not a candidate.
    #[must_use]
    pub fn first_in_document_order(&self, root: NodeId, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if node == a || node == b {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        None
    }

    /// Concatenated text of a subtree.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_text(id, &mut out);
        out
    }

    fn write_text(&self, id: NodeId, out: &mut String) {
        let Some(data) = self.data(id) else {
            return;
        };
        if let NodeKind::Text(text) = &data.kind {
            out.push_str(text);
        }
        for child in &data.children {
            self.write_text(*child, out);
        }
    }

    /// Character offset of `pos` within the text of `row`.
    ///
    /// For a text node the position offset counts characters; for any other
    /// node it counts children, as in DOM ranges. Offsets past the end clamp.
    #[must_use]
    pub fn char_offset_in_row(&self, row: NodeId, pos: ContentPosition) -> Option<usize> {
        let mut before = 0usize;
        let found = self.count_until(row, pos, &mut before)?;
        found.then_some(before)
    }

    /// Walks `node` in document order adding text lengths to `acc` until
    /// `pos` is reached. Returns `Some(true)` once found.
    fn count_until(&self, node: NodeId, pos: ContentPosition, acc: &mut usize) -> Option<bool> {
        let data = self.data(node)?;
        if node == pos.node {
            match &data.kind {
                NodeKind::Text(text) => *acc += pos.offset.min(text.chars().count()),
                NodeKind::Row { .. } | NodeKind::Span => {
                    for child in data.children.iter().take(pos.offset) {
                        *acc += self.text_content(*child).chars().count();
                    }
                }
            }
            return Some(true);
        }
        if let NodeKind::Text(text) = &data.kind {
            *acc += text.chars().count();
            return Some(false);
        }
        for child in &data.children {
            if self.count_until(*child, pos, acc)? {
                return Some(true);
            }
        }
        Some(false)
    }

    /// Live row nodes in slot order of allocation (not window order).
    pub fn rows(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().enumerate().filter_map(|(slot, entry)| {
            let data = entry.data.as_ref()?;
            matches!(data.kind, NodeKind::Row { .. }).then_some(NodeId {
                slot: slot as u32,
                generation: entry.generation,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(tree: &mut NodeTree) -> NodeId {
        tree.mount(RowNode::new(
            4,
            vec![
                Content::text("ab"),
                Content::Span(vec![Content::text("cd"), Content::text("ef")]),
                Content::text("gh"),
            ],
        ))
    }

    #[test]
    fn mount_builds_structure() {
        let mut tree = NodeTree::new();
        let row = sample_row(&mut tree);
        assert_eq!(tree.row_index(row), Some(4));
        assert_eq!(tree.children(row).len(), 3);
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.text_content(row), "abcdefgh");

        let span = tree.children(row)[1];
        assert_eq!(tree.kind(span), Some(&NodeKind::Span));
        assert_eq!(tree.parent(span), Some(row));
    }

    #[test]
    fn containing_row_ascends() {
        let mut tree = NodeTree::new();
        let row = sample_row(&mut tree);
        let span = tree.children(row)[1];
        let deep = tree.children(span)[1];
        assert_eq!(tree.containing_row(deep), Some(row));
        assert_eq!(tree.containing_row(row), Some(row));
    }

    #[test]
    fn document_order_search() {
        let mut tree = NodeTree::new();
        let row = sample_row(&mut tree);
        let first = tree.children(row)[0];
        let span = tree.children(row)[1];
        let inner = tree.children(span)[1];
        let last = tree.children(row)[2];

        assert_eq!(tree.first_in_document_order(row, last, inner), Some(inner));
        assert_eq!(tree.first_in_document_order(row, inner, first), Some(first));
        assert_eq!(tree.first_in_document_order(row, span, inner), Some(span));

        let mut other = NodeTree::new();
        let foreign = sample_row(&mut other);
        assert_eq!(tree.first_in_document_order(row, foreign, row), None);
    }

    #[test]
    fn release_invalidates_handles_and_reuses_slots() {
        let mut tree = NodeTree::new();
        let row = sample_row(&mut tree);
        let text = tree.children(row)[0];
        tree.release(row);
        assert!(!tree.contains(row));
        assert!(!tree.contains(text));
        assert!(tree.is_empty());
        assert_eq!(tree.containing_row(text), None);

        let again = tree.mount(RowNode::text(9, "x"));
        assert_ne!(again, row);
        assert_eq!(tree.row_index(again), Some(9));
        assert_eq!(tree.row_index(row), None);
    }

    #[test]
    fn flags_toggle() {
        let mut tree = NodeTree::new();
        let row = tree.mount(RowNode::text(0, "x"));
        tree.set_flag(row, NodeFlags::ARIA_HIDDEN, true);
        assert!(tree.flags(row).contains(NodeFlags::ARIA_HIDDEN));
        tree.set_flag(row, NodeFlags::ARIA_HIDDEN, false);
        assert!(tree.flags(row).is_empty());
    }

    #[test]
    fn char_offsets_follow_dom_range_rules() {
        let mut tree = NodeTree::new();
        let row = sample_row(&mut tree);
        let span = tree.children(row)[1];
        let inner = tree.children(span)[1];

        let at = |node, offset| ContentPosition { node, offset };
        assert_eq!(tree.char_offset_in_row(row, at(inner, 1)), Some(5));
        assert_eq!(tree.char_offset_in_row(row, at(span, 1)), Some(4));
        assert_eq!(tree.char_offset_in_row(row, at(row, 3)), Some(8));
        assert_eq!(tree.char_offset_in_row(row, at(inner, 99)), Some(6));

        let other = tree.mount(RowNode::text(5, "zz"));
        let other_text = tree.children(other)[0];
        assert_eq!(tree.char_offset_in_row(row, at(other_text, 0)), None);
    }

    #[test]
    fn rows_lists_only_row_nodes() {
        let mut tree = NodeTree::new();
        let a = sample_row(&mut tree);
        let b = tree.mount(RowNode::text(5, "x"));
        let rows: Vec<_> = tree.rows().collect();
        assert_eq!(rows, vec![a, b]);
    }
}
