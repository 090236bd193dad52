#![forbid(unsafe_code)]

//! Two-generation row node cache.
//!
//! The previous generation answers lookups during a pass; every row the pass
//! keeps or materializes is recorded into the current generation. At the end
//! of the pass the current generation becomes the previous one, so a row
//! survives exactly as long as consecutive passes keep using it.

use ahash::AHashMap;

use super::tree::NodeId;

#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    previous: AHashMap<usize, NodeId>,
    current: AHashMap<usize, NodeId>,
    hits: u64,
    misses: u64,
}

impl NodeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new current generation.
    pub fn begin_pass(&mut self) {
        self.current.clear();
    }

    /// Look up a row in the previous generation, counting hits and misses.
    pub fn lookup_previous(&mut self, index: usize) -> Option<NodeId> {
        let found = self.previous.get(&index).copied();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn record(&mut self, index: usize, node: NodeId) {
        self.current.insert(index, node);
    }

    /// Promote the current generation to previous.
    pub fn finish_pass(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    /// Forget the previous generation so every row is fetched again.
    pub fn discard_previous(&mut self) {
        self.previous.clear();
    }

    /// Whether `node` is held by the previous generation.
    #[must_use]
    pub fn retains(&self, node: NodeId) -> bool {
        self.previous.values().any(|n| *n == node)
    }

    /// Row nodes held by the previous generation.
    pub fn retained(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.previous.values().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }
}
