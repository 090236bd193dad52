#![forbid(unsafe_code)]

//! The row source: the external owner of row content.
//!
//! The scroll port never decides what a row contains. It asks the source for
//! the row count, for a content tree per row it needs to materialize, and for
//! plain text of row ranges it cannot materialize (copy backfill).
//!
//! Implementations must keep indices stable: `row_node(i)` returns content
//! for the same logical row `i` until the host signals a topology change
//! (which it does by scheduling an invalidate).

/// Structural content of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    /// A container grouping further content (styling runs, links, ...).
    Span(Vec<Content>),
}

impl Content {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Concatenated text of this subtree.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Span(children) => {
                for child in children {
                    child.write_text(out);
                }
            }
        }
    }
}

/// One row as produced by the source, before it is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowNode {
    pub index: usize,
    pub children: Vec<Content>,
}

impl RowNode {
    #[must_use]
    pub fn new(index: usize, children: Vec<Content>) -> Self {
        Self { index, children }
    }

    /// A row holding a single text node.
    #[must_use]
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self::new(index, vec![Content::text(text)])
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_text(&mut out);
        }
        out
    }
}

/// Provider of row count and row content.
pub trait RowSource {
    /// Number of logical rows.
    fn row_count(&self) -> usize;

    /// Content for row `index`, or `None` if it cannot be supplied right now.
    ///
    /// `None` is not an error: the pass stops filling and leaves a shorter
    /// window behind.
    fn row_node(&mut self, index: usize) -> Option<RowNode>;

    /// Plain text of rows `start..=end_inclusive`, one line per row joined by
    /// `\n`.
    fn rows_text(&self, start: usize, end_inclusive: usize) -> String;
}

/// A row source over an in-memory list of lines.
///
/// Counts how many rows were fetched so callers can observe cache behavior.
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    lines: Vec<String>,
    fetches: u64,
}

impl VecRowSource {
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines, fetches: 0 }
    }

    /// `count` rows whose text is `"row {i}"`.
    #[must_use]
    pub fn numbered(count: usize) -> Self {
        Self::new((0..count).map(|i| format!("row {i}")).collect())
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn truncate(&mut self, len: usize) {
        self.lines.truncate(len);
    }

    /// Number of `row_node` calls that returned a row.
    #[must_use]
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    pub fn reset_fetches(&mut self) {
        self.fetches = 0;
    }
}

impl RowSource for VecRowSource {
    fn row_count(&self) -> usize {
        self.lines.len()
    }

    fn row_node(&mut self, index: usize) -> Option<RowNode> {
        let line = self.lines.get(index)?;
        self.fetches += 1;
        Some(RowNode::text(index, line.clone()))
    }

    fn rows_text(&self, start: usize, end_inclusive: usize) -> String {
        if start > end_inclusive || start >= self.lines.len() {
            return String::new();
        }
        let end = end_inclusive.min(self.lines.len() - 1);
        self.lines[start..=end].join("\n")
    }
}
