#![forbid(unsafe_code)]

//! Page summaries for screen readers.

use scrollport_core::RowSource;
use scrollport_core::scroll::percent_scrolled;

/// Receiver of assertive (interrupting) announcements.
pub trait AccessibilityReader {
    fn assertive_announce(&mut self, text: &str);
}

impl<F: FnMut(&str)> AccessibilityReader for F {
    fn assertive_announce(&mut self, text: &str) {
        self(text);
    }
}

/// `"{percent}% scrolled,\n"` followed by each visible row and a newline.
#[must_use]
pub fn page_announcement<S: RowSource + ?Sized>(
    source: &S,
    top: usize,
    visible_row_count: usize,
) -> String {
    let row_count = source.row_count();
    let percent = percent_scrolled(top, row_count, visible_row_count);
    let mut out = format!("{percent}% scrolled,\n");
    let end = (top + visible_row_count).min(row_count);
    for index in top..end {
        out.push_str(&source.rows_text(index, index));
        out.push('\n');
    }
    out
}
