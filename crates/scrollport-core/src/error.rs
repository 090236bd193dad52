#![forbid(unsafe_code)]

//! Error model for the scroll port core.
//!
//! Only invariant violations are errors. A row the source cannot supply is
//! *not* an error: the pass truncates and reports it through
//! [`PassReport::truncated_at`](crate::window::PassReport::truncated_at).
//! Anything surfaced here means the window or the selection is in a shape the
//! reconciler cannot safely continue from, and masking it would risk
//! destroying pinned selection rows or inverting copied text.

use std::fmt;

// ── Error Types ─────────────────────────────────────────────────────────

/// Why a slot excision could not reach its target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcisionFailure {
    /// The walk reached the bottom fold before finding the target.
    HitBottomFold,
    /// The walk ran off the end of the slot sequence.
    EndOfSlots,
}

/// Fatal scroll port errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollPortError {
    /// Anchor and focus share a row but neither node was found under it.
    SelectionOrder {
        /// Row index both positions resolved to.
        row: usize,
    },
    /// A pinned selection row was due in the window but could not be
    /// reached by removing the slots in front of it.
    SlotExcision {
        /// Row index of the pinned row being searched for.
        target_row: usize,
        reason: ExcisionFailure,
    },
}

/// Standard result type for scroll port operations.
pub type Result<T> = std::result::Result<T, ScrollPortError>;

impl ScrollPortError {
    /// Every variant is fatal today; kept as a method so callers branch on
    /// intent rather than on the variant list.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::SelectionOrder { .. } | Self::SlotExcision { .. } => true,
        }
    }

    /// Error type label for tracing fields.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::SelectionOrder { .. } => "selection_order",
            Self::SlotExcision { .. } => "slot_excision",
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for ExcisionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HitBottomFold => f.write_str("encountered bottom fold before target row"),
            Self::EndOfSlots => f.write_str("did not encounter target row"),
        }
    }
}

impl fmt::Display for ScrollPortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectionOrder { row } => write!(
                f,
                "selection endpoints share row {row} but neither was found under it"
            ),
            Self::SlotExcision { target_row, reason } => {
                write!(f, "slot excision toward row {target_row} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ScrollPortError {}
