#![forbid(unsafe_code)]

//! Host-agnostic core of the scroll port: a virtualized viewport over an
//! arbitrarily large, line-oriented scrollback.
//!
//! Only the rows that fit in the viewport are materialized. The rest stay in
//! the external [`RowSource`](source::RowSource) until scrolled into view.
//! Rows anchoring a live selection are pinned outside the rendered window so
//! the host selection survives any amount of scrolling.
//!
//! # Layout
//!
//! - [`geometry`]: cell measurement and visible row count.
//! - [`scroll`]: row index ↔ scroll offset arithmetic.
//! - [`input`]: wheel/touch/paste normalization into [`input::Intent`]s.
//! - [`selection`]: ordered row-range view of the host selection.
//! - [`window`]: node tree, slot sequence, cache generations and the
//!   reconciliation pass.
//! - [`scheduler`]: coalescing `idle -> scheduled -> idle` deferred passes.
//!
//! The crate owns no event loop and installs no tracing subscriber; the host
//! drives everything.

pub mod error;
pub mod geometry;
pub mod input;
pub mod scheduler;
pub mod scroll;
pub mod selection;
pub mod source;
pub mod window;

pub use error::{ExcisionFailure, Result, ScrollPortError};
pub use geometry::{
    CellMeasurer, CellSize, FixedCellMeasurer, FontSpec, ScreenSize, ViewportGeometry,
};
pub use input::{
    DeltaMode, HostInput, InputNormalizer, Intent, PixelDelta, TouchTracker, WheelInput,
    WheelScale,
};
pub use scheduler::{Deferred, PassKind, RedrawScheduler, TickRequester};
pub use scroll::{ScrollController, ScrollState};
pub use selection::{ContentPosition, HostSelection, RowPin, SelectionRange, SelectionTracker};
pub use source::{Content, RowNode, RowSource, VecRowSource};
pub use window::{
    NodeCache, NodeFlags, NodeId, NodeKind, NodeTree, PassReport, RowWindow, Slot, WindowTarget,
};
