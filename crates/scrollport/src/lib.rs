#![forbid(unsafe_code)]

//! Host-facing scroll port.
//!
//! [`ScrollPort`] owns a [`RowSource`](scrollport_core::RowSource) and keeps a
//! virtualized window of its rows in step with the host's layout, scroll
//! position, input and selection. Observers subscribe to
//! [`ScrollPortEvent`]s; screen readers receive page summaries through an
//! [`AccessibilityReader`].
//!
//! # Example
//!
//! ```
//! use scrollport::{ScrollPort, ScrollPortConfig};
//! use scrollport_core::{CellSize, FixedCellMeasurer, VecRowSource};
//!
//! let config = ScrollPortConfig { scrollbar_visible: false, ..ScrollPortConfig::default() };
//! let measurer = FixedCellMeasurer::for_cell(CellSize::new(8.0, 16.0), config.font.size);
//! let mut port = ScrollPort::new(VecRowSource::numbered(1000), config, measurer);
//!
//! port.set_screen_size(640.0, 400.0);
//! port.flush().unwrap();
//! assert_eq!(port.top_row_index(), 975);
//! assert_eq!(port.window().visible_row_indices().len(), 25);
//! ```

pub mod announce;
pub mod config;
pub mod events;
pub mod port;

pub use announce::{AccessibilityReader, page_announcement};
pub use config::{ConfigError, ScrollPortConfig};
pub use events::{EventBus, EventKind, ScrollPortEvent, SubscriptionId};
pub use port::ScrollPort;
