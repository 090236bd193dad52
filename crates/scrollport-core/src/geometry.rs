#![forbid(unsafe_code)]

//! Viewport geometry: cell size, visible row count, and margins.
//!
//! A partial row is never shown. The visible row count is the floor of
//! `screen_height / cell_height`, and the leftover pixels become the bottom
//! margin so the scroll extent can still be computed exactly.

use serde::{Deserialize, Serialize};

/// Quotients this close below the next integer are treated as that integer.
///
/// Fractional device pixel ratios produce heights like `399.99997` for a
/// screen that holds exactly 25 rows of 16px.
const FLOOR_DIVIDE_EPSILON: f64 = 1e-4;

/// Size of one character cell in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub width: f64,
    pub height: f64,
}

impl CellSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are finite and positive.
    #[must_use]
    pub fn is_usable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Font parameters that determine the cell size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    /// Font size in CSS pixels.
    pub size: f64,
    pub smoothing: String,
    /// Browser or host zoom factor (1.0 = 100%).
    pub zoom: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "monospace".to_string(),
            size: 15.0,
            smoothing: "antialiased".to_string(),
            zoom: 1.0,
        }
    }
}

/// Measures the cell size for a font.
///
/// Implementations must be deterministic: the same [`FontSpec`] yields the
/// same [`CellSize`] until the host's font rendering changes.
pub trait CellMeasurer {
    fn measure_cell(&self, font: &FontSpec) -> CellSize;
}

/// A measurer that scales a fixed em-relative cell by font size and zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCellMeasurer {
    /// Cell width as a fraction of the font size.
    pub width_em: f64,
    /// Cell height as a fraction of the font size.
    pub height_em: f64,
}

impl FixedCellMeasurer {
    /// A measurer that yields exactly `cell` for a 1.0-zoom font of `font_size`.
    #[must_use]
    pub fn for_cell(cell: CellSize, font_size: f64) -> Self {
        Self {
            width_em: cell.width / font_size,
            height_em: cell.height / font_size,
        }
    }
}

impl CellMeasurer for FixedCellMeasurer {
    fn measure_cell(&self, font: &FontSpec) -> CellSize {
        // Zoom scales the rendered glyphs but the host reports CSS pixels, so
        // the measured cell is divided back out by zoom.
        let zoom = if font.zoom.is_finite() && font.zoom > 0.0 {
            font.zoom
        } else {
            1.0
        };
        let scale = font.size * zoom;
        CellSize::new(
            (self.width_em * scale) / zoom,
            (self.height_em * scale) / zoom,
        )
    }
}

/// Usable screen size in CSS pixels (scrollbar already excluded).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Shrink the width by a visible scrollbar.
    #[must_use]
    pub fn without_scrollbar(self, scrollbar_width: f64) -> Self {
        Self {
            width: (self.width - scrollbar_width).max(0.0),
            height: self.height,
        }
    }
}

/// Floor division that forgives float noise just below an integer.
///
/// Returns 0 for a zero, negative or non-finite denominator.
#[must_use]
pub fn visible_row_count(viewport_height_px: f64, cell_height_px: f64) -> usize {
    if !(cell_height_px.is_finite() && cell_height_px > 0.0) || !viewport_height_px.is_finite() {
        return 0;
    }
    let quotient = viewport_height_px / cell_height_px;
    if quotient <= 0.0 {
        return 0;
    }
    let ceiling = quotient.ceil();
    let rows = if ceiling - quotient < FLOOR_DIVIDE_EPSILON {
        ceiling
    } else {
        quotient.floor()
    };
    rows as usize
}

/// Derived viewport geometry, recomputed on every resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    screen: ScreenSize,
    cell: CellSize,
    visible_row_count: usize,
    top_margin: f64,
    bottom_margin: f64,
}

impl Default for ViewportGeometry {
    fn default() -> Self {
        Self {
            screen: ScreenSize::default(),
            cell: CellSize::new(1.0, 1.0),
            visible_row_count: 0,
            top_margin: 0.0,
            bottom_margin: 0.0,
        }
    }
}

impl ViewportGeometry {
    /// Geometry for a screen and cell size.
    #[must_use]
    pub fn new(screen: ScreenSize, cell: CellSize) -> Self {
        let mut geometry = Self::default();
        geometry.sync(screen, cell);
        geometry
    }

    /// Recompute from a new screen and cell size. Returns whether any derived
    /// value changed.
    pub fn sync(&mut self, screen: ScreenSize, cell: CellSize) -> bool {
        let cell = if cell.is_usable() { cell } else { self.cell };
        let visible_row_count = visible_row_count(screen.height, cell.height);
        let rows_height = visible_row_count as f64 * cell.height;
        let next = Self {
            screen,
            cell,
            visible_row_count,
            top_margin: 0.0,
            bottom_margin: (screen.height - rows_height).max(0.0),
        };
        let changed = next != *self;
        *self = next;
        changed
    }

    #[must_use]
    pub const fn screen(&self) -> ScreenSize {
        self.screen
    }

    #[must_use]
    pub const fn cell(&self) -> CellSize {
        self.cell
    }

    #[must_use]
    pub const fn visible_row_count(&self) -> usize {
        self.visible_row_count
    }

    #[must_use]
    pub const fn top_margin(&self) -> f64 {
        self.top_margin
    }

    #[must_use]
    pub const fn bottom_margin(&self) -> f64 {
        self.bottom_margin
    }

    /// Height of the virtual scroll area that pretends to hold every row.
    #[must_use]
    pub fn scroll_height(&self, row_count: usize) -> f64 {
        self.cell.height * row_count as f64 + self.top_margin + self.bottom_margin
    }

    /// Height of the integral rows actually shown.
    #[must_use]
    pub fn visible_rows_height(&self) -> f64 {
        self.visible_row_count as f64 * self.cell.height
    }
}
