#![forbid(unsafe_code)]

//! Host-facing configuration.
//!
//! Stored as JSON. Unknown fields are rejected so a typo in a hand-edited
//! file surfaces instead of silently falling back to a default.

use std::fmt;
use std::io;
use std::path::Path;

use scrollport_core::FontSpec;
use serde::{Deserialize, Serialize};

/// Width reserved for a visible scrollbar, in CSS pixels.
pub const DEFAULT_SCROLLBAR_WIDTH: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrollPortConfig {
    pub font: FontSpec,
    pub foreground_color: String,
    pub background_color: String,
    pub background_image: Option<String>,
    pub user_css_url: Option<String>,
    pub user_css_text: Option<String>,
    pub scrollbar_visible: bool,
    pub scrollbar_width: f64,
    /// Multiplier applied to pixel-mode wheel deltas.
    pub scroll_wheel_multiplier: f64,
    /// Whether Ctrl+V pastes instead of reaching the application.
    pub ctrl_v_paste: bool,
    /// Whether dropped `text/plain` is treated as a paste.
    pub paste_on_drop: bool,
}

impl Default for ScrollPortConfig {
    fn default() -> Self {
        Self {
            font: FontSpec::default(),
            foreground_color: "rgb(240, 240, 240)".to_string(),
            background_color: "rgb(16, 16, 16)".to_string(),
            background_image: None,
            user_css_url: None,
            user_css_text: None,
            scrollbar_visible: true,
            scrollbar_width: DEFAULT_SCROLLBAR_WIDTH,
            scroll_wheel_multiplier: 1.0,
            ctrl_v_paste: false,
            paste_on_drop: true,
        }
    }
}

impl ScrollPortConfig {
    /// Width the scrollbar takes from the screen, 0 when hidden.
    #[must_use]
    pub fn effective_scrollbar_width(&self) -> f64 {
        if self.scrollbar_visible {
            self.scrollbar_width.max(0.0)
        } else {
            0.0
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Write a config file, replacing any existing one.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.to_json_string()?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

// ── Error Types ─────────────────────────────────────────────────────────

/// Errors from loading or saving configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Json(e) => write!(f, "config JSON error: {e}"),
        }
    }
}

// ── std::error::Error ───────────────────────────────────────────────────

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────────

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
