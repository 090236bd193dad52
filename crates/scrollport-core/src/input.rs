#![forbid(unsafe_code)]

//! Input normalization for the scroll port.
//!
//! The host hands over raw wheel, touch, paste, drop and focus events as
//! [`HostInput`]. This module reduces every one of them to a small set of
//! [`Intent`] values so the scroll and paste logic never sees event shapes:
//!
//! - wheel deltas in pixel, line or page units become a pixel
//!   [`PixelDelta`] and then an offset move,
//! - touch moves are summed across every changed touch point,
//! - paste and drop payloads become paste text, or nothing when empty.
//!
//! [`HostInput`] also has a stable JSON encoding for record/replay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::{CellSize, ScreenSize, ViewportGeometry};

/// MIME type accepted from drag-and-drop payloads.
pub const PLAIN_TEXT_MIME: &str = "text/plain";

// ---------------------------------------------------------------------------
// Wheel
// ---------------------------------------------------------------------------

/// Unit of a raw wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaMode {
    Pixel,
    Line,
    Page,
}

/// Raw wheel event as reported by the host.
///
/// Positive `delta_y` follows the host convention (content moves up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    pub mode: DeltaMode,
}

/// Normalized wheel delta in pixels. Positive `y` scrolls up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelDelta {
    pub x: f64,
    pub y: f64,
}

/// Everything needed to turn wheel units into pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelScale {
    /// Multiplier for pixel-mode deltas.
    pub multiplier: f64,
    /// Size of one line unit.
    pub cell: CellSize,
    /// Size of one page unit.
    pub page: ScreenSize,
}

impl WheelScale {
    /// Scale derived from the current viewport geometry.
    #[must_use]
    pub fn from_geometry(geo: &ViewportGeometry, multiplier: f64) -> Self {
        Self {
            multiplier,
            cell: geo.cell(),
            page: geo.screen(),
        }
    }
}

/// Convert a raw wheel event into pixels, inverting the vertical sign.
#[must_use]
pub fn normalize_wheel_delta(event: &WheelInput, scale: &WheelScale) -> PixelDelta {
    let (x, y) = match event.mode {
        DeltaMode::Pixel => (
            event.delta_x * scale.multiplier,
            event.delta_y * scale.multiplier,
        ),
        DeltaMode::Line => (
            event.delta_x * scale.cell.width,
            event.delta_y * scale.cell.height,
        ),
        DeltaMode::Page => (
            event.delta_x * scale.page.width,
            event.delta_y * scale.page.height,
        ),
    };
    PixelDelta { x, y: -y }
}

// ---------------------------------------------------------------------------
// Touch
// ---------------------------------------------------------------------------

/// Phase for touch events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

/// A touch event carrying the touch points that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchInput {
    pub phase: TouchPhase,
    pub touches: Vec<TouchPoint>,
}

/// Last known position per active touch identifier.
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    last: BTreeMap<u32, (f64, f64)>,
}

impl TouchTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of touches currently tracked.
    #[must_use]
    pub fn active(&self) -> usize {
        self.last.len()
    }

    /// Last recorded position of a touch.
    #[must_use]
    pub fn position(&self, id: u32) -> Option<(f64, f64)> {
        self.last.get(&id).copied()
    }

    /// Feed one touch event.
    ///
    /// Returns the scroll offset delta for a move (positive scrolls down), and
    /// `None` for every other phase. Simultaneous touches add up, so two
    /// fingers scroll twice as fast. A move for an id that never started is
    /// recorded but contributes nothing.
    pub fn handle(&mut self, event: &TouchInput) -> Option<f64> {
        match event.phase {
            TouchPhase::Start => {
                for touch in &event.touches {
                    self.last.insert(touch.id, (touch.x, touch.y));
                }
                None
            }
            TouchPhase::End | TouchPhase::Cancel => {
                for touch in &event.touches {
                    self.last.remove(&touch.id);
                }
                None
            }
            TouchPhase::Move => {
                let mut moved = 0.0;
                for touch in &event.touches {
                    if let Some((_, last_y)) = self.last.insert(touch.id, (touch.x, touch.y)) {
                        moved += touch.y - last_y;
                    } else {
                        trace!(
                            target: "scrollport::input",
                            touch_id = touch.id,
                            "move for untracked touch"
                        );
                    }
                }
                Some(-moved)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Host events and intents
// ---------------------------------------------------------------------------

/// One item of a drag-and-drop payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropItem {
    pub mime: String,
    pub data: String,
}

/// Raw host input routed to the scroll port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostInput {
    Wheel(WheelInput),
    Touch(TouchInput),
    Paste {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Drop {
        items: Vec<DropItem>,
    },
    Focus,
}

impl HostInput {
    /// Encode this event as a stable JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a previously encoded event.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// What a host input asks the scroll port to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Move the scroll offset by this many pixels (positive = down).
    ScrollBy { pixels: f64 },
    /// Publish pasted text.
    Paste { text: String },
    /// Publish a focus notification.
    Focus,
}

/// Stateful normalizer: owns the touch tracker and the drop policy.
#[derive(Debug, Clone, Default)]
pub struct InputNormalizer {
    touch: TouchTracker,
    paste_on_drop: bool,
}

impl InputNormalizer {
    #[must_use]
    pub fn new(paste_on_drop: bool) -> Self {
        Self {
            touch: TouchTracker::new(),
            paste_on_drop,
        }
    }

    pub fn set_paste_on_drop(&mut self, enabled: bool) {
        self.paste_on_drop = enabled;
    }

    #[must_use]
    pub fn touch(&self) -> &TouchTracker {
        &self.touch
    }

    /// Reduce one host input to an intent, or nothing.
    pub fn normalize(&mut self, input: &HostInput, scale: &WheelScale) -> Option<Intent> {
        match input {
            HostInput::Wheel(wheel) => {
                let delta = normalize_wheel_delta(wheel, scale);
                scroll_intent(-delta.y)
            }
            HostInput::Touch(touch) => self.touch.handle(touch).and_then(scroll_intent),
            HostInput::Paste { text } => paste_intent(text.as_deref()),
            HostInput::Drop { items } => {
                if !self.paste_on_drop {
                    return None;
                }
                let text = items
                    .iter()
                    .find(|item| item.mime == PLAIN_TEXT_MIME)
                    .map(|item| item.data.as_str());
                paste_intent(text)
            }
            HostInput::Focus => Some(Intent::Focus),
        }
    }
}

fn scroll_intent(pixels: f64) -> Option<Intent> {
    (pixels != 0.0 && pixels.is_finite()).then_some(Intent::ScrollBy { pixels })
}

fn paste_intent(text: Option<&str>) -> Option<Intent> {
    let text = text.filter(|t| !t.is_empty())?;
    Some(Intent::Paste {
        text: text.to_string(),
    })
}
