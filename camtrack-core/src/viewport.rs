//! Viewport dimensions and orientation bookkeeping

use serde::{Deserialize, Serialize};

/// Device orientation derived from the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide
    Portrait,
    /// Wider than tall, or square
    Landscape,
}

/// Current pixel dimensions of the display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Orientation implied by the dimensions
    pub fn orientation(&self) -> Orientation {
        if self.height > self.width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    /// Check for portrait orientation
    pub fn is_portrait(&self) -> bool {
        self.orientation() == Orientation::Portrait
    }

    /// Width over height
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Check for a degenerate surface
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Window-level signals that trigger a resize pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportEvent {
    /// Window was resized
    Resized(Viewport),
    /// Device orientation changed
    OrientationChanged(Viewport),
}

impl ViewportEvent {
    /// Viewport carried by the event
    pub fn viewport(&self) -> Viewport {
        match self {
            ViewportEvent::Resized(viewport) | ViewportEvent::OrientationChanged(viewport) => {
                *viewport
            }
        }
    }
}
