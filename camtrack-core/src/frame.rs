//! Frame types exchanged between the capture source, the tracker and the renderer

use bytes::Bytes;

/// Target identifier reported when nothing was detected
pub const NO_TARGET: i32 = -1;

/// Row-major 4x4 homogeneous rototranslation
pub type Transform = [f64; 16];

/// Identity transform
pub const IDENTITY_TRANSFORM: Transform = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Raw RGBA pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA data, row-major, 4 bytes per pixel
    pub data: Bytes,
}

impl PixelBuffer {
    /// Bytes per RGBA pixel
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Create a buffer, checking that the data matches the dimensions
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> Option<Self> {
        let data = data.into();
        if data.len() != Self::expected_len(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Fully transparent black buffer
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Bytes::from(vec![0u8; Self::expected_len(width, height)]),
        }
    }

    /// Expected data length for the given dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }

    /// Check whether the buffer holds any pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One tracker update
#[derive(Debug, Clone)]
pub struct TrackingFrame {
    /// Raw camera frame the update was computed on
    pub pixels: PixelBuffer,
    /// Detected target, or [`NO_TARGET`]
    pub target_id: i32,
    /// Pose of the target relative to the camera
    pub transform: Transform,
    /// Focal length in pixels
    pub focal: f64,
}

impl TrackingFrame {
    /// Frame carrying a valid detection
    pub fn detected(pixels: PixelBuffer, target_id: i32, transform: Transform, focal: f64) -> Self {
        Self {
            pixels,
            target_id,
            transform,
            focal,
        }
    }

    /// Frame without a detection
    pub fn lost(pixels: PixelBuffer, focal: f64) -> Self {
        Self {
            pixels,
            target_id: NO_TARGET,
            transform: IDENTITY_TRANSFORM,
            focal,
        }
    }

    /// Whether the tracker found the target in this frame
    pub fn is_detected(&self) -> bool {
        self.target_id != NO_TARGET
    }
}
