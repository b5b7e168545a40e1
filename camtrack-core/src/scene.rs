//! Scene-facing types: the opaque renderer, the background surface, the
//! overlay description and the authoritative scene state.

use crate::error::TrackingResult;
use crate::frame::{PixelBuffer, Transform};
use crate::tracker::TargetDescriptor;
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};

/// Focal length assumed until the tracker reports one
pub const DEFAULT_FOCAL: f64 = 320.0;

/// Vertical field of view in degrees for a viewport height and focal length
pub fn field_of_view(viewport_height: u32, focal: f64) -> f64 {
    2.0 * (viewport_height as f64 / 2.0).atan2(focal) * 180.0 / std::f64::consts::PI
}

/// Opaque 3D renderer owning all GPU specifics
pub trait Renderer: Send {
    /// Resize the drawing surface and camera aspect
    fn resize(&mut self, width: u32, height: u32) -> TrackingResult<()>;

    /// Update the camera's vertical field of view (degrees)
    fn set_field_of_view(&mut self, fov: f64) -> TrackingResult<()>;

    /// Set the overlay container's world matrix, row-major
    fn apply_transform(&mut self, matrix: &Transform) -> TrackingResult<()>;

    /// Show or hide the overlay container
    fn set_visible(&mut self, visible: bool) -> TrackingResult<()>;

    /// Add the overlay object to the scene
    fn add_overlay(&mut self, overlay: &OverlaySpec) -> TrackingResult<()>;

    /// Remove the overlay object from the scene
    fn remove_overlay(&mut self, overlay: &OverlaySpec) -> TrackingResult<()>;

    /// Draw the scene with the current camera and overlay state
    fn render(&mut self) -> TrackingResult<()>;
}

/// 2D surface the raw camera image is composited onto
pub trait BackgroundSurface: Send {
    /// Draw the frame at the given surface size
    fn composite(&mut self, pixels: &PixelBuffer, viewport: Viewport) -> TrackingResult<()>;
}

/// Overlay geometry registered to the trained target
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    /// Box width in scene units
    pub width: f64,
    /// Box height in scene units
    pub height: f64,
    /// Box depth in scene units
    pub depth: f64,
    /// RGB colour
    pub color: u32,
    /// Material opacity
    pub opacity: f32,
    /// Whether the renderer may cull the overlay
    pub frustum_culled: bool,
}

impl OverlaySpec {
    /// Flat translucent box covering the target, normalized to width 2
    pub fn for_target(target: &TargetDescriptor) -> Self {
        let width = target.width.max(1) as f64;
        Self {
            width: 2.0,
            height: 2.0 * target.height as f64 / width,
            depth: 0.001,
            color: 0xffff00,
            opacity: 0.5,
            frustum_culled: false,
        }
    }
}

/// What to do with a visible overlay when the target is not detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LostTargetPolicy {
    /// Leave the overlay at its last known pose
    KeepLastPose,
    /// Hide the overlay after this many consecutive frames without detection
    HideAfter {
        /// Consecutive missed frames, at least one
        frames: u32,
    },
}

impl Default for LostTargetPolicy {
    fn default() -> Self {
        Self::KeepLastPose
    }
}

/// Authoritative scene state, mutated only by the render synchronizer
#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    /// Viewport the renderer was last sized to
    pub viewport: Viewport,
    /// Focal length the current field of view was computed from
    pub focal: f64,
    /// Field of view pushed to the renderer, if any
    pub fov: Option<f64>,
    /// Last applied overlay transform
    pub transform: Option<Transform>,
    /// Overlay visibility
    pub visible: bool,
    /// Overlay added to the scene
    pub overlay_attached: bool,
    /// Consecutive frames without detection
    pub missed_frames: u32,
}

impl SceneState {
    /// Initial state before any surface is attached
    pub fn new(viewport: Viewport, focal: f64) -> Self {
        Self {
            viewport,
            focal,
            fov: None,
            transform: None,
            visible: false,
            overlay_attached: false,
            missed_frames: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_of_view() {
        // height/2 == focal gives a 90 degree vertical fov
        assert!((field_of_view(640, 320.0) - 90.0).abs() < 1e-9);
        let fov = field_of_view(480, 320.0);
        let expected = 2.0 * (240.0f64 / 320.0).atan().to_degrees();
        assert!((fov - expected).abs() < 1e-9);
    }

    #[test]
    fn test_overlay_for_target() {
        let overlay = OverlaySpec::for_target(&TargetDescriptor {
            width: 1920,
            height: 1080,
        });
        assert_eq!(overlay.width, 2.0);
        assert!((overlay.height - 1.125).abs() < 1e-12);
        assert_eq!(overlay.color, 0xffff00);
        assert!(!overlay.frustum_culled);
    }

    #[test]
    fn test_lost_target_policy_serde() {
        let policy: LostTargetPolicy =
            serde_json::from_str(r#"{"mode":"hide_after","frames":5}"#).unwrap();
        assert_eq!(policy, LostTargetPolicy::HideAfter { frames: 5 });
        let keep: LostTargetPolicy = serde_json::from_str(r#"{"mode":"keep_last_pose"}"#).unwrap();
        assert_eq!(keep, LostTargetPolicy::KeepLastPose);
    }
}
