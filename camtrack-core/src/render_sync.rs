//! Turns tracker updates into renderer state
//!
//! Every update composites the camera image onto the background surface.
//! Valid detections additionally refresh the field of view when the focal
//! length changed, apply the reported transform verbatim and show the
//! overlay. Frames without a detection never touch the transform or the
//! field of view; what happens to a visible overlay is governed by
//! [`LostTargetPolicy`].

use crate::error::{TrackingError, TrackingResult};
use crate::frame::TrackingFrame;
use crate::scene::{
    field_of_view, BackgroundSurface, LostTargetPolicy, OverlaySpec, Renderer, SceneState,
};
use crate::viewport::Viewport;
use tracing::{debug, info};

/// Result of applying one tracker update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome {
    /// Background composited; pipeline not ready to pose the overlay
    BackgroundOnly,
    /// Pose applied for a detected target
    Posed {
        /// Detected target
        target_id: i32,
        /// New field of view, when the focal length changed
        fov_changed: Option<f64>,
    },
    /// No detection in this frame
    NoDetection {
        /// Overlay was hidden by the lost-target policy
        hidden: bool,
    },
}

/// Render synchronizer owning the renderer, the background surface and the scene state
pub struct RenderSync {
    renderer: Box<dyn Renderer>,
    background: Box<dyn BackgroundSurface>,
    state: SceneState,
    policy: LostTargetPolicy,
    overlay: Option<OverlaySpec>,
    surface_attached: bool,
}

impl std::fmt::Debug for RenderSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSync")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("surface_attached", &self.surface_attached)
            .finish()
    }
}

impl RenderSync {
    /// Create a synchronizer; nothing is pushed to the renderer until the
    /// surface is attached
    pub fn new(
        renderer: Box<dyn Renderer>,
        background: Box<dyn BackgroundSurface>,
        viewport: Viewport,
        initial_focal: f64,
    ) -> Self {
        Self {
            renderer,
            background,
            state: SceneState::new(viewport, initial_focal),
            policy: LostTargetPolicy::default(),
            overlay: None,
            surface_attached: false,
        }
    }

    /// Set the lost-target policy
    pub fn with_policy(mut self, policy: LostTargetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Size the render surface and push the initial field of view
    pub fn attach_surface(&mut self, viewport: Viewport) -> TrackingResult<()> {
        if self.surface_attached {
            return Err(TrackingError::InvalidState {
                expected: "surface detached".to_string(),
                actual: "surface attached".to_string(),
            });
        }

        self.renderer.resize(viewport.width, viewport.height)?;
        let fov = field_of_view(viewport.height, self.state.focal);
        self.renderer.set_field_of_view(fov)?;

        self.state.viewport = viewport;
        self.state.fov = Some(fov);
        self.surface_attached = true;
        info!("Render surface attached at {} (fov {:.2})", viewport, fov);
        Ok(())
    }

    /// Resize pass. Returns false when the dimensions did not change.
    pub fn resize(&mut self, viewport: Viewport) -> TrackingResult<bool> {
        if viewport == self.state.viewport {
            return Ok(false);
        }

        let height_changed = viewport.height != self.state.viewport.height;
        self.state.viewport = viewport;
        if !self.surface_attached {
            return Ok(true);
        }

        self.renderer.resize(viewport.width, viewport.height)?;
        if height_changed {
            let fov = field_of_view(viewport.height, self.state.focal);
            self.renderer.set_field_of_view(fov)?;
            self.state.fov = Some(fov);
        }
        debug!("Renderer resized to {}", viewport);
        Ok(true)
    }

    /// Add the overlay to the scene. Allowed exactly once.
    pub fn add_overlay(&mut self, overlay: OverlaySpec) -> TrackingResult<()> {
        if self.overlay.is_some() {
            return Err(TrackingError::OverlayAlreadyAttached);
        }
        if !self.surface_attached {
            return Err(TrackingError::InvalidState {
                expected: "surface attached".to_string(),
                actual: "surface detached".to_string(),
            });
        }

        self.renderer.add_overlay(&overlay)?;
        self.overlay = Some(overlay);
        self.state.overlay_attached = true;
        info!("Overlay added to scene");
        Ok(())
    }

    /// Apply one tracker update
    pub fn apply(&mut self, frame: &TrackingFrame) -> TrackingResult<RenderOutcome> {
        self.background
            .composite(&frame.pixels, self.state.viewport)?;

        if !self.state.overlay_attached {
            return Ok(RenderOutcome::BackgroundOnly);
        }

        if !frame.is_detected() {
            return self.apply_lost();
        }

        let mut fov_changed = None;
        if frame.focal != self.state.focal {
            let fov = field_of_view(self.state.viewport.height, frame.focal);
            self.renderer.set_field_of_view(fov)?;
            self.state.focal = frame.focal;
            self.state.fov = Some(fov);
            fov_changed = Some(fov);
            debug!("Focal changed to {:.2}, fov {:.2}", frame.focal, fov);
        }

        self.renderer.apply_transform(&frame.transform)?;
        self.state.transform = Some(frame.transform);
        self.state.missed_frames = 0;
        if !self.state.visible {
            self.renderer.set_visible(true)?;
            self.state.visible = true;
        }
        self.renderer.render()?;

        debug!("Detected target: {}", frame.target_id);
        Ok(RenderOutcome::Posed {
            target_id: frame.target_id,
            fov_changed,
        })
    }

    fn apply_lost(&mut self) -> TrackingResult<RenderOutcome> {
        self.state.missed_frames = self.state.missed_frames.saturating_add(1);

        let mut hidden = false;
        if let LostTargetPolicy::HideAfter { frames } = self.policy {
            if self.state.visible && self.state.missed_frames >= frames.max(1) {
                self.renderer.set_visible(false)?;
                self.renderer.render()?;
                self.state.visible = false;
                hidden = true;
                debug!(
                    "Overlay hidden after {} frames without detection",
                    self.state.missed_frames
                );
            }
        }

        Ok(RenderOutcome::NoDetection { hidden })
    }

    /// Remove the overlay from the scene on teardown
    pub fn detach(&mut self) -> TrackingResult<()> {
        if let Some(overlay) = self.overlay.take() {
            self.renderer.remove_overlay(&overlay)?;
            self.state.overlay_attached = false;
            self.state.visible = false;
            info!("Overlay removed from scene");
        }
        Ok(())
    }

    /// Current scene state
    pub fn state(&self) -> &SceneState {
        &self.state
    }

    /// Whether the surface has been attached
    pub fn is_surface_attached(&self) -> bool {
        self.surface_attached
    }
}
