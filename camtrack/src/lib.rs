//! # camtrack - Camera Tracking for Augmented Reality
//!
//! camtrack brings up a live camera stream under whatever constraints the
//! device can actually satisfy, feeds its frames to an image tracker and
//! keeps a 3D overlay aligned with the tracked target.
//!
//! ## Key Features
//!
//! - **Constraint Negotiation**: A deterministic fallback queue walks from
//!   the desired configuration down to "any video"
//! - **Validated Streams**: A stream only counts once it is actually playing
//! - **Ordered Rendering**: Tracker updates render in submission order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use camtrack::simulated::{
//!     RecordingBackground, RecordingRenderer, SimulatedCamera, SimulatedTracker,
//! };
//! use camtrack::{Camtrack, ReferenceImage, Viewport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let camtrack = Camtrack::init()?;
//!
//!     let session = camtrack
//!         .session()
//!         .viewport(Viewport::new(1280, 720))
//!         .device(Arc::new(SimulatedCamera::webcam()))
//!         .tracker(Box::new(SimulatedTracker::new(Vec::new())))
//!         .renderer(
//!             Box::new(RecordingRenderer::new()),
//!             Box::new(RecordingBackground::default()),
//!         )
//!         .start()
//!         .await?;
//!
//!     let image = ReferenceImage::new(2, 2, vec![0u8; 16])?;
//!     session.register_target(image).await?;
//!
//!     let mut events = session.events();
//!     while let Some(event) = events.next().await {
//!         println!("Session event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use camtrack_core::{
    field_of_view, LostTargetPolicy, Orientation, PipelineEvent, PipelineReport, PipelineStats,
    ReferenceImage, SceneState, TargetDescriptor, TrackingError, Transform, Viewport,
    ViewportEvent, DEFAULT_FOCAL, IDENTITY_TRANSFORM,
};
pub use camtrack_core::{BackgroundSurface, FrameSource, RepaintClock, Renderer, TrackingService};

pub use camtrack_media::{
    AcquisitionConfig, AcquisitionEvent, CaptureConfiguration, CaptureDevice, CaptureError,
    ConstraintRange, ConstraintValue, FacingMode, Platform, PlatformProfile, StreamElement,
    StreamMetadata, VideoConstraints, VideoElement, VideoRequest,
};

pub use camtrack_diagnostics::{AcquisitionReport, AttemptOutcome, AttemptRecord};

/// Simulated camera, tracker, renderer and clocks for tests and demos
pub mod simulated {
    pub use camtrack_core::simulated::*;
    pub use camtrack_core::IntervalClock;
    pub use camtrack_media::{CaptureMode, SimulatedCamera, SimulatedStream};
}

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod session;

// Re-export main API types
pub use config::{GlobalConfig, SessionConfig, TrackingConfig};
pub use error::{CamtrackError, CamtrackResult};
pub use event::{Event, EventFilter, EventStream, FilteredEventStream};
pub use session::{ArSession, DisplayState, SessionBuilder};

use camtrack_diagnostics::init_logging;
use std::sync::Arc;
use tracing::debug;

/// Main entry point for camtrack
#[derive(Debug, Clone)]
pub struct Camtrack {
    inner: Arc<CamtrackInner>,
}

#[derive(Debug)]
struct CamtrackInner {
    config: GlobalConfig,
}

impl Camtrack {
    /// Initialize camtrack with default settings
    ///
    /// # Example
    /// ```rust,no_run
    /// use camtrack::Camtrack;
    ///
    /// let camtrack = Camtrack::init()?;
    /// # Ok::<(), camtrack::CamtrackError>(())
    /// ```
    pub fn init() -> CamtrackResult<Self> {
        Self::init_with(GlobalConfig::default())
    }

    /// Initialize with custom global configuration
    ///
    /// With `debug_logging` set, a formatting subscriber is installed using
    /// `log_filter` unless `RUST_LOG` is set. An already installed
    /// subscriber is left alone.
    pub fn init_with(config: GlobalConfig) -> CamtrackResult<Self> {
        if config.debug_logging {
            let installed =
                init_logging(&config.log_filter).map_err(|e| CamtrackError::Configuration {
                    message: e.to_string(),
                })?;
            if !installed {
                debug!("Log subscriber already installed");
            }
        }

        Ok(Self {
            inner: Arc::new(CamtrackInner { config }),
        })
    }

    /// Global configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Create a session builder
    ///
    /// # Example
    /// ```rust,no_run
    /// use camtrack::simulated::{
    ///     RecordingBackground, RecordingRenderer, SimulatedCamera, SimulatedTracker,
    /// };
    /// use camtrack::{Camtrack, Viewport};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> Result<(), camtrack::CamtrackError> {
    /// let camtrack = Camtrack::init()?;
    /// let session = camtrack
    ///     .session()
    ///     .viewport(Viewport::new(1920, 1080))
    ///     .device(Arc::new(SimulatedCamera::webcam()))
    ///     .tracker(Box::new(SimulatedTracker::new(Vec::new())))
    ///     .renderer(
    ///         Box::new(RecordingRenderer::new()),
    ///         Box::new(RecordingBackground::default()),
    ///     )
    ///     .start()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn session(&self) -> SessionBuilder {
        SessionBuilder::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_defaults() {
        let camtrack = Camtrack::init().unwrap();
        assert!(!camtrack.config().debug_logging);

        let builder = camtrack.session();
        assert!(format!("{:?}", builder).contains("SessionBuilder"));
    }

    #[test]
    fn test_init_with_debug_logging_twice() {
        let config = GlobalConfig {
            debug_logging: true,
            ..Default::default()
        };
        assert!(Camtrack::init_with(config.clone()).is_ok());
        assert!(Camtrack::init_with(config).is_ok());
    }
}
