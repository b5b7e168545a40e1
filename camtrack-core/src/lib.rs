//! # camtrack core
//!
//! Tracking and render synchronization for camera-based augmented reality.
//! Video frames are fed to an opaque pose tracker on every repaint; its
//! asynchronous updates are turned into a consistent camera projection,
//! overlay transform and overlay visibility.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod pipeline;
pub mod readiness;
pub mod render_sync;
pub mod scene;
pub mod scheduler;
pub mod session;
pub mod simulated;
pub mod tracker;
pub mod viewport;

pub use error::{ErrorCategory, TrackingError, TrackingResult};
pub use frame::{PixelBuffer, TrackingFrame, Transform, IDENTITY_TRANSFORM, NO_TARGET};
pub use pipeline::{
    PipelineCommand, PipelineEvent, PipelineHandle, PipelineReport, PipelineStats,
    TrackingPipeline,
};
pub use readiness::{Readiness, ReadinessTransition};
pub use render_sync::{RenderOutcome, RenderSync};
pub use scene::{
    field_of_view, BackgroundSurface, LostTargetPolicy, OverlaySpec, Renderer, SceneState,
    DEFAULT_FOCAL,
};
pub use scheduler::{FrameScheduler, IntervalClock, RepaintClock, SchedulerStats};
pub use session::{SessionPhase, TrackingSession};
pub use tracker::{
    FrameSource, ReferenceImage, TargetDescriptor, TrackingService, UpdateReceiver, UpdateSink,
};
pub use viewport::{Orientation, Viewport, ViewportEvent};
