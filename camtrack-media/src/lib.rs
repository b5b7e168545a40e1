//! # camtrack media
//!
//! Capture side of camtrack: the constraint model, deterministic fallback
//! negotiation, platform quirks and the sequential stream acquirer that
//! turns a desired configuration into a validated, playing video source.

#![warn(clippy::all)]

pub mod acquisition;
pub mod constraints;
pub mod element;
pub mod error;
#[cfg(feature = "native-camera")]
pub mod native;
pub mod negotiation;
pub mod platform;
pub mod simulated;

// Re-export main types
pub use acquisition::{
    AcquisitionConfig, AcquisitionEvent, AcquisitionMetrics, AcquisitionState, CaptureDevice,
    StreamAcquirer, VideoSource,
};
pub use constraints::{
    aspect_ratio, CaptureConfiguration, ConstraintRange, ConstraintValue, FacingMode,
    VideoConstraints, VideoRequest,
};
pub use element::{
    MediaStream, PlaybackAttributes, StreamElement, StreamMetadata, StreamSettings, VideoElement,
};
pub use error::{CaptureError, CaptureResult, ErrorCategory};
#[cfg(feature = "native-camera")]
pub use native::{NativeCamera, NativeStream};
pub use negotiation::{
    aspect_band, build_fallbacks, closest_standard_resolutions, CandidateQueue,
    STANDARD_RESOLUTIONS,
};
pub use platform::{Platform, PlatformProfile};
pub use simulated::{CaptureMode, SimulatedCamera, SimulatedStream};
