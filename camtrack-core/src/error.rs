//! Error types for the tracking and render synchronization core

use thiserror::Error;

/// Main error type for tracking and rendering operations
#[derive(Error, Debug)]
pub enum TrackingError {
    /// The tracking service was used before it signalled readiness
    #[error("Tracker not initialized: cannot {operation} before the tracking service is ready")]
    TrackerUninitialized {
        /// Operation that was attempted
        operation: String,
    },

    /// A reference target was already trained for this session
    #[error("Target already registered ({width}x{height})")]
    TargetAlreadyRegistered {
        /// Width of the registered target
        width: u32,
        /// Height of the registered target
        height: u32,
    },

    /// Reference image cannot be used as a target
    #[error("Invalid target image: {reason}")]
    InvalidTarget {
        /// Reason the image was rejected
        reason: String,
    },

    /// Opaque failure reported by the tracking service
    #[error("Tracking service error: {reason}")]
    Tracker {
        /// Reason reported by the service
        reason: String,
    },

    /// Opaque failure reported by the renderer or background surface
    #[error("Renderer error: {reason}")]
    Renderer {
        /// Reason reported by the renderer
        reason: String,
    },

    /// Overlay was already added to the scene
    #[error("Overlay already attached to the scene")]
    OverlayAlreadyAttached,

    /// Invalid state for operation
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// A channel between pipeline components was closed
    #[error("Channel closed: {channel}")]
    ChannelClosed {
        /// Channel name
        channel: String,
    },
}

/// Result type alias for tracking operations
pub type TrackingResult<T> = Result<T, TrackingError>;

impl TrackingError {
    /// Check if error is recoverable
    ///
    /// Collaborator failures are opaque and may clear on the next frame.
    /// Invariant violations (using the tracker before it is ready, adding
    /// the overlay twice) are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TrackingError::Tracker { .. } => true,
            TrackingError::Renderer { .. } => true,
            TrackingError::TrackerUninitialized { .. } => false,
            TrackingError::TargetAlreadyRegistered { .. } => false,
            TrackingError::InvalidTarget { .. } => false,
            TrackingError::OverlayAlreadyAttached => false,
            TrackingError::InvalidState { .. } => false,
            TrackingError::ChannelClosed { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackingError::TrackerUninitialized { .. } => ErrorCategory::Invariant,
            TrackingError::TargetAlreadyRegistered { .. } => ErrorCategory::Invariant,
            TrackingError::OverlayAlreadyAttached => ErrorCategory::Invariant,
            TrackingError::InvalidTarget { .. } => ErrorCategory::Data,
            TrackingError::Tracker { .. } => ErrorCategory::External,
            TrackingError::Renderer { .. } => ErrorCategory::External,
            TrackingError::InvalidState { .. } => ErrorCategory::State,
            TrackingError::ChannelClosed { .. } => ErrorCategory::State,
        }
    }

    /// Shorthand for an uninitialized-tracker violation
    pub fn uninitialized(operation: &str) -> Self {
        TrackingError::TrackerUninitialized {
            operation: operation.to_string(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Programming invariant violated by the caller
    Invariant,
    /// Input data was unusable
    Data,
    /// Opaque failure of an external collaborator
    External,
    /// Component was in the wrong state
    State,
}
