//! Unified error type for camtrack sessions

use camtrack_core::TrackingError;
use camtrack_media::CaptureError;
use thiserror::Error;

/// Message shown when the stream could not be brought up
pub const STREAM_INIT_FAILED: &str = "Could not initialize video stream.";

/// Errors surfaced by the camtrack facade
#[derive(Error, Debug)]
pub enum CamtrackError {
    /// Capture negotiation or acquisition failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Tracking or rendering failed
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// Session or global configuration is incomplete or invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong
        message: String,
    },

    /// The session's pipeline is no longer running
    #[error("Session closed")]
    SessionClosed,
}

/// Result alias for facade operations
pub type CamtrackResult<T> = Result<T, CamtrackError>;

impl CamtrackError {
    /// Missing builder input
    pub fn missing(field: &str) -> Self {
        CamtrackError::Configuration {
            message: format!("missing {}", field),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            CamtrackError::Capture(e) => e.is_recoverable(),
            CamtrackError::Tracking(e) => e.is_recoverable(),
            CamtrackError::Configuration { .. } => false,
            CamtrackError::SessionClosed => false,
        }
    }

    /// Text for the failed display state
    pub fn user_message(&self) -> String {
        match self {
            CamtrackError::Capture(CaptureError::PermissionDenied { .. }) => {
                "Camera access was denied.".to_string()
            }
            CamtrackError::Capture(CaptureError::NotSupported { .. }) => {
                "This device does not support camera capture.".to_string()
            }
            CamtrackError::Capture(_) => STREAM_INIT_FAILED.to_string(),
            CamtrackError::Tracking(e) => format!("{} ({})", STREAM_INIT_FAILED, e),
            CamtrackError::Configuration { message } => {
                format!("{} ({})", STREAM_INIT_FAILED, message)
            }
            CamtrackError::SessionClosed => "The session has ended.".to_string(),
        }
    }
}

/// Commands to a stopped pipeline mean the session is gone
pub(crate) fn command_error(error: TrackingError) -> CamtrackError {
    match error {
        TrackingError::ChannelClosed { .. } => CamtrackError::SessionClosed,
        other => CamtrackError::Tracking(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_user_messages() {
        let denied: CamtrackError = CaptureError::PermissionDenied {
            reason: "NotAllowedError".to_string(),
        }
        .into();
        assert_eq!(denied.user_message(), "Camera access was denied.");

        let exhausted: CamtrackError = CaptureError::AcquisitionExhausted { attempts: 7 }.into();
        assert_eq!(exhausted.user_message(), STREAM_INIT_FAILED);
        assert!(!exhausted.is_recoverable());

        let timeout: CamtrackError = CaptureError::ValidationTimeout {
            timeout: Duration::from_secs(10),
        }
        .into();
        assert!(timeout.is_recoverable());
    }

    #[test]
    fn test_closed_channel_maps_to_session_closed() {
        let err = command_error(TrackingError::ChannelClosed {
            channel: "pipeline commands".to_string(),
        });
        assert!(matches!(err, CamtrackError::SessionClosed));

        let err = command_error(TrackingError::OverlayAlreadyAttached);
        assert!(matches!(err, CamtrackError::Tracking(_)));
    }
}
