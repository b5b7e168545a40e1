//! Capture error types
//!
//! Capture-layer failures are handled by the acquisition state machine;
//! only permission denial, missing platform support and exhaustion of the
//! candidate queue reach the caller.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while opening and validating a capture stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The platform exposes no capture API
    #[error("Media capture is not supported: {reason}")]
    NotSupported {
        /// Why capture is unavailable
        reason: String,
    },

    /// The user declined camera access
    #[error("Camera permission denied: {reason}")]
    PermissionDenied {
        /// Reason reported by the device
        reason: String,
    },

    /// The device cannot honor a configuration
    #[error("Constraint not satisfiable ({constraint}): {reason}")]
    ConstraintUnsatisfiable {
        /// Constraint that failed, e.g. `width`
        constraint: String,
        /// Failure reason
        reason: String,
    },

    /// No device matched the requested id
    #[error("Capture device not found: {device_id}")]
    DeviceNotFound {
        /// Requested device
        device_id: String,
    },

    /// The stream never reached a playable state
    #[error("Stream validation timed out after {timeout:?}")]
    ValidationTimeout {
        /// Configured limit
        timeout: Duration,
    },

    /// The stream ended or misbehaved during validation
    #[error("Stream validation failed: {reason}")]
    Validation {
        /// Failure reason
        reason: String,
    },

    /// Every candidate configuration failed
    #[error("No compatible capture configuration found after {attempts} attempts")]
    AcquisitionExhausted {
        /// Attempts made, including the desired configuration
        attempts: u32,
    },

    /// A configuration could not be parsed or is meaningless
    #[error("Invalid capture configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result alias for capture operations
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

impl CaptureError {
    /// Check if error is recoverable by trying another candidate
    pub fn is_recoverable(&self) -> bool {
        match self {
            CaptureError::ConstraintUnsatisfiable { .. } => true,
            CaptureError::DeviceNotFound { .. } => true,
            CaptureError::ValidationTimeout { .. } => true,
            CaptureError::Validation { .. } => true,
            CaptureError::NotSupported { .. } => false,
            CaptureError::PermissionDenied { .. } => false,
            CaptureError::AcquisitionExhausted { .. } => false,
            CaptureError::InvalidConfiguration { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CaptureError::PermissionDenied { .. } => ErrorCategory::Permission,
            CaptureError::ConstraintUnsatisfiable { .. } => ErrorCategory::Constraint,
            CaptureError::DeviceNotFound { .. } => ErrorCategory::Device,
            CaptureError::ValidationTimeout { .. } => ErrorCategory::Validation,
            CaptureError::Validation { .. } => ErrorCategory::Validation,
            CaptureError::NotSupported { .. } => ErrorCategory::Platform,
            CaptureError::AcquisitionExhausted { .. } => ErrorCategory::Terminal,
            CaptureError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Stable short name, used as a metrics key
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::NotSupported { .. } => "not_supported",
            CaptureError::PermissionDenied { .. } => "permission_denied",
            CaptureError::ConstraintUnsatisfiable { .. } => "constraint_unsatisfiable",
            CaptureError::DeviceNotFound { .. } => "device_not_found",
            CaptureError::ValidationTimeout { .. } => "validation_timeout",
            CaptureError::Validation { .. } => "validation",
            CaptureError::AcquisitionExhausted { .. } => "acquisition_exhausted",
            CaptureError::InvalidConfiguration { .. } => "invalid_configuration",
        }
    }

    /// Whether this is a user permission denial
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied { .. })
    }

    /// Shorthand for an unsatisfiable constraint
    pub fn unsatisfiable(constraint: &str, reason: impl Into<String>) -> Self {
        CaptureError::ConstraintUnsatisfiable {
            constraint: constraint.to_string(),
            reason: reason.into(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User consent
    Permission,
    /// Device capabilities
    Constraint,
    /// Device selection
    Device,
    /// Stream playback
    Validation,
    /// Platform capability
    Platform,
    /// Acquisition gave up
    Terminal,
    /// Caller input
    Configuration,
}
