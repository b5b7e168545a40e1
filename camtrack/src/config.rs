//! Configuration types and defaults

use crate::error::{CamtrackError, CamtrackResult};
use camtrack_core::{LostTargetPolicy, Viewport, DEFAULT_FOCAL};
use camtrack_diagnostics::DEFAULT_LOG_FILTER;
use camtrack_media::{AcquisitionConfig, CaptureConfiguration, PlatformProfile};
use serde::{Deserialize, Serialize};

/// Global camtrack configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Install the fmt log subscriber on init
    pub debug_logging: bool,
    /// Filter directives used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Tracking pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Focal length assumed before the tracker reports one
    pub initial_focal: f64,
    /// Tracker updates allowed in flight
    pub update_capacity: usize,
    /// Repaint ticks per second
    pub repaint_fps: u32,
    /// Longest side of a reference image before training
    pub target_max_dimension: u32,
    /// Overlay behaviour while the target is not detected
    pub lost_target: LostTargetPolicy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            initial_focal: DEFAULT_FOCAL,
            update_capacity: 1,
            repaint_fps: 60,
            target_max_dimension: 1920,
            lost_target: LostTargetPolicy::default(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Desired capture configuration; derived from the viewport when absent
    pub capture: Option<CaptureConfiguration>,
    /// Acquisition settings
    pub acquisition: AcquisitionConfig,
    /// Tracking settings
    pub tracking: TrackingConfig,
}

impl SessionConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> CamtrackResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CamtrackError::Configuration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> CamtrackResult<()> {
        if self.tracking.update_capacity == 0 {
            return Err(CamtrackError::Configuration {
                message: "tracking.update_capacity must be at least 1".to_string(),
            });
        }
        if self.tracking.repaint_fps == 0 {
            return Err(CamtrackError::Configuration {
                message: "tracking.repaint_fps must be at least 1".to_string(),
            });
        }
        if self.tracking.initial_focal.is_nan() || self.tracking.initial_focal <= 0.0 {
            return Err(CamtrackError::Configuration {
                message: "tracking.initial_focal must be positive".to_string(),
            });
        }
        if let LostTargetPolicy::HideAfter { frames: 0 } = self.tracking.lost_target {
            return Err(CamtrackError::Configuration {
                message: "lost_target.frames must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Desired capture configuration for a viewport and platform
    pub fn desired_capture(
        &self,
        viewport: Viewport,
        profile: &PlatformProfile,
    ) -> CaptureConfiguration {
        self.capture
            .clone()
            .unwrap_or_else(|| CaptureConfiguration::for_viewport(viewport, profile))
    }
}
