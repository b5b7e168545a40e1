//! Platform detection and capture quirks

use crate::constraints::{
    CaptureConfiguration, ConstraintValue, FacingMode, VideoConstraints, VideoRequest,
};
use camtrack_core::{Orientation, Viewport};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frame rate pinned on iOS, where low light otherwise drops it
pub const IOS_FRAME_RATE: f64 = 60.0;

/// Host platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// iPhone, iPad, iPod
    Ios,
    /// Android phones and tablets
    Android,
    /// Everything else
    Desktop,
}

/// What the acquisition engine knows about the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Platform family
    pub platform: Platform,
    /// Current device orientation
    pub orientation: Orientation,
    /// Whether a capture API is present at all
    pub media_devices_available: bool,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::desktop()
    }
}

impl PlatformProfile {
    /// Landscape desktop with a capture API
    pub fn desktop() -> Self {
        Self {
            platform: Platform::Desktop,
            orientation: Orientation::Landscape,
            media_devices_available: true,
        }
    }

    /// Detect from a user-agent string and the current viewport
    pub fn detect(user_agent: &str, viewport: Viewport) -> Self {
        let platform = if ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device))
        {
            Platform::Ios
        } else if user_agent.contains("Android") {
            Platform::Android
        } else {
            Platform::Desktop
        };

        Self {
            platform,
            orientation: viewport.orientation(),
            media_devices_available: true,
        }
    }

    /// Mark the capture API as missing
    pub fn without_media_devices(mut self) -> Self {
        self.media_devices_available = false;
        self
    }

    /// Same profile in another orientation
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Check for iOS
    pub fn is_ios(&self) -> bool {
        self.platform == Platform::Ios
    }

    /// Check for portrait orientation
    pub fn is_portrait(&self) -> bool {
        self.orientation == Orientation::Portrait
    }

    /// Apply platform quirks to a desired configuration
    ///
    /// On iOS in portrait, a configuration whose preferred width exceeds its
    /// height is swapped, since the stream follows the device orientation.
    /// iOS also gets its frame rate pinned. Other platforms are unchanged.
    pub fn apply_quirks(&self, config: &CaptureConfiguration) -> CaptureConfiguration {
        if !self.is_ios() || !config.video.is_enabled() {
            return config.clone();
        }

        let mut video = config.video_constraints().cloned().unwrap_or_default();

        if self.is_portrait() {
            if let (Some(width), Some(height)) = (video.width, video.height) {
                let preferred = match (width, height) {
                    (ConstraintValue::Exact(w), ConstraintValue::Exact(h)) => Some((w, h)),
                    (ConstraintValue::Range(_), ConstraintValue::Range(_)) => {
                        width.ideal().zip(height.ideal())
                    }
                    _ => None,
                };
                if matches!(preferred, Some((w, h)) if w > h) {
                    debug!("Swapping capture dimensions for portrait iOS");
                    video = video.swapped();
                }
            }
        }

        video.frame_rate = Some(ConstraintValue::Exact(IOS_FRAME_RATE));
        config.with_video_constraints(video)
    }
}

impl CaptureConfiguration {
    /// Default desired configuration for a viewport
    ///
    /// The rear camera at the viewport's landscape resolution. iOS leaves the
    /// resolution to the device and asks for 60 fps instead.
    pub fn for_viewport(viewport: Viewport, profile: &PlatformProfile) -> Self {
        let mut video = VideoConstraints {
            facing_mode: Some(FacingMode::Environment),
            ..Default::default()
        };

        if profile.is_ios() {
            video.frame_rate = Some(ConstraintValue::Exact(IOS_FRAME_RATE));
        } else {
            let (width, height) = if profile.is_portrait() {
                (viewport.height, viewport.width)
            } else {
                (viewport.width, viewport.height)
            };
            video.width = Some(ConstraintValue::pinned(width));
            video.height = Some(ConstraintValue::pinned(height));
        }

        Self {
            audio: false,
            video: VideoRequest::constrained(video),
            device_id: None,
        }
    }
}
