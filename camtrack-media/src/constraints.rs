//! Capture constraint data model
//!
//! Configurations serialize in the media-constraints JSON shape: exact
//! values are bare numbers, ranges are `{min, max, ideal}` objects and the
//! video request is either a boolean or a constraint object.

use crate::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `{min, max, ideal}` range; absent bounds are unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ConstraintRange<T> {
    /// Lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<T>,
    /// Upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<T>,
    /// Preferred value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal: Option<T>,
}

/// One constrained dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue<T> {
    /// Exactly this value
    Exact(T),
    /// A range with an optional preferred value
    Range(ConstraintRange<T>),
}

impl<T: Copy + PartialOrd + fmt::Display> ConstraintValue<T> {
    /// Range with only a preferred value
    pub fn ideal_only(ideal: T) -> Self {
        ConstraintValue::Range(ConstraintRange {
            min: None,
            max: None,
            ideal: Some(ideal),
        })
    }

    /// Range pinned to one value through min, max and ideal
    pub fn pinned(value: T) -> Self {
        ConstraintValue::Range(ConstraintRange {
            min: Some(value),
            max: Some(value),
            ideal: Some(value),
        })
    }

    /// Preferred value of a range
    pub fn ideal(&self) -> Option<T> {
        match self {
            ConstraintValue::Exact(_) => None,
            ConstraintValue::Range(range) => range.ideal,
        }
    }

    /// Exact value, or the preferred value of a range
    pub fn preferred(&self) -> Option<T> {
        match self {
            ConstraintValue::Exact(value) => Some(*value),
            ConstraintValue::Range(range) => range.ideal,
        }
    }

    /// Same constraint with a different preferred value
    pub fn with_ideal(&self, ideal: T) -> Self {
        match self {
            ConstraintValue::Exact(_) => ConstraintValue::ideal_only(ideal),
            ConstraintValue::Range(range) => ConstraintValue::Range(ConstraintRange {
                ideal: Some(ideal),
                ..*range
            }),
        }
    }

    /// Drop the preferred value. `None` when nothing remains.
    pub fn without_ideal(&self) -> Option<Self> {
        match self {
            ConstraintValue::Exact(_) => Some(*self),
            ConstraintValue::Range(range) => {
                if range.min.is_none() && range.max.is_none() {
                    None
                } else {
                    Some(ConstraintValue::Range(ConstraintRange {
                        ideal: None,
                        ..*range
                    }))
                }
            }
        }
    }

    /// Whether a range carries no bounds at all
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            ConstraintValue::Range(ConstraintRange {
                min: None,
                max: None,
                ideal: None
            })
        )
    }

    /// Whether a concrete value satisfies the hard bounds
    pub fn accepts(&self, value: T) -> bool {
        match self {
            ConstraintValue::Exact(exact) => value == *exact,
            ConstraintValue::Range(range) => {
                range.min.map_or(true, |min| value >= min)
                    && range.max.map_or(true, |max| value <= max)
            }
        }
    }

    /// Short form for logs
    pub fn label(&self) -> String {
        match self {
            ConstraintValue::Exact(value) => value.to_string(),
            ConstraintValue::Range(range) => {
                let mut parts = Vec::new();
                if let Some(min) = range.min {
                    parts.push(format!(">={}", min));
                }
                if let Some(max) = range.max {
                    parts.push(format!("<={}", max));
                }
                if let Some(ideal) = range.ideal {
                    parts.push(format!("~{}", ideal));
                }
                format!("[{}]", parts.join(" "))
            }
        }
    }
}

/// Which camera to prefer on devices with several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera
    User,
    /// Rear camera
    Environment,
    /// Left-facing camera
    Left,
    /// Right-facing camera
    Right,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
            FacingMode::Left => "left",
            FacingMode::Right => "right",
        };
        f.write_str(name)
    }
}

/// Video constraints; absent fields are unconstrained
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    /// Frame width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<ConstraintValue<u32>>,
    /// Frame height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<ConstraintValue<u32>>,
    /// Frames per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<ConstraintValue<f64>>,
    /// Preferred camera
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing_mode: Option<FacingMode>,
}

impl VideoConstraints {
    /// Whether nothing is constrained
    pub fn is_empty(&self) -> bool {
        self.width.map_or(true, |w| w.is_empty())
            && self.height.map_or(true, |h| h.is_empty())
            && self.frame_rate.map_or(true, |f| f.is_empty())
            && self.facing_mode.is_none()
    }

    /// Both dimensions are constrained
    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    /// Preferred width and height, when both carry an ideal
    pub fn ideal_dimensions(&self) -> Option<(u32, u32)> {
        match (self.width?.ideal(), self.height?.ideal()) {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        }
    }

    /// Width and height constraints exchanged
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
            ..self.clone()
        }
    }

    /// Ideal width and height stripped, other bounds kept
    pub fn without_ideal_dimensions(&self) -> Self {
        Self {
            width: self.width.and_then(|w| w.without_ideal()),
            height: self.height.and_then(|h| h.without_ideal()),
            ..self.clone()
        }
    }

    /// Width and height removed entirely
    pub fn without_dimensions(&self) -> Self {
        Self {
            width: None,
            height: None,
            ..self.clone()
        }
    }

    /// Facing mode removed
    pub fn without_facing_mode(&self) -> Self {
        Self {
            facing_mode: None,
            ..self.clone()
        }
    }

    /// Short form for logs
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(width) = &self.width {
            parts.push(format!("width {}", width.label()));
        }
        if let Some(height) = &self.height {
            parts.push(format!("height {}", height.label()));
        }
        if let Some(frame_rate) = &self.frame_rate {
            parts.push(format!("fps {}", frame_rate.label()));
        }
        if let Some(facing) = self.facing_mode {
            parts.push(format!("facing {}", facing));
        }
        parts.join(", ")
    }
}

/// What is requested for video
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawVideoRequest", into = "RawVideoRequest")]
pub enum VideoRequest {
    /// No video
    #[default]
    Disabled,
    /// Any video the device offers
    Any,
    /// Video satisfying these constraints
    Constrained(VideoConstraints),
}

impl VideoRequest {
    /// Constrained request; empty constraints normalize to [`VideoRequest::Any`]
    pub fn constrained(constraints: VideoConstraints) -> Self {
        if constraints.is_empty() {
            VideoRequest::Any
        } else {
            VideoRequest::Constrained(constraints)
        }
    }

    /// Constraints, when constrained
    pub fn constraints(&self) -> Option<&VideoConstraints> {
        match self {
            VideoRequest::Constrained(constraints) => Some(constraints),
            _ => None,
        }
    }

    /// Whether video is requested at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, VideoRequest::Disabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawVideoRequest {
    Flag(bool),
    Constraints(VideoConstraints),
}

impl From<RawVideoRequest> for VideoRequest {
    fn from(raw: RawVideoRequest) -> Self {
        match raw {
            RawVideoRequest::Flag(false) => VideoRequest::Disabled,
            RawVideoRequest::Flag(true) => VideoRequest::Any,
            RawVideoRequest::Constraints(constraints) => VideoRequest::constrained(constraints),
        }
    }
}

impl From<VideoRequest> for RawVideoRequest {
    fn from(request: VideoRequest) -> Self {
        match request {
            VideoRequest::Disabled => RawVideoRequest::Flag(false),
            VideoRequest::Any => RawVideoRequest::Flag(true),
            VideoRequest::Constrained(constraints) => RawVideoRequest::Constraints(constraints),
        }
    }
}

/// A requested capture configuration. Equality is structural.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfiguration {
    /// Capture audio too
    #[serde(default)]
    pub audio: bool,
    /// Video request
    #[serde(default)]
    pub video: VideoRequest,
    /// Specific device to open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl CaptureConfiguration {
    /// Any video, with the given audio setting
    pub fn any_video(audio: bool) -> Self {
        Self {
            audio,
            video: VideoRequest::Any,
            device_id: None,
        }
    }

    /// Video with constraints, audio off
    pub fn video(constraints: VideoConstraints) -> Self {
        Self {
            audio: false,
            video: VideoRequest::constrained(constraints),
            device_id: None,
        }
    }

    /// Request a specific device
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Copy with different video constraints; audio and device are kept
    pub fn with_video_constraints(&self, constraints: VideoConstraints) -> Self {
        Self {
            audio: self.audio,
            video: VideoRequest::constrained(constraints),
            device_id: self.device_id.clone(),
        }
    }

    /// Video constraints, when constrained
    pub fn video_constraints(&self) -> Option<&VideoConstraints> {
        self.video.constraints()
    }

    /// Parse from media-constraints JSON
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        serde_json::from_str(json).map_err(|e| CaptureError::InvalidConfiguration {
            message: e.to_string(),
        })
    }

    /// Media-constraints JSON, for logs
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.label())
    }

    /// Short form for logs
    pub fn label(&self) -> String {
        let video = match &self.video {
            VideoRequest::Disabled => "no video".to_string(),
            VideoRequest::Any => "any video".to_string(),
            VideoRequest::Constrained(constraints) => constraints.label(),
        };
        let mut label = format!("{}{}", video, if self.audio { " + audio" } else { "" });
        if let Some(device_id) = &self.device_id {
            label.push_str(&format!(" on {}", device_id));
        }
        label
    }
}

impl fmt::Display for CaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Long side over short side
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    let long = width.max(height) as f64;
    let short = width.min(height).max(1) as f64;
    long / short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_constraints_json() {
        let config = CaptureConfiguration::from_json_str(
            r#"{
                "audio": false,
                "video": {
                    "width": {"min": 640, "max": 1920, "ideal": 1280},
                    "height": 720,
                    "frameRate": 60,
                    "facingMode": "environment"
                },
                "deviceId": "cam-0"
            }"#,
        )
        .unwrap();

        let video = config.video_constraints().unwrap();
        assert_eq!(
            video.width,
            Some(ConstraintValue::Range(ConstraintRange {
                min: Some(640),
                max: Some(1920),
                ideal: Some(1280)
            }))
        );
        assert_eq!(video.height, Some(ConstraintValue::Exact(720)));
        assert_eq!(video.frame_rate, Some(ConstraintValue::Exact(60.0)));
        assert_eq!(video.facing_mode, Some(FacingMode::Environment));
        assert_eq!(config.device_id.as_deref(), Some("cam-0"));
    }

    #[test]
    fn test_video_flag_shapes() {
        let any = CaptureConfiguration::from_json_str(r#"{"video": true}"#).unwrap();
        assert_eq!(any.video, VideoRequest::Any);
        assert_eq!(any.to_json(), r#"{"audio":false,"video":true}"#);

        let audio_only = CaptureConfiguration::from_json_str(r#"{"audio": true}"#).unwrap();
        assert_eq!(audio_only.video, VideoRequest::Disabled);

        let empty = CaptureConfiguration::from_json_str(r#"{"video": {}}"#).unwrap();
        assert_eq!(empty.video, VideoRequest::Any);

        assert!(CaptureConfiguration::from_json_str(r#"{"video": "yes"}"#).is_err());
    }

    #[test]
    fn test_without_ideal() {
        let range = ConstraintValue::Range(ConstraintRange {
            min: Some(480),
            max: None,
            ideal: Some(720),
        });
        assert_eq!(
            range.without_ideal(),
            Some(ConstraintValue::Range(ConstraintRange {
                min: Some(480),
                max: None,
                ideal: None
            }))
        );
        assert_eq!(ConstraintValue::ideal_only(720u32).without_ideal(), None);
        assert_eq!(
            ConstraintValue::Exact(720u32).without_ideal(),
            Some(ConstraintValue::Exact(720))
        );
    }

    #[test]
    fn test_accepts() {
        let pinned = ConstraintValue::pinned(1280u32);
        assert!(pinned.accepts(1280));
        assert!(!pinned.accepts(1920));
        assert!(ConstraintValue::ideal_only(1280u32).accepts(640));
        assert!(!ConstraintValue::Exact(720u32).accepts(719));
    }

    #[test]
    fn test_aspect_ratio_is_orientation_independent() {
        assert_eq!(aspect_ratio(1920, 1080), aspect_ratio(1080, 1920));
        assert!((aspect_ratio(640, 480) - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_labels() {
        let config = CaptureConfiguration::video(VideoConstraints {
            width: Some(ConstraintValue::ideal_only(1280)),
            height: Some(ConstraintValue::Exact(720)),
            frame_rate: None,
            facing_mode: Some(FacingMode::User),
        });
        assert_eq!(config.label(), "width [~1280], height 720, facing user");
        assert_eq!(CaptureConfiguration::any_video(true).label(), "any video + audio");
    }
}
