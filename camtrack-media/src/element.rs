//! Capture streams and the video element they are bound to

use crate::constraints::{CaptureConfiguration, FacingMode};
use crate::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use camtrack_core::PixelBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

/// Settings a live stream actually runs with
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frames per second, when known
    pub frame_rate: Option<f64>,
    /// Camera in use, when known
    pub facing_mode: Option<FacingMode>,
    /// Device identifier, when known
    pub device_id: Option<String>,
}

/// Raw hardware stream returned by the capture device
pub trait MediaStream: Send + Sync {
    /// Stream identifier
    fn id(&self) -> Uuid;

    /// Negotiated settings
    fn settings(&self) -> StreamSettings;

    /// Most recent decoded frame, if one has arrived
    fn latest_frame(&self) -> Option<PixelBuffer>;

    /// Release the hardware. Idempotent.
    fn stop(&self);

    /// Whether the stream is still live
    fn is_active(&self) -> bool;
}

/// Resolution reported once the stream's data has loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Video width
    pub width: u32,
    /// Video height
    pub height: u32,
}

/// Playback attributes set on the element before each attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackAttributes {
    /// Start playing when data is available
    pub autoplay: bool,
    /// Play inline rather than fullscreen
    pub plays_inline: bool,
    /// Mute output
    pub muted: bool,
    /// Output volume, 0.0 to 1.0
    pub volume: f32,
}

impl Default for PlaybackAttributes {
    fn default() -> Self {
        Self {
            autoplay: false,
            plays_inline: false,
            muted: false,
            volume: 1.0,
        }
    }
}

impl PlaybackAttributes {
    /// Attributes for a capture attempt. Requested audio is silenced by
    /// volume so the track stays live; otherwise the element is muted.
    pub fn for_config(config: &CaptureConfiguration) -> Self {
        Self {
            autoplay: true,
            plays_inline: true,
            muted: !config.audio,
            volume: if config.audio { 0.0 } else { 1.0 },
        }
    }
}

/// Element a stream is bound to for playback and frame access
#[async_trait]
pub trait VideoElement: Send + Sync {
    /// Set playback attributes. Idempotent.
    fn apply_playback(&mut self, attributes: &PlaybackAttributes);

    /// Current playback attributes
    fn playback(&self) -> PlaybackAttributes;

    /// Bind a stream, replacing any previous one
    fn attach(&mut self, stream: Arc<dyn MediaStream>);

    /// Unbind the current stream
    fn detach(&mut self) -> Option<Arc<dyn MediaStream>>;

    /// Wait until the stream's metadata and first data are loaded
    async fn loaded_data(&mut self) -> CaptureResult<StreamMetadata>;

    /// Start playback
    fn play(&mut self) -> CaptureResult<()>;

    /// Wait until a fully decoded frame is ready for playback
    async fn ready(&mut self) -> CaptureResult<()>;

    /// Frame currently displayed
    fn current_frame(&self) -> Option<PixelBuffer>;
}

/// Default interval at which [`StreamElement`] polls its stream
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Video element over any [`MediaStream`]
///
/// Data is considered loaded when the stream delivers its first frame, and
/// playable once a non-empty frame is available after playback started.
pub struct StreamElement {
    stream: Option<Arc<dyn MediaStream>>,
    playback: PlaybackAttributes,
    poll_interval: Duration,
    playing: bool,
}

impl std::fmt::Debug for StreamElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamElement")
            .field("stream", &self.stream.as_ref().map(|s| s.id()))
            .field("playback", &self.playback)
            .field("playing", &self.playing)
            .finish()
    }
}

impl Default for StreamElement {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamElement {
    /// Element polling at [`DEFAULT_POLL_INTERVAL`]
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Element polling at the given interval
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            stream: None,
            playback: PlaybackAttributes::default(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            playing: false,
        }
    }

    fn attached(&self) -> CaptureResult<Arc<dyn MediaStream>> {
        self.stream.clone().ok_or_else(|| CaptureError::Validation {
            reason: "no stream attached".to_string(),
        })
    }

    async fn wait_for_frame(
        &self,
        stream: &Arc<dyn MediaStream>,
        stage: &str,
    ) -> CaptureResult<PixelBuffer> {
        loop {
            if !stream.is_active() {
                return Err(CaptureError::Validation {
                    reason: format!("stream ended while waiting for {}", stage),
                });
            }
            if let Some(frame) = stream.latest_frame() {
                if !frame.is_empty() {
                    return Ok(frame);
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl VideoElement for StreamElement {
    fn apply_playback(&mut self, attributes: &PlaybackAttributes) {
        self.playback = *attributes;
    }

    fn playback(&self) -> PlaybackAttributes {
        self.playback
    }

    fn attach(&mut self, stream: Arc<dyn MediaStream>) {
        self.playing = false;
        self.stream = Some(stream);
    }

    fn detach(&mut self) -> Option<Arc<dyn MediaStream>> {
        self.playing = false;
        self.stream.take()
    }

    async fn loaded_data(&mut self) -> CaptureResult<StreamMetadata> {
        let stream = self.attached()?;
        let frame = self.wait_for_frame(&stream, "data").await?;
        Ok(StreamMetadata {
            width: frame.width,
            height: frame.height,
        })
    }

    fn play(&mut self) -> CaptureResult<()> {
        self.attached()?;
        self.playing = true;
        Ok(())
    }

    async fn ready(&mut self) -> CaptureResult<()> {
        if !self.playing {
            return Err(CaptureError::Validation {
                reason: "playback not started".to_string(),
            });
        }
        let stream = self.attached()?;
        self.wait_for_frame(&stream, "a playable frame").await?;
        debug!("Stream {} is playable", stream.id());
        Ok(())
    }

    fn current_frame(&self) -> Option<PixelBuffer> {
        if !self.playing {
            return None;
        }
        self.stream.as_ref().and_then(|stream| stream.latest_frame())
    }
}
