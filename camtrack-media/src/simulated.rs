//! Simulated capture device
//!
//! A camera with a fixed set of capture modes that evaluates constraints the
//! way a real device would, for tests and demos without hardware.

use crate::acquisition::CaptureDevice;
use crate::constraints::{CaptureConfiguration, FacingMode, VideoConstraints, VideoRequest};
use crate::element::{MediaStream, StreamSettings};
use crate::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use camtrack_core::PixelBuffer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One resolution/frame-rate mode the simulated camera offers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureMode {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frames per second
    pub frame_rate: f64,
}

impl CaptureMode {
    /// Mode at 30 fps
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_rate: 30.0,
        }
    }
}

/// Simulated camera
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    modes: Vec<CaptureMode>,
    facing: Vec<FacingMode>,
    device_id: String,
    permission_granted: bool,
    supported: bool,
    stall: bool,
    fail_first: usize,
    attempts: Arc<Mutex<Vec<CaptureConfiguration>>>,
    streams: Arc<Mutex<Vec<Arc<SimulatedStream>>>>,
}

impl SimulatedCamera {
    /// Rear-facing camera offering `modes`, permission granted
    pub fn new(modes: Vec<CaptureMode>) -> Self {
        Self {
            modes,
            facing: vec![FacingMode::Environment],
            device_id: "simulated-0".to_string(),
            permission_granted: true,
            supported: true,
            stall: false,
            fail_first: 0,
            attempts: Arc::new(Mutex::new(Vec::new())),
            streams: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Typical laptop webcam: 640x480 and 1280x720, front-facing
    pub fn webcam() -> Self {
        Self::new(vec![CaptureMode::new(640, 480), CaptureMode::new(1280, 720)])
            .with_facing(vec![FacingMode::User])
    }

    /// Cameras the device has
    pub fn with_facing(mut self, facing: Vec<FacingMode>) -> Self {
        self.facing = facing;
        self
    }

    /// Device identifier
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Deny camera access on every request
    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Report no capture API
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Open streams that never deliver a frame
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    /// Reject the first `count` requests regardless of constraints
    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    /// Configurations requested so far, in order
    pub fn attempts(&self) -> Vec<CaptureConfiguration> {
        self.attempts.lock().clone()
    }

    /// Streams opened so far, in order
    pub fn streams(&self) -> Vec<Arc<SimulatedStream>> {
        self.streams.lock().clone()
    }

    fn select_mode(&self, video: &VideoConstraints) -> CaptureResult<(CaptureMode, FacingMode)> {
        let facing = match video.facing_mode {
            Some(wanted) if self.facing.contains(&wanted) => wanted,
            Some(wanted) => {
                return Err(CaptureError::unsatisfiable(
                    "facingMode",
                    format!("no {} camera", wanted),
                ))
            }
            None => self.default_facing()?,
        };

        let candidates: Vec<CaptureMode> = self
            .modes
            .iter()
            .copied()
            .filter(|mode| video.width.map_or(true, |w| w.accepts(mode.width)))
            .filter(|mode| video.height.map_or(true, |h| h.accepts(mode.height)))
            .filter(|mode| video.frame_rate.map_or(true, |f| f.accepts(mode.frame_rate)))
            .collect();

        let ideal_width = video.width.and_then(|w| w.preferred());
        let ideal_height = video.height.and_then(|h| h.preferred());
        let mode = candidates
            .into_iter()
            .min_by_key(|mode| {
                ideal_width.map_or(0, |w| w.abs_diff(mode.width))
                    + ideal_height.map_or(0, |h| h.abs_diff(mode.height))
            })
            .ok_or_else(|| {
                CaptureError::unsatisfiable(
                    "resolution",
                    format!("no mode satisfies {}", video.label()),
                )
            })?;

        Ok((mode, facing))
    }

    fn default_facing(&self) -> CaptureResult<FacingMode> {
        self.facing
            .first()
            .copied()
            .ok_or_else(|| CaptureError::DeviceNotFound {
                device_id: self.device_id.clone(),
            })
    }
}

#[async_trait]
impl CaptureDevice for SimulatedCamera {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn get_user_media(
        &self,
        config: &CaptureConfiguration,
    ) -> CaptureResult<Arc<dyn MediaStream>> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            attempts.push(config.clone());
            attempts.len()
        };
        tokio::task::yield_now().await;

        if !self.permission_granted {
            return Err(CaptureError::PermissionDenied {
                reason: "NotAllowedError".to_string(),
            });
        }
        if let Some(device_id) = &config.device_id {
            if device_id != &self.device_id {
                return Err(CaptureError::DeviceNotFound {
                    device_id: device_id.clone(),
                });
            }
        }
        if attempt <= self.fail_first {
            return Err(CaptureError::unsatisfiable(
                "device",
                format!("scripted failure {} of {}", attempt, self.fail_first),
            ));
        }

        let (mode, facing) = match &config.video {
            VideoRequest::Disabled => {
                return Err(CaptureError::InvalidConfiguration {
                    message: "no video requested".to_string(),
                })
            }
            VideoRequest::Any => {
                let mode = self.modes.first().copied().ok_or_else(|| {
                    CaptureError::unsatisfiable("resolution", "camera offers no modes")
                })?;
                (mode, self.default_facing()?)
            }
            VideoRequest::Constrained(video) => self.select_mode(video)?,
        };

        debug!(
            "Simulated camera opened {}x{} @ {} fps ({})",
            mode.width, mode.height, mode.frame_rate, facing
        );

        let stream = Arc::new(SimulatedStream::new(
            StreamSettings {
                width: mode.width,
                height: mode.height,
                frame_rate: Some(mode.frame_rate),
                facing_mode: Some(facing),
                device_id: Some(self.device_id.clone()),
            },
            self.stall,
        ));
        self.streams.lock().push(stream.clone());
        Ok(stream)
    }
}

/// Stream produced by [`SimulatedCamera`]
#[derive(Debug)]
pub struct SimulatedStream {
    id: Uuid,
    settings: StreamSettings,
    frame: Option<PixelBuffer>,
    active: AtomicBool,
}

impl SimulatedStream {
    /// Stream with the given settings; a stalled stream never delivers frames
    pub fn new(settings: StreamSettings, stall: bool) -> Self {
        let frame = (!stall).then(|| PixelBuffer::blank(settings.width, settings.height));
        Self {
            id: Uuid::new_v4(),
            settings,
            frame,
            active: AtomicBool::new(true),
        }
    }
}

impl MediaStream for SimulatedStream {
    fn id(&self) -> Uuid {
        self.id
    }

    fn settings(&self) -> StreamSettings {
        self.settings.clone()
    }

    fn latest_frame(&self) -> Option<PixelBuffer> {
        if !self.is_active() {
            return None;
        }
        self.frame.clone()
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
