//! Native camera backend
//!
//! Opens a local camera through nokhwa. The camera lives on a dedicated
//! thread that keeps the latest decoded frame in a shared slot; the stream
//! handle only reads that slot and signals the thread to stop.

use crate::acquisition::CaptureDevice;
use crate::constraints::{CaptureConfiguration, VideoConstraints};
use crate::element::{MediaStream, StreamSettings};
use crate::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use bytes::Bytes;
use camtrack_core::PixelBuffer;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_RESOLUTION: (u32, u32) = (640, 480);
const DEFAULT_FRAME_RATE: u32 = 30;

/// Local camera opened through nokhwa
#[derive(Debug, Clone)]
pub struct NativeCamera {
    index: u32,
}

impl NativeCamera {
    /// Camera at a system device index
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    fn requested_format(video: Option<&VideoConstraints>) -> RequestedFormat<'static> {
        let width = video.and_then(|v| v.width).and_then(|w| w.preferred());
        let height = video.and_then(|v| v.height).and_then(|h| h.preferred());
        let fps = video
            .and_then(|v| v.frame_rate)
            .and_then(|f| f.preferred())
            .map(|f| f.round() as u32)
            .unwrap_or(DEFAULT_FRAME_RATE);

        let (width, height) = width.zip(height).unwrap_or(DEFAULT_RESOLUTION);
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::MJPEG,
            fps,
        )))
    }
}

fn classify_open_error(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
        CaptureError::PermissionDenied { reason: message }
    } else {
        CaptureError::unsatisfiable("device", message)
    }
}

fn rgb_to_rgba(rgb: &[u8]) -> Bytes {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for pixel in rgb.chunks_exact(3) {
        rgba.extend_from_slice(pixel);
        rgba.push(u8::MAX);
    }
    Bytes::from(rgba)
}

#[async_trait]
impl CaptureDevice for NativeCamera {
    async fn get_user_media(
        &self,
        config: &CaptureConfiguration,
    ) -> CaptureResult<Arc<dyn MediaStream>> {
        if !config.video.is_enabled() {
            return Err(CaptureError::InvalidConfiguration {
                message: "no video requested".to_string(),
            });
        }

        let video = config.video_constraints().cloned();
        let requested = Self::requested_format(video.as_ref());
        let index = self.index;
        let slot: Arc<Mutex<Option<PixelBuffer>>> = Arc::new(Mutex::new(None));
        let active = Arc::new(AtomicBool::new(true));
        let (info_tx, info_rx) = oneshot::channel::<CaptureResult<(u32, u32, u32)>>();

        let thread_slot = slot.clone();
        let thread_active = active.clone();
        thread::spawn(move || {
            let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
                Ok(camera) => camera,
                Err(e) => {
                    let _ = info_tx.send(Err(classify_open_error(e.to_string())));
                    return;
                }
            };
            if let Err(e) = camera.open_stream() {
                let _ = info_tx.send(Err(classify_open_error(e.to_string())));
                return;
            }

            let resolution = camera.resolution();
            let _ = info_tx.send(Ok((
                resolution.width(),
                resolution.height(),
                camera.frame_rate(),
            )));

            while thread_active.load(Ordering::Relaxed) {
                if let Ok(buffer) = camera.frame() {
                    if let Ok(image) = buffer.decode_image::<RgbFormat>() {
                        let (width, height) = (image.width(), image.height());
                        if let Some(frame) =
                            PixelBuffer::new(width, height, rgb_to_rgba(image.as_raw()))
                        {
                            *thread_slot.lock() = Some(frame);
                        }
                    }
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = camera.stop_stream();
        });

        let (width, height, frame_rate) = info_rx.await.map_err(|_| CaptureError::Validation {
            reason: "camera thread exited before opening".to_string(),
        })??;
        debug!(
            "Native camera {} opened at {}x{} @ {} fps",
            index, width, height, frame_rate
        );

        // the device picks the closest format; hard bounds still apply
        if let Some(video) = &video {
            let fits = video.width.map_or(true, |w| w.accepts(width))
                && video.height.map_or(true, |h| h.accepts(height));
            if !fits {
                active.store(false, Ordering::Relaxed);
                warn!("Native camera resolution {}x{} outside constraints", width, height);
                return Err(CaptureError::unsatisfiable(
                    "resolution",
                    format!("camera delivered {}x{}", width, height),
                ));
            }
        }

        Ok(Arc::new(NativeStream {
            id: Uuid::new_v4(),
            settings: StreamSettings {
                width,
                height,
                frame_rate: Some(frame_rate as f64),
                facing_mode: video.as_ref().and_then(|v| v.facing_mode),
                device_id: Some(index.to_string()),
            },
            slot,
            active,
        }))
    }
}

/// Stream backed by a native camera thread
pub struct NativeStream {
    id: Uuid,
    settings: StreamSettings,
    slot: Arc<Mutex<Option<PixelBuffer>>>,
    active: Arc<AtomicBool>,
}

impl MediaStream for NativeStream {
    fn id(&self) -> Uuid {
        self.id
    }

    fn settings(&self) -> StreamSettings {
        self.settings.clone()
    }

    fn latest_frame(&self) -> Option<PixelBuffer> {
        self.slot.lock().clone()
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}
