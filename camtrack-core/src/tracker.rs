//! Interface to the opaque pose-tracking service
//!
//! The tracker is an external collaborator. It is handed a read-only
//! [`FrameSource`], trained on a single [`ReferenceImage`], and asked to
//! process frames. Results come back asynchronously through an
//! [`UpdateSink`], a bounded single-consumer channel that preserves
//! submission order.

use crate::error::{TrackingError, TrackingResult};
use crate::frame::{PixelBuffer, TrackingFrame};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Read-only view of a bound, playing capture source
pub trait FrameSource: Send + Sync {
    /// Identifier of the underlying stream
    fn source_id(&self) -> Uuid;

    /// Native frame dimensions (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Most recent decoded frame, if one is available
    fn current_frame(&self) -> Option<PixelBuffer>;
}

/// Opaque tracking service
#[async_trait]
pub trait TrackingService: Send {
    /// Load the tracker runtime and bind it to a capture source
    async fn initialize(&mut self, source: Arc<dyn FrameSource>) -> TrackingResult<()>;

    /// Register the single consumer of tracker updates
    fn register_update_handler(&mut self, sink: UpdateSink);

    /// Process the current frame at the given viewport dimensions.
    /// Results are delivered through the update sink, never returned.
    fn process_frame(&mut self, width: u32, height: u32) -> TrackingResult<()>;

    /// Submit the reference image to search for
    fn add_reference_image(&mut self, image: &ReferenceImage) -> TrackingResult<()>;

    /// Train the submitted reference image
    async fn train(&mut self) -> TrackingResult<()>;
}

/// Producer half of the tracker update channel
#[derive(Debug, Clone)]
pub struct UpdateSink {
    tx: mpsc::Sender<TrackingFrame>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half of the tracker update channel
pub type UpdateReceiver = mpsc::Receiver<TrackingFrame>;

impl UpdateSink {
    /// Create a bounded update channel
    pub fn channel(capacity: usize) -> (UpdateSink, UpdateReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            UpdateSink {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Emit an update. Returns false when the previous update is still
    /// pending or the consumer is gone, in which case the frame is dropped.
    pub fn emit(&self, frame: TrackingFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Tracker update dropped: previous update still in flight");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Number of updates dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Check whether the consumer is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Decoded RGBA reference image
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA pixel data
    pub data: Bytes,
}

impl ReferenceImage {
    /// Create a reference image, validating dimensions against the data
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> TrackingResult<Self> {
        let image = Self {
            width,
            height,
            data: data.into(),
        };
        image.validate()?;
        Ok(image)
    }

    /// Check that the dimensions are non-zero and match the data length
    pub fn validate(&self) -> TrackingResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TrackingError::InvalidTarget {
                reason: format!("empty image ({}x{})", self.width, self.height),
            });
        }
        let expected = PixelBuffer::expected_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(TrackingError::InvalidTarget {
                reason: format!(
                    "expected {} bytes of RGBA data, got {}",
                    expected,
                    self.data.len()
                ),
            });
        }
        Ok(())
    }

    /// Dimensions after scaling so that neither side exceeds `max_dimension`
    pub fn fitted_dimensions(&self, max_dimension: u32) -> (u32, u32) {
        let mut scale = 1.0f64;
        if self.width > max_dimension {
            scale = max_dimension as f64 / self.width as f64;
        }
        if self.height > max_dimension {
            scale = scale.min(max_dimension as f64 / self.height as f64);
        }
        if scale >= 1.0 {
            return (self.width, self.height);
        }
        (
            ((self.width as f64 * scale) as u32).max(1),
            ((self.height as f64 * scale) as u32).max(1),
        )
    }

    /// Nearest-neighbour downscale so that neither side exceeds `max_dimension`
    ///
    /// The image must pass [`ReferenceImage::validate`].
    pub fn downscaled_to_fit(&self, max_dimension: u32) -> ReferenceImage {
        let (width, height) = self.fitted_dimensions(max_dimension);
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }

        let bpp = PixelBuffer::BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(PixelBuffer::expected_len(width, height));
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as usize;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as usize;
                let offset = (src_y * self.width as usize + src_x) * bpp;
                out.extend_from_slice(&self.data[offset..offset + bpp]);
            }
        }

        ReferenceImage {
            width,
            height,
            data: Bytes::from(out),
        }
    }
}

/// Dimensions of the trained reference image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl TargetDescriptor {
    /// Height over width
    pub fn aspect(&self) -> f64 {
        self.height as f64 / self.width as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::NO_TARGET;

    fn rgba(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let v = (i % 251) as u8;
                [v, v, v, 255]
            })
            .collect()
    }

    #[test]
    fn test_fitted_dimensions() {
        let image = ReferenceImage::new(384, 216, rgba(384, 216)).unwrap();
        assert_eq!(image.fitted_dimensions(192), (192, 108));

        let portrait = ReferenceImage::new(100, 400, rgba(100, 400)).unwrap();
        assert_eq!(portrait.fitted_dimensions(192), (48, 192));

        let small = ReferenceImage::new(64, 48, rgba(64, 48)).unwrap();
        assert_eq!(small.fitted_dimensions(192), (64, 48));
    }

    #[test]
    fn test_downscale_keeps_pixel_layout() {
        let image = ReferenceImage::new(8, 4, rgba(8, 4)).unwrap();
        let scaled = image.downscaled_to_fit(4);
        assert_eq!((scaled.width, scaled.height), (4, 2));
        assert_eq!(scaled.data.len(), 4 * 2 * 4);
        // top-left pixel is sampled from the source origin
        assert_eq!(&scaled.data[0..4], &image.data[0..4]);
    }

    #[test]
    fn test_invalid_reference_image() {
        assert!(ReferenceImage::new(0, 10, Vec::new()).is_err());
        assert!(ReferenceImage::new(2, 2, vec![0u8; 3]).is_err());

        let mut image = ReferenceImage::new(2, 2, vec![0u8; 16]).unwrap();
        assert!(image.validate().is_ok());
        image.height = 3;
        assert!(matches!(
            image.validate(),
            Err(TrackingError::InvalidTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_sink_single_in_flight() {
        let (sink, mut rx) = UpdateSink::channel(1);
        let pixels = PixelBuffer::blank(2, 2);

        assert!(sink.emit(TrackingFrame::lost(pixels.clone(), 320.0)));
        assert!(!sink.emit(TrackingFrame::lost(pixels.clone(), 320.0)));
        assert_eq!(sink.dropped(), 1);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.target_id, NO_TARGET);
        assert!(sink.emit(TrackingFrame::lost(pixels, 320.0)));
    }
}
