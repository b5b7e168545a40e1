//! Simulated collaborators
//!
//! Stand-ins for the opaque tracker, renderer, background surface and
//! repaint clock, used by tests and demos in place of real hardware.

use crate::error::{TrackingError, TrackingResult};
use crate::frame::{PixelBuffer, TrackingFrame, Transform};
use crate::scene::{BackgroundSurface, OverlaySpec, Renderer};
use crate::scheduler::RepaintClock;
use crate::tracker::{FrameSource, ReferenceImage, TrackingService, UpdateSink};
use crate::viewport::Viewport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Pose the simulated tracker reports for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedPose {
    /// Detected target
    pub target_id: i32,
    /// Reported transform
    pub transform: Transform,
    /// Reported focal length
    pub focal: f64,
}

/// Tracker that replays a scripted sequence of detections
///
/// `None` entries in the script produce frames without a detection. The
/// script repeats once exhausted; an empty script never detects anything.
pub struct SimulatedTracker {
    script: Vec<Option<SimulatedPose>>,
    cursor: usize,
    default_focal: f64,
    source: Option<Arc<dyn FrameSource>>,
    sink: Option<UpdateSink>,
    reference: Option<ReferenceImage>,
    trained: bool,
    processed: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl SimulatedTracker {
    /// Tracker replaying `script`
    pub fn new(script: Vec<Option<SimulatedPose>>) -> Self {
        Self {
            script,
            cursor: 0,
            default_focal: 320.0,
            source: None,
            sink: None,
            reference: None,
            trained: false,
            processed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared log of `process_frame` calls (width, height)
    pub fn processed_log(&self) -> Arc<Mutex<Vec<(u32, u32)>>> {
        self.processed.clone()
    }

    fn next_pose(&mut self) -> Option<SimulatedPose> {
        if self.script.is_empty() {
            return None;
        }
        let pose = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        pose
    }
}

#[async_trait]
impl TrackingService for SimulatedTracker {
    async fn initialize(&mut self, source: Arc<dyn FrameSource>) -> TrackingResult<()> {
        tokio::task::yield_now().await;
        self.source = Some(source);
        Ok(())
    }

    fn register_update_handler(&mut self, sink: UpdateSink) {
        self.sink = Some(sink);
    }

    fn process_frame(&mut self, width: u32, height: u32) -> TrackingResult<()> {
        if !self.trained {
            return Err(TrackingError::uninitialized("process frames"));
        }
        self.processed.lock().push((width, height));

        let pixels = self
            .source
            .as_ref()
            .and_then(|source| source.current_frame())
            .unwrap_or_else(|| PixelBuffer::blank(width, height));

        let frame = match self.next_pose() {
            Some(pose) => {
                TrackingFrame::detected(pixels, pose.target_id, pose.transform, pose.focal)
            }
            None => TrackingFrame::lost(pixels, self.default_focal),
        };

        if let Some(sink) = &self.sink {
            sink.emit(frame);
        }
        Ok(())
    }

    fn add_reference_image(&mut self, image: &ReferenceImage) -> TrackingResult<()> {
        if self.source.is_none() {
            return Err(TrackingError::uninitialized("add a reference image"));
        }
        self.reference = Some(image.clone());
        Ok(())
    }

    async fn train(&mut self) -> TrackingResult<()> {
        if self.reference.is_none() {
            return Err(TrackingError::Tracker {
                reason: "no reference image to train".to_string(),
            });
        }
        tokio::task::yield_now().await;
        self.trained = true;
        debug!("Simulated tracker trained");
        Ok(())
    }
}

/// Call recorded by [`RecordingRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    /// `resize(width, height)`
    Resize(u32, u32),
    /// `set_field_of_view(fov)`
    FieldOfView(f64),
    /// `apply_transform(matrix)`
    Transform(Transform),
    /// `set_visible(visible)`
    Visible(bool),
    /// `add_overlay(spec)`
    AddOverlay(OverlaySpec),
    /// `remove_overlay(spec)`
    RemoveOverlay(OverlaySpec),
    /// `render()`
    Render,
    /// Background `composite(frame size, viewport)`
    Composite {
        /// Frame dimensions
        frame: (u32, u32),
        /// Surface size
        viewport: Viewport,
    },
}

/// Shared call log
pub type RenderLog = Arc<Mutex<Vec<RenderCall>>>;

/// Renderer that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: RenderLog,
}

impl RecordingRenderer {
    /// Renderer writing into a fresh log
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer writing into an existing log
    pub fn with_log(log: RenderLog) -> Self {
        Self { log }
    }

    /// Shared call log
    pub fn log(&self) -> RenderLog {
        self.log.clone()
    }
}

impl Renderer for RecordingRenderer {
    fn resize(&mut self, width: u32, height: u32) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::Resize(width, height));
        Ok(())
    }

    fn set_field_of_view(&mut self, fov: f64) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::FieldOfView(fov));
        Ok(())
    }

    fn apply_transform(&mut self, matrix: &Transform) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::Transform(*matrix));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::Visible(visible));
        Ok(())
    }

    fn add_overlay(&mut self, overlay: &OverlaySpec) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::AddOverlay(overlay.clone()));
        Ok(())
    }

    fn remove_overlay(&mut self, overlay: &OverlaySpec) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::RemoveOverlay(overlay.clone()));
        Ok(())
    }

    fn render(&mut self) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::Render);
        Ok(())
    }
}

/// Background surface that records composites into a render log
#[derive(Debug, Clone, Default)]
pub struct RecordingBackground {
    log: RenderLog,
}

impl RecordingBackground {
    /// Background writing into an existing log
    pub fn with_log(log: RenderLog) -> Self {
        Self { log }
    }
}

impl BackgroundSurface for RecordingBackground {
    fn composite(&mut self, pixels: &PixelBuffer, viewport: Viewport) -> TrackingResult<()> {
        self.log.lock().push(RenderCall::Composite {
            frame: (pixels.width, pixels.height),
            viewport,
        });
        Ok(())
    }
}

/// Repaint clock advanced by hand
#[derive(Debug)]
pub struct ManualClock {
    ticks: mpsc::UnboundedReceiver<()>,
}

/// Driver for a [`ManualClock`]
#[derive(Debug, Clone)]
pub struct ManualTicker {
    ticks: mpsc::UnboundedSender<()>,
}

impl ManualClock {
    /// Create a clock and its driver
    pub fn new() -> (ManualClock, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ManualClock { ticks: rx }, ManualTicker { ticks: tx })
    }
}

impl ManualTicker {
    /// Queue one repaint tick
    pub fn tick(&self) {
        let _ = self.ticks.send(());
    }
}

#[async_trait]
impl RepaintClock for ManualClock {
    async fn tick(&mut self) -> Instant {
        match self.ticks.recv().await {
            Some(()) => Instant::now(),
            // driver dropped: no more repaints
            None => std::future::pending().await,
        }
    }
}

/// Frame source producing a fixed frame
#[derive(Debug, Clone)]
pub struct StaticFrameSource {
    id: Uuid,
    frame: PixelBuffer,
}

impl StaticFrameSource {
    /// Source returning a blank frame of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            frame: PixelBuffer::blank(width, height),
        }
    }
}

impl FrameSource for StaticFrameSource {
    fn source_id(&self) -> Uuid {
        self.id
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn current_frame(&self) -> Option<PixelBuffer> {
        Some(self.frame.clone())
    }
}
