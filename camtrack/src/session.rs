//! Session orchestration
//!
//! A session acquires a playing video stream, hands it to the tracker,
//! and runs the tracking pipeline on a background task. What the user
//! sees is summarized by [`DisplayState`]: the failed state carries the
//! message to display in place of the video.

use crate::config::SessionConfig;
use crate::error::{command_error, CamtrackError, CamtrackResult, STREAM_INIT_FAILED};
use crate::event::{Event, EventHub, EventStream};
use crate::Camtrack;
use camtrack_core::{
    BackgroundSurface, FrameScheduler, FrameSource, PipelineEvent, PipelineReport, ReferenceImage,
    RenderSync, Renderer, RepaintClock, TargetDescriptor, TrackingPipeline, TrackingResult,
    TrackingService, TrackingSession, Viewport,
};
use camtrack_diagnostics::{AcquisitionReport, FpsMeter};
use camtrack_media::{
    AcquisitionEvent, CaptureConfiguration, CaptureDevice, PlatformProfile, StreamAcquirer,
    StreamElement, StreamMetadata, VideoElement, VideoSource,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What the session currently shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    /// Acquiring the stream and loading the tracker
    Initializing,
    /// Video is playing and frames are being tracked
    Tracking,
    /// The session could not start or stopped on an error
    Failed {
        /// Text shown instead of the video
        message: String,
    },
}

/// Publishes display state to watchers and event subscribers
#[derive(Debug, Clone)]
struct DisplayPublisher {
    tx: Arc<watch::Sender<DisplayState>>,
    hub: EventHub,
}

impl DisplayPublisher {
    fn set(&self, state: DisplayState) {
        if *self.tx.borrow() == state {
            return;
        }
        let _ = self.tx.send(state.clone());
        self.hub.publish(Event::DisplayStateChanged { state });
    }

    fn fail(&self, message: String) {
        self.set(DisplayState::Failed { message });
    }

    fn close(&self, reason: &str) {
        self.hub.publish(Event::SessionClosed {
            reason: reason.to_string(),
        });
        self.hub.close();
    }
}

/// Fluent builder for a tracking session
pub struct SessionBuilder {
    camtrack: Camtrack,
    config: SessionConfig,
    device: Option<Arc<dyn CaptureDevice>>,
    element: Option<Box<dyn VideoElement>>,
    tracker: Option<Box<dyn TrackingService>>,
    renderer: Option<Box<dyn Renderer>>,
    background: Option<Box<dyn BackgroundSurface>>,
    clock: Option<Box<dyn RepaintClock>>,
    viewport: Viewport,
    profile: PlatformProfile,
    hub: EventHub,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("viewport", &self.viewport)
            .field("profile", &self.profile)
            .finish()
    }
}

impl SessionBuilder {
    pub(crate) fn new(camtrack: &Camtrack) -> Self {
        Self {
            camtrack: camtrack.clone(),
            config: SessionConfig::default(),
            device: None,
            element: None,
            tracker: None,
            renderer: None,
            background: None,
            clock: None,
            viewport: Viewport::new(1280, 720),
            profile: PlatformProfile::default(),
            hub: EventHub::default(),
        }
    }

    /// Replace the whole session configuration
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Desired capture configuration, overriding the viewport default
    pub fn capture(mut self, capture: CaptureConfiguration) -> Self {
        self.config.capture = Some(capture);
        self
    }

    /// Capture device (required)
    pub fn device(mut self, device: Arc<dyn CaptureDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Video element the stream is bound to; a [`StreamElement`] by default
    pub fn element(mut self, element: Box<dyn VideoElement>) -> Self {
        self.element = Some(element);
        self
    }

    /// Tracking service (required)
    pub fn tracker(mut self, tracker: Box<dyn TrackingService>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// 3D renderer and 2D background surface (required)
    pub fn renderer(
        mut self,
        renderer: Box<dyn Renderer>,
        background: Box<dyn BackgroundSurface>,
    ) -> Self {
        self.renderer = Some(renderer);
        self.background = Some(background);
        self
    }

    /// Repaint clock; a fixed-rate timer at the configured fps by default
    pub fn clock(mut self, clock: Box<dyn RepaintClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Initial viewport size
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Host platform
    pub fn profile(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Subscribe before starting, to observe acquisition as it happens
    pub fn events(&self) -> EventStream {
        self.hub.subscribe()
    }

    /// Acquire the stream, initialize the tracker and start the pipeline
    ///
    /// On failure the display state moves to failed and subscribers get a
    /// [`Event::DisplayStateChanged`] before the error is returned.
    pub async fn start(self) -> CamtrackResult<ArSession> {
        let (display_tx, display_rx) = watch::channel(DisplayState::Initializing);
        let display = DisplayPublisher {
            tx: Arc::new(display_tx),
            hub: self.hub.clone(),
        };

        match self.launch(display.clone(), display_rx).await {
            Ok(session) => Ok(session),
            Err(e) => {
                error!("Session failed to start: {}", e);
                display.fail(e.user_message());
                display.close("start failed");
                Err(e)
            }
        }
    }

    fn take_parts(&mut self) -> CamtrackResult<Parts> {
        let device = self.device.take().ok_or_else(|| CamtrackError::missing("capture device"))?;
        let tracker = self
            .tracker
            .take()
            .ok_or_else(|| CamtrackError::missing("tracking service"))?;
        let renderer = self.renderer.take().ok_or_else(|| CamtrackError::missing("renderer"))?;
        let background = self
            .background
            .take()
            .ok_or_else(|| CamtrackError::missing("background surface"))?;
        let poll_interval = self.config.acquisition.poll_interval();
        let element = self
            .element
            .take()
            .unwrap_or_else(|| Box::new(StreamElement::with_poll_interval(poll_interval)));

        Ok(Parts {
            device,
            element,
            tracker,
            renderer,
            background,
            clock: self.clock.take(),
        })
    }

    async fn launch(
        mut self,
        display: DisplayPublisher,
        display_rx: watch::Receiver<DisplayState>,
    ) -> CamtrackResult<ArSession> {
        self.config.validate()?;
        let parts = self.take_parts()?;
        let session_id = Uuid::new_v4();
        info!(
            "Starting session {} at {} (debug logging: {})",
            session_id,
            self.viewport,
            self.camtrack.config().debug_logging
        );

        let desired = self.config.desired_capture(self.viewport, &self.profile);
        let (source, report) = self.acquire(parts.device, parts.element, &desired).await?;

        let tracking = &self.config.tracking;
        let mut session = TrackingSession::new(parts.tracker, tracking.update_capacity)
            .with_target_max_dimension(tracking.target_max_dimension);
        let frame_source: Arc<dyn FrameSource> = source.clone();
        session.initialize(frame_source).await?;

        let render_sync = RenderSync::new(
            parts.renderer,
            parts.background,
            self.viewport,
            tracking.initial_focal,
        )
        .with_policy(tracking.lost_target);
        let scheduler = match parts.clock {
            Some(clock) => FrameScheduler::new(clock),
            None => FrameScheduler::with_fps(tracking.repaint_fps),
        };

        let (pipeline, handle) =
            TrackingPipeline::new(session, render_sync, scheduler, self.viewport)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pipeline = pipeline.with_events(events_tx);
        handle.attach_surface()?;

        let fps = Arc::new(Mutex::new(FpsMeter::new()));
        let task = tokio::spawn(supervise(pipeline, events_rx, display.clone(), fps.clone()));
        display.set(DisplayState::Tracking);

        Ok(ArSession {
            id: session_id,
            handle,
            source,
            display: display_rx,
            hub: self.hub,
            fps,
            report,
            viewport: self.viewport,
            task: Some(task),
        })
    }

    async fn acquire(
        &self,
        device: Arc<dyn CaptureDevice>,
        element: Box<dyn VideoElement>,
        desired: &CaptureConfiguration,
    ) -> CamtrackResult<(Arc<VideoSource>, AcquisitionReport)> {
        let mut acquirer =
            StreamAcquirer::new(device, self.profile).with_config(self.config.acquisition.clone());
        let forwarded = acquirer.subscribe_events();
        let mut recorded = acquirer.subscribe_events();
        let forwarder = tokio::spawn(forward_acquisition(forwarded, self.hub.clone()));

        let result = acquirer.acquire(desired, element).await;
        let metrics = acquirer.metrics();
        // dropping the acquirer closes the event channel and ends the forwarder
        drop(acquirer);
        if forwarder.await.is_err() {
            warn!("Acquisition event forwarder ended abnormally");
        }

        let mut report = AcquisitionReport::new().with_metrics(&metrics);
        while let Ok(event) = recorded.try_recv() {
            report.record(&event);
        }
        debug!("{}", report);

        let source = result?;
        Ok((Arc::new(source), report))
    }
}

struct Parts {
    device: Arc<dyn CaptureDevice>,
    element: Box<dyn VideoElement>,
    tracker: Box<dyn TrackingService>,
    renderer: Box<dyn Renderer>,
    background: Box<dyn BackgroundSurface>,
    clock: Option<Box<dyn RepaintClock>>,
}

async fn forward_acquisition(mut rx: broadcast::Receiver<AcquisitionEvent>, hub: EventHub) {
    loop {
        match rx.recv().await {
            Ok(event) => hub.publish(Event::Acquisition(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Skipped {} acquisition events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Runs the pipeline and relays its events until it stops
async fn supervise(
    pipeline: TrackingPipeline,
    mut events: mpsc::UnboundedReceiver<PipelineEvent>,
    display: DisplayPublisher,
    fps: Arc<Mutex<FpsMeter>>,
) -> TrackingResult<PipelineReport> {
    let relay = |event: PipelineEvent| {
        if matches!(event, PipelineEvent::FrameRendered { .. }) {
            fps.lock().tick();
        }
        display.hub.publish(Event::Pipeline(event));
    };

    let run = pipeline.run();
    tokio::pin!(run);

    let result = loop {
        tokio::select! {
            biased;

            Some(event) = events.recv() => relay(event),
            result = &mut run => break result,
        }
    };
    while let Ok(event) = events.try_recv() {
        relay(event);
    }

    match &result {
        Ok(report) => {
            debug!(
                "Pipeline stopped after {} rendered updates",
                report.stats.updates_rendered
            );
            display.close("shutdown");
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            display.fail(format!("{} ({})", STREAM_INIT_FAILED, e));
            display.close(&e.to_string());
        }
    }
    result
}

/// A running tracking session
pub struct ArSession {
    id: Uuid,
    handle: camtrack_core::PipelineHandle,
    source: Arc<VideoSource>,
    display: watch::Receiver<DisplayState>,
    hub: EventHub,
    fps: Arc<Mutex<FpsMeter>>,
    report: AcquisitionReport,
    viewport: Viewport,
    task: Option<JoinHandle<TrackingResult<PipelineReport>>>,
}

impl std::fmt::Debug for ArSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArSession")
            .field("id", &self.id)
            .field("display", &*self.display.borrow())
            .field("viewport", &self.viewport)
            .field("capture", &self.source.config())
            .finish()
    }
}

impl ArSession {
    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current display state
    pub fn display_state(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    /// Watch display state changes
    pub fn watch_display_state(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }

    /// Subscribe to session events from now on
    pub fn events(&self) -> EventStream {
        self.hub.subscribe()
    }

    /// Capture configuration the stream was opened with
    pub fn capture_config(&self) -> &CaptureConfiguration {
        self.source.config()
    }

    /// Stream resolution
    pub fn stream_metadata(&self) -> StreamMetadata {
        self.source.metadata()
    }

    /// How the stream was acquired
    pub fn acquisition_report(&self) -> &AcquisitionReport {
        &self.report
    }

    /// Current viewport
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Forward a viewport resize
    pub fn resize(&mut self, viewport: Viewport) -> CamtrackResult<()> {
        self.handle.resize(viewport).map_err(command_error)?;
        self.viewport = viewport;
        Ok(())
    }

    /// Forward an orientation change; the renderer is resized to the new viewport
    pub fn orientation_changed(&mut self, viewport: Viewport) -> CamtrackResult<()> {
        if viewport.orientation() != self.viewport.orientation() {
            info!("Orientation changed to {:?}", viewport.orientation());
        }
        self.resize(viewport)
    }

    /// Train the reference target; the overlay appears once training completes
    pub async fn register_target(&self, image: ReferenceImage) -> CamtrackResult<TargetDescriptor> {
        self.handle
            .register_target(image)
            .await
            .map_err(command_error)
    }

    /// Tracker update rate over the recent window
    pub fn tracking_fps(&self) -> f64 {
        self.fps.lock().fps()
    }

    /// Whether the pipeline is still running
    pub fn is_running(&self) -> bool {
        !self.handle.is_closed()
    }

    /// Stop the pipeline and release the stream
    pub async fn shutdown(mut self) -> CamtrackResult<PipelineReport> {
        if self.handle.shutdown().is_err() {
            debug!("Pipeline already stopped");
        }
        let task = self.task.take().ok_or(CamtrackError::SessionClosed)?;
        let result = task.await.map_err(|e| {
            error!("Pipeline task failed: {}", e);
            CamtrackError::SessionClosed
        })?;
        info!("Session {} shut down", self.id);
        Ok(result?)
    }
}
