//! Adapter over the opaque tracking service

use crate::error::{TrackingError, TrackingResult};
use crate::tracker::{
    FrameSource, ReferenceImage, TargetDescriptor, TrackingService, UpdateReceiver, UpdateSink,
};
use crate::viewport::Viewport;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Default longest side of a reference image before training
pub const DEFAULT_TARGET_MAX_DIMENSION: u32 = 1920;

/// Lifecycle of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Service not yet bound to a source
    Created,
    /// Runtime loaded and bound to the capture source
    Initialized,
    /// Reference target trained; frames can be processed
    Trained,
}

/// Tracking session wrapping a single tracking service
pub struct TrackingSession {
    service: Box<dyn TrackingService>,
    phase: SessionPhase,
    sink: UpdateSink,
    updates: Option<UpdateReceiver>,
    target: Option<TargetDescriptor>,
    source_id: Option<uuid::Uuid>,
    target_max_dimension: u32,
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession")
            .field("phase", &self.phase)
            .field("target", &self.target)
            .field("source_id", &self.source_id)
            .finish()
    }
}

impl TrackingSession {
    /// Create a session with an update channel of the given capacity
    pub fn new(service: Box<dyn TrackingService>, update_capacity: usize) -> Self {
        let (sink, updates) = UpdateSink::channel(update_capacity);
        Self {
            service,
            phase: SessionPhase::Created,
            sink,
            updates: Some(updates),
            target: None,
            source_id: None,
            target_max_dimension: DEFAULT_TARGET_MAX_DIMENSION,
        }
    }

    /// Override the longest side allowed for reference images
    pub fn with_target_max_dimension(mut self, max_dimension: u32) -> Self {
        self.target_max_dimension = max_dimension.max(1);
        self
    }

    /// Hand the capture source to the tracker and wait for its runtime
    pub async fn initialize(&mut self, source: Arc<dyn FrameSource>) -> TrackingResult<()> {
        if self.phase != SessionPhase::Created {
            return Err(TrackingError::InvalidState {
                expected: "Created".to_string(),
                actual: format!("{:?}", self.phase),
            });
        }

        let source_id = source.source_id();
        let (width, height) = source.dimensions();
        info!(
            "Initializing tracker with source {} ({}x{})",
            source_id, width, height
        );

        self.service.register_update_handler(self.sink.clone());
        self.service.initialize(source).await?;

        self.source_id = Some(source_id);
        self.phase = SessionPhase::Initialized;
        info!("Tracker runtime ready");
        Ok(())
    }

    /// Submit the reference image and train it. Only one target per session.
    pub async fn register_target(
        &mut self,
        image: &ReferenceImage,
    ) -> TrackingResult<TargetDescriptor> {
        if let Some(existing) = self.target {
            return Err(TrackingError::TargetAlreadyRegistered {
                width: existing.width,
                height: existing.height,
            });
        }
        if self.phase == SessionPhase::Created {
            error!("Target registration attempted before tracker initialization");
            return Err(TrackingError::uninitialized("register a target"));
        }

        image.validate()?;
        let fitted = image.downscaled_to_fit(self.target_max_dimension);
        if fitted.width != image.width || fitted.height != image.height {
            debug!(
                "Reference image scaled from {}x{} to {}x{}",
                image.width, image.height, fitted.width, fitted.height
            );
        }

        self.service.add_reference_image(&fitted)?;
        self.service.train().await?;

        let descriptor = TargetDescriptor {
            width: fitted.width,
            height: fitted.height,
        };
        self.target = Some(descriptor);
        self.phase = SessionPhase::Trained;
        info!("Target trained ({}x{})", descriptor.width, descriptor.height);
        Ok(descriptor)
    }

    /// Take the single consumer end of the update channel
    pub fn on_update(&mut self) -> TrackingResult<UpdateReceiver> {
        self.updates.take().ok_or_else(|| TrackingError::InvalidState {
            expected: "update handler unregistered".to_string(),
            actual: "update handler already registered".to_string(),
        })
    }

    /// Ask the tracker to process the current frame at the viewport size
    pub fn process_frame(&mut self, viewport: Viewport) -> TrackingResult<()> {
        if self.phase != SessionPhase::Trained {
            return Err(TrackingError::uninitialized("process frames"));
        }
        self.service.process_frame(viewport.width, viewport.height)
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether frames can be processed
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Trained
    }

    /// Trained target, once training completed
    pub fn target(&self) -> Option<TargetDescriptor> {
        self.target
    }

    /// Updates dropped because one was already in flight
    pub fn dropped_updates(&self) -> u64 {
        self.sink.dropped()
    }
}
