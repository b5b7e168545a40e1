//! Tracking/render pipeline loop
//!
//! A single task owns the tracking session, the render synchronizer and the
//! frame scheduler. Work is taken in a fixed order on every iteration:
//! commands first, then tracker updates, then repaint ticks. Because the
//! update for frame n is rendered inside the loop before the next tick can
//! submit frame n+1, render state always reflects updates in submission
//! order.

use crate::error::{TrackingError, TrackingResult};
use crate::frame::TrackingFrame;
use crate::readiness::{Readiness, ReadinessTransition};
use crate::render_sync::{RenderOutcome, RenderSync};
use crate::scene::{OverlaySpec, SceneState};
use crate::scheduler::{FrameScheduler, SchedulerStats};
use crate::session::TrackingSession;
use crate::tracker::{ReferenceImage, TargetDescriptor, UpdateReceiver};
use crate::viewport::Viewport;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Commands accepted by a running pipeline
#[derive(Debug)]
pub enum PipelineCommand {
    /// Viewport resized or orientation changed
    Resize(Viewport),
    /// Render surface is attached and may be sized
    AttachSurface,
    /// Train a reference target
    RegisterTarget {
        /// Reference image
        image: ReferenceImage,
        /// Reply with the trained descriptor
        reply: oneshot::Sender<TrackingResult<TargetDescriptor>>,
    },
    /// Stop the loop
    Shutdown,
}

/// Events emitted by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Render surface attached and sized
    SurfaceAttached {
        /// Surface size
        viewport: Viewport,
    },
    /// Reference target trained
    TargetTrained {
        /// Trained target
        target: TargetDescriptor,
    },
    /// Both readiness conditions hold; overlay added
    OverlayAttached,
    /// One tracker update was rendered
    FrameRendered {
        /// Target reported by the tracker
        target_id: i32,
        /// Whether a pose was applied
        posed: bool,
    },
    /// Field of view changed after a focal length change
    FieldOfViewChanged {
        /// New field of view in degrees
        fov: f64,
    },
    /// Overlay hidden by the lost-target policy
    OverlayHidden,
    /// Viewport changed
    ViewportChanged {
        /// New viewport
        viewport: Viewport,
    },
}

/// Pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Updates received from the tracker and rendered
    pub updates_rendered: u64,
    /// Updates carrying a valid detection
    pub detections: u64,
    /// Updates dropped by the tracker sink while one was in flight
    pub dropped_updates: u64,
}

/// Summary returned when the pipeline stops
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Pipeline counters
    pub stats: PipelineStats,
    /// Scheduler counters
    pub scheduler: SchedulerStats,
    /// Final scene state
    pub scene: SceneState,
    /// Trained target, if any
    pub target: Option<TargetDescriptor>,
}

/// Handle used to drive a pipeline running on another task
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    commands: mpsc::UnboundedSender<PipelineCommand>,
}

impl PipelineHandle {
    fn send(&self, command: PipelineCommand) -> TrackingResult<()> {
        self.commands
            .send(command)
            .map_err(|_| TrackingError::ChannelClosed {
                channel: "pipeline commands".to_string(),
            })
    }

    /// Forward a viewport resize or orientation change
    pub fn resize(&self, viewport: Viewport) -> TrackingResult<()> {
        self.send(PipelineCommand::Resize(viewport))
    }

    /// Signal that the render surface is attached
    pub fn attach_surface(&self) -> TrackingResult<()> {
        self.send(PipelineCommand::AttachSurface)
    }

    /// Train a reference target and wait for the descriptor
    pub async fn register_target(&self, image: ReferenceImage) -> TrackingResult<TargetDescriptor> {
        let (reply, rx) = oneshot::channel();
        self.send(PipelineCommand::RegisterTarget { image, reply })?;
        rx.await.map_err(|_| TrackingError::ChannelClosed {
            channel: "target registration reply".to_string(),
        })?
    }

    /// Stop the pipeline; no further ticks are scheduled
    pub fn shutdown(&self) -> TrackingResult<()> {
        self.send(PipelineCommand::Shutdown)
    }

    /// Check whether the pipeline loop is gone
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Tracking/render pipeline
pub struct TrackingPipeline {
    session: TrackingSession,
    render_sync: RenderSync,
    scheduler: FrameScheduler,
    readiness: Readiness,
    viewport: Viewport,
    updates: UpdateReceiver,
    commands: mpsc::UnboundedReceiver<PipelineCommand>,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
    stats: PipelineStats,
}

impl std::fmt::Debug for TrackingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingPipeline")
            .field("readiness", &self.readiness)
            .field("viewport", &self.viewport)
            .field("stats", &self.stats)
            .finish()
    }
}

impl TrackingPipeline {
    /// Assemble a pipeline. Takes the session's update receiver.
    pub fn new(
        mut session: TrackingSession,
        render_sync: RenderSync,
        scheduler: FrameScheduler,
        viewport: Viewport,
    ) -> TrackingResult<(Self, PipelineHandle)> {
        let updates = session.on_update()?;
        let (commands_tx, commands) = mpsc::unbounded_channel();

        let mut readiness = Readiness::new();
        if session.is_ready() {
            readiness.mark_trained();
        }
        if render_sync.is_surface_attached() {
            readiness.mark_surface_attached();
        }

        let mut pipeline = Self {
            session,
            render_sync,
            scheduler,
            readiness,
            viewport,
            updates,
            commands,
            events: None,
            stats: PipelineStats::default(),
        };
        // both conditions completed before assembly: the overlay goes in now
        if pipeline.readiness.is_ready() {
            pipeline.on_transition(ReadinessTransition::BecameReady)?;
        }
        Ok((
            pipeline,
            PipelineHandle {
                commands: commands_tx,
            },
        ))
    }

    /// Subscribe to pipeline events
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Attach and size the render surface
    pub fn on_surface_attached(&mut self) -> TrackingResult<()> {
        if self.render_sync.is_surface_attached() {
            return Ok(());
        }
        self.render_sync.attach_surface(self.viewport)?;
        self.emit(PipelineEvent::SurfaceAttached {
            viewport: self.viewport,
        });
        let transition = self.readiness.mark_surface_attached();
        self.on_transition(transition)
    }

    /// Train a reference target through the session
    pub async fn on_register_target(
        &mut self,
        image: &ReferenceImage,
    ) -> TrackingResult<TargetDescriptor> {
        let target = self.session.register_target(image).await?;
        self.emit(PipelineEvent::TargetTrained { target });
        let transition = self.readiness.mark_trained();
        self.on_transition(transition)?;
        Ok(target)
    }

    fn on_transition(&mut self, transition: ReadinessTransition) -> TrackingResult<()> {
        if transition != ReadinessTransition::BecameReady {
            return Ok(());
        }

        let target = self.session.target().ok_or_else(|| TrackingError::InvalidState {
            expected: "trained target".to_string(),
            actual: "no target".to_string(),
        })?;
        self.render_sync.add_overlay(OverlaySpec::for_target(&target))?;
        info!("Pipeline ready: overlay attached for {}x{} target", target.width, target.height);
        self.emit(PipelineEvent::OverlayAttached);
        Ok(())
    }

    /// Apply a viewport change
    pub fn on_resize(&mut self, viewport: Viewport) -> TrackingResult<()> {
        self.viewport = viewport;
        if self.render_sync.resize(viewport)? {
            self.emit(PipelineEvent::ViewportChanged { viewport });
        }
        Ok(())
    }

    /// Render one tracker update
    pub fn on_update(&mut self, frame: &TrackingFrame) -> TrackingResult<RenderOutcome> {
        let outcome = self.render_sync.apply(frame)?;
        self.stats.updates_rendered += 1;

        match outcome {
            RenderOutcome::Posed { fov_changed, .. } => {
                self.stats.detections += 1;
                if let Some(fov) = fov_changed {
                    self.emit(PipelineEvent::FieldOfViewChanged { fov });
                }
            }
            RenderOutcome::NoDetection { hidden: true } => {
                self.emit(PipelineEvent::OverlayHidden);
            }
            _ => {}
        }

        self.emit(PipelineEvent::FrameRendered {
            target_id: frame.target_id,
            posed: matches!(outcome, RenderOutcome::Posed { .. }),
        });
        Ok(outcome)
    }

    /// Current readiness
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Current scene state
    pub fn scene(&self) -> &SceneState {
        self.render_sync.state()
    }

    async fn on_command(&mut self, command: PipelineCommand) -> TrackingResult<bool> {
        match command {
            PipelineCommand::Resize(viewport) => self.on_resize(viewport)?,
            PipelineCommand::AttachSurface => self.on_surface_attached()?,
            PipelineCommand::RegisterTarget { image, reply } => {
                let result = self.on_register_target(&image).await;
                if let Err(e) = &result {
                    warn!("Target registration failed: {}", e);
                }
                let _ = reply.send(result);
            }
            PipelineCommand::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    /// Run until shutdown. Tracker and renderer failures end the loop.
    pub async fn run(mut self) -> TrackingResult<PipelineReport> {
        info!("Tracking pipeline started at {}", self.viewport);

        let result = self.run_loop().await;

        self.scheduler.stop();
        let detached = self.render_sync.detach();
        self.stats.dropped_updates = self.session.dropped_updates();

        result?;
        detached?;

        info!(
            "Tracking pipeline stopped: {} updates rendered, {} detections",
            self.stats.updates_rendered, self.stats.detections
        );
        Ok(PipelineReport {
            stats: self.stats.clone(),
            scheduler: self.scheduler.stats().clone(),
            scene: self.render_sync.state().clone(),
            target: self.session.target(),
        })
    }

    async fn run_loop(&mut self) -> TrackingResult<()> {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.on_command(command).await? {
                                debug!("Pipeline shutdown requested");
                                return Ok(());
                            }
                        }
                        None => {
                            debug!("All pipeline handles dropped");
                            return Ok(());
                        }
                    }
                }

                Some(frame) = self.updates.recv() => {
                    self.on_update(&frame)?;
                }

                _ = self.scheduler.next_tick() => {
                    self.scheduler.on_tick(&mut self.session, self.viewport)?;
                }
            }
        }
    }
}
