//! Per-repaint frame scheduling
//!
//! The scheduler ticks once per display repaint. On every tick, if the
//! tracking session is ready, it asks the tracker to process a frame at the
//! current viewport size. Submission is fire-and-forget: results arrive
//! later through the session's update channel. Ticks keep coming while the
//! session is not ready so readiness can change mid-session.

use crate::error::TrackingResult;
use crate::session::TrackingSession;
use crate::viewport::Viewport;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

/// Default repaint cadence
pub const DEFAULT_REPAINT_FPS: u32 = 60;

/// Source of repaint ticks (vertical-sync cadence)
#[async_trait]
pub trait RepaintClock: Send {
    /// Wait for the next repaint
    async fn tick(&mut self) -> Instant;
}

/// Repaint clock driven by a fixed-rate timer
#[derive(Debug)]
pub struct IntervalClock {
    interval: Interval,
}

impl IntervalClock {
    /// Clock ticking `fps` times per second (0 is treated as 1).
    /// Must be called from within a Tokio runtime.
    pub fn new(fps: u32) -> Self {
        let period = Duration::from_nanos(1_000_000_000 / fps.max(1) as u64);
        let mut interval = interval(period);
        // a late repaint is skipped, never replayed in a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl RepaintClock for IntervalClock {
    async fn tick(&mut self) -> Instant {
        self.interval.tick().await.into_std()
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Repaint ticks observed
    pub ticks: u64,
    /// Frames submitted to the tracker
    pub frames_submitted: u64,
    /// Ticks skipped because tracking was not ready
    pub ticks_not_ready: u64,
}

/// Frame scheduler
pub struct FrameScheduler {
    clock: Box<dyn RepaintClock>,
    stats: SchedulerStats,
    running: bool,
    last_tick: Option<Instant>,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("stats", &self.stats)
            .field("running", &self.running)
            .finish()
    }
}

impl FrameScheduler {
    /// Create a scheduler over a repaint clock
    pub fn new(clock: Box<dyn RepaintClock>) -> Self {
        Self {
            clock,
            stats: SchedulerStats::default(),
            running: true,
            last_tick: None,
        }
    }

    /// Scheduler ticking at a fixed rate
    pub fn with_fps(fps: u32) -> Self {
        Self::new(Box::new(IntervalClock::new(fps)))
    }

    /// Wait for the next repaint. Never resolves once stopped.
    pub async fn next_tick(&mut self) -> Instant {
        if !self.running {
            return std::future::pending().await;
        }
        let now = self.clock.tick().await;
        self.last_tick = Some(now);
        now
    }

    /// Handle one repaint tick. Returns true when a frame was submitted.
    pub fn on_tick(
        &mut self,
        session: &mut TrackingSession,
        viewport: Viewport,
    ) -> TrackingResult<bool> {
        if !self.running {
            return Ok(false);
        }

        self.stats.ticks += 1;
        if !session.is_ready() {
            self.stats.ticks_not_ready += 1;
            return Ok(false);
        }

        session.process_frame(viewport)?;
        self.stats.frames_submitted += 1;
        Ok(true)
    }

    /// Stop scheduling; no further ticks are observed
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            debug!(
                "Frame scheduler stopped after {} ticks ({} frames submitted)",
                self.stats.ticks, self.stats.frames_submitted
            );
        }
    }

    /// Whether the scheduler is still running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Scheduler statistics
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Instant of the last observed tick
    pub fn last_tick(&self) -> Option<Instant> {
        self.last_tick
    }
}
