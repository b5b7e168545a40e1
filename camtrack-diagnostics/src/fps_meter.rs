//! Update rate measurement over a sliding window of frame times

use std::collections::VecDeque;
use std::time::Instant;

/// Frames kept for the rate estimate
pub const DEFAULT_WINDOW: usize = 100;

/// Rate of recorded events, estimated from the last N timestamps
#[derive(Debug, Clone)]
pub struct FpsMeter {
    frame_times: VecDeque<Instant>,
    window: usize,
    total: u64,
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsMeter {
    /// Meter over [`DEFAULT_WINDOW`] frames
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Meter over the last `window` frames (at least 2)
    pub fn with_window(window: usize) -> Self {
        let window = window.max(2);
        Self {
            frame_times: VecDeque::with_capacity(window),
            window,
            total: 0,
        }
    }

    /// Record a frame now
    pub fn tick(&mut self) {
        self.record(Instant::now());
    }

    /// Record a frame at `at`. Timestamps must not go backwards.
    pub fn record(&mut self, at: Instant) {
        if self.frame_times.len() == self.window {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(at);
        self.total += 1;
    }

    /// Frames per second over the window; 0 until two frames are recorded
    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_times.front(), self.frame_times.back()) else {
            return 0.0;
        };
        let dt = last.duration_since(*first).as_secs_f64();
        if dt > 0.0 {
            (self.frame_times.len() - 1) as f64 / dt
        } else {
            0.0
        }
    }

    /// Frames recorded since creation
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Forget all samples
    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.total = 0;
    }
}
