//! Two-bit readiness state
//!
//! Rendering starts once the tracker target is trained AND the render
//! surface is attached. The two complete independently and in either
//! order; the overlay is added exactly once, on whichever completes second.

/// Outcome of marking one readiness condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessTransition {
    /// Condition recorded, still waiting on the other one
    Pending,
    /// This call completed readiness
    BecameReady,
    /// Condition was already set; nothing changed
    Unchanged,
}

/// Readiness of the tracking/render pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    trained: bool,
    surface_attached: bool,
}

impl Readiness {
    /// Nothing ready yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the tracker finished training
    pub fn mark_trained(&mut self) -> ReadinessTransition {
        if self.trained {
            return ReadinessTransition::Unchanged;
        }
        self.trained = true;
        self.transition()
    }

    /// Record that the render surface was attached and sized
    pub fn mark_surface_attached(&mut self) -> ReadinessTransition {
        if self.surface_attached {
            return ReadinessTransition::Unchanged;
        }
        self.surface_attached = true;
        self.transition()
    }

    fn transition(&self) -> ReadinessTransition {
        if self.is_ready() {
            ReadinessTransition::BecameReady
        } else {
            ReadinessTransition::Pending
        }
    }

    /// Tracker trained
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Render surface attached
    pub fn is_surface_attached(&self) -> bool {
        self.surface_attached
    }

    /// Both conditions hold
    pub fn is_ready(&self) -> bool {
        self.trained && self.surface_attached
    }
}
