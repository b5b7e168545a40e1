//! Human-readable account of a stream acquisition

use camtrack_media::{AcquisitionEvent, AcquisitionMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a single attempt ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Still opening or validating
    Pending,
    /// Rejected or failed validation
    Failed {
        /// Error kind
        kind: String,
        /// Error message
        message: String,
    },
    /// User declined camera access
    Denied,
    /// Stream validated at this resolution
    Validated {
        /// Video width
        width: u32,
        /// Video height
        height: u32,
    },
}

/// One capture attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// Configuration tried, as a short label
    pub config: String,
    /// How it ended
    pub outcome: AttemptOutcome,
}

/// Acquisition report assembled from acquisition events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionReport {
    /// Attempts in order
    pub attempts: Vec<AttemptRecord>,
    /// Fallback candidates generated, if the desired configuration failed
    pub fallbacks_built: Option<usize>,
    /// Whether every candidate failed
    pub exhausted: bool,
    /// Time from start to resolution
    pub elapsed: Option<Duration>,
}

impl AcquisitionReport {
    /// Empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from an event sequence
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a AcquisitionEvent>) -> Self {
        let mut report = Self::new();
        for event in events {
            report.record(event);
        }
        report
    }

    /// Take timing from acquirer metrics
    pub fn with_metrics(mut self, metrics: &AcquisitionMetrics) -> Self {
        self.elapsed = metrics.elapsed;
        self
    }

    /// Fold one event into the report
    pub fn record(&mut self, event: &AcquisitionEvent) {
        match event {
            AcquisitionEvent::AttemptStarted { attempt, config } => {
                self.attempts.push(AttemptRecord {
                    attempt: *attempt,
                    config: config.label(),
                    outcome: AttemptOutcome::Pending,
                });
            }
            AcquisitionEvent::AttemptFailed { attempt, error } => {
                self.set_outcome(
                    *attempt,
                    AttemptOutcome::Failed {
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    },
                );
            }
            AcquisitionEvent::PermissionDenied { attempt } => {
                self.set_outcome(*attempt, AttemptOutcome::Denied);
            }
            AcquisitionEvent::StreamValidated { attempt, metadata } => {
                self.set_outcome(
                    *attempt,
                    AttemptOutcome::Validated {
                        width: metadata.width,
                        height: metadata.height,
                    },
                );
            }
            AcquisitionEvent::FallbacksBuilt { count } => {
                self.fallbacks_built = Some(*count);
            }
            AcquisitionEvent::Exhausted { .. } => {
                self.exhausted = true;
            }
        }
    }

    fn set_outcome(&mut self, attempt: u32, outcome: AttemptOutcome) {
        if let Some(record) = self
            .attempts
            .iter_mut()
            .rev()
            .find(|record| record.attempt == attempt)
        {
            record.outcome = outcome;
        }
    }

    /// Attempt that produced the stream
    pub fn successful_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts
            .iter()
            .find(|record| matches!(record.outcome, AttemptOutcome::Validated { .. }))
    }

    /// Whether acquisition ended on a permission denial
    pub fn permission_denied(&self) -> bool {
        self.attempts
            .iter()
            .any(|record| record.outcome == AttemptOutcome::Denied)
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        if let Some(success) = self.successful_attempt() {
            format!(
                "stream acquired on attempt {} of {} ({})",
                success.attempt,
                self.attempts.len(),
                success.config
            )
        } else if self.permission_denied() {
            "camera access denied".to_string()
        } else if self.exhausted {
            format!("no configuration worked after {} attempts", self.attempts.len())
        } else {
            format!("{} attempts, unresolved", self.attempts.len())
        }
    }
}

impl fmt::Display for AcquisitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Acquisition: {}", self.summary())?;
        if let Some(count) = self.fallbacks_built {
            writeln!(f, "  fallbacks built: {}", count)?;
        }
        if let Some(elapsed) = self.elapsed {
            writeln!(f, "  elapsed: {:?}", elapsed)?;
        }
        for record in &self.attempts {
            let outcome = match &record.outcome {
                AttemptOutcome::Pending => "pending".to_string(),
                AttemptOutcome::Failed { kind, message } => format!("{}: {}", kind, message),
                AttemptOutcome::Denied => "permission denied".to_string(),
                AttemptOutcome::Validated { width, height } => {
                    format!("playing at {}x{}", width, height)
                }
            };
            writeln!(f, "  #{} [{}] {}", record.attempt, record.config, outcome)?;
        }
        Ok(())
    }
}
