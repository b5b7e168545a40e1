//! # camtrack diagnostics
//!
//! Debugging and diagnostic tools for camtrack.
//! Provides structured logging setup, tracking rate measurement and
//! acquisition reports.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition_report;
pub mod debug_logger;
pub mod fps_meter;

// Re-export main types
pub use acquisition_report::{AcquisitionReport, AttemptRecord, AttemptOutcome};
pub use debug_logger::{init_logging, LoggingError, DEFAULT_LOG_FILTER};
pub use fps_meter::FpsMeter;
