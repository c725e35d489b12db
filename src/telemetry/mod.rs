//! Telemetry and logging infrastructure
//!
//! Provides structured logging with tracing and playback statistics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogGuard, LogInitError};
pub use metrics::{LatenessStats, PlaybackStats};
