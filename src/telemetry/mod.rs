//! Telemetry module for logging and metrics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Controller and per-switch metrics

mod logging;
mod metrics;

pub use logging::{LogConfig, LogFormat, init_logging};
pub use metrics::{ControllerMetrics, Counter, Gauge, SwitchStats};
