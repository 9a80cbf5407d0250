//! Logging configuration and initialization.
//!
//! The `[logging]` section of config.toml picks level and output format.
//! RUST_LOG, when set, overrides the configured level.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// `[logging]` section of config.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Installs the global subscriber.
///
/// Priority for the filter:
/// 1. RUST_LOG environment variable (if set)
/// 2. `config.level`
/// 3. info
///
/// Calling it twice is harmless; the second subscriber is dropped.
pub fn init_logging(config: Option<&LogConfig>) {
    let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), config);
    let format = config.map(|c| c.format).unwrap_or_default();

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE),
            ),
        ),
        LogFormat::Compact => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().compact()),
        ),
        LogFormat::Pretty => {
            tracing::subscriber::set_global_default(registry.with(tracing_subscriber::fmt::layer()))
        }
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

fn build_filter(rust_log: Option<&str>, config: Option<&LogConfig>) -> EnvFilter {
    if let Some(directives) = rust_log {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    let level = config.map(|c| parse_level(&c.level)).unwrap_or(Level::INFO);
    EnvFilter::new(level.as_str())
}

/// Unknown names fall back to info
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
