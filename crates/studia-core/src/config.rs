//! Configuration model for the streaming engine.
//!
//! Every field carries a serde default so a partial (or empty) `config.toml`
//! still yields a complete configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables for turn supervision and reconciliation.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How long a turn may wait for its first content event.
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,
    /// How long after completion external resyncs are refused.
    #[serde(default = "default_protection_window_ms")]
    pub protection_window_ms: u64,
    /// A completion payload replaces the streamed buffer only when it is
    /// longer than `buffer_len * completion_override_ratio`.
    #[serde(default = "default_completion_override_ratio")]
    pub completion_override_ratio: f64,
    /// Number of leading characters that go into a dedup token.
    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,
    /// Capacity of the lifecycle event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_stream_timeout_ms() -> u64 {
    10_000
}

fn default_protection_window_ms() -> u64 {
    3_000
}

fn default_completion_override_ratio() -> f64 {
    1.5
}

fn default_dedup_prefix_chars() -> usize {
    64
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_timeout_ms: default_stream_timeout_ms(),
            protection_window_ms: default_protection_window_ms(),
            completion_override_ratio: default_completion_override_ratio(),
            dedup_prefix_chars: default_dedup_prefix_chars(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    pub fn protection_window(&self) -> Duration {
        Duration::from_millis(self.protection_window_ms)
    }
}

/// Logging output settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write a daily rolling log file under the logs directory.
    #[serde(default)]
    pub file_output: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
        }
    }
}
