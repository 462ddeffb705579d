//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the front end.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FrontendConfig {
    /// Public listening socket settings.
    pub listener: ListenerConfig,

    /// Worker channel settings.
    pub channel: ChannelConfig,

    /// Readiness loop settings.
    pub event_loop: EventLoopConfig,

    /// Greeting written to every accepted connection.
    pub greeting: GreetingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Public listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Pending connection backlog passed to listen().
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            backlog: 128,
        }
    }
}

/// Worker channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Filesystem path of the worker's Unix domain socket.
    pub socket_path: PathBuf,

    /// Fixed delay between failed connect attempts.
    pub reconnect_backoff_ms: u64,

    /// Upper bound on waiting for the channel to become writable during a handoff.
    pub handoff_timeout_ms: u64,
}

impl ChannelConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("fd-pass.sock"),
            reconnect_backoff_ms: 1000,
            handoff_timeout_ms: 1000,
        }
    }
}

/// Event loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Readiness wait bound; also the worst-case shutdown latency.
    pub poll_timeout_ms: u64,
}

impl EventLoopConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self { poll_timeout_ms: 100 }
    }
}

/// Greeting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GreetingConfig {
    /// Name announced to clients alongside the PID.
    pub process_name: String,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            process_name: "handoff-frontend".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
