//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening socket settings.
    pub listener: ListenerConfig,

    /// Per-connection queue limits.
    pub connection: ConnectionConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9001").
    pub bind_address: String,

    /// Pending-connection queue depth passed to listen(2).
    pub backlog: u32,

    /// Maximum simultaneously tracked connections. Accepts beyond this are closed.
    pub max_connections: usize,

    /// Set SO_REUSEADDR before binding.
    pub reuse_address: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9001".to_string(),
            backlog: 20,
            max_connections: 99,
            reuse_address: true,
        }
    }
}

/// Bounds on the in-process queues that sit between sockets and the event loop.
///
/// Reader tasks wait when `event_queue` is full, so the OS receive buffer
/// pushes back on fast senders. Sends fail once a connection's outbound
/// queue holds `outbound_frames` frames or `outbound_bytes` bytes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Reads buffered between all reader tasks and the event loop.
    pub event_queue: usize,

    /// Frames queued per connection before sends are dropped.
    pub outbound_frames: usize,

    /// Bytes queued per connection before sends are dropped.
    pub outbound_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            event_queue: 1024,
            outbound_frames: 256,
            outbound_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
