//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and value ranges are non-zero
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// Smallest outbound budget; must hold a handshake response.
pub const MIN_OUTBOUND_BYTES: usize = 1024;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("listener.backlog must be greater than zero")]
    ZeroBacklog,

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("connection.event_queue must be greater than zero")]
    ZeroEventQueue,

    #[error("connection.outbound_frames must be greater than zero")]
    ZeroOutboundFrames,

    #[error("connection.outbound_bytes must be at least {MIN_OUTBOUND_BYTES}, got {0}")]
    OutboundBytes(usize),

    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(listener.bind_address.clone()));
    }
    if listener.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }
    if listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    let connection = &config.connection;
    if connection.event_queue == 0 {
        errors.push(ValidationError::ZeroEventQueue);
    }
    if connection.outbound_frames == 0 {
        errors.push(ValidationError::ZeroOutboundFrames);
    }
    if connection.outbound_bytes < MIN_OUTBOUND_BYTES {
        errors.push(ValidationError::OutboundBytes(connection.outbound_bytes));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
