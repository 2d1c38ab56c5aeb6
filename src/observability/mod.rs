//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! event loop, dispatcher, listener produce:
//!     → logging.rs (structured tracing events: connection_id, peer_addr, handle)
//!     → metrics.rs (connection, handshake and message counters)
//!
//! Consumers:
//!     → stdout (text or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
