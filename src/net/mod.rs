//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept)
//!     → connection.rs (split stream, spawn reader + writer)
//!     → reader: every read → SocketEvent → event loop
//!     → writer: queued bytes → socket
//!
//! Connection States:
//!     AwaitingHandshake → Established → (removed)
//! ```
//!
//! # Design Decisions
//! - I/O tasks only move bytes; all protocol decisions are made by the
//!   single event loop, so processing stays strictly sequential
//! - Socket handles are never reused, so late events for a removed
//!   connection cannot resolve to a different one
//! - Dropping a Connection is the only way its socket gets closed
//! - Queues are bounded: a slow peer loses frames instead of growing memory

pub mod connection;
pub mod listener;

pub use connection::{
    Connection, ConnectionId, ConnectionInfo, ConnectionState, EnqueueError, SocketEvent,
    SocketHandle, READ_BUFFER_SIZE,
};
pub use listener::{Listener, ListenerError};
