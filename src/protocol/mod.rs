//! Wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! First read on a connection
//!     → handshake.rs (parse request, pick variant, compute response)
//!     → response bytes queued on the connection's writer
//!
//! Every later read
//!     → frame.rs unwrap (drop 0x00 / 0xFF markers)
//!     → dispatcher
//!
//! Outgoing payloads
//!     → frame.rs wrap → writer
//! ```
//!
//! # Design Decisions
//! - Pure functions only; no I/O happens here
//! - Legacy limitations kept verbatim: no payload escaping, no buffering
//!   of a request split across reads

pub mod frame;
pub mod handshake;

pub use frame::FrameError;
pub use handshake::{Handshake, HandshakeError, HandshakeRequest, HandshakeVariant};
