//! Server core subsystem.
//!
//! # Data Flow
//! ```text
//! event_loop.rs
//!     ├─ listener ready      → accept → registry.rs (AwaitingHandshake)
//!     ├─ SocketEvent::Data   → AwaitingHandshake: protocol::handshake → Established
//!     │                      → Established: dispatcher.rs → handler.rs (application)
//!     ├─ SocketEvent::Closed → registry.rs remove → socket closed
//!     └─ Command             → handle.rs requests (send, broadcast, snapshot)
//! ```
//!
//! # Design Decisions
//! - A single task owns all state; no locks
//! - Handlers get `&mut Server` for replies, broadcasts and poll state
//! - Handshake failures close only the offending connection

pub mod dispatcher;
pub mod event_loop;
pub mod handle;
pub mod handler;
pub mod registry;
pub mod state;

pub use dispatcher::Dispatcher;
pub use event_loop::EventLoop;
pub use handle::{LoopStopped, ServerHandle};
pub use handler::MessageHandler;
pub use registry::ConnectionRegistry;
pub use state::Server;
