//! Legacy WebSocket (draft-75 / draft-76) messaging server library.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod poll;
pub mod protocol;
pub mod server;

pub use config::schema::ServerConfig;
pub use lifecycle::Shutdown;
pub use net::{Connection, SocketHandle};
pub use server::{MessageHandler, Server, ServerHandle};
