//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener (any failure is fatal and returned to the caller)
//! - Build the event loop around the application handler and queue limits
//! - Spawn it, wired to the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: nothing is spawned unless the listener is ready
//! - Logging and metrics are installed by the caller, before launch

use std::net::SocketAddr;

use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::server::{EventLoop, MessageHandler, ServerHandle};

/// A running server.
#[derive(Debug)]
pub struct Launched {
    /// Handle for pushing messages and querying connections.
    pub handle: ServerHandle,
    /// Address actually bound (resolves port 0).
    pub local_addr: SocketAddr,
    /// The event loop task. Completes after shutdown, or with a panic from the handler.
    pub task: JoinHandle<()>,
}

/// Bind, build and spawn the event loop.
///
/// Must be called from within a Tokio runtime.
pub fn launch<H: MessageHandler>(
    config: &ServerConfig,
    handler: H,
    shutdown: &Shutdown,
) -> Result<Launched, ListenerError> {
    let listener = Listener::bind(&config.listener)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    let (event_loop, handle) = EventLoop::new(listener, config.connection.clone(), handler);
    let task = tokio::spawn(event_loop.run(shutdown.subscribe()));

    Ok(Launched {
        handle,
        local_addr,
        task,
    })
}
