//! The connection lifecycle engine.
//!
//! One task owns the registry and every protocol decision. It waits on
//! three sources at once: the accept socket, reads reported by connection
//! reader tasks, and commands from [`ServerHandle`]s. Each ready event is
//! processed to completion before the next is taken, so handlers never run
//! concurrently and per-connection ordering matches the wire.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};

use crate::config::ConnectionConfig;
use crate::net::{Connection, Listener, ListenerError, SocketEvent, SocketHandle};
use crate::observability::metrics;
use crate::protocol::handshake;
use crate::server::dispatcher::Dispatcher;
use crate::server::handle::{Command, ServerHandle};
use crate::server::handler::MessageHandler;
use crate::server::Server;

/// Pause after an accept failure that will likely repeat at once.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Multiplexes the listener and all connections on a single task.
pub struct EventLoop<H> {
    listener: Listener,
    server: Server,
    dispatcher: Dispatcher<H>,
    limits: ConnectionConfig,
    events_tx: mpsc::Sender<SocketEvent>,
    events: mpsc::Receiver<SocketEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<H: MessageHandler> EventLoop<H> {
    /// Create a loop around a bound listener, plus a handle for reaching it.
    pub fn new(listener: Listener, limits: ConnectionConfig, handler: H) -> (Self, ServerHandle) {
        let (events_tx, events) = mpsc::channel(limits.event_queue);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let event_loop = Self {
            listener,
            server: Server::new(),
            dispatcher: Dispatcher::new(handler),
            limits,
            events_tx,
            events,
            commands,
        };
        (event_loop, ServerHandle::new(commands_tx))
    }

    /// Serve until `shutdown` fires (or its sender is dropped).
    ///
    /// Every remaining connection is closed on the way out.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            max_connections = self.listener.max_connections(),
            "Event loop started"
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    if let Some(delay) = self.on_accept(accepted) {
                        tokio::time::sleep(delay).await;
                    }
                }
                Some(event) = self.events.recv() => self.on_socket_event(event),
                Some(command) = self.commands.recv() => self.on_command(command),
                _ = shutdown.recv() => {
                    tracing::info!("Event loop received shutdown signal");
                    break;
                }
            }
        }

        let closed = self.server.registry_mut().clear();
        metrics::record_active_connections(0);
        tracing::info!(closed, "Event loop stopped");
    }

    /// Returns how long to pause before accepting again, if at all.
    fn on_accept(
        &mut self,
        accepted: Result<(TcpStream, SocketAddr), ListenerError>,
    ) -> Option<Duration> {
        let (stream, peer_addr) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                let backoff = match &e {
                    ListenerError::Accept(io_error) => accept_backoff(io_error),
                    _ => Some(ACCEPT_ERROR_BACKOFF),
                };
                tracing::warn!(error = %e, backoff = ?backoff, "Accept failed");
                metrics::record_accept_error();
                return backoff;
            }
        };

        let max_connections = self.listener.max_connections();
        if self.server.connection_count() >= max_connections {
            tracing::warn!(
                peer_addr = %peer_addr,
                max_connections,
                "Connection limit reached, rejecting client"
            );
            metrics::record_connection_rejected();
            drop(stream);
            return None;
        }

        let connection = Connection::open(stream, peer_addr, self.events_tx.clone(), &self.limits);
        tracing::info!(
            connection_id = %connection.id(),
            handle = %connection.handle(),
            peer_addr = %peer_addr,
            "Client connected"
        );
        self.server.registry_mut().add(connection);
        metrics::record_connection_accepted();
        metrics::record_active_connections(self.server.connection_count());
        None
    }

    fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Data { handle, bytes } => {
                let Some(connection) = self.server.connection(handle) else {
                    tracing::trace!(handle = %handle, "Ignoring read for removed connection");
                    return;
                };
                if connection.is_established() {
                    self.dispatcher.dispatch(handle, &bytes, &mut self.server);
                } else {
                    self.on_handshake(handle, &bytes);
                }
            }
            SocketEvent::Closed { handle, error } => {
                if let Some(e) = error {
                    tracing::debug!(handle = %handle, error = %e, "Read failed");
                }
                self.disconnect(handle);
            }
        }
    }

    fn on_handshake(&mut self, handle: SocketHandle, request: &[u8]) {
        match handshake::negotiate(request) {
            Ok(negotiated) => {
                let Some(connection) = self.server.connection_mut(handle) else {
                    return;
                };
                if let Err(e) = connection.enqueue(negotiated.response) {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        error = %e,
                        "Handshake response dropped"
                    );
                }
                connection.mark_established();
                tracing::info!(
                    connection_id = %connection.id(),
                    variant = negotiated.variant.as_str(),
                    resource = negotiated.request.resource.as_deref().unwrap_or(""),
                    "Handshake complete"
                );
                metrics::record_handshake(negotiated.variant.as_str());
            }
            Err(e) => {
                if let Some(connection) = self.server.connection(handle) {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        peer_addr = %connection.peer_addr(),
                        error = %e,
                        "Handshake failed"
                    );
                }
                metrics::record_handshake_failure();
                self.disconnect(handle);
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Send {
                handle,
                payload,
                reply,
            } => {
                let _ = reply.send(self.server.send(handle, &payload));
            }
            Command::Broadcast { payload, reply } => {
                let _ = reply.send(self.server.broadcast(&payload));
            }
            Command::Connections { reply } => {
                let _ = reply.send(self.server.connections().map(Connection::info).collect());
            }
            Command::Count { reply } => {
                let _ = reply.send(self.server.connection_count());
            }
        }
    }

    fn disconnect(&mut self, handle: SocketHandle) {
        // Dropping the record closes the socket.
        if let Some(connection) = self.server.remove_connection(handle) {
            tracing::info!(
                connection_id = %connection.id(),
                peer_addr = %connection.peer_addr(),
                "Client disconnected"
            );
            metrics::record_connection_closed();
            metrics::record_active_connections(self.server.connection_count());
        }
    }
}

/// Errors tied to one pending connection are skipped at once; anything
/// else (descriptor or buffer exhaustion) would fail again immediately.
fn accept_backoff(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}
