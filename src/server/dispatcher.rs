//! Hands decoded frames to the application handler and frames replies.

use crate::net::{Connection, EnqueueError, SocketHandle};
use crate::observability::metrics;
use crate::protocol::frame;
use crate::server::handler::MessageHandler;
use crate::server::Server;

/// Frame a payload and queue it on the connection's writer.
///
/// Never waits. A full outbound queue or a dead writer drops the frame;
/// failures are logged and swallowed, and the reader will observe a disconnect.
pub fn send(connection: &Connection, payload: &[u8]) -> bool {
    match connection.enqueue(frame::wrap(payload)) {
        Ok(()) => {
            metrics::record_frame_sent();
            true
        }
        Err(EnqueueError::Full) => {
            tracing::warn!(
                connection_id = %connection.id(),
                bytes = payload.len(),
                "Outbound queue full, frame dropped"
            );
            metrics::record_send_failure();
            false
        }
        Err(EnqueueError::Closed) => {
            tracing::debug!(
                connection_id = %connection.id(),
                bytes = payload.len(),
                "Send to closed connection dropped"
            );
            metrics::record_send_failure();
            false
        }
    }
}

/// Invokes the handler for frames on established connections.
#[derive(Debug)]
pub struct Dispatcher<H> {
    handler: H,
}

impl<H: MessageHandler> Dispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Unwrap a raw frame and pass the payload to the handler.
    ///
    /// The connection's activity time is stamped before the handler runs.
    pub fn dispatch(&mut self, handle: SocketHandle, raw_frame: &[u8], server: &mut Server) {
        let Some(connection) = server.connection_mut(handle) else {
            return;
        };

        let payload = match frame::unwrap(raw_frame) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(connection_id = %connection.id(), error = %e, "Dropping malformed frame");
                return;
            }
        };

        connection.touch();
        tracing::debug!(
            connection_id = %connection.id(),
            bytes = payload.len(),
            "Dispatching message"
        );
        metrics::record_message_dispatched();

        self.handler.on_message(handle, payload, server);
    }
}
