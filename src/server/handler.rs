//! Message handler capability.

use crate::net::SocketHandle;
use crate::server::Server;

/// Application logic invoked once per inbound frame on an established connection.
///
/// The connection is identified by handle; reach its record through
/// [`Server::connection`] or [`Server::connection_mut`]. Panics are not
/// caught by the event loop.
pub trait MessageHandler: Send + 'static {
    fn on_message(&mut self, connection: SocketHandle, message: &[u8], server: &mut Server);
}

impl<F> MessageHandler for F
where
    F: FnMut(SocketHandle, &[u8], &mut Server) + Send + 'static,
{
    fn on_message(&mut self, connection: SocketHandle, message: &[u8], server: &mut Server) {
        self(connection, message, server)
    }
}
