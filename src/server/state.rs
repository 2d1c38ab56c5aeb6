//! Server state handed to message handlers.

use crate::net::{Connection, SocketHandle};
use crate::poll::Question;
use crate::server::dispatcher;
use crate::server::registry::ConnectionRegistry;

/// Everything a handler may inspect or change: live connections, the
/// privileged (admin) set, and the current poll question.
///
/// Owned by the event loop; handlers only ever see it through `&mut`.
#[derive(Debug, Default)]
pub struct Server {
    registry: ConnectionRegistry,
    admins: Vec<SocketHandle>,
    question: Option<Question>,
}

impl Server {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn registry_mut(&mut self) -> &mut ConnectionRegistry {
        &mut self.registry
    }

    /// Remove a connection along with any admin entry for it.
    pub(crate) fn remove_connection(&mut self, handle: SocketHandle) -> Option<Connection> {
        self.admins.retain(|admin| *admin != handle);
        self.registry.remove(handle)
    }

    /// All live connections, including those still awaiting a handshake.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.registry.iter()
    }

    pub fn connection(&self, handle: SocketHandle) -> Option<&Connection> {
        self.registry.get(handle)
    }

    pub fn connection_mut(&mut self, handle: SocketHandle) -> Option<&mut Connection> {
        self.registry.get_mut(handle)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Frame and queue a payload for one connection.
    ///
    /// Returns false if the connection is unknown or its writer has gone away.
    pub fn send(&self, handle: SocketHandle, payload: &[u8]) -> bool {
        match self.registry.get(handle) {
            Some(connection) => dispatcher::send(connection, payload),
            None => false,
        }
    }

    /// Send a payload to every established connection. Returns how many accepted it.
    pub fn broadcast(&self, payload: &[u8]) -> usize {
        self.registry
            .iter()
            .filter(|connection| connection.is_established())
            .filter(|connection| dispatcher::send(connection, payload))
            .count()
    }

    /// Live connections registered as admins, in registration order.
    pub fn admins(&self) -> impl Iterator<Item = &Connection> {
        self.admins
            .iter()
            .filter_map(|handle| self.registry.get(*handle))
    }

    /// Register a connection as an admin. Returns false if it is unknown or already one.
    pub fn add_admin(&mut self, handle: SocketHandle) -> bool {
        if !self.registry.contains(handle) || self.admins.contains(&handle) {
            return false;
        }
        self.admins.push(handle);
        true
    }

    pub fn is_admin(&self, handle: SocketHandle) -> bool {
        self.admins.contains(&handle)
    }

    /// Replace the current question.
    pub fn create_question(
        &mut self,
        text: impl Into<String>,
        choices: Vec<String>,
    ) -> &mut Question {
        self.question.insert(Question::new(text, choices))
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn question_mut(&mut self) -> Option<&mut Question> {
        self.question.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    async fn connect(server: &mut Server, listener: &TcpListener) -> (TcpStream, SocketHandle) {
        let (tx, _rx) = mpsc::channel(8);
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        let handle = server
            .registry_mut()
            .add(Connection::open(stream, peer, tx, &ConnectionConfig::default()));
        (client, handle)
    }

    #[tokio::test]
    async fn admins_follow_connection_lifetime() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut server = Server::new();
        let (_a, first) = connect(&mut server, &listener).await;
        let (_b, second) = connect(&mut server, &listener).await;

        assert!(server.add_admin(first));
        assert!(!server.add_admin(first));
        assert!(server.is_admin(first));
        assert!(!server.is_admin(second));
        assert_eq!(server.admins().count(), 1);

        server.remove_connection(first);
        assert!(!server.is_admin(first));
        assert_eq!(server.admins().count(), 0);
        assert!(!server.add_admin(first));
    }

    #[tokio::test]
    async fn broadcast_skips_pending_handshakes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut server = Server::new();
        let (mut established, handle) = connect(&mut server, &listener).await;
        let (_pending, _) = connect(&mut server, &listener).await;
        server.connection_mut(handle).unwrap().mark_established();

        assert_eq!(server.broadcast(b"hi"), 1);

        let mut frame = [0u8; 4];
        established.read_exact(&mut frame).await.unwrap();
        assert_eq!(&frame, b"\x00hi\xff");
    }

    #[tokio::test]
    async fn send_to_unknown_handle_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut server = Server::new();
        let (_client, handle) = connect(&mut server, &listener).await;
        server.remove_connection(handle);
        assert!(!server.send(handle, b"late"));
    }

    #[test]
    fn question_replaced_on_create() {
        let mut server = Server::new();
        assert!(server.question().is_none());

        let first = server.create_question("one?", vec!["a".into()]).id();
        server.question_mut().unwrap().vote(0).unwrap();
        let second = server.create_question("two?", vec!["b".into(), "c".into()]).id();

        assert_ne!(first, second);
        assert_eq!(server.question().unwrap().total_votes(), 0);
    }
}
