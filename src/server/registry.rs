//! Connection registry.
//!
//! Owns every live [`Connection`], keyed by socket handle. The listening
//! socket is never stored here. Removing an entry hands the record back to
//! the caller; dropping it closes the socket.

use std::collections::BTreeMap;

use crate::net::{Connection, SocketHandle};

/// The set of live connections, iterated in accept order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<SocketHandle, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection. Returns its handle.
    pub fn add(&mut self, connection: Connection) -> SocketHandle {
        let handle = connection.handle();
        self.connections.insert(handle, connection);
        handle
    }

    /// Stop tracking a connection and return it.
    pub fn remove(&mut self, handle: SocketHandle) -> Option<Connection> {
        self.connections.remove(&handle)
    }

    pub fn get(&self, handle: SocketHandle) -> Option<&Connection> {
        self.connections.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SocketHandle) -> Option<&mut Connection> {
        self.connections.get_mut(&handle)
    }

    pub fn contains(&self, handle: SocketHandle) -> bool {
        self.connections.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Drop every connection, closing their sockets. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }
}
