//! Connection record and per-socket I/O tasks.
//!
//! # Responsibilities
//! - Generate unique connection IDs and socket handles
//! - Track handshake state (AwaitingHandshake → Established)
//! - Own the socket: a reader task forwards raw reads to the event loop,
//!   a writer task drains queued frames onto the wire
//! - Bound what is buffered in-process: readers wait on a full event queue,
//!   sends fail on a full outbound queue
//! - Close the socket exactly once, when the record is dropped

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::AbortHandle;

use crate::config::ConnectionConfig;

/// Upper bound on bytes taken from the socket per read.
pub const READ_BUFFER_SIZE: usize = 2048;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Global atomic counter for socket handles. Handles are never reused.
static SOCKET_HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Key under which the registry tracks a connection's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SocketHandle(u64);

impl SocketHandle {
    fn next() -> Self {
        Self(SOCKET_HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sock-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Accepted; the next read is the upgrade request.
    AwaitingHandshake,
    /// Handshake done; every read is a frame.
    Established,
}

/// What a reader task reports back to the event loop.
#[derive(Debug)]
pub enum SocketEvent {
    /// Bytes from one read, at most [`READ_BUFFER_SIZE`].
    Data {
        handle: SocketHandle,
        bytes: Vec<u8>,
    },
    /// The peer closed (zero-byte read) or the read failed.
    Closed {
        handle: SocketHandle,
        error: Option<std::io::Error>,
    },
}

/// Why bytes could not be queued for a connection's writer.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The outbound frame or byte budget is used up; the peer is not reading.
    #[error("outbound queue full")]
    Full,
    /// The writer has exited after a write failure.
    #[error("writer closed")]
    Closed,
}

/// Queued bytes plus their share of the connection's byte budget.
/// The share is returned once the bytes are on the wire.
#[derive(Debug)]
struct Outbound {
    bytes: Vec<u8>,
    _budget: OwnedSemaphorePermit,
}

/// One peer.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    handle: SocketHandle,
    peer_addr: SocketAddr,
    state: ConnectionState,
    last_activity: Option<SystemTime>,
    /// Application data. The server never reads or writes it.
    pub attributes: HashMap<String, serde_json::Value>,
    outbound: mpsc::Sender<Outbound>,
    outbound_budget: Arc<Semaphore>,
    reader: AbortHandle,
}

impl Connection {
    /// Take ownership of an accepted stream and start its I/O tasks.
    ///
    /// Reads are reported on `events`. Must be called from within a Tokio runtime.
    pub fn open(
        stream: TcpStream,
        peer_addr: SocketAddr,
        events: mpsc::Sender<SocketEvent>,
        limits: &ConnectionConfig,
    ) -> Self {
        let id = ConnectionId::new();
        let handle = SocketHandle::next();
        let (read_half, write_half) = stream.into_split();

        let reader = tokio::spawn(read_loop(handle, read_half, events)).abort_handle();
        let (outbound, queued) = mpsc::channel(limits.outbound_frames);
        tokio::spawn(write_loop(id, write_half, queued));

        Self {
            id,
            handle,
            peer_addr,
            state: ConnectionState::AwaitingHandshake,
            last_activity: None,
            attributes: HashMap::new(),
            outbound,
            outbound_budget: Arc::new(Semaphore::new(limits.outbound_bytes)),
            reader,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    /// Time of the last dispatched message, if any.
    pub fn last_activity(&self) -> Option<SystemTime> {
        self.last_activity
    }

    pub(crate) fn mark_established(&mut self) {
        self.state = ConnectionState::Established;
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Some(SystemTime::now());
    }

    /// Queue raw bytes for the writer without waiting.
    ///
    /// Bytes larger than the whole budget can never be queued.
    pub(crate) fn enqueue(&self, bytes: Vec<u8>) -> Result<(), EnqueueError> {
        let size = u32::try_from(bytes.len()).map_err(|_| EnqueueError::Full)?;
        let budget = Arc::clone(&self.outbound_budget)
            .try_acquire_many_owned(size)
            .map_err(|_| EnqueueError::Full)?;

        self.outbound
            .try_send(Outbound {
                bytes,
                _budget: budget,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Closed(_) => EnqueueError::Closed,
            })
    }

    /// Serializable snapshot of this connection.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            handle: self.handle,
            peer_addr: self.peer_addr,
            state: self.state,
            last_activity: self.last_activity,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // The writer exits once `outbound` is dropped with this record.
        self.reader.abort();
        tracing::trace!(connection_id = %self.id, handle = %self.handle, "Connection released");
    }
}

/// Point-in-time view of a connection, safe to hand outside the event loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub handle: SocketHandle,
    pub peer_addr: SocketAddr,
    pub state: ConnectionState,
    pub last_activity: Option<SystemTime>,
}

async fn read_loop(
    handle: SocketHandle,
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<SocketEvent>,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let event = match reader.read(&mut buffer).await {
            Ok(0) => SocketEvent::Closed {
                handle,
                error: None,
            },
            Ok(n) => SocketEvent::Data {
                handle,
                bytes: buffer[..n].to_vec(),
            },
            Err(e) => SocketEvent::Closed {
                handle,
                error: Some(e),
            },
        };
        let closed = matches!(event, SocketEvent::Closed { .. });
        // Waiting here leaves unread data in the OS receive buffer.
        if events.send(event).await.is_err() || closed {
            break;
        }
    }
}

async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut queued: mpsc::Receiver<Outbound>,
) {
    while let Some(outbound) = queued.recv().await {
        if let Err(e) = writer.write_all(&outbound.bytes).await {
            tracing::warn!(connection_id = %id, error = %e, "Write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        (client, server, peer)
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn socket_handles_increase() {
        let a = SocketHandle::next();
        let b = SocketHandle::next();
        assert!(b > a);
    }

    #[tokio::test]
    async fn reads_are_forwarded_then_close_reported() {
        let (mut client, server, peer) = pair().await;
        let (tx, mut rx) = mpsc::channel(8);
        let connection = Connection::open(server, peer, tx, &ConnectionConfig::default());
        assert_eq!(connection.state(), ConnectionState::AwaitingHandshake);

        client.write_all(b"ping").await.unwrap();
        match rx.recv().await.unwrap() {
            SocketEvent::Data { handle, bytes } => {
                assert_eq!(handle, connection.handle());
                assert_eq!(bytes, b"ping");
            }
            other => panic!("unexpected event {other:?}"),
        }

        drop(client);
        assert!(matches!(
            rx.recv().await.unwrap(),
            SocketEvent::Closed { error: None, .. }
        ));
    }

    #[tokio::test]
    async fn queued_bytes_reach_peer_and_drop_closes() {
        let (mut client, server, peer) = pair().await;
        let (tx, _rx) = mpsc::channel(8);
        let connection = Connection::open(server, peer, tx, &ConnectionConfig::default());

        assert_eq!(connection.enqueue(b"abc".to_vec()), Ok(()));
        drop(connection);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"abc");
    }

    fn limits(outbound_frames: usize, outbound_bytes: usize) -> ConnectionConfig {
        ConnectionConfig {
            outbound_frames,
            outbound_bytes,
            ..ConnectionConfig::default()
        }
    }

    // The test runtime is single-threaded, so the writer task does not run
    // until the test yields; nothing leaves the queue in between.
    #[tokio::test]
    async fn outbound_frame_limit_rejects_without_blocking() {
        let (_client, server, peer) = pair().await;
        let (tx, _rx) = mpsc::channel(8);
        let connection = Connection::open(server, peer, tx, &limits(2, 4096));

        assert_eq!(connection.enqueue(b"one".to_vec()), Ok(()));
        assert_eq!(connection.enqueue(b"two".to_vec()), Ok(()));
        assert_eq!(connection.enqueue(b"three".to_vec()), Err(EnqueueError::Full));
    }

    #[tokio::test]
    async fn outbound_byte_budget_rejects_without_blocking() {
        let (_client, server, peer) = pair().await;
        let (tx, _rx) = mpsc::channel(8);
        let connection = Connection::open(server, peer, tx, &limits(64, 2048));

        assert_eq!(connection.enqueue(vec![1; 1024]), Ok(()));
        assert_eq!(connection.enqueue(vec![2; 1024]), Ok(()));
        assert_eq!(connection.enqueue(vec![3; 1]), Err(EnqueueError::Full));
        assert_eq!(connection.enqueue(vec![4; 4096]), Err(EnqueueError::Full));
    }

    #[tokio::test]
    async fn budget_is_returned_once_written() {
        let (mut client, server, peer) = pair().await;
        let (tx, _rx) = mpsc::channel(8);
        let connection = Connection::open(server, peer, tx, &limits(64, 2048));

        assert_eq!(connection.enqueue(vec![7; 2048]), Ok(()));
        let mut received = vec![0u8; 2048];
        client.read_exact(&mut received).await.unwrap();

        // The writer drops the budget right after its write completes.
        tokio::task::yield_now().await;
        assert_eq!(connection.enqueue(vec![8; 2048]), Ok(()));
    }
}
