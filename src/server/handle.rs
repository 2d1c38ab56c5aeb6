//! Cloneable handle for talking to a running event loop from other tasks.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::net::{ConnectionInfo, SocketHandle};

/// The event loop has exited, so the request could not be served.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("event loop is no longer running")]
pub struct LoopStopped;

/// Requests executed inside the event loop, in arrival order.
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        handle: SocketHandle,
        payload: Vec<u8>,
        reply: oneshot::Sender<bool>,
    },
    Broadcast {
        payload: Vec<u8>,
        reply: oneshot::Sender<usize>,
    },
    Connections {
        reply: oneshot::Sender<Vec<ConnectionInfo>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Sends commands to the event loop and awaits its replies.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ServerHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Push a payload to one connection. Ok(false) if it is not connected.
    pub async fn send(
        &self,
        handle: SocketHandle,
        payload: impl Into<Vec<u8>>,
    ) -> Result<bool, LoopStopped> {
        let payload = payload.into();
        self.request(|reply| Command::Send {
            handle,
            payload,
            reply,
        })
        .await
    }

    /// Push a payload to every established connection.
    pub async fn broadcast(&self, payload: impl Into<Vec<u8>>) -> Result<usize, LoopStopped> {
        let payload = payload.into();
        self.request(|reply| Command::Broadcast { payload, reply })
            .await
    }

    /// Snapshot of every live connection.
    pub async fn connections(&self) -> Result<Vec<ConnectionInfo>, LoopStopped> {
        self.request(|reply| Command::Connections { reply }).await
    }

    /// Number of live connections, without building snapshots.
    pub async fn connection_count(&self) -> Result<usize, LoopStopped> {
        self.request(|reply| Command::Count { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LoopStopped> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| LoopStopped)?;
        response.await.map_err(|_| LoopStopped)
    }
}
