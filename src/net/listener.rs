//! TCP listener implementation.
//!
//! # Responsibilities
//! - Create, configure, bind and listen on the single accept socket
//! - Accept incoming TCP connections
//! - Report every startup step's failure distinctly (all are fatal)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Configured address does not parse.
    #[error("Invalid bind address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },
    /// Failed to create the socket.
    #[error("Failed to create socket: {0}")]
    Socket(#[source] std::io::Error),
    /// Failed to set a socket option.
    #[error("Failed to set socket option: {0}")]
    SocketOption(#[source] std::io::Error),
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
    /// Failed to start listening.
    #[error("Failed to listen: {0}")]
    Listen(#[source] std::io::Error),
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// The accept socket.
///
/// Never treated as a connection; the event loop polls it alongside the
/// connection events.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with the configured backlog.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|source| ListenerError::InvalidAddress {
                address: config.bind_address.clone(),
                source,
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Socket)?;

        if config.reuse_address {
            socket
                .set_reuseaddr(true)
                .map_err(ListenerError::SocketOption)?;
        }
        socket.bind(addr).map_err(ListenerError::Bind)?;
        let inner = socket.listen(config.backlog).map_err(ListenerError::Listen)?;

        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ListenerConfig {
        ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            ..ListenerConfig::default()
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port_and_accepts() {
        let listener = Listener::bind(&loopback()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = TcpStream::connect(addr).await.unwrap();
        let (_stream, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn rejects_unparseable_address() {
        let config = ListenerConfig {
            bind_address: "not an address".into(),
            ..ListenerConfig::default()
        };
        assert!(matches!(
            Listener::bind(&config),
            Err(ListenerError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn second_bind_without_reuse_fails() {
        let first = Listener::bind(&loopback()).unwrap();
        let config = ListenerConfig {
            bind_address: first.local_addr().unwrap().to_string(),
            reuse_address: false,
            ..ListenerConfig::default()
        };
        assert!(matches!(Listener::bind(&config), Err(ListenerError::Bind(_))));
    }
}
