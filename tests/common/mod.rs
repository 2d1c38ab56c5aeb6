//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use ws_legacy_server::config::{ConnectionConfig, ListenerConfig, ServerConfig};
use ws_legacy_server::lifecycle::{launch, Launched};
use ws_legacy_server::{MessageHandler, ServerHandle, Shutdown};

pub const KEY1: &str = "4 @1  46546xW%0l 1 5";
pub const KEY2: &str = "12998 5 Y3 1  .P00";
pub const CHALLENGE: &[u8] = b"^n:ds[4U";
pub const ANSWER: &[u8] = b"8jKS'y:G*Co,Wxa-";

const TIMEOUT: Duration = Duration::from_secs(5);

/// Start a server on an ephemeral loopback port.
pub fn start<H: MessageHandler>(handler: H, max_connections: usize) -> (Launched, Shutdown) {
    start_with(handler, max_connections, ConnectionConfig::default())
}

/// Like [`start`], with explicit per-connection queue limits.
pub fn start_with<H: MessageHandler>(
    handler: H,
    max_connections: usize,
    connection: ConnectionConfig,
) -> (Launched, Shutdown) {
    let shutdown = Shutdown::new();
    let config = ServerConfig {
        listener: ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections,
            ..ListenerConfig::default()
        },
        connection,
        ..ServerConfig::default()
    };
    let launched = launch(&config, handler, &shutdown).unwrap();
    (launched, shutdown)
}

/// Draft-76 upgrade request carrying the reference keys.
pub fn keyed_request(addr: SocketAddr) -> Vec<u8> {
    let mut request = format!(
        "GET /demo HTTP/1.1\r\n\
         Upgrade: WebSocket\r\n\
         Connection: Upgrade\r\n\
         Host: {addr}\r\n\
         Origin: http://example.com\r\n\
         Sec-WebSocket-Key1: {KEY1}\r\n\
         Sec-WebSocket-Key2: {KEY2}\r\n\
         \r\n"
    )
    .into_bytes();
    request.extend_from_slice(CHALLENGE);
    request
}

pub fn keyed_response(addr: SocketAddr) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
         Upgrade: WebSocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Origin: http://example.com\r\n\
         Sec-WebSocket-Location: ws://{addr}/demo\r\n\
         \r\n"
    )
    .into_bytes();
    response.extend_from_slice(ANSWER);
    response.push(0);
    response
}

/// Draft-75 upgrade request (no keys).
pub fn plain_request(addr: SocketAddr) -> Vec<u8> {
    format!(
        "GET /chat HTTP/1.1\r\n\
         Upgrade: WebSocket\r\n\
         Connection: Upgrade\r\n\
         Host: {addr}\r\n\
         Origin: http://localhost\r\n\
         \r\n"
    )
    .into_bytes()
}

pub fn plain_response(addr: SocketAddr) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
         Upgrade: WebSocket\r\n\
         Connection: Upgrade\r\n\
         WebSocket-Origin: http://localhost\r\n\
         WebSocket-Location: ws://{addr}/chat\r\n\
         \r\n\0"
    )
    .into_bytes()
}

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TIMEOUT, future)
        .await
        .expect("timed out")
}

/// Read exactly `len` bytes.
pub async fn read_bytes(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; len];
    within(stream.read_exact(&mut buffer)).await.unwrap();
    buffer
}

/// Connect and complete a keyed handshake, checking the response byte for byte.
pub async fn connect_keyed(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&keyed_request(addr)).await.unwrap();
    let expected = keyed_response(addr);
    assert_eq!(read_bytes(&mut stream, expected.len()).await, expected);
    stream
}

/// Drop the stream so the peer sees a reset (RST) rather than a clean close.
#[allow(deprecated)]
pub fn reset(stream: TcpStream) {
    stream.set_linger(Some(Duration::ZERO)).unwrap();
    drop(stream);
}

/// True once the server has closed its side.
pub async fn closed_by_server(stream: &mut TcpStream) -> bool {
    let mut rest = Vec::new();
    matches!(within(stream.read_to_end(&mut rest)).await, Ok(0) | Err(_))
}

/// Poll until the server tracks exactly `expected` connections.
pub async fn wait_for_count(handle: &ServerHandle, expected: usize) {
    within(async {
        loop {
            if handle.connection_count().await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}
