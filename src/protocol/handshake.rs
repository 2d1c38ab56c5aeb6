//! Legacy upgrade handshake negotiation.
//!
//! Supports both pre-standard variants:
//! - **Keyed**: the request carries `Sec-WebSocket-Key1`/`Key2` plus eight
//!   opaque bytes after the header block; the response proves the challenge
//!   was solved with a 16-byte MD5 digest.
//! - **Plain**: no keys; the response uses unprefixed `WebSocket-Origin` and
//!   `WebSocket-Location` headers and carries no binary payload.
//!
//! The request is expected in a single read. Nothing is buffered across reads.

use std::collections::HashMap;

use md5::{Digest, Md5};
use thiserror::Error;

/// First legacy security key header.
pub const KEY1_HEADER: &str = "Sec-WebSocket-Key1";

/// Second legacy security key header.
pub const KEY2_HEADER: &str = "Sec-WebSocket-Key2";

const STATUS_LINE: &str = "HTTP/1.1 101 Web Socket Protocol Handshake\r\n";

/// Handshake negotiation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// A security key contains no space characters, so its number is undefined.
    #[error("{header} contains no spaces")]
    NoSpaces { header: &'static str },

    /// A security key's derived number does not fit in 32 bits.
    #[error("{header} does not reduce to a 32-bit number")]
    KeyOverflow { header: &'static str },
}

/// The parts of an upgrade request the negotiator cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Path from the `GET <path> HTTP` line, if one was found.
    pub resource: Option<String>,
    /// `Name: Value` header lines, trimmed.
    pub headers: HashMap<String, String>,
    /// Bytes following the last CRLF; the challenge for the keyed variant.
    pub security_code: Vec<u8>,
}

impl HandshakeRequest {
    /// Parse a raw request. Never fails; missing pieces are left empty.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);

        let resource = text.split('\n').find_map(|line| {
            let start = line.find("GET ")? + 4;
            let rest = &line[start..];
            rest.find(" HTTP").map(|end| rest[..end].to_string())
        });

        let security_code = raw
            .windows(2)
            .rposition(|w| w == b"\r\n")
            .map(|pos| raw[pos + 2..].to_vec())
            .unwrap_or_default();

        let headers = text
            .split("\r\n")
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        Self {
            resource,
            headers,
            security_code,
        }
    }

    /// Look up a header by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Which legacy variant was negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeVariant {
    Keyed,
    Plain,
}

impl HandshakeVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeVariant::Keyed => "keyed",
            HandshakeVariant::Plain => "plain",
        }
    }
}

/// A completed negotiation: the parsed request and the bytes to write back.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub request: HandshakeRequest,
    pub variant: HandshakeVariant,
    /// Full response, including the trailing NUL byte.
    pub response: Vec<u8>,
}

/// Negotiate a handshake from the first bytes read on a connection.
pub fn negotiate(raw: &[u8]) -> Result<Handshake, HandshakeError> {
    let request = HandshakeRequest::parse(raw);

    let security_response = match (request.header(KEY1_HEADER), request.header(KEY2_HEADER)) {
        (Some(key1), Some(key2)) => Some(security_response(key1, key2, &request.security_code)?),
        _ => None,
    };

    let origin = request.header("Origin").unwrap_or_default();
    let host = request.header("Host").unwrap_or_default();
    let resource = request.resource.as_deref().unwrap_or_default();

    let (variant, prefix) = match security_response {
        Some(_) => (HandshakeVariant::Keyed, "Sec-"),
        None => (HandshakeVariant::Plain, ""),
    };

    let mut response = format!(
        "{STATUS_LINE}\
         Upgrade: WebSocket\r\n\
         Connection: Upgrade\r\n\
         {prefix}WebSocket-Origin: {origin}\r\n\
         {prefix}WebSocket-Location: ws://{host}{resource}\r\n\
         \r\n"
    )
    .into_bytes();
    if let Some(digest) = security_response {
        response.extend_from_slice(&digest);
    }
    response.push(0);

    Ok(Handshake {
        request,
        variant,
        response,
    })
}

/// Compute the keyed variant's 16-byte answer.
///
/// Each key reduces to `digits / spaces`; both are packed big-endian, the
/// challenge bytes appended, and the whole run through MD5.
pub fn security_response(key1: &str, key2: &str, code: &[u8]) -> Result<[u8; 16], HandshakeError> {
    let number1 = key_number(KEY1_HEADER, key1)?;
    let number2 = key_number(KEY2_HEADER, key2)?;

    let mut hasher = Md5::new();
    hasher.update(number1.to_be_bytes());
    hasher.update(number2.to_be_bytes());
    hasher.update(code);
    Ok(hasher.finalize().into())
}

fn key_number(header: &'static str, key: &str) -> Result<u32, HandshakeError> {
    let spaces = key.chars().filter(|c| *c == ' ').count() as u64;
    if spaces == 0 {
        return Err(HandshakeError::NoSpaces { header });
    }

    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    let number = if digits.is_empty() {
        0
    } else {
        digits
            .parse::<u64>()
            .map_err(|_| HandshakeError::KeyOverflow { header })?
    };

    u32::try_from(number / spaces).map_err(|_| HandshakeError::KeyOverflow { header })
}
