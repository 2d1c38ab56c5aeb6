//! Legacy message framing.
//!
//! Every message travels as `0x00 <payload> 0xFF`. There is no length field
//! and no escaping, so a payload must not contain `0xFF`.

use thiserror::Error;

/// Byte that opens a frame.
pub const FRAME_START: u8 = 0x00;

/// Byte that closes a frame.
pub const FRAME_END: u8 = 0xFF;

/// Errors raised while unwrapping a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Input cannot hold both markers.
    #[error("frame of {0} bytes is too short to carry start and end markers")]
    TooShort(usize),
}

/// Wrap a payload in start and end markers.
pub fn wrap(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(FRAME_START);
    frame.extend_from_slice(payload);
    frame.push(FRAME_END);
    frame
}

/// Strip exactly one leading and one trailing byte.
///
/// The marker values themselves are not checked.
pub fn unwrap(frame: &[u8]) -> Result<&[u8], FrameError> {
    if frame.len() < 2 {
        return Err(FrameError::TooShort(frame.len()));
    }
    Ok(&frame[1..frame.len() - 1])
}
