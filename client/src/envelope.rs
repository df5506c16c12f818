//! Message envelope
//!
//! Every message travels as a fixed 16 byte header followed by one encoded
//! root tag.

use bytes::{BufMut, BytesMut};
use log::trace;
use tiesdb_core::{decode, encode, Tag};

use crate::error::{protocol_error, Result};

/// Length of the envelope header
pub const HEADER_LENGTH: usize = 16;

/// Envelope header: magic, protocol revision and flags
pub const HEADER: [u8; HEADER_LENGTH] = [
    0xc0, 0x01, 0xba, 0x5e, 0x12, 0x25, 0xef, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// Prefix `body` with the envelope header
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_LENGTH + body.len());
    buf.put_slice(&HEADER);
    buf.put_slice(body);
    buf.to_vec()
}

/// Strip and check the envelope header
pub fn unframe(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < HEADER_LENGTH {
        return Err(protocol_error(format!(
            "Message of {} bytes is shorter than the envelope header",
            frame.len()
        )));
    }
    let (header, body) = frame.split_at(HEADER_LENGTH);
    if header != HEADER {
        return Err(protocol_error(format!(
            "Wrong message header: {}",
            hex::encode(header)
        )));
    }
    Ok(body)
}

/// Encode a root tag and frame it
pub fn encode_message(message: &Tag) -> Result<Vec<u8>> {
    let body = encode(message)?;
    trace!("{}: {}", message.name(), hex::encode(&body));
    Ok(frame(&body))
}

/// Unframe and decode a root tag
pub fn decode_message(frame: &[u8]) -> Result<Tag> {
    let body = unframe(frame)?;
    Ok(decode(body)?)
}
