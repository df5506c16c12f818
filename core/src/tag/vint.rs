//! EBML variable-length integers
//!
//! The width of a vint is one plus the number of leading zero bits of its
//! first byte. The marker bit is stripped from the value. A value made of all
//! ones is reserved for "unknown size" and never produced.

use bytes::{BufMut, BytesMut};

use crate::error::{CoreError, Result};

/// Widest vint the codec accepts
pub const MAX_VINT_WIDTH: usize = 8;

/// Widest tag id the codec accepts
pub const MAX_ID_WIDTH: usize = 4;

/// Width of the vint starting with `first`, or `None` for a zero byte
fn width_of(first: u8) -> Option<usize> {
    match first.leading_zeros() as usize {
        8 => None,
        zeros => Some(zeros + 1),
    }
}

/// Largest value a vint of `width` bytes can carry
fn max_value(width: usize) -> u64 {
    (1u64 << (7 * width)) - 2
}

/// Minimal vint width for `value`
pub fn encoded_width(value: u64) -> Result<usize> {
    (1..=MAX_VINT_WIDTH)
        .find(|width| value <= max_value(*width))
        .ok_or_else(|| CoreError::InvalidValue(format!("Value {} does not fit a vint", value)))
}

/// Append the minimal vint encoding of `value`
pub fn put_vint(buf: &mut BytesMut, value: u64) -> Result<()> {
    let width = encoded_width(value)?;
    let marked = value | (1u64 << (7 * width));
    buf.put_slice(&marked.to_be_bytes()[8 - width..]);
    Ok(())
}

/// Minimal vint encoding of `value`
pub fn encode_vint(value: u64) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(MAX_VINT_WIDTH);
    put_vint(&mut buf, value)?;
    Ok(buf.to_vec())
}

/// Read a vint from the front of `input`, returning the value and its width
pub fn read_vint(input: &[u8]) -> Result<(u64, usize)> {
    let first = *input
        .first()
        .ok_or_else(|| CoreError::Parse("Unexpected end of input reading vint".to_string()))?;

    let width = width_of(first)
        .ok_or_else(|| CoreError::Parse("Invalid vint marker byte 0x00".to_string()))?;

    if input.len() < width {
        return Err(CoreError::Parse(format!(
            "Vint needs {} bytes, {} available",
            width,
            input.len()
        )));
    }

    let mut value = u64::from(first) & ((1u64 << (8 - width)) - 1);
    for byte in &input[1..width] {
        value = (value << 8) | u64::from(*byte);
    }

    if value == max_value(width) + 1 {
        return Err(CoreError::Parse("Unknown-size elements are not supported".to_string()));
    }

    Ok((value, width))
}

/// Read a tag id from the front of `input`
pub fn read_id(input: &[u8]) -> Result<&[u8]> {
    let first = *input
        .first()
        .ok_or_else(|| CoreError::Parse("Unexpected end of input reading tag id".to_string()))?;

    let width = width_of(first)
        .filter(|width| *width <= MAX_ID_WIDTH)
        .ok_or_else(|| CoreError::Parse(format!("Invalid tag id marker 0x{:02x}", first)))?;

    input
        .get(..width)
        .ok_or_else(|| CoreError::Parse("Truncated tag id".to_string()))
}
