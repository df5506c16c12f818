//! Integer and scaled-decimal byte layouts
//!
//! Integers are written in their shortest big-endian form: unsigned values
//! without a sign bit, signed values in two's complement. Decimals write the
//! zig-zag transformed scale as a vint followed by the unscaled value.

use bigdecimal::BigDecimal;
use bytes::BytesMut;
use num_bigint::BigInt;

use crate::error::{CoreError, Result};
use crate::tag::vint::{put_vint, read_vint};

/// Minimal big-endian unsigned encoding; zero is a single `0x00`
pub fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

/// Decode up to eight big-endian bytes; an empty slice is zero
pub fn decode_unsigned(data: &[u8]) -> Result<u64> {
    if data.len() > 8 {
        return Err(CoreError::Parse(format!(
            "Unsigned integer of {} bytes exceeds 64 bits",
            data.len()
        )));
    }
    Ok(data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Minimal two's-complement big-endian encoding
pub fn encode_signed(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Decode up to eight two's-complement bytes; an empty slice is zero
pub fn decode_signed(data: &[u8]) -> Result<i64> {
    if data.len() > 8 {
        return Err(CoreError::Parse(format!(
            "Signed integer of {} bytes exceeds 64 bits",
            data.len()
        )));
    }
    let Some(first) = data.first() else {
        return Ok(0);
    };
    let seed: i64 = if first & 0x80 != 0 { -1 } else { 0 };
    Ok(data.iter().fold(seed, |acc, b| (acc << 8) | i64::from(*b)))
}

/// Minimal two's-complement encoding of an arbitrary width integer
pub fn encode_bigint(value: &BigInt) -> Vec<u8> {
    value.to_signed_bytes_be()
}

/// Decode an arbitrary width two's-complement integer
pub fn decode_bigint(data: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(data)
}

/// Map a signed scale onto the non-negative integers
pub fn zigzag_scale(scale: i64) -> Result<u64> {
    let doubled = scale.unsigned_abs().checked_mul(2);
    let encoded = if scale >= 0 {
        doubled
    } else {
        doubled.and_then(|d| d.checked_add(1))
    };
    encoded.ok_or_else(|| {
        CoreError::InvalidValue(format!("Decimal scale {} is out of range", scale))
    })
}

/// Inverse of [`zigzag_scale`]
pub fn unzigzag_scale(encoded: u64) -> i64 {
    let magnitude = (encoded >> 1) as i64;
    if encoded & 1 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// `vint(zigzag(scale)) ‖ two's-complement(unscaled)`
pub fn encode_decimal(value: &BigDecimal) -> Result<Vec<u8>> {
    let (unscaled, scale) = value.as_bigint_and_exponent();
    let mut buf = BytesMut::new();
    put_vint(&mut buf, zigzag_scale(scale)?)?;
    buf.extend_from_slice(&unscaled.to_signed_bytes_be());
    Ok(buf.to_vec())
}

/// Decode the scaled decimal layout written by [`encode_decimal`]
pub fn decode_decimal(data: &[u8]) -> Result<BigDecimal> {
    let (encoded_scale, width) = read_vint(data)?;
    let unscaled = &data[width..];
    if unscaled.is_empty() {
        return Err(CoreError::Parse("Decimal carries no unscaled value".to_string()));
    }
    Ok(BigDecimal::new(
        decode_bigint(unscaled),
        unzigzag_scale(encoded_scale),
    ))
}
