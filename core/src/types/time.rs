//! Time values as signed offsets from the protocol epoch (2001-01-01T00:00:00Z)

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::numeric::{decode_signed, encode_signed};
use crate::error::{CoreError, Result};

/// Seconds between the Unix epoch and the protocol epoch
pub const EPOCH_DELAY_SECS: i64 = 978_307_200;

/// Resolution of an encoded time offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Nanoseconds
    Nanoseconds,

    /// Microseconds
    Microseconds,

    /// Milliseconds
    #[default]
    Milliseconds,

    /// Seconds
    Seconds,
}

impl TimeUnit {
    fn to_duration(self, offset: i64) -> Option<Duration> {
        let millis = match self {
            TimeUnit::Nanoseconds => return Some(Duration::nanoseconds(offset)),
            TimeUnit::Microseconds => return Some(Duration::microseconds(offset)),
            TimeUnit::Milliseconds => offset,
            TimeUnit::Seconds => offset.checked_mul(1000)?,
        };
        // i64::MIN milliseconds is outside the representable range
        (millis != i64::MIN).then(|| Duration::milliseconds(millis))
    }

    fn from_duration(self, duration: Duration) -> Option<i64> {
        match self {
            TimeUnit::Nanoseconds => duration.num_nanoseconds(),
            TimeUnit::Microseconds => duration.num_microseconds(),
            TimeUnit::Milliseconds => Some(duration.num_milliseconds()),
            TimeUnit::Seconds => Some(duration.num_seconds()),
        }
    }
}

/// The protocol epoch
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(EPOCH_DELAY_SECS, 0)
        .single()
        .unwrap_or_default()
}

/// Offset of `time` from the protocol epoch, truncated to `unit`
pub fn time_to_offset(time: &DateTime<Utc>, unit: TimeUnit) -> Result<i64> {
    unit.from_duration(time.signed_duration_since(epoch()))
        .ok_or_else(|| CoreError::InvalidValue(format!("Time {} overflows {:?}", time, unit)))
}

/// Inverse of [`time_to_offset`]
pub fn offset_to_time(offset: i64, unit: TimeUnit) -> Result<DateTime<Utc>> {
    unit.to_duration(offset)
        .and_then(|duration| epoch().checked_add_signed(duration))
        .ok_or_else(|| CoreError::InvalidValue(format!("Time offset {} is out of range", offset)))
}

/// Encode a time as a minimal signed offset
pub fn encode_time(time: &DateTime<Utc>, unit: TimeUnit) -> Result<Vec<u8>> {
    Ok(encode_signed(time_to_offset(time, unit)?))
}

/// Decode a minimal signed offset
pub fn decode_time(data: &[u8], unit: TimeUnit) -> Result<DateTime<Utc>> {
    offset_to_time(decode_signed(data)?, unit)
}
