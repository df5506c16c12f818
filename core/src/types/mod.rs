//! Logical field types and their byte encodings
//!
//! Every value carried in a `FieldValue` or a static query argument is encoded
//! here. The conversion is pure and bidirectional: `decode(encode(v)) == v`
//! for every supported type.

pub mod numeric;
pub mod time;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{to_value_error, CoreError, Result};
use numeric::{
    decode_bigint, decode_decimal, decode_signed, encode_bigint, encode_decimal, encode_signed,
};
pub use time::{TimeUnit, EPOCH_DELAY_SECS};

/// Length of a UUID value
pub const UUID_LENGTH: usize = 16;

/// Logical type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// true or false
    Boolean,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Long,
    /// Arbitrary width signed integer
    BigInt,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// Arbitrary precision decimal
    Decimal,
    /// Time span as a scaled decimal
    Duration,
    /// UTF-8 text
    String,
    /// ASCII text
    Ascii,
    /// Raw bytes
    Binary,
    /// Point in time
    Time,
    /// 16-byte identifier
    Uuid,
}

impl ValueType {
    /// Wire name, as carried in `FieldType`
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Long => "long",
            ValueType::BigInt => "bigint",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Decimal => "decimal",
            ValueType::Duration => "duration",
            ValueType::String => "string",
            ValueType::Ascii => "ascii",
            ValueType::Binary => "binary",
            ValueType::Time => "time",
            ValueType::Uuid => "uuid",
        }
    }
}

impl FromStr for ValueType {
    type Err = CoreError;

    /// Case-insensitive; `varchar`/`text` alias `string`, `int` aliases `integer`
    fn from_str(s: &str) -> Result<Self> {
        let value_type = match s.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ValueType::Boolean,
            "integer" | "int" => ValueType::Integer,
            "long" => ValueType::Long,
            "bigint" => ValueType::BigInt,
            "float" => ValueType::Float,
            "double" => ValueType::Double,
            "decimal" => ValueType::Decimal,
            "duration" => ValueType::Duration,
            "string" | "varchar" | "text" => ValueType::String,
            "ascii" => ValueType::Ascii,
            "binary" | "blob" => ValueType::Binary,
            "time" | "timestamp" => ValueType::Time,
            "uuid" => ValueType::Uuid,
            other => {
                return Err(CoreError::InvalidValue(format!("Unknown value type {}", other)))
            }
        };
        Ok(value_type)
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Boolean(bool),
    /// 32-bit integer
    Integer(i32),
    /// 64-bit integer
    Long(i64),
    /// Arbitrary width integer
    BigInt(BigInt),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// Arbitrary precision decimal
    Decimal(BigDecimal),
    /// Duration in seconds
    Duration(BigDecimal),
    /// UTF-8 text
    String(String),
    /// ASCII text
    Ascii(String),
    /// Raw bytes
    Binary(Vec<u8>),
    /// Point in time
    Time(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
}

impl Value {
    /// Logical type of the value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Long(_) => ValueType::Long,
            Value::BigInt(_) => ValueType::BigInt,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Duration(_) => ValueType::Duration,
            Value::String(_) => ValueType::String,
            Value::Ascii(_) => ValueType::Ascii,
            Value::Binary(_) => ValueType::Binary,
            Value::Time(_) => ValueType::Time,
            Value::Uuid(_) => ValueType::Uuid,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

/// Converts values to bytes and back for a configured time resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueCodec {
    time_unit: TimeUnit,
}

impl ValueCodec {
    /// Create a codec writing times in `time_unit`
    pub fn new(time_unit: TimeUnit) -> Self {
        Self { time_unit }
    }

    /// Time resolution of the codec
    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    /// Encode `value` as `value_type`
    ///
    /// The value must already be of the requested type; widening between
    /// integer types and from integers to decimals is allowed.
    pub fn encode(&self, value_type: ValueType, value: &Value) -> Result<Vec<u8>> {
        let encoded = match (value_type, value) {
            (ValueType::Boolean, Value::Boolean(b)) => vec![u8::from(*b)],
            (ValueType::Integer, Value::Integer(i)) => encode_signed(i64::from(*i)),
            (ValueType::Long | ValueType::BigInt, Value::Integer(i)) => {
                encode_signed(i64::from(*i))
            }
            (ValueType::Long | ValueType::BigInt, Value::Long(l)) => encode_signed(*l),
            (ValueType::BigInt, Value::BigInt(b)) => encode_bigint(b),
            (ValueType::Float, Value::Float(f)) => encode_decimal(&float_to_decimal(f)?)?,
            (ValueType::Double, Value::Double(d)) => encode_decimal(&float_to_decimal(d)?)?,
            (ValueType::Double, Value::Float(f)) => {
                encode_decimal(&float_to_decimal(&f64::from(*f))?)?
            }
            (ValueType::Decimal | ValueType::Duration, Value::Decimal(d) | Value::Duration(d)) => {
                encode_decimal(d)?
            }
            (ValueType::Decimal | ValueType::Duration, Value::Integer(i)) => {
                encode_decimal(&BigDecimal::from(*i))?
            }
            (ValueType::Decimal | ValueType::Duration, Value::Long(l)) => {
                encode_decimal(&BigDecimal::from(*l))?
            }
            (ValueType::String, Value::String(s) | Value::Ascii(s)) => s.as_bytes().to_vec(),
            (ValueType::Ascii, Value::Ascii(s) | Value::String(s)) => {
                if !s.is_ascii() {
                    return Err(CoreError::InvalidValue(format!("{:?} is not ASCII", s)));
                }
                s.as_bytes().to_vec()
            }
            (ValueType::Binary, Value::Binary(b)) => b.clone(),
            (ValueType::Time, Value::Time(t)) => time::encode_time(t, self.time_unit)?,
            (ValueType::Uuid, Value::Uuid(u)) => u.as_bytes().to_vec(),
            (target, value) => {
                return Err(CoreError::InvalidValue(format!(
                    "Cannot encode {} value as {}",
                    value.value_type(),
                    target
                )))
            }
        };
        Ok(encoded)
    }

    /// Decode bytes written for `value_type`
    pub fn decode(&self, value_type: ValueType, data: &[u8]) -> Result<Value> {
        let value = match value_type {
            ValueType::Boolean => {
                let byte = data.first().ok_or_else(|| {
                    CoreError::Parse("Boolean value carries no bytes".to_string())
                })?;
                Value::Boolean(*byte != 0)
            }
            ValueType::Integer => {
                let wide = decode_signed(data)?;
                Value::Integer(i32::try_from(wide).map_err(to_value_error)?)
            }
            ValueType::Long => Value::Long(decode_signed(data)?),
            ValueType::BigInt => Value::BigInt(decode_bigint(data)),
            ValueType::Float => {
                let decimal = decode_decimal(data)?;
                Value::Float(decimal_to_float_text(&decimal).parse().map_err(to_value_error)?)
            }
            ValueType::Double => {
                let decimal = decode_decimal(data)?;
                Value::Double(decimal_to_float_text(&decimal).parse().map_err(to_value_error)?)
            }
            ValueType::Decimal => Value::Decimal(decode_decimal(data)?),
            ValueType::Duration => Value::Duration(decode_decimal(data)?),
            ValueType::String => {
                Value::String(String::from_utf8(data.to_vec()).map_err(to_value_error)?)
            }
            ValueType::Ascii => {
                if !data.is_ascii() {
                    return Err(CoreError::InvalidValue(
                        "Non-ASCII bytes in ascii value".to_string(),
                    ));
                }
                Value::Ascii(String::from_utf8(data.to_vec()).map_err(to_value_error)?)
            }
            ValueType::Binary => Value::Binary(data.to_vec()),
            ValueType::Time => Value::Time(time::decode_time(data, self.time_unit)?),
            ValueType::Uuid => {
                let bytes: [u8; UUID_LENGTH] = data.try_into().map_err(|_| {
                    CoreError::InvalidValue(format!("UUID must be 16 bytes, got {}", data.len()))
                })?;
                Value::Uuid(Uuid::from_bytes(bytes))
            }
        };
        Ok(value)
    }
}

/// Encode with the default (millisecond) codec
pub fn encode_value(value_type: ValueType, value: &Value) -> Result<Vec<u8>> {
    ValueCodec::default().encode(value_type, value)
}

/// Decode with the default (millisecond) codec
pub fn decode_value(value_type: ValueType, data: &[u8]) -> Result<Value> {
    ValueCodec::default().decode(value_type, data)
}

/// Fit arbitrary bytes into a UUID: keep the last 16 bytes, left-pad with zeros
pub fn to_uuid_bytes(data: &[u8]) -> [u8; UUID_LENGTH] {
    let mut out = [0u8; UUID_LENGTH];
    let tail = &data[data.len().saturating_sub(UUID_LENGTH)..];
    out[UUID_LENGTH - tail.len()..].copy_from_slice(tail);
    out
}

/// Exact decimal form of a float, through its shortest round-trip text
fn float_to_decimal<F: std::fmt::LowerExp + Copy + Into<f64>>(value: &F) -> Result<BigDecimal> {
    if !(*value).into().is_finite() {
        return Err(CoreError::InvalidValue("Non-finite floats cannot be encoded".to_string()));
    }
    BigDecimal::from_str(&format!("{:e}", value)).map_err(to_value_error)
}

fn decimal_to_float_text(value: &BigDecimal) -> String {
    let (unscaled, scale) = value.as_bigint_and_exponent();
    format!("{}e{}", unscaled, -scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rstest::rstest;

    fn round_trip(value: Value) {
        let value_type = value.value_type();
        let encoded = encode_value(value_type, &value).unwrap();
        assert_eq!(decode_value(value_type, &encoded).unwrap(), value);
    }

    #[rstest]
    #[case(Value::Boolean(false))]
    #[case(Value::Boolean(true))]
    #[case(Value::Integer(423_424_432))]
    #[case(Value::Integer(i32::MIN))]
    #[case(Value::Long(-278_374_928_374))]
    #[case(Value::BigInt(BigInt::parse_bytes(b"-123456789012345678901234567890", 10).unwrap()))]
    #[case(Value::Float(-42803.234e-8))]
    #[case(Value::Double(158.234e200))]
    #[case(Value::Decimal(BigDecimal::from_str("-1.235e-2318").unwrap()))]
    #[case(Value::Duration(BigDecimal::from(20 * 86_400)))]
    #[case(Value::String("This is UTF-8 строка".to_string()))]
    #[case(Value::Ascii("plain".to_string()))]
    #[case(Value::Binary(hex::decode("e0a61e5ad74f").unwrap()))]
    #[case(Value::Time(Utc.with_ymd_and_hms(2018, 6, 27, 10, 1, 25).unwrap()))]
    #[case(Value::Uuid(Uuid::new_v4()))]
    fn test_value_round_trip(#[case] value: Value) {
        round_trip(value);
    }

    #[test]
    fn test_boolean_layout() {
        assert_eq!(encode_value(ValueType::Boolean, &Value::Boolean(true)).unwrap(), vec![1]);
        assert_eq!(encode_value(ValueType::Boolean, &Value::Boolean(false)).unwrap(), vec![0]);
        assert_eq!(decode_value(ValueType::Boolean, &[7]).unwrap(), Value::Boolean(true));
        assert!(decode_value(ValueType::Boolean, &[]).is_err());
    }

    #[test]
    fn test_decimal_layout() {
        let value = Value::Decimal(BigDecimal::from_str("-1.235e-2318").unwrap());
        assert_eq!(hex::encode(encode_value(ValueType::Decimal, &value).unwrap()), "5222fb2d");
    }

    #[test]
    fn test_integer_widening() {
        let bytes = encode_value(ValueType::Long, &Value::Integer(-2)).unwrap();
        assert_eq!(bytes, vec![0xfe]);
        assert_eq!(decode_value(ValueType::Long, &bytes).unwrap(), Value::Long(-2));
    }

    #[test]
    fn test_integer_overflow_rejected() {
        let bytes = encode_value(ValueType::Long, &Value::Long(i64::from(i32::MAX) + 1)).unwrap();
        assert!(matches!(
            decode_value(ValueType::Integer, &bytes),
            Err(CoreError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        assert!(encode_value(ValueType::Uuid, &Value::Boolean(true)).is_err());
        let text = Value::String("строка".to_string());
        assert!(encode_value(ValueType::Ascii, &text).is_err());
        assert!(encode_value(ValueType::Double, &Value::Double(f64::NAN)).is_err());
        assert!(decode_value(ValueType::Uuid, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_time_unit_configurable() {
        let time = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 2).unwrap();
        let seconds = ValueCodec::new(TimeUnit::Seconds);
        assert_eq!(seconds.encode(ValueType::Time, &Value::Time(time)).unwrap(), vec![2]);
        let millis = ValueCodec::default();
        assert_eq!(millis.encode(ValueType::Time, &Value::Time(time)).unwrap(), vec![0x07, 0xd0]);
    }

    #[rstest]
    #[case(&[0x01], "00000000000000000000000000000001")]
    #[case(&[0xaa; 18], "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")]
    #[case(&[], "00000000000000000000000000000000")]
    fn test_to_uuid_bytes(#[case] input: &[u8], #[case] expected: &str) {
        assert_eq!(hex::encode(to_uuid_bytes(input)), expected);
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!("UUID".parse::<ValueType>().unwrap(), ValueType::Uuid);
        assert_eq!("varchar".parse::<ValueType>().unwrap(), ValueType::String);
        assert_eq!(ValueType::Duration.to_string(), "duration");
        assert!("list".parse::<ValueType>().is_err());
    }

    proptest! {
        #[test]
        fn prop_double_round_trip(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let encoded = encode_value(ValueType::Double, &Value::Double(value)).unwrap();
            let decoded = decode_value(ValueType::Double, &encoded).unwrap();
            prop_assert_eq!(decoded, Value::Double(value));
        }

        #[test]
        fn prop_float_round_trip(value in any::<f32>().prop_filter("finite", |v| v.is_finite())) {
            let encoded = encode_value(ValueType::Float, &Value::Float(value)).unwrap();
            prop_assert_eq!(decode_value(ValueType::Float, &encoded).unwrap(), Value::Float(value));
        }

        #[test]
        fn prop_string_round_trip(value in ".*") {
            let encoded = encode_value(ValueType::String, &Value::String(value.clone())).unwrap();
            let decoded = decode_value(ValueType::String, &encoded).unwrap();
            prop_assert_eq!(decoded, Value::String(value));
        }
    }
}
