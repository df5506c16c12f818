//! Static argument conversion
//!
//! A literal is sent as `ArgStaticType` plus `ArgStaticValue`. Without a
//! requested type it travels in its natural type; otherwise it is converted
//! along this matrix (anything else is a compile error):
//!
//! | literal | accepted targets |
//! |---|---|
//! | INTEGER, DECIMAL | every numeric type, time, duration, string, ascii, boolean, binary, uuid |
//! | UUID | uuid, binary, string, ascii |
//! | BOOLEAN | boolean, string, ascii, every numeric type (as 0 or 1), binary |
//! | STRING | every type the text parses as; binary from hex; time from RFC 3339 |

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use uuid::Uuid;

use super::ast::{Literal, StaticValue};
use crate::error::{CoreError, Result};
use crate::types::numeric::encode_bigint;
use crate::types::{to_uuid_bytes, Value, ValueCodec, ValueType};

/// Natural wire type of a literal
pub fn natural_type(literal: &Literal) -> ValueType {
    match literal {
        Literal::Integer(_) => ValueType::Integer,
        Literal::Decimal(_) => ValueType::Decimal,
        Literal::Uuid(_) => ValueType::Uuid,
        Literal::Boolean(_) => ValueType::Boolean,
        Literal::String(_) => ValueType::String,
    }
}

/// Convert a static argument to its wire type and bytes
pub fn encode_static(value: &StaticValue, codec: &ValueCodec) -> Result<(ValueType, Vec<u8>)> {
    let literal = &value.literal;
    let target = value.target.unwrap_or_else(|| natural_type(literal));
    let bytes = match literal {
        Literal::Integer(integer) => encode_integer(codec, literal, integer, target)?,
        Literal::Decimal(decimal) => encode_decimal_literal(codec, literal, decimal, target)?,
        Literal::Uuid(uuid) => match target {
            ValueType::Uuid | ValueType::Binary => uuid.as_bytes().to_vec(),
            ValueType::String | ValueType::Ascii => uuid.hyphenated().to_string().into_bytes(),
            _ => return Err(unsupported(literal, target)),
        },
        Literal::Boolean(flag) => encode_boolean(codec, literal, *flag, target)?,
        Literal::String(text) => encode_text(codec, literal, text, target)?,
    };
    Ok((target, bytes))
}

fn unsupported(literal: &Literal, target: ValueType) -> CoreError {
    CoreError::Compile(format!(
        "Can not convert {} {} to type {}",
        literal.kind(),
        literal,
        target
    ))
}

fn encode(
    codec: &ValueCodec,
    literal: &Literal,
    target: ValueType,
    value: Value,
) -> Result<Vec<u8>> {
    codec.encode(target, &value).map_err(|e| {
        CoreError::Compile(format!(
            "Can not encode {} {} as {}: {}",
            literal.kind(),
            literal,
            target,
            e
        ))
    })
}

fn time_from_millis(literal: &Literal, millis: Option<i64>) -> Result<DateTime<Utc>> {
    millis
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .ok_or_else(|| unsupported(literal, ValueType::Time))
}

fn encode_integer(
    codec: &ValueCodec,
    literal: &Literal,
    integer: &BigInt,
    target: ValueType,
) -> Result<Vec<u8>> {
    let out_of_range = || unsupported(literal, target);
    let value = match target {
        ValueType::Integer => Value::Integer(integer.to_i32().ok_or_else(out_of_range)?),
        ValueType::Long => Value::Long(integer.to_i64().ok_or_else(out_of_range)?),
        ValueType::BigInt => Value::BigInt(integer.clone()),
        ValueType::Float => Value::Float(integer.to_f32().ok_or_else(out_of_range)?),
        ValueType::Double => Value::Double(integer.to_f64().ok_or_else(out_of_range)?),
        ValueType::Decimal => Value::Decimal(BigDecimal::from(integer.clone())),
        ValueType::Duration => Value::Duration(BigDecimal::from(integer.clone())),
        ValueType::Time => Value::Time(time_from_millis(literal, integer.to_i64())?),
        ValueType::String => Value::String(integer.to_string()),
        ValueType::Ascii => Value::Ascii(integer.to_string()),
        ValueType::Boolean => Value::Boolean(!integer.is_zero()),
        ValueType::Binary => return Ok(encode_bigint(integer)),
        ValueType::Uuid => return Ok(to_uuid_bytes(&encode_bigint(integer)).to_vec()),
    };
    encode(codec, literal, target, value)
}

fn encode_decimal_literal(
    codec: &ValueCodec,
    literal: &Literal,
    decimal: &BigDecimal,
    target: ValueType,
) -> Result<Vec<u8>> {
    let whole = || {
        if decimal.is_integer() {
            Ok(decimal.with_scale(0).into_bigint_and_exponent().0)
        } else {
            Err(unsupported(literal, target))
        }
    };
    let value = match target {
        ValueType::Integer | ValueType::Long | ValueType::BigInt | ValueType::Time => {
            return encode_integer(codec, literal, &whole()?, target)
        }
        ValueType::Float => {
            Value::Float(decimal.to_f32().ok_or_else(|| unsupported(literal, target))?)
        }
        ValueType::Double => {
            Value::Double(decimal.to_f64().ok_or_else(|| unsupported(literal, target))?)
        }
        ValueType::Decimal => Value::Decimal(decimal.clone()),
        ValueType::Duration => Value::Duration(decimal.clone()),
        ValueType::String => Value::String(decimal.to_string()),
        ValueType::Ascii => Value::Ascii(decimal.to_string()),
        ValueType::Boolean => Value::Boolean(!decimal.is_zero()),
        ValueType::Binary => Value::Decimal(decimal.clone()),
        ValueType::Uuid => {
            let bytes =
                encode(codec, literal, ValueType::Decimal, Value::Decimal(decimal.clone()))?;
            return Ok(to_uuid_bytes(&bytes).to_vec());
        }
    };
    let wire = if target == ValueType::Binary { ValueType::Decimal } else { target };
    encode(codec, literal, wire, value)
}

fn encode_boolean(
    codec: &ValueCodec,
    literal: &Literal,
    flag: bool,
    target: ValueType,
) -> Result<Vec<u8>> {
    let value = match target {
        ValueType::Boolean | ValueType::Binary => return Ok(vec![u8::from(flag)]),
        ValueType::String => Value::String(flag.to_string()),
        ValueType::Ascii => Value::Ascii(flag.to_string()),
        ValueType::Integer => Value::Integer(i32::from(flag)),
        ValueType::Long => Value::Long(i64::from(flag)),
        ValueType::BigInt => Value::BigInt(BigInt::from(u8::from(flag))),
        ValueType::Float => Value::Float(f32::from(u8::from(flag))),
        ValueType::Double => Value::Double(f64::from(u8::from(flag))),
        ValueType::Decimal => Value::Decimal(BigDecimal::from(u8::from(flag))),
        ValueType::Duration | ValueType::Time | ValueType::Uuid => {
            return Err(unsupported(literal, target))
        }
    };
    encode(codec, literal, target, value)
}

fn encode_text(
    codec: &ValueCodec,
    literal: &Literal,
    text: &str,
    target: ValueType,
) -> Result<Vec<u8>> {
    let parse_error = || unsupported(literal, target);
    let value = match target {
        ValueType::String => Value::String(text.to_string()),
        ValueType::Ascii => Value::Ascii(text.to_string()),
        ValueType::Binary => return hex::decode(text).map_err(|_| parse_error()),
        ValueType::Time => {
            let time = DateTime::parse_from_rfc3339(text).map_err(|_| parse_error())?;
            Value::Time(time.with_timezone(&Utc))
        }
        ValueType::Boolean => Value::Boolean(text.parse().map_err(|_| parse_error())?),
        ValueType::Integer => Value::Integer(text.parse().map_err(|_| parse_error())?),
        ValueType::Long => Value::Long(text.parse().map_err(|_| parse_error())?),
        ValueType::BigInt => Value::BigInt(BigInt::from_str(text).map_err(|_| parse_error())?),
        ValueType::Float => Value::Float(text.parse().map_err(|_| parse_error())?),
        ValueType::Double => Value::Double(text.parse().map_err(|_| parse_error())?),
        ValueType::Decimal => {
            Value::Decimal(BigDecimal::from_str(text).map_err(|_| parse_error())?)
        }
        ValueType::Duration => {
            Value::Duration(BigDecimal::from_str(text).map_err(|_| parse_error())?)
        }
        ValueType::Uuid => Value::Uuid(Uuid::parse_str(text).map_err(|_| parse_error())?),
    };
    encode(codec, literal, target, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decode_value;
    use rstest::rstest;

    fn convert(literal: Literal, target: Option<ValueType>) -> Result<(ValueType, Vec<u8>)> {
        encode_static(&StaticValue { literal, target }, &ValueCodec::default())
    }

    fn int(value: i64) -> Literal {
        Literal::Integer(BigInt::from(value))
    }

    fn dec(text: &str) -> Literal {
        Literal::Decimal(BigDecimal::from_str(text).unwrap())
    }

    #[rstest]
    #[case(int(5), ValueType::Integer, "05")]
    #[case(int(-1), ValueType::Integer, "ff")]
    #[case(dec("-1.5"), ValueType::Decimal, "82f1")]
    #[case(Literal::Boolean(true), ValueType::Boolean, "01")]
    #[case(Literal::String("ab".into()), ValueType::String, "6162")]
    fn test_natural_types(
        #[case] literal: Literal,
        #[case] expected_type: ValueType,
        #[case] hex: &str,
    ) {
        let (value_type, bytes) = convert(literal, None).unwrap();
        assert_eq!(value_type, expected_type);
        assert_eq!(hex::encode(bytes), hex);
    }

    #[rstest]
    #[case(int(300), ValueType::Long, "012c")]
    #[case(int(300), ValueType::Binary, "012c")]
    #[case(int(300), ValueType::Uuid, "0000000000000000000000000000012c")]
    #[case(int(0), ValueType::Boolean, "00")]
    #[case(int(42), ValueType::String, "3432")]
    #[case(dec("12"), ValueType::Integer, "0c")]
    #[case(dec("1.5"), ValueType::Binary, "820f")]
    #[case(Literal::Boolean(true), ValueType::Long, "01")]
    #[case(Literal::Boolean(false), ValueType::Decimal, "8000")]
    #[case(Literal::Boolean(true), ValueType::Binary, "01")]
    #[case(Literal::String("00ff".into()), ValueType::Binary, "00ff")]
    #[case(Literal::String("-2".into()), ValueType::Long, "fe")]
    fn test_conversions(#[case] literal: Literal, #[case] target: ValueType, #[case] hex: &str) {
        let (value_type, bytes) = convert(literal, Some(target)).unwrap();
        assert_eq!(value_type, target);
        assert_eq!(hex::encode(bytes), hex);
    }

    #[rstest]
    #[case(Literal::Boolean(true), ValueType::Uuid)]
    #[case(Literal::Boolean(true), ValueType::Time)]
    #[case(Literal::Uuid(Uuid::nil()), ValueType::Long)]
    #[case(dec("1.5"), ValueType::Integer)]
    #[case(int(1 << 40), ValueType::Integer)]
    #[case(Literal::String("zz".into()), ValueType::Binary)]
    #[case(Literal::String("yesterday".into()), ValueType::Time)]
    fn test_unsupported_conversions(#[case] literal: Literal, #[case] target: ValueType) {
        assert!(matches!(convert(literal, Some(target)), Err(CoreError::Compile(_))));
    }

    #[test]
    fn test_uuid_literal() {
        let uuid = Uuid::parse_str("1b4e28ba-2fa1-11d2-883f-0016d3cca427").unwrap();
        let (value_type, bytes) = convert(Literal::Uuid(uuid), None).unwrap();
        assert_eq!(value_type, ValueType::Uuid);
        assert_eq!(bytes, uuid.as_bytes());

        let (_, text) = convert(Literal::Uuid(uuid), Some(ValueType::String)).unwrap();
        assert_eq!(text, b"1b4e28ba-2fa1-11d2-883f-0016d3cca427");
    }

    #[test]
    fn test_string_to_time() {
        let (_, bytes) = convert(
            Literal::String("2001-01-01T00:00:01Z".into()),
            Some(ValueType::Time),
        )
        .unwrap();
        assert_eq!(bytes, vec![0x03, 0xe8]);

        let (_, bytes) = convert(int(978_307_201_000), Some(ValueType::Time)).unwrap();
        assert_eq!(bytes, vec![0x03, 0xe8]);
    }

    #[test]
    fn test_integer_to_double_decodes() {
        let (_, bytes) = convert(int(7), Some(ValueType::Double)).unwrap();
        assert_eq!(decode_value(ValueType::Double, &bytes).unwrap(), Value::Double(7.0));
    }
}
