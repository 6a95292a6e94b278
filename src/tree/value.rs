//! # Decoded Values
//!
//! [`Value`] is the logical payload carried by every node. Integers wider
//! than 64 bits and all decimals stay arbitrary-precision, so a UInt64 of
//! `18446744073709551615` or a Decimal256 with 70 digits keeps every digit.
//!
//! ## Display Rules
//!
//! The `Display` impl produces the string shown next to a node. It follows
//! ClickHouse's own text rendering closely enough to be recognizable:
//!
//! | Value | Top level | Nested in a container |
//! |-------|-----------|-----------------------|
//! | String | `hello` | `'hello'` |
//! | Null | `NULL` | `NULL` |
//! | Array | `[1, 2]` | `[1, 2]` |
//! | Tuple | `(1, 'a')` | `(1, 'a')` |
//! | Map | `{'k': 1}` | `{'k': 1}` |
//! | Float NaN | `nan` | `nan` |
//!
//! `to_json` exports a lossless JSON view: wide integers and decimals
//! become strings so JSON consumers never round them through a double.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::net::{Ipv4Addr, Ipv6Addr};

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use num_bigint::BigInt;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    BigInt(BigInt),
    Float32(f32),
    Float64(f64),
    Decimal(BigDecimal),
    String(String),
    /// Raw bytes that are not valid UTF-8 (or are binary by nature).
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime {
        at: DateTime<Tz>,
        precision: u8,
    },
    /// Signed time of day in `10^-precision` second ticks.
    Time {
        ticks: i64,
        precision: u8,
    },
    Uuid(Uuid),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Enum {
        name: Option<String>,
        value: i16,
    },
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Record(Vec<(String, Value)>),
    Map(Vec<(Value, Value)>),
    Object(BTreeMap<String, Value>),
    /// Row whose discriminator selects no known alternative.
    Unknown(u64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Renders the value as it appears inside a container.
    pub fn to_nested_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write(&mut out, true);
        out
    }

    fn write(&self, out: &mut impl fmt::Write, nested: bool) -> fmt::Result {
        match self {
            Value::Null => out.write_str("NULL"),
            Value::Bool(b) => write!(out, "{}", b),
            Value::Int(v) => write!(out, "{}", v),
            Value::UInt(v) => write!(out, "{}", v),
            Value::BigInt(v) => write!(out, "{}", v),
            Value::Float32(v) => write_float(out, *v as f64, &v.to_string()),
            Value::Float64(v) => write_float(out, *v, &v.to_string()),
            Value::Decimal(d) => out.write_str(&format_decimal(d)),
            Value::String(s) if nested => write_quoted(out, s),
            Value::String(s) => out.write_str(s),
            Value::Bytes(bytes) => {
                if nested {
                    out.write_char('\'')?;
                }
                for byte in bytes {
                    if byte.is_ascii_graphic() || *byte == b' ' {
                        out.write_char(*byte as char)?;
                    } else {
                        write!(out, "\\x{:02X}", byte)?;
                    }
                }
                if nested {
                    out.write_char('\'')?;
                }
                Ok(())
            }
            Value::Date(d) => write!(out, "{}", d.format("%Y-%m-%d")),
            Value::DateTime { at, precision } => {
                write!(out, "{}", at.format("%Y-%m-%d %H:%M:%S"))?;
                if *precision > 0 {
                    let nanos = at.timestamp_subsec_nanos() as u64;
                    let ticks = nanos / 10u64.pow(9 - (*precision).min(9) as u32);
                    write!(out, ".{:0width$}", ticks, width = *precision as usize)?;
                }
                Ok(())
            }
            Value::Time { ticks, precision } => write_time(out, *ticks, *precision),
            Value::Uuid(u) => write!(out, "{}", u),
            Value::Ipv4(ip) => write!(out, "{}", ip),
            Value::Ipv6(ip) => write!(out, "{}", ip),
            Value::Enum { name, value } => match name {
                Some(name) if nested => write_quoted(out, name),
                Some(name) => out.write_str(name),
                None => write!(out, "<unknown {}>", value),
            },
            Value::Array(items) => {
                out.write_char('[')?;
                write_list(out, items)?;
                out.write_char(']')
            }
            Value::Tuple(items) => {
                out.write_char('(')?;
                write_list(out, items)?;
                out.write_char(')')
            }
            Value::Record(fields) => {
                out.write_char('(')?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write!(out, "{}: ", name)?;
                    value.write(out, true)?;
                }
                out.write_char(')')
            }
            Value::Map(entries) => {
                out.write_char('{')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    key.write(out, true)?;
                    out.write_str(": ")?;
                    value.write(out, true)?;
                }
                out.write_char('}')
            }
            Value::Object(fields) => {
                out.write_char('{')?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write!(out, "\"{}\": ", key)?;
                    value.write(out, true)?;
                }
                out.write_char('}')
            }
            Value::Unknown(discriminant) => write!(out, "<unknown {}>", discriminant),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(v) => json!(v),
            Value::UInt(v) => json!(v),
            Value::BigInt(v) => json!(v.to_string()),
            Value::Float32(v) if v.is_finite() => json!(v),
            Value::Float64(v) if v.is_finite() => json!(v),
            Value::Float32(_) | Value::Float64(_) => json!(self.to_string()),
            Value::Decimal(d) => json!(format_decimal(d)),
            Value::String(s) => json!(s),
            Value::Bytes(bytes) => json!(bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<String>()),
            Value::Enum { name: Some(name), .. } => json!(name),
            Value::Enum { name: None, value } => json!(value),
            Value::Date(_)
            | Value::DateTime { .. }
            | Value::Time { .. }
            | Value::Uuid(_)
            | Value::Ipv4(_)
            | Value::Ipv6(_)
            | Value::Unknown(_) => json!(self.to_string()),
            Value::Array(items) | Value::Tuple(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_json()))
                    .collect(),
            ),
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Value::UInt(v)
                } else if let Some(v) = n.as_i64() {
                    Value::Int(v)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false)
    }
}

fn write_list(out: &mut impl fmt::Write, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        item.write(out, true)?;
    }
    Ok(())
}

fn write_quoted(out: &mut impl fmt::Write, s: &str) -> fmt::Result {
    out.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => out.write_str("\\'")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\0' => out.write_str("\\0")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('\'')
}

fn write_float(out: &mut impl fmt::Write, value: f64, rendered: &str) -> fmt::Result {
    if value.is_nan() {
        out.write_str("nan")
    } else if value.is_infinite() {
        out.write_str(if value > 0.0 { "inf" } else { "-inf" })
    } else {
        out.write_str(rendered)
    }
}

fn write_time(out: &mut impl fmt::Write, ticks: i64, precision: u8) -> fmt::Result {
    let scale = 10u64.pow(precision.min(9) as u32);
    let magnitude = ticks.unsigned_abs();
    let seconds = magnitude / scale;
    let fraction = magnitude % scale;
    if ticks < 0 {
        out.write_char('-')?;
    }
    write!(
        out,
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )?;
    if precision > 0 {
        write!(out, ".{:0width$}", fraction, width = precision as usize)?;
    }
    Ok(())
}

/// Formats a decimal with exactly its own scale, never in exponent form.
pub fn format_decimal(value: &BigDecimal) -> String {
    let (digits, scale) = value.as_bigint_and_exponent();
    let negative = digits.sign() == num_bigint::Sign::Minus;
    let magnitude = digits.magnitude().to_string();

    let mut out = String::with_capacity(magnitude.len() + 3);
    if negative {
        out.push('-');
    }
    if scale <= 0 {
        out.push_str(&magnitude);
        if magnitude != "0" {
            out.extend(std::iter::repeat('0').take(scale.unsigned_abs() as usize));
        }
        return out;
    }

    let scale = scale as usize;
    if magnitude.len() <= scale {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take(scale - magnitude.len()));
        out.push_str(&magnitude);
    } else {
        let (whole, fraction) = magnitude.split_at(magnitude.len() - scale);
        out.push_str(whole);
        out.push('.');
        out.push_str(fraction);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn strings_are_quoted_only_when_nested() {
        let value = Value::Array(vec![Value::String("it's".into()), Value::Null]);
        assert_eq!(value.to_string(), "['it\\'s', NULL]");
        assert_eq!(Value::String("plain".into()).to_string(), "plain");
    }

    #[test]
    fn decimal_keeps_scale_and_sign() {
        let d = BigDecimal::new(BigInt::from(-12345), 4);
        assert_eq!(format_decimal(&d), "-1.2345");

        let small = BigDecimal::new(BigInt::from(5), 3);
        assert_eq!(format_decimal(&small), "0.005");

        let whole = BigDecimal::new(BigInt::from(7), 0);
        assert_eq!(format_decimal(&whole), "7");
    }

    #[test]
    fn datetime64_prints_requested_precision() {
        let at = Tz::UTC.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        let value = Value::DateTime { at, precision: 3 };
        assert_eq!(value.to_string(), "2023-11-14 22:13:20.123");
    }

    #[test]
    fn time_handles_negative_and_fraction() {
        let value = Value::Time {
            ticks: -3_723_500,
            precision: 3,
        };
        assert_eq!(value.to_string(), "-01:02:03.500");
    }

    #[test]
    fn unknown_enum_renders_placeholder() {
        let value = Value::Enum {
            name: None,
            value: -3,
        };
        assert_eq!(value.to_string(), "<unknown -3>");
    }

    #[test]
    fn non_finite_floats_use_clickhouse_spelling() {
        assert_eq!(Value::Float64(f64::NAN).to_string(), "nan");
        assert_eq!(Value::Float32(f32::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Value::Float32(0.1).to_string(), "0.1");
    }

    #[test]
    fn wide_integers_export_as_json_strings() {
        let big = Value::BigInt(BigInt::from(u128::MAX));
        assert_eq!(big.to_json(), json!(u128::MAX.to_string()));
        assert_eq!(Value::UInt(u64::MAX).to_json(), json!(u64::MAX));
    }

    #[test]
    fn map_renders_key_value_pairs() {
        let value = Value::Map(vec![(Value::String("k".into()), Value::UInt(1))]);
        assert_eq!(value.to_string(), "{'k': 1}");
        assert_eq!(value.to_json(), json!({"k": 1}));
    }
}
