//! # Scalar Values
//!
//! Fixed-layout values read identically by both formats: integers, floats,
//! strings, dates and times, UUIDs, IP addresses, decimals and enums.
//!
//! ## Wire Layouts
//!
//! | Type | Bytes | Decoded as |
//! |------|-------|------------|
//! | Date | u16 days since 1970-01-01 | `NaiveDate` |
//! | Date32 | i32 days since 1970-01-01 | `NaiveDate` |
//! | DateTime | u32 seconds | `DateTime<Tz>` |
//! | DateTime64(P) | i64 ticks of 10^-P s | `DateTime<Tz>` |
//! | Time / Time64(P) | i32 seconds / i64 ticks | signed duration |
//! | UUID | u64 high half, u64 low half | `Uuid` |
//! | IPv4 | u32 little-endian | `Ipv4Addr` |
//! | IPv6 | 16 bytes network order | `Ipv6Addr` |
//! | Decimal(P, S) | signed 4/8/16/32-byte integer | `BigDecimal` with scale S |
//! | Enum8 / Enum16 | i8 / i16 | entry name, or `<unknown N>` |
//!
//! ## Value-Level Anomalies
//!
//! Bytes that decode fine but carry a meaningless value (an enum number
//! with no entry, an unknown time zone name, a timestamp outside the
//! calendar) never abort the decode. The value is kept and the anomaly is
//! appended to the node's display string.

use std::net::{Ipv4Addr, Ipv6Addr};

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;
use eyre::Result;
use uuid::Uuid;

use crate::encoding::ByteCursor;
use crate::tree::{ByteRange, Node, NodeId, Value};
use crate::types::{enum_name, EnumEntry, TypeDescriptor};

/// `NaiveDate::from_num_days_from_ce` value of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub value: Value,
    pub range: ByteRange,
    pub display: Option<String>,
    pub note: Option<String>,
}

impl Scalar {
    fn new(value: Value, range: ByteRange) -> Self {
        Self {
            value,
            range,
            display: None,
            note: None,
        }
    }

    fn with_display(mut self, display: Option<String>) -> Self {
        self.display = display;
        self
    }

    fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn into_node(self, id: NodeId, type_name: impl Into<String>) -> Node {
        let mut node = Node::leaf(id, type_name, self.range, self.value);
        if let Some(display) = self.display {
            node = node.with_display(display);
        }
        match self.note {
            Some(note) => {
                let display = format!("{} ({})", node.display, note);
                node.with_display(display)
            }
            None => node,
        }
    }
}

/// True for types [`read_scalar`] handles.
pub fn is_scalar(ty: &TypeDescriptor) -> bool {
    use TypeDescriptor as T;
    matches!(
        ty,
        T::UInt8
            | T::UInt16
            | T::UInt32
            | T::UInt64
            | T::UInt128
            | T::UInt256
            | T::Int8
            | T::Int16
            | T::Int32
            | T::Int64
            | T::Int128
            | T::Int256
            | T::Float32
            | T::Float64
            | T::BFloat16
            | T::Bool
            | T::String
            | T::FixedString(_)
            | T::Date
            | T::Date32
            | T::DateTime { .. }
            | T::DateTime64 { .. }
            | T::Time
            | T::Time64 { .. }
            | T::Uuid
            | T::IPv4
            | T::IPv6
            | T::Decimal(_)
            | T::Enum8(_)
            | T::Enum16(_)
            | T::Interval(_)
    )
}

/// Reads one scalar value; `None` when `ty` is not a scalar type.
pub fn read_scalar(cursor: &mut ByteCursor<'_>, ty: &TypeDescriptor) -> Result<Option<Scalar>> {
    use TypeDescriptor as T;
    let scalar = match ty {
        T::UInt8 => unsigned(cursor.read_u8()?),
        T::UInt16 => unsigned(cursor.read_u16()?),
        T::UInt32 => unsigned(cursor.read_u32()?),
        T::UInt64 => {
            let (v, range) = cursor.read_u64()?;
            Scalar::new(Value::UInt(v), range)
        }
        T::Int8 => signed(cursor.read_i8()?),
        T::Int16 => signed(cursor.read_i16()?),
        T::Int32 => signed(cursor.read_i32()?),
        T::Int64 | T::Interval(_) => {
            let (v, range) = cursor.read_i64()?;
            Scalar::new(Value::Int(v), range)
        }
        T::UInt128 | T::UInt256 => {
            let width = if matches!(ty, T::UInt128) { 16 } else { 32 };
            let (v, range) = cursor.read_uint_wide(width)?;
            Scalar::new(Value::BigInt(v), range)
        }
        T::Int128 | T::Int256 => {
            let width = if matches!(ty, T::Int128) { 16 } else { 32 };
            let (v, range) = cursor.read_int_wide(width)?;
            Scalar::new(Value::BigInt(v), range)
        }
        T::Float32 => {
            let (v, range) = cursor.read_f32()?;
            Scalar::new(Value::Float32(v), range)
        }
        T::Float64 => {
            let (v, range) = cursor.read_f64()?;
            Scalar::new(Value::Float64(v), range)
        }
        T::BFloat16 => {
            let (v, range) = cursor.read_bf16()?;
            Scalar::new(Value::Float32(v), range)
        }
        T::Bool => {
            let (byte, range) = cursor.read_u8()?;
            let note = (byte > 1).then(|| format!("non-canonical byte 0x{:02X}", byte));
            Scalar::new(Value::Bool(byte != 0), range).with_note(note)
        }
        T::String => {
            let (bytes, range) = cursor.read_string()?;
            Scalar::new(text_or_bytes(bytes), range)
        }
        T::FixedString(len) => {
            // The value keeps all N bytes; only the display drops NUL padding.
            let (bytes, range) = cursor.read_bytes(*len)?;
            let value = text_or_bytes(bytes);
            let display = value
                .as_str()
                .map(|text| text.trim_end_matches('\0').to_string());
            Scalar::new(value, range).with_display(display)
        }
        T::Date => {
            let (days, range) = cursor.read_u16()?;
            date(days as i64, range)
        }
        T::Date32 => {
            let (days, range) = cursor.read_i32()?;
            date(days as i64, range)
        }
        T::DateTime { timezone } => {
            let (seconds, range) = cursor.read_u32()?;
            datetime(seconds as i64, 0, timezone.as_deref(), range)
        }
        T::DateTime64 {
            precision,
            timezone,
        } => {
            let (ticks, range) = cursor.read_i64()?;
            datetime(ticks, *precision, timezone.as_deref(), range)
        }
        T::Time => {
            let (seconds, range) = cursor.read_i32()?;
            Scalar::new(
                Value::Time {
                    ticks: seconds as i64,
                    precision: 0,
                },
                range,
            )
        }
        T::Time64 { precision } => {
            let (ticks, range) = cursor.read_i64()?;
            Scalar::new(
                Value::Time {
                    ticks,
                    precision: *precision,
                },
                range,
            )
        }
        T::Uuid => {
            let start = cursor.position();
            let (high, _) = cursor.read_u64()?;
            let (low, _) = cursor.read_u64()?;
            Scalar::new(
                Value::Uuid(Uuid::from_u64_pair(high, low)),
                cursor.since(start),
            )
        }
        T::IPv4 => {
            let (bits, range) = cursor.read_u32()?;
            Scalar::new(Value::Ipv4(Ipv4Addr::from(bits)), range)
        }
        T::IPv6 => {
            let (bytes, range) = cursor.read_bytes(16)?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Scalar::new(Value::Ipv6(Ipv6Addr::from(octets)), range)
        }
        T::Decimal(spec) => {
            let (unscaled, range) = cursor.read_int_wide(spec.width())?;
            Scalar::new(
                Value::Decimal(BigDecimal::new(unscaled, spec.scale as i64)),
                range,
            )
        }
        T::Enum8(entries) => {
            let (v, range) = cursor.read_i8()?;
            enum_value(entries, v as i16, range)
        }
        T::Enum16(entries) => {
            let (v, range) = cursor.read_i16()?;
            enum_value(entries, v, range)
        }
        _ => return Ok(None),
    };
    Ok(Some(scalar))
}

fn unsigned<T: Into<u64>>((v, range): (T, ByteRange)) -> Scalar {
    Scalar::new(Value::UInt(v.into()), range)
}

fn signed<T: Into<i64>>((v, range): (T, ByteRange)) -> Scalar {
    Scalar::new(Value::Int(v.into()), range)
}

fn text_or_bytes(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Bytes(bytes.to_vec()),
    }
}

fn enum_value(entries: &[EnumEntry], value: i16, range: ByteRange) -> Scalar {
    let name = enum_name(entries, value).map(str::to_string);
    Scalar::new(Value::Enum { name, value }, range)
}

pub fn date_from_days(days: i64) -> Option<NaiveDate> {
    let days = i32::try_from(UNIX_EPOCH_DAYS_FROM_CE + days).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days)
}

fn date(days: i64, range: ByteRange) -> Scalar {
    match date_from_days(days) {
        Some(d) => Scalar::new(Value::Date(d), range),
        None => Scalar::new(Value::Int(days), range)
            .with_note(Some("day number outside the calendar".into())),
    }
}

fn resolve_timezone(name: Option<&str>) -> (Tz, Option<String>) {
    match name {
        None => (Tz::UTC, None),
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => (tz, None),
            Err(_) => (
                Tz::UTC,
                Some(format!("unknown time zone '{}', shown in UTC", name)),
            ),
        },
    }
}

fn datetime(ticks: i64, precision: u8, timezone: Option<&str>, range: ByteRange) -> Scalar {
    let (tz, note) = resolve_timezone(timezone);
    let precision = precision.min(9);
    let scale = 10i64.pow(precision as u32);
    let seconds = ticks.div_euclid(scale);
    let nanos = ticks.rem_euclid(scale) * 10i64.pow(9 - precision as u32);

    match tz.timestamp_opt(seconds, nanos as u32).single() {
        Some(at) => Scalar::new(Value::DateTime { at, precision }, range).with_note(note),
        None => Scalar::new(Value::Int(ticks), range)
            .with_note(Some("timestamp outside the calendar".into())),
    }
}
