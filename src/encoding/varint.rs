//! # LEB128 Variable-Length Integers
//!
//! ClickHouse writes every length, count and row number on the wire as an
//! unsigned LEB128 varint: seven payload bits per byte, least significant
//! group first, high bit set on every byte except the last.
//!
//! ## Encoding Format
//!
//! | Value Range       | Bytes | Example            |
//! |-------------------|-------|--------------------|
//! | 0 - 127           | 1     | `2a` = 42          |
//! | 128 - 16383       | 2     | `80 01` = 128      |
//! | 16384 - 2097151   | 3     | `80 80 01` = 16384 |
//! | ...               | ...   | ...                |
//! | u64::MAX          | 10    | `ff .. ff 01`      |
//!
//! ## Bounded Readers
//!
//! Two decoders exist, differing only in how far the shift may grow before
//! the input is declared malformed:
//!
//! - [`decode_varint`]: 32-bit-safe, fails once the shift passes 35. Used for
//!   string/array/map lengths and row/column counts.
//! - [`decode_varint_wide`]: arbitrary-precision (u128), fails once the shift
//!   passes 70.
//!
//! Both guard against adversarial input that would otherwise make a single
//! length field claim petabytes.
//!
//! ## Usage Example
//!
//! ```rust
//! use chwire::encoding::varint::{decode_varint, encode_varint, varint_len};
//!
//! let mut buf = Vec::new();
//! let written = encode_varint(300, &mut buf);
//! assert_eq!(written, varint_len(300));
//!
//! let (value, read) = decode_varint(&buf).unwrap();
//! assert_eq!(value, 300);
//! assert_eq!(read, 2);
//! ```

use eyre::{bail, Result};

use crate::config::{VARINT_MAX_SHIFT, VARINT_WIDE_MAX_SHIFT};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarintFault {
    /// Ran out of input after `consumed` bytes.
    Truncated { consumed: usize },
    Overflow,
}

pub(crate) fn decode_leb128(
    buf: &[u8],
    max_shift: u32,
) -> std::result::Result<(u128, usize), VarintFault> {
    let mut value: u128 = 0;
    let mut shift: u32 = 0;
    let mut pos = 0;

    loop {
        let Some(&byte) = buf.get(pos) else {
            return Err(VarintFault::Truncated { consumed: pos });
        };
        pos += 1;
        value |= ((byte & 0x7F) as u128) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
        shift += 7;
        if shift > max_shift {
            return Err(VarintFault::Overflow);
        }
    }
}

fn fault_to_error(fault: VarintFault, available: usize) -> DecodeError {
    match fault {
        VarintFault::Truncated { consumed } => DecodeError::UnexpectedEof {
            offset: consumed,
            needed: 1,
            available: available - consumed,
        },
        VarintFault::Overflow => DecodeError::VarintOverflow { offset: 0 },
    }
}

/// Decodes a 32-bit-safe varint, returning `(value, bytes_read)`.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    match decode_leb128(buf, VARINT_MAX_SHIFT) {
        Ok((value, read)) => Ok((value as u64, read)),
        Err(fault) => bail!(fault_to_error(fault, buf.len())),
    }
}

/// Decodes an arbitrary-precision varint, returning `(value, bytes_read)`.
pub fn decode_varint_wide(buf: &[u8]) -> Result<(u128, usize)> {
    match decode_leb128(buf, VARINT_WIDE_MAX_SHIFT) {
        Ok(decoded) => Ok(decoded),
        Err(fault) => bail!(fault_to_error(fault, buf.len())),
    }
}

pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Appends the LEB128 form of `value` to `buf`, returning bytes written.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
    buf.len() - start
}
