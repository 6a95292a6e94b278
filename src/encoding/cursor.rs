//! # ByteCursor - Range-Tracking Sequential Reader
//!
//! `ByteCursor` is the single primitive every decoder is built on. It walks a
//! borrowed buffer front to back and every read returns the decoded value
//! together with the half-open `[start, end)` range it consumed, so the tree
//! builder never has to recompute offsets.
//!
//! ## Guarantees
//!
//! - Reads never zero-fill: running past the limit is a fatal
//!   `DecodeError::UnexpectedEof` carrying the offset and shortfall.
//! - A cursor may be bounded to a window of the buffer (`bounded`) so that
//!   nested payloads, such as a SharedVariant value stored inside a String,
//!   are decoded with absolute offsets yet cannot read past their envelope.
//! - The buffer is never mutated; cursors are cheap to copy.
//!
//! ## Wide Integers
//!
//! 128/256-bit integers are assembled byte by byte (byte *i* contributes
//! `byte_i << 8i`) into a `BigInt`. Signed reads subtract `2^bits` when the
//! unsigned value is at least `2^(bits-1)`.

use eyre::{bail, Result};
use num_bigint::{BigInt, BigUint};
use num_traits::One;

use crate::config::{VARINT_MAX_SHIFT, VARINT_WIDE_MAX_SHIFT};
use crate::encoding::varint::{decode_leb128, VarintFault};
use crate::error::DecodeError;
use crate::tree::ByteRange;

#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            limit: buf.len(),
        }
    }

    /// Creates a cursor over `buf[start..limit]` that reports absolute offsets.
    pub fn bounded(buf: &'a [u8], start: usize, limit: usize) -> Self {
        let limit = limit.min(buf.len());
        Self {
            buf,
            pos: start.min(limit),
            limit,
        }
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.limit
    }

    /// Zero-width range at the current position.
    pub fn here(&self) -> ByteRange {
        ByteRange::empty_at(self.pos)
    }

    /// Range from `start` up to the current position.
    pub fn since(&self, start: usize) -> ByteRange {
        ByteRange::new(start, self.pos)
    }

    fn eof(&self, needed: usize) -> DecodeError {
        DecodeError::UnexpectedEof {
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<(&'a [u8], ByteRange)> {
        if len > self.remaining() {
            bail!(self.eof(len));
        }
        let start = self.pos;
        self.pos += len;
        Ok((&self.buf[start..self.pos], ByteRange::new(start, self.pos)))
    }

    pub fn skip(&mut self, len: usize) -> Result<ByteRange> {
        self.read_bytes(len).map(|(_, range)| range)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        if self.is_empty() {
            bail!(self.eof(1));
        }
        Ok(self.buf[self.pos])
    }

    le_readers! {
        read_u8: u8,
        read_i8: i8,
        read_u16: u16,
        read_i16: i16,
        read_u32: u32,
        read_i32: i32,
        read_u64: u64,
        read_i64: i64,
        read_f32: f32,
        read_f64: f64,
    }

    /// Reads a truncated 16-bit float (the upper half of an f32).
    pub fn read_bf16(&mut self) -> Result<(f32, ByteRange)> {
        let (bits, range) = self.read_u16()?;
        Ok((f32::from_bits((bits as u32) << 16), range))
    }

    pub fn read_bool(&mut self) -> Result<(bool, ByteRange)> {
        let (byte, range) = self.read_u8()?;
        Ok((byte != 0, range))
    }

    /// Reads an unsigned integer of `width` bytes as an arbitrary-precision value.
    pub fn read_uint_wide(&mut self, width: usize) -> Result<(BigInt, ByteRange)> {
        let (bytes, range) = self.read_bytes(width)?;
        let mut value = BigUint::default();
        for (i, &byte) in bytes.iter().enumerate() {
            value |= BigUint::from(byte) << (8 * i);
        }
        Ok((BigInt::from(value), range))
    }

    /// Reads a two's-complement signed integer of `width` bytes.
    pub fn read_int_wide(&mut self, width: usize) -> Result<(BigInt, ByteRange)> {
        let (unsigned, range) = self.read_uint_wide(width)?;
        let bits = width * 8;
        let half = BigInt::one() << (bits - 1);
        if unsigned >= half {
            return Ok((unsigned - (BigInt::one() << bits), range));
        }
        Ok((unsigned, range))
    }

    fn read_leb128(&mut self, max_shift: u32) -> Result<(u128, ByteRange)> {
        let start = self.pos;
        match decode_leb128(&self.buf[start..self.limit], max_shift) {
            Ok((value, read)) => {
                self.pos += read;
                Ok((value, ByteRange::new(start, self.pos)))
            }
            Err(VarintFault::Truncated { consumed }) => bail!(DecodeError::UnexpectedEof {
                offset: start + consumed,
                needed: 1,
                available: 0,
            }),
            Err(VarintFault::Overflow) => bail!(DecodeError::VarintOverflow { offset: start }),
        }
    }

    /// 32-bit-safe LEB128 varint (lengths and counts).
    pub fn read_varint(&mut self) -> Result<(u64, ByteRange)> {
        let (value, range) = self.read_leb128(VARINT_MAX_SHIFT)?;
        Ok((value as u64, range))
    }

    /// Arbitrary-precision LEB128 varint.
    pub fn read_varint_wide(&mut self) -> Result<(u128, ByteRange)> {
        self.read_leb128(VARINT_WIDE_MAX_SHIFT)
    }

    /// Reads a varint length and checks it against the remaining bytes.
    pub fn read_length(&mut self) -> Result<(usize, ByteRange)> {
        let (len, range) = self.read_varint()?;
        let len = len as usize;
        if len > self.remaining() {
            bail!(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        Ok((len, range))
    }

    /// Reads a varint-prefixed byte string; the range covers prefix and payload.
    pub fn read_string(&mut self) -> Result<(&'a [u8], ByteRange)> {
        let start = self.pos;
        let (len, _) = self.read_length()?;
        let (bytes, _) = self.read_bytes(len)?;
        Ok((bytes, self.since(start)))
    }

    /// Like `read_string` but requires UTF-8 (names and type strings).
    pub fn read_utf8(&mut self) -> Result<(&'a str, ByteRange)> {
        let (bytes, range) = self.read_string()?;
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok((text, range)),
            Err(e) => bail!(DecodeError::invalid(
                range.start,
                format!("string is not valid UTF-8: {}", e)
            )),
        }
    }
}
