//! # Encoding Module
//!
//! This module provides the byte-level primitives every decoder is built on:
//!
//! - **Varint encoding**: unsigned LEB128 lengths and counts, in a
//!   32-bit-safe and an arbitrary-precision form
//! - **Byte cursor**: a sequential reader whose every read reports the byte
//!   range it consumed

pub mod cursor;
pub mod varint;

pub use cursor::ByteCursor;
pub use varint::{decode_varint, decode_varint_wide, encode_varint, varint_len};
