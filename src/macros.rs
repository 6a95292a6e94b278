//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in chwire.
//!
//! ## le_readers!
//!
//! Generates fixed-width little-endian read methods on `ByteCursor`. Each
//! generated method consumes exactly `size_of::<T>()` bytes and returns the
//! value together with the byte range it occupied.
//!
//! ### Usage
//!
//! ```ignore
//! impl<'a> ByteCursor<'a> {
//!     le_readers! {
//!         read_u16: u16,
//!         read_i64: i64,
//!     }
//! }
//!
//! // Generates:
//! // pub fn read_u16(&mut self) -> Result<(u16, ByteRange)> { ... }
//! // pub fn read_i64(&mut self) -> Result<(i64, ByteRange)> { ... }
//! ```

/// Generates little-endian fixed-width readers for primitive numeric types.
macro_rules! le_readers {
    ($($name:ident : $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&mut self) -> ::eyre::Result<($ty, $crate::tree::ByteRange)> {
                const WIDTH: usize = ::std::mem::size_of::<$ty>();
                let (bytes, range) = self.read_bytes(WIDTH)?;
                let mut raw = [0u8; WIDTH];
                raw.copy_from_slice(bytes);
                Ok((<$ty>::from_le_bytes(raw), range))
            }
        )*
    };
}
