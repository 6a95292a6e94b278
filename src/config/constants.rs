//! # chwire Wire Constants
//!
//! This module centralizes the numeric constants of the two ClickHouse wire
//! formats and the guard limits of the decoder. Constants that depend on
//! each other are co-located and checked at compile time.
//!
//! ## Dependency Graph
//!
//! ```text
//! VARINT_MAX_SHIFT (35)
//!       │
//!       └─> bounds every length/count varint to 42 payload bits, which is
//!           always larger than any buffer the decoder will be handed
//!
//! VARINT_WIDE_MAX_SHIFT (70)
//!       │
//!       └─> must be >= VARINT_MAX_SHIFT and fit in u128 (shift + 7 <= 128)
//!
//! LC_INDEX_WIDTH_MASK / LC_NEED_GLOBAL_DICTIONARY / LC_HAS_ADDITIONAL_KEYS
//!       │
//!       └─> bit layout of the UInt64 index-serialization word written in
//!           front of every LowCardinality data run
//! ```
//!
//! ## Serialization Versions
//!
//! Dynamic and JSON columns carry a version word in their Native structure
//! prefix. Only the versions a server emits for the Native output format are
//! listed; any other value is reported as unsupported.

/// Highest LEB128 shift accepted for length-like varints.
pub const VARINT_MAX_SHIFT: u32 = 35;

/// Highest LEB128 shift accepted by the wide (u128) varint reader.
pub const VARINT_WIDE_MAX_SHIFT: u32 = 70;

/// Recursion limit for type strings, binary type encodings and values.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Discriminator byte marking a NULL Variant / Dynamic value.
pub const VARIANT_NULL_DISCRIMINATOR: u8 = 0xFF;

/// Internal overflow branch name inside a Native Dynamic column.
pub const SHARED_VARIANT_NAME: &str = "SharedVariant";

/// `SharedDictionariesWithAdditionalKeys`, the only keys version written.
pub const LC_KEYS_VERSION: u64 = 1;
pub const LC_INDEX_WIDTH_MASK: u64 = 0xFF;
pub const LC_NEED_GLOBAL_DICTIONARY: u64 = 1 << 8;
pub const LC_HAS_ADDITIONAL_KEYS: u64 = 1 << 9;

pub const VARIANT_MODE_BASIC: u64 = 0;
pub const VARIANT_MODE_COMPACT: u64 = 1;
pub const VARIANT_GRANULE_PLAIN: u8 = 0;
pub const VARIANT_GRANULE_COMPACT: u8 = 1;

pub const DYNAMIC_VERSION_V1: u64 = 1;
pub const DYNAMIC_VERSION_V2: u64 = 2;

pub const JSON_VERSION_V1: u64 = 0;
pub const JSON_VERSION_STRING: u64 = 1;
pub const JSON_VERSION_V2: u64 = 2;

const _: () = assert!(VARINT_WIDE_MAX_SHIFT >= VARINT_MAX_SHIFT);
const _: () = assert!(VARINT_WIDE_MAX_SHIFT + 7 <= 128);
const _: () = assert!(LC_INDEX_WIDTH_MASK & LC_HAS_ADDITIONAL_KEYS == 0);
