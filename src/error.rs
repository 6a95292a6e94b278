//! # Decode Error Taxonomy
//!
//! Every decoder failure is raised as an `eyre::Report` wrapping a
//! [`DecodeError`], so callers that only want a message can print the report
//! while callers that need to branch on the failure kind can recover it:
//!
//! ```ignore
//! match chwire::decode(&bytes, WireFormat::Native) {
//!     Ok(result) => show(result),
//!     Err(report) => match report.downcast_ref::<DecodeError>() {
//!         Some(DecodeError::UnexpectedEof { .. }) => println!("truncated body"),
//!         _ => println!("{:#}", report),
//!     },
//! }
//! ```
//!
//! ## Fatal vs. Absorbed
//!
//! | Kind | Fatal | Notes |
//! |------|-------|-------|
//! | `UnexpectedEof` | yes | Never zero-fills |
//! | `VarintOverflow` | yes | Guards adversarial length fields |
//! | `UnknownType` / `MalformedTypeString` | yes | Next bytes are unreadable |
//! | `UnsupportedType` | yes | Known type, no rule for the active format |
//! | `UnknownDiscriminant` | RowBinary Variant only | Enum values render `<unknown N>` |
//! | `InvalidData` | yes | Structurally impossible stream contents |
//! | `NestingTooDeep` | yes | Recursion guard |
//! | `TrailingBytes` | yes | Bytes after a stream terminator |
//!
//! Structural errors abort the whole decode; no partial tree is returned
//! because every byte past a misread would be fabricated data.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },
    VarintOverflow {
        offset: usize,
    },
    UnknownType {
        name: String,
    },
    MalformedTypeString {
        input: String,
        position: usize,
        message: String,
    },
    UnsupportedType {
        type_name: String,
        format: &'static str,
    },
    UnknownDiscriminant {
        offset: usize,
        discriminant: u64,
        type_name: String,
    },
    InvalidData {
        offset: usize,
        message: String,
    },
    NestingTooDeep {
        limit: usize,
    },
    TrailingBytes {
        offset: usize,
    },
}

impl DecodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::UnexpectedEof { .. } => "UnexpectedEof",
            DecodeError::VarintOverflow { .. } => "VarintOverflow",
            DecodeError::UnknownType { .. } => "UnknownType",
            DecodeError::MalformedTypeString { .. } => "MalformedTypeString",
            DecodeError::UnsupportedType { .. } => "UnsupportedType",
            DecodeError::UnknownDiscriminant { .. } => "UnknownDiscriminant",
            DecodeError::InvalidData { .. } => "InvalidData",
            DecodeError::NestingTooDeep { .. } => "NestingTooDeep",
            DecodeError::TrailingBytes { .. } => "TrailingBytes",
        }
    }

    pub fn malformed(input: &str, position: usize, message: impl Into<String>) -> Self {
        DecodeError::MalformedTypeString {
            input: input.to_string(),
            position,
            message: message.into(),
        }
    }

    pub fn unsupported(type_name: impl fmt::Display, format: &'static str) -> Self {
        DecodeError::UnsupportedType {
            type_name: type_name.to_string(),
            format,
        }
    }

    pub fn invalid(offset: usize, message: impl Into<String>) -> Self {
        DecodeError::InvalidData {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof {
                offset,
                needed,
                available,
            } => write!(
                f,
                "unexpected end of buffer at offset {}: needed {} bytes, {} available",
                offset, needed, available
            ),
            DecodeError::VarintOverflow { offset } => {
                write!(f, "varint starting at offset {} overflows", offset)
            }
            DecodeError::UnknownType { name } => write!(f, "unknown type '{}'", name),
            DecodeError::MalformedTypeString {
                input,
                position,
                message,
            } => write!(
                f,
                "malformed type string '{}' at position {}: {}",
                input, position, message
            ),
            DecodeError::UnsupportedType { type_name, format } => {
                write!(f, "type {} is not supported in {} format", type_name, format)
            }
            DecodeError::UnknownDiscriminant {
                offset,
                discriminant,
                type_name,
            } => write!(
                f,
                "unknown discriminant {} for {} at offset {}",
                discriminant, type_name, offset
            ),
            DecodeError::InvalidData { offset, message } => {
                write!(f, "invalid data at offset {}: {}", offset, message)
            }
            DecodeError::NestingTooDeep { limit } => {
                write!(f, "type nesting exceeds the limit of {} levels", limit)
            }
            DecodeError::TrailingBytes { offset } => {
                write!(f, "unexpected trailing bytes after stream end at offset {}", offset)
            }
        }
    }
}

impl std::error::Error for DecodeError {}
