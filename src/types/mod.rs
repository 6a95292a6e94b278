//! # ClickHouse Type System
//!
//! - [`descriptor`]: the closed [`TypeDescriptor`] model and its canonical
//!   rendering
//! - [`lexer`] / [`parser`]: type-string signatures such as
//!   `Array(Nullable(String))`
//! - [`binary`]: the compact binary type encoding embedded in Dynamic and
//!   JSON shared data

pub mod binary;
pub mod descriptor;
pub mod lexer;
pub mod parser;

pub use binary::read_binary_type;
pub use descriptor::{
    enum_name, AggregateSpec, DecimalSpec, EnumEntry, IntervalKind, JsonSpec, TupleElement,
    TypeDescriptor,
};
pub use parser::parse_type;
