//! # Type-String Parser
//!
//! Recursive-descent parser turning a ClickHouse type signature into a
//! [`TypeDescriptor`]. Failure is always fatal to the caller: without the
//! descriptor there is no way to know how many bytes the next value spans.
//!
//! ## Grammar
//!
//! ```text
//! type      := name | name '(' params ')'
//! element   := [ident] type                      (Tuple, Nested)
//! enum      := string ['=' number] {',' ...}      (Enum8, Enum16, Enum)
//! json      := { max_dynamic_paths=N | max_dynamic_types=N
//!              | path type | SKIP path | SKIP REGEXP string }
//! aggregate := [version ','] function ['(' literal {',' literal} ')'] {',' type}
//! ```
//!
//! Simple names resolve through a compile-time perfect hash map; a second,
//! case-insensitive map covers the SQL-standard aliases ClickHouse accepts
//! (`BIGINT`, `VARCHAR`, `BOOLEAN`, ...).
//!
//! ## Usage Example
//!
//! ```rust
//! use chwire::types::parse_type;
//!
//! let ty = parse_type("Map(String, Array(Nullable(Decimal64(4))))").unwrap();
//! assert_eq!(ty.to_string(), "Map(String, Array(Nullable(Decimal64(4))))");
//! ```

use std::str::FromStr;

use eyre::{bail, Result};
use phf::phf_map;

use crate::config::MAX_NESTING_DEPTH;
use crate::error::DecodeError;
use crate::types::descriptor::{
    AggregateSpec, DecimalSpec, EnumEntry, IntervalKind, JsonSpec, TupleElement, TypeDescriptor,
};
use crate::types::lexer::{unescape, Lexer, Token};

static SIMPLE_TYPES: phf::Map<&'static str, TypeDescriptor> = phf_map! {
    "Nothing" => TypeDescriptor::Nothing,
    "UInt8" => TypeDescriptor::UInt8,
    "UInt16" => TypeDescriptor::UInt16,
    "UInt32" => TypeDescriptor::UInt32,
    "UInt64" => TypeDescriptor::UInt64,
    "UInt128" => TypeDescriptor::UInt128,
    "UInt256" => TypeDescriptor::UInt256,
    "Int8" => TypeDescriptor::Int8,
    "Int16" => TypeDescriptor::Int16,
    "Int32" => TypeDescriptor::Int32,
    "Int64" => TypeDescriptor::Int64,
    "Int128" => TypeDescriptor::Int128,
    "Int256" => TypeDescriptor::Int256,
    "Float32" => TypeDescriptor::Float32,
    "Float64" => TypeDescriptor::Float64,
    "BFloat16" => TypeDescriptor::BFloat16,
    "Bool" => TypeDescriptor::Bool,
    "String" => TypeDescriptor::String,
    "Date" => TypeDescriptor::Date,
    "Date32" => TypeDescriptor::Date32,
    "DateTime" => TypeDescriptor::DateTime { timezone: None },
    "Time" => TypeDescriptor::Time,
    "UUID" => TypeDescriptor::Uuid,
    "IPv4" => TypeDescriptor::IPv4,
    "IPv6" => TypeDescriptor::IPv6,
    "Dynamic" => TypeDescriptor::Dynamic { max_types: None },
    "Point" => TypeDescriptor::Point,
    "Ring" => TypeDescriptor::Ring,
    "LineString" => TypeDescriptor::LineString,
    "Polygon" => TypeDescriptor::Polygon,
    "MultiLineString" => TypeDescriptor::MultiLineString,
    "MultiPolygon" => TypeDescriptor::MultiPolygon,
    "Geometry" => TypeDescriptor::Geometry,
    "IntervalNanosecond" => TypeDescriptor::Interval(IntervalKind::Nanosecond),
    "IntervalMicrosecond" => TypeDescriptor::Interval(IntervalKind::Microsecond),
    "IntervalMillisecond" => TypeDescriptor::Interval(IntervalKind::Millisecond),
    "IntervalSecond" => TypeDescriptor::Interval(IntervalKind::Second),
    "IntervalMinute" => TypeDescriptor::Interval(IntervalKind::Minute),
    "IntervalHour" => TypeDescriptor::Interval(IntervalKind::Hour),
    "IntervalDay" => TypeDescriptor::Interval(IntervalKind::Day),
    "IntervalWeek" => TypeDescriptor::Interval(IntervalKind::Week),
    "IntervalMonth" => TypeDescriptor::Interval(IntervalKind::Month),
    "IntervalQuarter" => TypeDescriptor::Interval(IntervalKind::Quarter),
    "IntervalYear" => TypeDescriptor::Interval(IntervalKind::Year),
};

static SQL_ALIASES: phf::Map<&'static str, TypeDescriptor> = phf_map! {
    "TINYINT" => TypeDescriptor::Int8,
    "SMALLINT" => TypeDescriptor::Int16,
    "INT" => TypeDescriptor::Int32,
    "INTEGER" => TypeDescriptor::Int32,
    "BIGINT" => TypeDescriptor::Int64,
    "FLOAT" => TypeDescriptor::Float32,
    "REAL" => TypeDescriptor::Float32,
    "DOUBLE" => TypeDescriptor::Float64,
    "TEXT" => TypeDescriptor::String,
    "VARCHAR" => TypeDescriptor::String,
    "CHAR" => TypeDescriptor::String,
    "BLOB" => TypeDescriptor::String,
    "BOOLEAN" => TypeDescriptor::Bool,
    "BOOL" => TypeDescriptor::Bool,
    "TIMESTAMP" => TypeDescriptor::DateTime { timezone: None },
    "JSON" => TypeDescriptor::Json(JsonSpec {
        max_dynamic_paths: None,
        max_dynamic_types: None,
        typed_paths: Vec::new(),
        skip_paths: Vec::new(),
        skip_regexps: Vec::new(),
    }),
};

/// Parses a complete type signature; trailing input is an error.
pub fn parse_type(input: &str) -> Result<TypeDescriptor> {
    let mut parser = TypeParser::new(input);
    let ty = parser.parse_type()?;
    if !matches!(parser.current, Token::Eof) {
        bail!(parser.malformed(format!(
            "unexpected {:?} after complete type",
            parser.current
        )));
    }
    Ok(ty)
}

struct TypeParser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    current: Token<'a>,
    current_start: usize,
    depth: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let current_start = lexer.token_start();
        Self {
            input,
            lexer,
            current,
            current_start,
            depth: 0,
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let next = self.lexer.next_token();
        self.current_start = self.lexer.token_start();
        std::mem::replace(&mut self.current, next)
    }

    fn malformed(&self, message: impl Into<String>) -> DecodeError {
        let message = match self.current {
            Token::Error(lex_message) => lex_message.to_string(),
            _ => message.into(),
        };
        DecodeError::malformed(self.input, self.current_start, message)
    }

    fn check(&self, expected: &Token<'_>) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(expected)
    }

    fn consume(&mut self, expected: &Token<'_>) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token<'_>) -> Result<()> {
        if self.consume(expected) {
            return Ok(());
        }
        bail!(self.malformed(format!("expected {:?}, found {:?}", expected, self.current)))
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.current {
            Token::Ident(name) => {
                self.advance();
                Ok(name.to_string())
            }
            Token::QuotedIdent(raw) => {
                self.advance();
                Ok(unescape(raw, '`'))
            }
            other => bail!(self.malformed(format!("expected identifier, found {:?}", other))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.current {
            Token::String(raw) => {
                self.advance();
                Ok(unescape(raw, '\''))
            }
            other => bail!(self.malformed(format!("expected string literal, found {:?}", other))),
        }
    }

    fn expect_number<T: FromStr>(&mut self, what: &str) -> Result<T> {
        match self.current {
            Token::Number(text) => match text.parse::<T>() {
                Ok(value) => {
                    self.advance();
                    Ok(value)
                }
                Err(_) => bail!(self.malformed(format!("{} '{}' is out of range", what, text))),
            },
            other => bail!(self.malformed(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn parse_type(&mut self) -> Result<TypeDescriptor> {
        let name = match self.current {
            Token::Ident(name) => name,
            other => bail!(self.malformed(format!("expected type name, found {:?}", other))),
        };
        self.advance();
        self.parse_type_after_name(name)
    }

    /// Continues a type whose leading name has already been consumed.
    fn parse_type_after_name(&mut self, name: &'a str) -> Result<TypeDescriptor> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            bail!(DecodeError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH
            });
        }
        let result = if self.consume(&Token::LParen) {
            self.parse_parametric(name).and_then(|ty| {
                self.expect(&Token::RParen)?;
                Ok(ty)
            })
        } else {
            self.resolve_simple(name)
        };
        self.depth -= 1;
        result
    }

    fn resolve_simple(&self, name: &str) -> Result<TypeDescriptor> {
        if let Some(ty) = SIMPLE_TYPES.get(name) {
            return Ok(ty.clone());
        }
        if let Some(ty) = SQL_ALIASES.get(name.to_ascii_uppercase().as_str()) {
            return Ok(ty.clone());
        }
        match name {
            "Array" | "Nullable" | "LowCardinality" | "Map" | "Tuple" | "Nested" | "Variant"
            | "FixedString" | "DateTime64" | "Time64" | "Decimal" | "Decimal32" | "Decimal64"
            | "Decimal128" | "Decimal256" | "Enum" | "Enum8" | "Enum16" | "QBit"
            | "AggregateFunction" | "SimpleAggregateFunction" => {
                bail!(DecodeError::malformed(
                    self.input,
                    self.current_start,
                    format!("{} requires parameters", name)
                ))
            }
            _ => bail!(DecodeError::UnknownType {
                name: name.to_string()
            }),
        }
    }

    fn parse_parametric(&mut self, name: &str) -> Result<TypeDescriptor> {
        let ty = match name {
            "Nullable" => TypeDescriptor::nullable(self.parse_type()?),
            "Array" => TypeDescriptor::array(self.parse_type()?),
            "LowCardinality" => TypeDescriptor::LowCardinality(Box::new(self.parse_type()?)),
            "Map" => {
                let key = self.parse_type()?;
                self.expect(&Token::Comma)?;
                let value = self.parse_type()?;
                TypeDescriptor::Map(Box::new(key), Box::new(value))
            }
            "Tuple" => TypeDescriptor::Tuple(self.parse_elements(false)?),
            "Nested" => TypeDescriptor::Nested(self.parse_elements(true)?),
            "Variant" => {
                let mut alternatives = vec![self.parse_type()?];
                while self.consume(&Token::Comma) {
                    alternatives.push(self.parse_type()?);
                }
                TypeDescriptor::variant(alternatives)
            }
            "FixedString" => TypeDescriptor::FixedString(self.expect_number("string length")?),
            "DateTime" => TypeDescriptor::DateTime {
                timezone: Some(self.expect_string()?),
            },
            "DateTime64" => {
                let precision = self.parse_precision()?;
                let timezone = if self.consume(&Token::Comma) {
                    Some(self.expect_string()?)
                } else {
                    None
                };
                TypeDescriptor::DateTime64 {
                    precision,
                    timezone,
                }
            }
            "Time64" => TypeDescriptor::Time64 {
                precision: self.parse_precision()?,
            },
            "Decimal" => {
                let precision: u8 = self.expect_number("decimal precision")?;
                let scale = if self.consume(&Token::Comma) {
                    self.expect_number("decimal scale")?
                } else {
                    0
                };
                self.check_decimal(precision, scale)?;
                TypeDescriptor::Decimal(DecimalSpec::new(precision, scale))
            }
            "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
                let bits: u16 = match name[7..].parse() {
                    Ok(bits) => bits,
                    Err(_) => bail!(self.malformed("bad decimal width")),
                };
                let scale: u8 = self.expect_number("decimal scale")?;
                let spec = DecimalSpec::sized(bits, scale);
                self.check_decimal(spec.precision, scale)?;
                TypeDescriptor::Decimal(spec)
            }
            "Enum8" => {
                let entries = self.parse_enum_entries()?;
                self.check_enum8(&entries)?;
                TypeDescriptor::Enum8(entries)
            }
            "Enum16" => TypeDescriptor::Enum16(self.parse_enum_entries()?),
            "Enum" => {
                let entries = self.parse_enum_entries()?;
                if entries.iter().all(|e| i8::try_from(e.value).is_ok()) {
                    TypeDescriptor::Enum8(entries)
                } else {
                    TypeDescriptor::Enum16(entries)
                }
            }
            "Dynamic" => {
                let max_types = if self.check(&Token::RParen) {
                    None
                } else {
                    self.expect_setting("max_types")?;
                    Some(self.expect_number("max_types")?)
                };
                TypeDescriptor::Dynamic { max_types }
            }
            "JSON" | "json" => TypeDescriptor::Json(self.parse_json_params()?),
            "QBit" => {
                let element = self.parse_type()?;
                if !matches!(
                    element,
                    TypeDescriptor::BFloat16 | TypeDescriptor::Float32 | TypeDescriptor::Float64
                ) {
                    bail!(self.malformed(format!(
                        "QBit element must be BFloat16, Float32 or Float64, found {}",
                        element
                    )));
                }
                self.expect(&Token::Comma)?;
                TypeDescriptor::QBit {
                    element: Box::new(element),
                    dimension: self.expect_number("QBit dimension")?,
                }
            }
            "AggregateFunction" => TypeDescriptor::AggregateFunction(self.parse_aggregate()?),
            "SimpleAggregateFunction" => {
                let function = self.expect_ident()?;
                self.expect(&Token::Comma)?;
                TypeDescriptor::SimpleAggregateFunction {
                    function,
                    argument: Box::new(self.parse_type()?),
                }
            }
            other if SIMPLE_TYPES.contains_key(other) => {
                bail!(self.malformed(format!("{} takes no parameters", other)))
            }
            other => bail!(DecodeError::UnknownType {
                name: other.to_string()
            }),
        };
        Ok(ty)
    }

    fn parse_precision(&mut self) -> Result<u8> {
        let precision: u8 = self.expect_number("precision")?;
        if precision > 9 {
            bail!(self.malformed(format!("precision {} exceeds 9", precision)));
        }
        Ok(precision)
    }

    fn check_decimal(&self, precision: u8, scale: u8) -> Result<()> {
        if precision == 0 || precision > 76 {
            bail!(self.malformed(format!("decimal precision {} is outside 1..=76", precision)));
        }
        if scale > precision {
            bail!(self.malformed(format!(
                "decimal scale {} exceeds precision {}",
                scale, precision
            )));
        }
        Ok(())
    }

    fn check_enum8(&self, entries: &[EnumEntry]) -> Result<()> {
        if let Some(entry) = entries.iter().find(|e| i8::try_from(e.value).is_err()) {
            bail!(self.malformed(format!(
                "Enum8 value {} for '{}' is out of range",
                entry.value, entry.name
            )));
        }
        Ok(())
    }

    /// Tuple/Nested elements; an element is named when an identifier is
    /// followed directly by its type.
    fn parse_elements(&mut self, names_required: bool) -> Result<Vec<TupleElement>> {
        let mut elements = Vec::new();
        if self.check(&Token::RParen) && !names_required {
            return Ok(elements);
        }
        loop {
            let element = match self.current {
                Token::QuotedIdent(raw) => {
                    self.advance();
                    TupleElement::named(unescape(raw, '`'), self.parse_type()?)
                }
                Token::Ident(first) => {
                    self.advance();
                    if matches!(self.current, Token::Ident(_)) {
                        TupleElement::named(first, self.parse_type()?)
                    } else {
                        TupleElement::unnamed(self.parse_type_after_name(first)?)
                    }
                }
                other => bail!(self.malformed(format!("expected tuple element, found {:?}", other))),
            };
            if names_required && element.name.is_none() {
                bail!(self.malformed("Nested fields must be named"));
            }
            elements.push(element);
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        Ok(elements)
    }

    fn parse_enum_entries(&mut self) -> Result<Vec<EnumEntry>> {
        let mut entries: Vec<EnumEntry> = Vec::new();
        loop {
            let name = self.expect_string()?;
            let value = if self.consume(&Token::Eq) {
                self.expect_number("enum value")?
            } else {
                entries.last().map_or(1, |e| e.value.saturating_add(1))
            };
            if entries.iter().any(|e| e.name == name || e.value == value) {
                bail!(self.malformed(format!("duplicate enum entry '{}' = {}", name, value)));
            }
            entries.push(EnumEntry { name, value });
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        Ok(entries)
    }

    fn expect_setting(&mut self, setting: &str) -> Result<()> {
        match self.current {
            Token::Ident(name) if name == setting => {
                self.advance();
                self.expect(&Token::Eq)
            }
            other => bail!(self.malformed(format!("expected {}=, found {:?}", setting, other))),
        }
    }

    fn parse_json_params(&mut self) -> Result<JsonSpec> {
        let mut spec = JsonSpec::default();
        if self.check(&Token::RParen) {
            return Ok(spec);
        }
        loop {
            match self.current {
                Token::Ident("max_dynamic_paths") => {
                    self.expect_setting("max_dynamic_paths")?;
                    spec.max_dynamic_paths = Some(self.expect_number("max_dynamic_paths")?);
                }
                Token::Ident("max_dynamic_types") => {
                    self.expect_setting("max_dynamic_types")?;
                    spec.max_dynamic_types = Some(self.expect_number("max_dynamic_types")?);
                }
                Token::Ident(word) if word.eq_ignore_ascii_case("SKIP") => {
                    self.advance();
                    match self.current {
                        Token::Ident(word) if word.eq_ignore_ascii_case("REGEXP") => {
                            self.advance();
                            if matches!(self.current, Token::String(_)) {
                                spec.skip_regexps.push(self.expect_string()?);
                            } else {
                                spec.skip_paths.push(word.to_string());
                            }
                        }
                        _ => spec.skip_paths.push(self.expect_ident()?),
                    }
                }
                _ => {
                    let path = self.expect_ident()?;
                    let ty = self.parse_type()?;
                    if spec.typed_paths.iter().any(|(p, _)| *p == path) {
                        bail!(self.malformed(format!("duplicate typed path '{}'", path)));
                    }
                    spec.typed_paths.push((path, ty));
                }
            }
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        spec.typed_paths.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(spec)
    }

    fn parse_aggregate(&mut self) -> Result<AggregateSpec> {
        let version = if matches!(self.current, Token::Number(_)) {
            let version = self.expect_number("aggregate function version")?;
            self.expect(&Token::Comma)?;
            Some(version)
        } else {
            None
        };
        let function = self.expect_ident()?;

        let mut parameters = Vec::new();
        if self.consume(&Token::LParen) {
            if !self.check(&Token::RParen) {
                loop {
                    parameters.push(self.parse_literal()?);
                    if !self.consume(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::RParen)?;
        }

        let mut arguments = Vec::new();
        while self.consume(&Token::Comma) {
            arguments.push(self.parse_type()?);
        }
        Ok(AggregateSpec {
            version,
            function,
            parameters,
            arguments,
        })
    }

    fn parse_literal(&mut self) -> Result<String> {
        match self.advance() {
            Token::Number(text) | Token::Ident(text) => Ok(text.to_string()),
            Token::String(raw) => Ok(format!("'{}'", raw)),
            other => bail!(DecodeError::malformed(
                self.input,
                self.current_start,
                format!("expected parameter literal, found {:?}", other)
            )),
        }
    }
}
