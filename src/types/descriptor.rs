//! # Type Descriptors
//!
//! [`TypeDescriptor`] is the closed, recursive model of a ClickHouse column
//! type. Every decoder dispatches on it with a single exhaustive `match`, so
//! adding a constructor is a compile error everywhere a rule is missing.
//!
//! ## Type Categories
//!
//! | Category | Constructors | Fixed width |
//! |----------|--------------|-------------|
//! | **Integer** | UInt8..UInt256, Int8..Int256 | 1 - 32 bytes |
//! | **Float** | Float32, Float64, BFloat16 | 4, 8, 2 bytes |
//! | **Text** | String, FixedString(N) | Variable / N |
//! | **Date/Time** | Date, Date32, DateTime, DateTime64, Time, Time64 | 2 - 8 bytes |
//! | **Network** | UUID, IPv4, IPv6 | 16, 4, 16 bytes |
//! | **Numeric** | Decimal(P, S), Decimal32..256(S) | 4 - 32 bytes |
//! | **Enum** | Enum8, Enum16 | 1, 2 bytes |
//! | **Composite** | Array, Tuple, Map, Nullable, LowCardinality | Variable |
//! | **Self-describing** | Variant, Dynamic, JSON | Variable |
//! | **Sugar** | Nested, Point, Ring, LineString, Polygon, MultiLineString, MultiPolygon, Geometry | Variable |
//! | **Other** | QBit, AggregateFunction, SimpleAggregateFunction, Interval, Nothing | - |
//!
//! ## Canonical Rendering
//!
//! `Display` renders a descriptor back to the type string ClickHouse would
//! print. Variant alternatives are kept sorted by that rendering because the
//! sort order *is* the wire discriminator assignment:
//!
//! ```ignore
//! let ty = parse_type("Variant(UInt64, String)")?;
//! assert_eq!(ty.to_string(), "Variant(String, UInt64)");
//! ```
//!
//! ## Desugaring
//!
//! Geo shapes, `Nested`, `Interval*` and `SimpleAggregateFunction` have no
//! wire layout of their own; [`TypeDescriptor::desugar`] maps them onto the
//! structural type that is actually transmitted.

use std::fmt::{self, Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalKind {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalKind {
    pub const ALL: [IntervalKind; 11] = [
        IntervalKind::Nanosecond,
        IntervalKind::Microsecond,
        IntervalKind::Millisecond,
        IntervalKind::Second,
        IntervalKind::Minute,
        IntervalKind::Hour,
        IntervalKind::Day,
        IntervalKind::Week,
        IntervalKind::Month,
        IntervalKind::Quarter,
        IntervalKind::Year,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IntervalKind::Nanosecond => "Nanosecond",
            IntervalKind::Microsecond => "Microsecond",
            IntervalKind::Millisecond => "Millisecond",
            IntervalKind::Second => "Second",
            IntervalKind::Minute => "Minute",
            IntervalKind::Hour => "Hour",
            IntervalKind::Day => "Day",
            IntervalKind::Week => "Week",
            IntervalKind::Month => "Month",
            IntervalKind::Quarter => "Quarter",
            IntervalKind::Year => "Year",
        }
    }

    /// Kind from its position in the binary type encoding.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecimalSpec {
    pub precision: u8,
    pub scale: u8,
    /// Backing width in bits when spelled `Decimal32(S)` .. `Decimal256(S)`.
    pub alias_bits: Option<u16>,
}

impl DecimalSpec {
    pub fn new(precision: u8, scale: u8) -> Self {
        Self {
            precision,
            scale,
            alias_bits: None,
        }
    }

    pub fn sized(bits: u16, scale: u8) -> Self {
        let precision = match bits {
            32 => 9,
            64 => 18,
            128 => 38,
            _ => 76,
        };
        Self {
            precision,
            scale,
            alias_bits: Some(bits),
        }
    }

    /// Bytes of the backing integer, chosen by precision.
    pub fn width(&self) -> usize {
        match self.precision {
            0..=9 => 4,
            10..=18 => 8,
            19..=38 => 16,
            _ => 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumEntry {
    pub name: String,
    pub value: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleElement {
    pub name: Option<String>,
    pub ty: TypeDescriptor,
}

impl TupleElement {
    pub fn unnamed(ty: TypeDescriptor) -> Self {
        Self { name: None, ty }
    }

    pub fn named(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonSpec {
    pub max_dynamic_paths: Option<u64>,
    pub max_dynamic_types: Option<u64>,
    /// Declared paths, kept sorted by path name.
    pub typed_paths: Vec<(String, TypeDescriptor)>,
    pub skip_paths: Vec<String>,
    pub skip_regexps: Vec<String>,
}

impl JsonSpec {
    pub fn typed_path(&self, path: &str) -> Option<&TypeDescriptor> {
        self.typed_paths
            .binary_search_by(|(name, _)| name.as_str().cmp(path))
            .ok()
            .map(|idx| &self.typed_paths[idx].1)
    }

    fn is_plain(&self) -> bool {
        self.max_dynamic_paths.is_none()
            && self.max_dynamic_types.is_none()
            && self.typed_paths.is_empty()
            && self.skip_paths.is_empty()
            && self.skip_regexps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateSpec {
    pub version: Option<u64>,
    pub function: String,
    /// Parameter literals exactly as written, e.g. `0.5` or `'x'`.
    pub parameters: Vec<String>,
    pub arguments: Vec<TypeDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Nothing,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    Float32,
    Float64,
    BFloat16,
    Bool,
    String,
    FixedString(usize),
    Date,
    Date32,
    DateTime {
        timezone: Option<String>,
    },
    DateTime64 {
        precision: u8,
        timezone: Option<String>,
    },
    Time,
    Time64 {
        precision: u8,
    },
    Uuid,
    IPv4,
    IPv6,
    Decimal(DecimalSpec),
    Enum8(Vec<EnumEntry>),
    Enum16(Vec<EnumEntry>),
    Interval(IntervalKind),
    Array(Box<TypeDescriptor>),
    Tuple(Vec<TupleElement>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Nullable(Box<TypeDescriptor>),
    LowCardinality(Box<TypeDescriptor>),
    /// Alternatives sorted by rendered name; index = discriminator.
    Variant(Vec<TypeDescriptor>),
    Dynamic {
        max_types: Option<u64>,
    },
    Json(JsonSpec),
    Nested(Vec<TupleElement>),
    Point,
    Ring,
    LineString,
    Polygon,
    MultiLineString,
    MultiPolygon,
    Geometry,
    QBit {
        element: Box<TypeDescriptor>,
        dimension: usize,
    },
    AggregateFunction(AggregateSpec),
    SimpleAggregateFunction {
        function: String,
        argument: Box<TypeDescriptor>,
    },
}

impl TypeDescriptor {
    /// Builds a Variant with alternatives in discriminator order.
    pub fn variant(mut alternatives: Vec<TypeDescriptor>) -> Self {
        sort_by_rendered_name(&mut alternatives);
        alternatives.dedup();
        TypeDescriptor::Variant(alternatives)
    }

    pub fn array(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(inner))
    }

    pub fn nullable(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nullable(Box::new(inner))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDescriptor::Nullable(_))
    }

    /// Type without an outer `Nullable`.
    pub fn non_nullable(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Width in bytes of a fixed-size value, `None` for variable layouts.
    pub fn fixed_width(&self) -> Option<usize> {
        use TypeDescriptor::*;
        match self {
            UInt8 | Int8 | Bool | Enum8(_) => Some(1),
            UInt16 | Int16 | BFloat16 | Date | Enum16(_) => Some(2),
            UInt32 | Int32 | Float32 | Date32 | DateTime { .. } | IPv4 | Time => Some(4),
            UInt64 | Int64 | Float64 | DateTime64 { .. } | Time64 { .. } | Interval(_) => Some(8),
            UInt128 | Int128 | Uuid | IPv6 => Some(16),
            UInt256 | Int256 => Some(32),
            FixedString(n) => Some(*n),
            Decimal(spec) => Some(spec.width()),
            _ => None,
        }
    }

    /// The structural type actually transmitted for sugar types.
    pub fn desugar(&self) -> Option<TypeDescriptor> {
        use TypeDescriptor::*;
        let desugared = match self {
            Point => Tuple(vec![
                TupleElement::unnamed(Float64),
                TupleElement::unnamed(Float64),
            ]),
            Ring | LineString => TypeDescriptor::array(Point),
            Polygon => TypeDescriptor::array(Ring),
            MultiLineString => TypeDescriptor::array(LineString),
            MultiPolygon => TypeDescriptor::array(Polygon),
            Geometry => TypeDescriptor::variant(vec![
                LineString,
                MultiLineString,
                MultiPolygon,
                Point,
                Polygon,
                Ring,
            ]),
            Nested(fields) => TypeDescriptor::array(Tuple(fields.clone())),
            Interval(_) => Int64,
            SimpleAggregateFunction { argument, .. } => (**argument).clone(),
            _ => return None,
        };
        Some(desugared)
    }

    /// Short constructor name used in logs and error messages.
    pub fn family(&self) -> &'static str {
        use TypeDescriptor::*;
        match self {
            Nothing => "Nothing",
            UInt8 => "UInt8",
            UInt16 => "UInt16",
            UInt32 => "UInt32",
            UInt64 => "UInt64",
            UInt128 => "UInt128",
            UInt256 => "UInt256",
            Int8 => "Int8",
            Int16 => "Int16",
            Int32 => "Int32",
            Int64 => "Int64",
            Int128 => "Int128",
            Int256 => "Int256",
            Float32 => "Float32",
            Float64 => "Float64",
            BFloat16 => "BFloat16",
            Bool => "Bool",
            String => "String",
            FixedString(_) => "FixedString",
            Date => "Date",
            Date32 => "Date32",
            DateTime { .. } => "DateTime",
            DateTime64 { .. } => "DateTime64",
            Time => "Time",
            Time64 { .. } => "Time64",
            Uuid => "UUID",
            IPv4 => "IPv4",
            IPv6 => "IPv6",
            Decimal(_) => "Decimal",
            Enum8(_) => "Enum8",
            Enum16(_) => "Enum16",
            Interval(_) => "Interval",
            Array(_) => "Array",
            Tuple(_) => "Tuple",
            Map(_, _) => "Map",
            Nullable(_) => "Nullable",
            LowCardinality(_) => "LowCardinality",
            Variant(_) => "Variant",
            Dynamic { .. } => "Dynamic",
            Json(_) => "JSON",
            Nested(_) => "Nested",
            Point => "Point",
            Ring => "Ring",
            LineString => "LineString",
            Polygon => "Polygon",
            MultiLineString => "MultiLineString",
            MultiPolygon => "MultiPolygon",
            Geometry => "Geometry",
            QBit { .. } => "QBit",
            AggregateFunction(_) => "AggregateFunction",
            SimpleAggregateFunction { .. } => "SimpleAggregateFunction",
        }
    }
}

/// Looks up the name bound to `value` in an enum's entry list.
pub fn enum_name(entries: &[EnumEntry], value: i16) -> Option<&str> {
    entries
        .iter()
        .find(|entry| entry.value == value)
        .map(|entry| entry.name.as_str())
}

pub fn sort_by_rendered_name(types: &mut [TypeDescriptor]) {
    types.sort_by_cached_key(|ty| ty.to_string());
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn write_identifier(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_identifier(name) {
        return f.write_str(name);
    }
    f.write_char('`')?;
    for c in name.chars() {
        match c {
            '`' => f.write_str("\\`")?,
            '\\' => f.write_str("\\\\")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('`')
}

pub(crate) fn write_string_literal(f: &mut impl fmt::Write, text: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in text.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

fn write_elements(f: &mut fmt::Formatter<'_>, elements: &[TupleElement]) -> fmt::Result {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if let Some(name) = &element.name {
            write_identifier(f, name)?;
            f.write_char(' ')?;
        }
        write!(f, "{}", element.ty)?;
    }
    Ok(())
}

fn write_enum(f: &mut fmt::Formatter<'_>, family: &str, entries: &[EnumEntry]) -> fmt::Result {
    write!(f, "{}(", family)?;
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_string_literal(f, &entry.name)?;
        write!(f, " = {}", entry.value)?;
    }
    f.write_char(')')
}

fn write_json(f: &mut fmt::Formatter<'_>, spec: &JsonSpec) -> fmt::Result {
    f.write_str("JSON")?;
    if spec.is_plain() {
        return Ok(());
    }
    let mut parts = Vec::new();
    if let Some(n) = spec.max_dynamic_paths {
        parts.push(format!("max_dynamic_paths={}", n));
    }
    if let Some(n) = spec.max_dynamic_types {
        parts.push(format!("max_dynamic_types={}", n));
    }
    for (path, ty) in &spec.typed_paths {
        parts.push(format!("{} {}", Identifier(path), ty));
    }
    for path in &spec.skip_paths {
        parts.push(format!("SKIP {}", Identifier(path)));
    }
    for regexp in &spec.skip_regexps {
        let mut part = String::from("SKIP REGEXP ");
        write_string_literal(&mut part, regexp)?;
        parts.push(part);
    }
    write!(f, "({})", parts.join(", "))
}

struct Identifier<'a>(&'a str);

impl fmt::Display for Identifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_identifier(f, self.0)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TypeDescriptor::*;
        match self {
            FixedString(n) => write!(f, "FixedString({})", n),
            DateTime { timezone: None } => f.write_str("DateTime"),
            DateTime { timezone: Some(tz) } => {
                f.write_str("DateTime(")?;
                write_string_literal(f, tz)?;
                f.write_char(')')
            }
            DateTime64 {
                precision,
                timezone,
            } => {
                write!(f, "DateTime64({}", precision)?;
                if let Some(tz) = timezone {
                    f.write_str(", ")?;
                    write_string_literal(f, tz)?;
                }
                f.write_char(')')
            }
            Time64 { precision } => write!(f, "Time64({})", precision),
            Decimal(spec) => match spec.alias_bits {
                Some(bits) => write!(f, "Decimal{}({})", bits, spec.scale),
                None => write!(f, "Decimal({}, {})", spec.precision, spec.scale),
            },
            Enum8(entries) => write_enum(f, "Enum8", entries),
            Enum16(entries) => write_enum(f, "Enum16", entries),
            Interval(kind) => write!(f, "Interval{}", kind.name()),
            Array(inner) => write!(f, "Array({})", inner),
            Tuple(elements) => {
                f.write_str("Tuple(")?;
                write_elements(f, elements)?;
                f.write_char(')')
            }
            Nested(elements) => {
                f.write_str("Nested(")?;
                write_elements(f, elements)?;
                f.write_char(')')
            }
            Map(key, value) => write!(f, "Map({}, {})", key, value),
            Nullable(inner) => write!(f, "Nullable({})", inner),
            LowCardinality(inner) => write!(f, "LowCardinality({})", inner),
            Variant(alternatives) => {
                f.write_str("Variant(")?;
                for (i, alternative) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", alternative)?;
                }
                f.write_char(')')
            }
            Dynamic { max_types: None } => f.write_str("Dynamic"),
            Dynamic {
                max_types: Some(n),
            } => write!(f, "Dynamic(max_types={})", n),
            Json(spec) => write_json(f, spec),
            QBit { element, dimension } => write!(f, "QBit({}, {})", element, dimension),
            AggregateFunction(spec) => {
                f.write_str("AggregateFunction(")?;
                if let Some(version) = spec.version {
                    write!(f, "{}, ", version)?;
                }
                f.write_str(&spec.function)?;
                if !spec.parameters.is_empty() {
                    write!(f, "({})", spec.parameters.join(", "))?;
                }
                for argument in &spec.arguments {
                    write!(f, ", {}", argument)?;
                }
                f.write_char(')')
            }
            SimpleAggregateFunction { function, argument } => {
                write!(f, "SimpleAggregateFunction({}, {})", function, argument)
            }
            other => f.write_str(other.family()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_sorts_alternatives_by_rendered_name() {
        let ty = TypeDescriptor::variant(vec![TypeDescriptor::UInt64, TypeDescriptor::String]);
        assert_eq!(ty.to_string(), "Variant(String, UInt64)");
    }

    #[test]
    fn decimal_width_follows_precision() {
        assert_eq!(DecimalSpec::new(9, 2).width(), 4);
        assert_eq!(DecimalSpec::new(10, 2).width(), 8);
        assert_eq!(DecimalSpec::new(38, 2).width(), 16);
        assert_eq!(DecimalSpec::new(39, 2).width(), 32);
        assert_eq!(DecimalSpec::sized(64, 4).width(), 8);
    }

    #[test]
    fn decimal_alias_renders_with_alias_spelling() {
        let ty = TypeDescriptor::Decimal(DecimalSpec::sized(64, 4));
        assert_eq!(ty.to_string(), "Decimal64(4)");
        let ty = TypeDescriptor::Decimal(DecimalSpec::new(12, 3));
        assert_eq!(ty.to_string(), "Decimal(12, 3)");
    }

    #[test]
    fn geometry_desugars_to_sorted_variant() {
        let TypeDescriptor::Variant(alternatives) = TypeDescriptor::Geometry.desugar().unwrap()
        else {
            panic!("Geometry must desugar to a Variant");
        };
        let names: Vec<String> = alternatives.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            [
                "LineString",
                "MultiLineString",
                "MultiPolygon",
                "Point",
                "Polygon",
                "Ring"
            ]
        );
    }

    #[test]
    fn nested_desugars_to_array_of_named_tuple() {
        let nested = TypeDescriptor::Nested(vec![
            TupleElement::named("a", TypeDescriptor::UInt8),
            TupleElement::named("b", TypeDescriptor::String),
        ]);
        assert_eq!(
            nested.desugar().unwrap().to_string(),
            "Array(Tuple(a UInt8, b String))"
        );
    }

    #[test]
    fn enum_renders_escaped_names() {
        let ty = TypeDescriptor::Enum8(vec![
            EnumEntry {
                name: "it's".into(),
                value: -1,
            },
            EnumEntry {
                name: "b".into(),
                value: 2,
            },
        ]);
        assert_eq!(ty.to_string(), "Enum8('it\\'s' = -1, 'b' = 2)");
    }

    #[test]
    fn json_with_parameters_renders_in_order() {
        let spec = JsonSpec {
            max_dynamic_paths: Some(10),
            typed_paths: vec![("a.b".into(), TypeDescriptor::UInt32)],
            skip_paths: vec!["c".into()],
            skip_regexps: vec!["^d".into()],
            ..JsonSpec::default()
        };
        assert_eq!(
            TypeDescriptor::Json(spec).to_string(),
            "JSON(max_dynamic_paths=10, a.b UInt32, SKIP c, SKIP REGEXP '^d')"
        );
        assert_eq!(TypeDescriptor::Json(JsonSpec::default()).to_string(), "JSON");
    }

    #[test]
    fn tuple_names_needing_quotes_are_backquoted() {
        let ty = TypeDescriptor::Tuple(vec![TupleElement::named("my col", TypeDescriptor::Int8)]);
        assert_eq!(ty.to_string(), "Tuple(`my col` Int8)");
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(TypeDescriptor::Uuid.fixed_width(), Some(16));
        assert_eq!(TypeDescriptor::FixedString(3).fixed_width(), Some(3));
        assert_eq!(TypeDescriptor::String.fixed_width(), None);
        assert_eq!(TypeDescriptor::Nothing.fixed_width(), None);
    }
}
