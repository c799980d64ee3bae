//! The closed vocabulary of database types the engine can alter between.
//!
//! Every type the cast graph knows is a variant of [`DbType`]: the native
//! PostgreSQL types plus the custom types (email, money, uri) this crate
//! installs. Keeping the vocabulary closed means a typo can never create an
//! unreachable cast edge; anything stringly-typed is resolved through
//! [`DbType::lookup`] at the API boundary.

pub mod catalog;
pub mod custom;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Schema that holds installed cast functions, custom types and helpers.
pub const TYPE_SCHEMA: &str = "typeshift_types";

/// A database type the engine can cast from or to.
///
/// Custom variants are backed by native storage (a domain over text, a
/// composite of numeric and char(3)) plus validation owned by the type
/// definition itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DbType {
    // ===== Integer types =====
    SmallInt,
    Integer,
    BigInt,

    // ===== Decimal/floating types =====
    Real,
    DoublePrecision,
    Float,
    Numeric,
    Decimal,

    // ===== Boolean =====
    Boolean,

    // ===== Textual types =====
    Char,
    Varchar,
    Text,
    /// The catalog `name` type, exposed to callers as "string".
    Name,

    // ===== Date/time types =====
    Date,
    TimeWithoutTimeZone,
    TimeWithTimeZone,
    Interval,

    // ===== Custom types =====
    Email,
    Money,
    Uri,
}

impl DbType {
    /// Every variant, in a stable order.
    pub const ALL: &'static [DbType] = &[
        DbType::SmallInt,
        DbType::Integer,
        DbType::BigInt,
        DbType::Real,
        DbType::DoublePrecision,
        DbType::Float,
        DbType::Numeric,
        DbType::Decimal,
        DbType::Boolean,
        DbType::Char,
        DbType::Varchar,
        DbType::Text,
        DbType::Name,
        DbType::Date,
        DbType::TimeWithoutTimeZone,
        DbType::TimeWithTimeZone,
        DbType::Interval,
        DbType::Email,
        DbType::Money,
        DbType::Uri,
    ];

    /// The canonical compiled name of the type. Two type identifiers are
    /// equal iff their canonical forms (including any parameters) are equal.
    pub fn canonical(&self) -> &'static str {
        match self {
            DbType::SmallInt => "smallint",
            DbType::Integer => "integer",
            DbType::BigInt => "bigint",
            DbType::Real => "real",
            DbType::DoublePrecision => "double precision",
            DbType::Float => "float",
            DbType::Numeric => "numeric",
            DbType::Decimal => "decimal",
            DbType::Boolean => "boolean",
            DbType::Char => "char",
            DbType::Varchar => "varchar",
            DbType::Text => "text",
            DbType::Name => "name",
            DbType::Date => "date",
            DbType::TimeWithoutTimeZone => "time without time zone",
            DbType::TimeWithTimeZone => "time with time zone",
            DbType::Interval => "interval",
            DbType::Email => "typeshift_types.email",
            DbType::Money => "typeshift_types.money",
            DbType::Uri => "typeshift_types.uri",
        }
    }

    /// The service-layer ("friendly") name.
    pub fn friendly(&self) -> &'static str {
        match self {
            DbType::Name => "string",
            DbType::Email => "email",
            DbType::Money => "money",
            DbType::Uri => "uri",
            other => other.canonical(),
        }
    }

    /// Whether this is one of the custom types installed by this crate.
    pub fn is_custom(&self) -> bool {
        matches!(self, DbType::Email | DbType::Money | DbType::Uri)
    }

    /// Resolve an arbitrary type string: friendly names, canonical names and
    /// common aliases, in any case. Returns `None` for anything outside the
    /// vocabulary.
    pub fn lookup(name: &str) -> Option<DbType> {
        let normalized = name.trim().to_lowercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        for ty in DbType::ALL {
            if normalized == ty.canonical() || normalized == ty.friendly() {
                return Some(*ty);
            }
        }
        match normalized.as_str() {
            "character varying" => Some(DbType::Varchar),
            "character" => Some(DbType::Char),
            "time" => Some(DbType::TimeWithoutTimeZone),
            "timetz" => Some(DbType::TimeWithTimeZone),
            _ => None,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Integer targets, which share the no-loss narrowing rule.
pub const INTEGER_TYPES: &[DbType] = &[DbType::BigInt, DbType::Integer, DbType::SmallInt];

/// Decimal and floating types.
pub const DECIMAL_TYPES: &[DbType] = &[
    DbType::Decimal,
    DbType::DoublePrecision,
    DbType::Float,
    DbType::Numeric,
    DbType::Real,
];

/// All numeric types: integers plus the decimal family.
pub const NUMBER_TYPES: &[DbType] = &[
    DbType::BigInt,
    DbType::Integer,
    DbType::SmallInt,
    DbType::Decimal,
    DbType::DoublePrecision,
    DbType::Float,
    DbType::Numeric,
    DbType::Real,
];

/// Textual types that participate in the cast graph.
pub const TEXT_TYPES: &[DbType] = &[DbType::Char, DbType::Text, DbType::Varchar];

/// Optional type parameters: precision/scale for numerics, length for
/// character types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl TypeOptions {
    pub fn is_empty(&self) -> bool {
        self.precision.is_none() && self.scale.is_none() && self.length.is_none()
    }

    /// Precision/scale constructor for numeric targets.
    pub fn precision_scale(precision: u32, scale: u32) -> Self {
        TypeOptions {
            precision: Some(precision),
            scale: Some(scale),
            length: None,
        }
    }

    /// Length constructor for character targets.
    pub fn with_length(length: u32) -> Self {
        TypeOptions {
            precision: None,
            scale: None,
            length: Some(length),
        }
    }
}

/// Compile a type with its options into the fully parameterized name, e.g.
/// `numeric(10, 2)` or `varchar(255)`. Options that do not apply to the type
/// are ignored.
pub fn compiled(ty: DbType, options: &TypeOptions) -> String {
    match ty {
        DbType::Numeric | DbType::Decimal => match (options.precision, options.scale) {
            (Some(p), Some(s)) => format!("{}({}, {})", ty.canonical(), p, s),
            (Some(p), None) => format!("{}({})", ty.canonical(), p),
            _ => ty.canonical().to_string(),
        },
        DbType::Char | DbType::Varchar => match options.length {
            Some(n) => format!("{}({})", ty.canonical(), n),
            None => ty.canonical().to_string(),
        },
        _ => ty.canonical().to_string(),
    }
}

/// Derive the bare cast function name from a target type name.
///
/// The name is the type stripped of schema qualification and of the first
/// parenthesized parameter list (keeping any text that trails the closing
/// parenthesis), lower-cased, with whitespace runs joined by underscores and
/// a `cast_to_` prefix. Overload resolution on the server dispatches on the
/// argument type, so all sources of one target share this name.
pub fn cast_function_name(target_type: &str) -> String {
    let unqualified = target_type
        .rsplit('.')
        .next()
        .unwrap_or(target_type)
        .to_lowercase();
    let bare = match unqualified.find('(') {
        Some(open) => {
            let mut bare = unqualified[..open].to_string();
            if !unqualified.ends_with(')') {
                if let Some(close) = unqualified.find(')') {
                    bare.push_str(&unqualified[close + 1..]);
                }
            }
            bare
        }
        None => unqualified,
    };
    let joined = bare.split_whitespace().collect::<Vec<_>>().join("_");
    format!("cast_to_{}", joined)
}

/// The schema-qualified cast function name for a target type.
pub fn qualified_cast_function_name(target: DbType) -> String {
    format!("{}.{}", TYPE_SCHEMA, cast_function_name(target.canonical()))
}
