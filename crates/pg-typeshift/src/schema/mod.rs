//! Schema metadata types for tables, columns and constraints.
//!
//! These are ephemeral descriptors: the backend re-reflects them from the
//! catalog before and after every mutating operation. In particular a
//! column's ordinal index is the position among the table's current columns
//! at reflection time, never a stored field, and must not be cached across an
//! alteration that changes column count.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeshiftError};
use crate::ident;
use crate::types::{compiled, DbType, TypeOptions};

/// Name of the reserved identity column every managed table carries.
pub const RESERVED_ID_COLUMN: &str = "id";

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Catalog oid, the stable handle callers address tables by.
    pub oid: u32,

    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Column definitions in catalog ordinal order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Get the quoted, schema-qualified table name.
    pub fn qualified_name(&self) -> Result<String> {
        ident::qualify(&self.schema, &self.name)
    }

    /// Get the unquoted `schema.table` form for messages.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// The column at a zero-based ordinal index.
    pub fn column_at(&self, index: usize) -> Result<&Column> {
        self.columns
            .get(index)
            .ok_or_else(|| TypeshiftError::column_out_of_range(self.full_name(), index))
    }

    /// Find a column and its current ordinal index by name.
    pub fn column_named(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, col)| col.name == name)
    }

    /// Whether any column currently has the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_named(name).is_some()
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Type name as reported by the catalog (canonical, possibly
    /// parameterized at the source, e.g. "character varying").
    pub type_name: String,

    /// The vocabulary type, when the reported type resolves to one.
    pub data_type: Option<DbType>,

    /// Parameters recovered from the reported type.
    pub type_options: TypeOptions,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    /// Referenced `schema.table` names of foreign keys on this column.
    pub foreign_keys: Vec<String>,

    /// Zero-based position among the table's current columns at reflection
    /// time. Valid only until the next structural alteration.
    pub ordinal_pos: usize,

    /// Oid of the owning table; `None` for detached descriptors.
    pub table_oid: Option<u32>,
}

impl Column {
    /// Whether this is the engine's own reserved default column, which is
    /// never alterable.
    pub fn is_reserved(&self) -> bool {
        self.name == RESERVED_ID_COLUMN
            && self.is_primary_key
            && self.data_type == Some(DbType::Integer)
    }

    /// Whether the descriptor is attached to a live table.
    pub fn is_attached(&self) -> bool {
        self.table_oid.is_some()
    }

    /// The fully parameterized type, suitable for DDL.
    pub fn compiled_type(&self) -> String {
        match self.data_type {
            Some(ty) => compiled(ty, &self.type_options),
            None => self.type_name.clone(),
        }
    }
}

/// Constraint kinds as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Exclusion,
}

impl ConstraintKind {
    /// Decode the single-character contype code from pg_constraint.
    pub fn from_catalog_code(code: char) -> Option<ConstraintKind> {
        match code {
            'p' => Some(ConstraintKind::PrimaryKey),
            'u' => Some(ConstraintKind::Unique),
            'f' => Some(ConstraintKind::ForeignKey),
            'c' => Some(ConstraintKind::Check),
            'x' => Some(ConstraintKind::Exclusion),
            _ => None,
        }
    }

    /// Uniqueness constraints are never copied during column duplication.
    pub fn is_uniqueness(&self) -> bool {
        matches!(self, ConstraintKind::PrimaryKey | ConstraintKind::Unique)
    }
}

/// A constraint attached to a column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConstraint {
    /// Constraint name.
    pub name: String,

    /// Constraint kind.
    pub kind: ConstraintKind,

    /// Reconstructible definition as produced by pg_get_constraintdef.
    pub definition: String,
}
