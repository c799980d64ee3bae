//! Collaborator contracts the core depends on, and their PostgreSQL
//! implementation.
//!
//! The cast installer, resolver and alteration engine never talk to the
//! database directly; they go through [`SchemaBackend`]. That keeps the
//! orchestration logic testable against a mock and keeps every contract this
//! core assumes about its collaborators in one place.

mod pg;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{ColumnConstraint, Table};
use crate::types::DbType;

pub use pg::PgBackend;

/// Reflection, type-catalog, constraint and transaction services.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// Reflect a table's committed state: name, schema, and columns in the
    /// catalog's own ordinal order (dropped columns excluded).
    async fn table_by_oid(&self, oid: u32) -> Result<Table>;

    /// The types this deployment exposes: the native vocabulary plus
    /// whichever custom types are installed.
    async fn available_types(&self) -> Result<BTreeSet<DbType>>;

    /// Constraints attached to a column, with reconstructible definitions.
    async fn constraints_on_column(
        &self,
        table_oid: u32,
        column: &str,
    ) -> Result<Vec<ColumnConstraint>>;

    /// Execute statements inside one transaction: committed on success,
    /// rolled back on the first failure, which surfaces as a typed error.
    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()>;
}
