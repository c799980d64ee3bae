//! The column alteration engine.
//!
//! Six operations against a table: add, rename, retype, change-nullability,
//! drop and duplicate. Every mutation runs in one transaction through the
//! backend and re-reflects the table before acting, so a column's ordinal
//! index is always resolved against committed state at call time. Callers
//! must still not hold an index across concurrent structural changes; this
//! engine does not coordinate multiple writers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::{PgBackend, SchemaBackend};
use crate::cast::{install, resolve};
use crate::config::ConnectionConfig;
use crate::error::{Result, TypeshiftError};
use crate::ident::quote_ident;
use crate::schema::{Column, Table};
use crate::types::{catalog, compiled, custom, DbType, TypeOptions};

/// Definition of a column to add.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Requested type, friendly or canonical.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Optional precision/scale/length.
    #[serde(default)]
    pub type_options: TypeOptions,

    /// Whether the column allows NULL. Defaults to true.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// A single-attribute column change. Exactly one attribute per alteration is
/// the contract; this closed union enforces it for direct callers.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    /// Change the column's name.
    Rename(String),

    /// Change the column's type, casting existing values.
    Retype {
        target: String,
        options: TypeOptions,
    },

    /// Change the column's nullability.
    SetNullable(bool),
}

/// The loose, caller-facing changeset. Validates into [`ColumnChange`]; a
/// request with zero or multiple attributes set is a contract violation
/// surfaced before any transaction is opened.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlterRequest {
    /// New column name.
    pub name: Option<String>,

    /// New column type, friendly or canonical.
    #[serde(rename = "type")]
    pub new_type: Option<String>,

    /// Options for the new type; only valid together with `type`.
    pub type_options: Option<TypeOptions>,

    /// New nullability.
    pub nullable: Option<bool>,
}

impl AlterRequest {
    /// Validate the exactly-one-attribute contract and produce the change.
    pub fn into_change(self) -> Result<ColumnChange> {
        if self.type_options.is_some() && self.new_type.is_none() {
            return Err(TypeshiftError::MalformedChangeset(
                "type_options are only valid together with a type change".to_string(),
            ));
        }
        match (self.name, self.new_type, self.nullable) {
            (Some(name), None, None) => Ok(ColumnChange::Rename(name)),
            (None, Some(target), None) => Ok(ColumnChange::Retype {
                target,
                options: self.type_options.unwrap_or_default(),
            }),
            (None, None, Some(nullable)) => Ok(ColumnChange::SetNullable(nullable)),
            (name, new_type, nullable) => {
                let given = [name.is_some(), new_type.is_some(), nullable.is_some()]
                    .into_iter()
                    .filter(|present| *present)
                    .count();
                Err(TypeshiftError::MalformedChangeset(format!(
                    "exactly one of name, type, nullable must be given, got {}",
                    given
                )))
            }
        }
    }
}

/// The engine: cast installation, resolution queries and the six column
/// operations, all through one backend.
pub struct AlterEngine {
    backend: Arc<dyn SchemaBackend>,
}

impl AlterEngine {
    /// Wrap an existing backend.
    pub fn new(backend: Arc<dyn SchemaBackend>) -> Self {
        AlterEngine { backend }
    }

    /// Connect to PostgreSQL with the given configuration.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        Ok(AlterEngine::new(Arc::new(PgBackend::connect(config)?)))
    }

    /// Install the type schema, the custom types and every cast function.
    /// Idempotent; safe to run on every startup.
    pub async fn install(&self) -> Result<()> {
        custom::install_custom_types(self.backend.as_ref()).await?;
        install::install_all_casts(self.backend.as_ref()).await
    }

    /// The types this deployment supports as alteration targets.
    pub async fn supported_types(
        &self,
        friendly_names: bool,
    ) -> Result<BTreeMap<String, DbType>> {
        let available = self.backend.available_types().await?;
        Ok(catalog::supported_alter_types(&available, friendly_names))
    }

    /// The complete directed cast graph, keyed by source type.
    pub async fn full_cast_map(&self) -> Result<BTreeMap<DbType, Vec<DbType>>> {
        let available = self.backend.available_types().await?;
        Ok(resolve::full_cast_map(&available))
    }

    /// Every type the column at `index` can be retyped to, or `None` when
    /// the column is not alterable at all.
    pub async fn valid_target_types(
        &self,
        table_oid: u32,
        index: usize,
    ) -> Result<Option<BTreeSet<DbType>>> {
        let table = self.backend.table_by_oid(table_oid).await?;
        let column = table.column_at(index)?;
        let available = self.backend.available_types().await?;
        Ok(resolve::valid_target_types(column, &available))
    }

    /// The SQL expression converting the column at `index` to the target
    /// type.
    pub async fn cast_expression(
        &self,
        table_oid: u32,
        index: usize,
        target: &str,
        options: &TypeOptions,
    ) -> Result<String> {
        let table = self.backend.table_by_oid(table_oid).await?;
        let column = table.column_at(index)?;
        let available = self.backend.available_types().await?;
        let target = catalog::resolve_type(&available, target)?;
        let current = column
            .data_type
            .ok_or_else(|| TypeshiftError::UnsupportedType(column.type_name.clone()))?;
        resolve::cast_expression(&column.name, current, target, options)
    }

    /// Append a column with the given type and nullability.
    ///
    /// An unsupported requested type falls back to varchar with a warning;
    /// this is the one deliberate graceful-degradation exception to the
    /// no-fallback rule.
    pub async fn add_column(&self, table_oid: u32, spec: &ColumnSpec) -> Result<Column> {
        let available = self.backend.available_types().await?;
        let type_sql = match catalog::resolve_type(&available, &spec.type_name) {
            Ok(ty) => compiled(ty, &spec.type_options),
            Err(_) => {
                warn!(
                    "requested type '{}' not supported, falling back to varchar",
                    spec.type_name
                );
                DbType::Varchar.canonical().to_string()
            }
        };

        let table = self.backend.table_by_oid(table_oid).await?;
        let statement = add_column_sql(&table, &spec.name, &type_sql, spec.nullable)?;
        self.backend.execute_in_transaction(&[statement]).await?;

        info!("added column {} to {}", spec.name, table.full_name());
        let table = self.backend.table_by_oid(table_oid).await?;
        find_created(&table, &spec.name).cloned()
    }

    /// Apply a single-attribute change to the column at `index`.
    pub async fn alter_column(
        &self,
        table_oid: u32,
        index: usize,
        request: AlterRequest,
    ) -> Result<Column> {
        let change = request.into_change()?;
        self.alter_column_change(table_oid, index, change).await
    }

    /// Apply an already-validated change to the column at `index`.
    pub async fn alter_column_change(
        &self,
        table_oid: u32,
        index: usize,
        change: ColumnChange,
    ) -> Result<Column> {
        let table = self.backend.table_by_oid(table_oid).await?;
        let column = table.column_at(index)?.clone();

        let statement = match &change {
            ColumnChange::Rename(new_name) => rename_column_sql(&table, &column.name, new_name)?,
            ColumnChange::SetNullable(nullable) => {
                set_nullable_sql(&table, &column.name, *nullable)?
            }
            ColumnChange::Retype { target, options } => {
                let available = self.backend.available_types().await?;
                let target = catalog::resolve_type(&available, target)?;
                let current = column
                    .data_type
                    .ok_or_else(|| TypeshiftError::UnsupportedType(column.type_name.clone()))?;
                let using = resolve::cast_expression(&column.name, current, target, options)?;
                retype_column_sql(&table, &column.name, &compiled(target, options), &using)?
            }
        };

        self.backend.execute_in_transaction(&[statement]).await?;
        info!(
            "altered column {} of {}: {:?}",
            column.name,
            table.full_name(),
            change
        );

        // the index is stable across single-attribute changes; re-reflect to
        // return the committed descriptor
        let table = self.backend.table_by_oid(table_oid).await?;
        Ok(table.column_at(index)?.clone())
    }

    /// Remove the column at `index`. Ordinal indices of later columns shift
    /// down by one.
    pub async fn drop_column(&self, table_oid: u32, index: usize) -> Result<()> {
        let table = self.backend.table_by_oid(table_oid).await?;
        let column = table.column_at(index)?;
        let statement = drop_column_sql(&table, &column.name)?;
        self.backend.execute_in_transaction(&[statement]).await?;
        info!("dropped column {} of {}", column.name, table.full_name());
        Ok(())
    }

    /// Create a copy of the column at `from_index`.
    ///
    /// The new column takes the source's type. Without an explicit name the
    /// lowest unused `<source>_<n>` (n >= 1) is chosen. With `copy_data` the
    /// values are copied by one set-based update; with `copy_constraints`
    /// the source's constraints are copied too, except that PRIMARY KEY and
    /// UNIQUE constraints are never duplicated. Column creation commits on
    /// its own; data and constraint copies share a second transaction, so a
    /// failure there leaves a usable but unpopulated column.
    pub async fn duplicate_column(
        &self,
        table_oid: u32,
        from_index: usize,
        new_name: Option<String>,
        copy_data: bool,
        copy_constraints: bool,
    ) -> Result<Column> {
        let table = self.backend.table_by_oid(table_oid).await?;
        let from_column = table.column_at(from_index)?.clone();
        let new_name = new_name.unwrap_or_else(|| generate_copy_name(&table, &from_column.name));

        let add = add_column_sql(&table, &new_name, &from_column.compiled_type(), true)?;
        self.backend.execute_in_transaction(&[add]).await?;

        let mut followup = Vec::new();
        if copy_data {
            followup.push(copy_data_sql(&table, &new_name, &from_column.name)?);
            if !from_column.is_nullable {
                followup.push(set_nullable_sql(&table, &new_name, false)?);
            }
        }
        if copy_constraints {
            let constraints = self
                .backend
                .constraints_on_column(table_oid, &from_column.name)
                .await?;
            for constraint in constraints {
                if constraint.kind.is_uniqueness() {
                    continue;
                }
                let definition = rewrite_constraint_definition(
                    &constraint.definition,
                    &from_column.name,
                    &new_name,
                );
                let name = format!("{}_{}", constraint.name, new_name);
                followup.push(add_constraint_sql(&table, &name, &definition)?);
            }
        }
        if !followup.is_empty() {
            self.backend.execute_in_transaction(&followup).await?;
        }

        info!(
            "duplicated column {} of {} as {}",
            from_column.name,
            table.full_name(),
            new_name
        );
        let table = self.backend.table_by_oid(table_oid).await?;
        find_created(&table, &new_name).cloned()
    }
}

/// A column that was just created must reflect back; anything else means the
/// catalog and this call disagree about committed state.
fn find_created<'a>(table: &'a Table, name: &str) -> Result<&'a Column> {
    table
        .column_named(name)
        .map(|(_, column)| column)
        .ok_or_else(|| {
            TypeshiftError::Config(format!(
                "column {} missing from {} after creation",
                name,
                table.full_name()
            ))
        })
}

/// Lowest unused `<source>_<n>` with n >= 1.
pub(crate) fn generate_copy_name(table: &Table, source_name: &str) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", source_name, n);
        if !table.has_column(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn add_column_sql(table: &Table, name: &str, type_sql: &str, nullable: bool) -> Result<String> {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table.qualified_name()?,
        quote_ident(name)?,
        type_sql
    );
    if !nullable {
        sql.push_str(" NOT NULL");
    }
    Ok(sql)
}

fn rename_column_sql(table: &Table, old: &str, new: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        table.qualified_name()?,
        quote_ident(old)?,
        quote_ident(new)?
    ))
}

fn retype_column_sql(table: &Table, column: &str, type_sql: &str, using: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}",
        table.qualified_name()?,
        quote_ident(column)?,
        type_sql,
        using
    ))
}

fn set_nullable_sql(table: &Table, column: &str, nullable: bool) -> Result<String> {
    let action = if nullable { "DROP" } else { "SET" };
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
        table.qualified_name()?,
        quote_ident(column)?,
        action
    ))
}

fn drop_column_sql(table: &Table, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        table.qualified_name()?,
        quote_ident(column)?
    ))
}

/// One set-based update equating the destination column to the source.
fn copy_data_sql(table: &Table, to_column: &str, from_column: &str) -> Result<String> {
    Ok(format!(
        "UPDATE {} SET {} = {}",
        table.qualified_name()?,
        quote_ident(to_column)?,
        quote_ident(from_column)?
    ))
}

fn add_constraint_sql(table: &Table, name: &str, definition: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {}",
        table.qualified_name()?,
        quote_ident(name)?,
        definition
    ))
}

/// Re-target a reconstructed constraint definition from one column to
/// another. Identifier tokens are rewritten; string literals are left
/// untouched.
pub(crate) fn rewrite_constraint_definition(
    definition: &str,
    from_column: &str,
    to_column: &str,
) -> String {
    let mut out = String::with_capacity(definition.len());
    let chars: Vec<char> = definition.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // string literal, copied verbatim ('' is the escape)
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '\'' {
                    if i + 1 < chars.len() && chars[i + 1] == '\'' {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
        } else if c == '"' {
            let start = i + 1;
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            i += 1;
            if ident == from_column {
                out.push('"');
                out.push_str(to_column);
                out.push('"');
            } else {
                out.push('"');
                out.push_str(&ident);
                out.push('"');
            }
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if word == from_column {
                out.push('"');
                out.push_str(to_column);
                out.push('"');
            } else {
                out.push_str(&word);
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnConstraint, ConstraintKind};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const TABLE_OID: u32 = 16384;

    fn column(name: &str, data_type: DbType, nullable: bool) -> Column {
        Column {
            name: name.to_string(),
            type_name: data_type.canonical().to_string(),
            data_type: Some(data_type),
            type_options: TypeOptions::default(),
            is_nullable: nullable,
            is_primary_key: false,
            foreign_keys: vec![],
            ordinal_pos: 0,
            table_oid: Some(TABLE_OID),
        }
    }

    fn table(columns: Vec<Column>) -> Table {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, mut col)| {
                col.ordinal_pos = i;
                col
            })
            .collect();
        Table {
            oid: TABLE_OID,
            schema: "public".to_string(),
            name: "accounts".to_string(),
            columns,
        }
    }

    /// Backend double: serves reflection snapshots in order (the last one
    /// repeats) and records every transaction's statements.
    struct MockBackend {
        tables: Mutex<VecDeque<Table>>,
        constraints: Vec<ColumnConstraint>,
        executed: Mutex<Vec<Vec<String>>>,
    }

    impl MockBackend {
        fn new(snapshots: Vec<Table>) -> Self {
            MockBackend {
                tables: Mutex::new(snapshots.into()),
                constraints: vec![],
                executed: Mutex::new(vec![]),
            }
        }

        fn with_constraints(mut self, constraints: Vec<ColumnConstraint>) -> Self {
            self.constraints = constraints;
            self
        }

        fn executed(&self) -> Vec<Vec<String>> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SchemaBackend for MockBackend {
        async fn table_by_oid(&self, _oid: u32) -> Result<Table> {
            let mut tables = self.tables.lock().unwrap();
            if tables.len() > 1 {
                Ok(tables.pop_front().unwrap())
            } else {
                Ok(tables.front().unwrap().clone())
            }
        }

        async fn available_types(&self) -> Result<BTreeSet<DbType>> {
            Ok(catalog::all_types())
        }

        async fn constraints_on_column(
            &self,
            _table_oid: u32,
            _column: &str,
        ) -> Result<Vec<ColumnConstraint>> {
            Ok(self.constraints.clone())
        }

        async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
            self.executed.lock().unwrap().push(statements.to_vec());
            Ok(())
        }
    }

    fn engine_with(backend: MockBackend) -> (AlterEngine, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        (AlterEngine::new(backend.clone()), backend)
    }

    // =========================================================================
    // Changeset contract
    // =========================================================================

    #[test]
    fn test_empty_changeset_is_malformed() {
        let err = AlterRequest::default().into_change().unwrap_err();
        assert!(matches!(err, TypeshiftError::MalformedChangeset(_)));
    }

    #[test]
    fn test_multiple_attributes_are_malformed() {
        let request = AlterRequest {
            new_type: Some("numeric".to_string()),
            nullable: Some(false),
            ..Default::default()
        };
        let err = request.into_change().unwrap_err();
        assert!(matches!(err, TypeshiftError::MalformedChangeset(_)));
    }

    #[test]
    fn test_options_without_type_are_malformed() {
        let request = AlterRequest {
            name: Some("renamed".to_string()),
            type_options: Some(TypeOptions::with_length(10)),
            ..Default::default()
        };
        assert!(request.into_change().is_err());
    }

    #[test]
    fn test_single_attribute_requests_validate() {
        let rename = AlterRequest {
            name: Some("renamed".to_string()),
            ..Default::default()
        };
        assert_eq!(
            rename.into_change().unwrap(),
            ColumnChange::Rename("renamed".to_string())
        );

        let retype = AlterRequest {
            new_type: Some("numeric".to_string()),
            type_options: Some(TypeOptions::precision_scale(10, 2)),
            ..Default::default()
        };
        assert_eq!(
            retype.into_change().unwrap(),
            ColumnChange::Retype {
                target: "numeric".to_string(),
                options: TypeOptions::precision_scale(10, 2),
            }
        );

        let nullable = AlterRequest {
            nullable: Some(false),
            ..Default::default()
        };
        assert_eq!(
            nullable.into_change().unwrap(),
            ColumnChange::SetNullable(false)
        );
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let request: AlterRequest = serde_json::from_str(
            r#"{"type": "numeric", "type_options": {"precision": 10, "scale": 2}}"#,
        )
        .unwrap();
        assert!(matches!(
            request.into_change().unwrap(),
            ColumnChange::Retype { .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_changeset_touches_nothing() {
        let (engine, backend) = engine_with(MockBackend::new(vec![table(vec![column(
            "total",
            DbType::Numeric,
            true,
        )])]));
        let result = engine
            .alter_column(TABLE_OID, 0, AlterRequest::default())
            .await;
        assert!(matches!(
            result,
            Err(TypeshiftError::MalformedChangeset(_))
        ));
        assert!(backend.executed().is_empty());
    }

    // =========================================================================
    // Rename / nullability / retype
    // =========================================================================

    #[tokio::test]
    async fn test_rename_keeps_ordinal_index() {
        let before = table(vec![
            column("id", DbType::Integer, false),
            column("total", DbType::Numeric, true),
        ]);
        let after = table(vec![
            column("id", DbType::Integer, false),
            column("amount", DbType::Numeric, true),
        ]);
        let (engine, backend) = engine_with(MockBackend::new(vec![before, after]));

        let request = AlterRequest {
            name: Some("amount".to_string()),
            ..Default::default()
        };
        let renamed = engine.alter_column(TABLE_OID, 1, request).await.unwrap();

        assert_eq!(renamed.name, "amount");
        assert_eq!(renamed.ordinal_pos, 1);
        let executed = backend.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0][0],
            "ALTER TABLE \"public\".\"accounts\" RENAME COLUMN \"total\" TO \"amount\""
        );
    }

    #[tokio::test]
    async fn test_set_not_null() {
        let snapshot = table(vec![column("total", DbType::Numeric, true)]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        let request = AlterRequest {
            nullable: Some(false),
            ..Default::default()
        };
        engine.alter_column(TABLE_OID, 0, request).await.unwrap();

        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" ALTER COLUMN \"total\" SET NOT NULL"
        );
    }

    #[tokio::test]
    async fn test_drop_not_null() {
        let snapshot = table(vec![column("total", DbType::Numeric, false)]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        engine
            .alter_column_change(TABLE_OID, 0, ColumnChange::SetNullable(true))
            .await
            .unwrap();

        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" ALTER COLUMN \"total\" DROP NOT NULL"
        );
    }

    #[tokio::test]
    async fn test_retype_uses_cast_function() {
        let snapshot = table(vec![column("total", DbType::Numeric, true)]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        let request = AlterRequest {
            new_type: Some("integer".to_string()),
            ..Default::default()
        };
        engine.alter_column(TABLE_OID, 0, request).await.unwrap();

        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" ALTER COLUMN \"total\" TYPE integer \
             USING typeshift_types.cast_to_integer(\"total\")"
        );
    }

    #[tokio::test]
    async fn test_retype_with_options_adds_parameterized_cast() {
        let snapshot = table(vec![column("total", DbType::Text, true)]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        let request = AlterRequest {
            new_type: Some("numeric".to_string()),
            type_options: Some(TypeOptions::precision_scale(10, 2)),
            ..Default::default()
        };
        engine.alter_column(TABLE_OID, 0, request).await.unwrap();

        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" ALTER COLUMN \"total\" TYPE numeric(10, 2) \
             USING typeshift_types.cast_to_numeric(\"total\")::numeric(10, 2)"
        );
    }

    #[tokio::test]
    async fn test_retype_to_unsupported_type_executes_nothing() {
        let snapshot = table(vec![column("total", DbType::Numeric, true)]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        let request = AlterRequest {
            new_type: Some("blob".to_string()),
            ..Default::default()
        };
        let result = engine.alter_column(TABLE_OID, 0, request).await;

        assert!(matches!(result, Err(TypeshiftError::UnsupportedType(_))));
        assert!(backend.executed().is_empty());
    }

    #[tokio::test]
    async fn test_alter_out_of_range_index() {
        let snapshot = table(vec![column("total", DbType::Numeric, true)]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        let result = engine
            .alter_column_change(TABLE_OID, 5, ColumnChange::SetNullable(true))
            .await;
        assert!(matches!(
            result,
            Err(TypeshiftError::ColumnOutOfRange { index: 5, .. })
        ));
        assert!(backend.executed().is_empty());
    }

    // =========================================================================
    // Add / drop
    // =========================================================================

    #[tokio::test]
    async fn test_add_column_with_options() {
        let snapshot = table(vec![column("id", DbType::Integer, false)]);
        let mut after = table(vec![
            column("id", DbType::Integer, false),
            column("balance", DbType::Numeric, false),
        ]);
        after.columns[1].type_options = TypeOptions::precision_scale(12, 4);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot, after]));

        let spec = ColumnSpec {
            name: "balance".to_string(),
            type_name: "numeric".to_string(),
            type_options: TypeOptions::precision_scale(12, 4),
            nullable: false,
        };
        let added = engine.add_column(TABLE_OID, &spec).await.unwrap();

        assert_eq!(added.name, "balance");
        assert_eq!(added.ordinal_pos, 1);
        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" ADD COLUMN \"balance\" numeric(12, 4) NOT NULL"
        );
    }

    #[tokio::test]
    async fn test_add_column_unsupported_type_falls_back_to_varchar() {
        let snapshot = table(vec![column("id", DbType::Integer, false)]);
        let after = table(vec![
            column("id", DbType::Integer, false),
            column("notes", DbType::Varchar, true),
        ]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot, after]));

        let spec = ColumnSpec {
            name: "notes".to_string(),
            type_name: "hyperloglog".to_string(),
            type_options: TypeOptions::default(),
            nullable: true,
        };
        engine.add_column(TABLE_OID, &spec).await.unwrap();

        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" ADD COLUMN \"notes\" varchar"
        );
    }

    #[tokio::test]
    async fn test_drop_column() {
        let snapshot = table(vec![
            column("id", DbType::Integer, false),
            column("legacy", DbType::Text, true),
        ]);
        let (engine, backend) = engine_with(MockBackend::new(vec![snapshot]));

        engine.drop_column(TABLE_OID, 1).await.unwrap();

        assert_eq!(
            backend.executed()[0][0],
            "ALTER TABLE \"public\".\"accounts\" DROP COLUMN \"legacy\""
        );
    }

    // =========================================================================
    // Duplicate
    // =========================================================================

    fn email_table() -> Table {
        table(vec![
            column("id", DbType::Integer, false),
            column("email", DbType::Email, false),
            column("email_1", DbType::Email, true),
        ])
    }

    fn email_table_with_copy() -> Table {
        table(vec![
            column("id", DbType::Integer, false),
            column("email", DbType::Email, false),
            column("email_1", DbType::Email, true),
            column("email_2", DbType::Email, true),
        ])
    }

    #[test]
    fn test_generate_copy_name_skips_taken_suffixes() {
        assert_eq!(generate_copy_name(&email_table(), "email"), "email_2");
        assert_eq!(generate_copy_name(&email_table(), "id"), "id_1");
    }

    #[tokio::test]
    async fn test_duplicate_generates_name_and_copies_data() {
        let (engine, backend) = engine_with(MockBackend::new(vec![
            email_table(),
            email_table_with_copy(),
        ]));

        let copy = engine
            .duplicate_column(TABLE_OID, 1, None, true, false)
            .await
            .unwrap();

        assert_eq!(copy.name, "email_2");
        assert_eq!(copy.ordinal_pos, 3);

        let executed = backend.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(
            executed[0][0],
            "ALTER TABLE \"public\".\"accounts\" ADD COLUMN \"email_2\" typeshift_types.email"
        );
        assert_eq!(
            executed[1][0],
            "UPDATE \"public\".\"accounts\" SET \"email_2\" = \"email\""
        );
        // the source is NOT NULL and data was copied, so nullability follows
        assert_eq!(
            executed[1][1],
            "ALTER TABLE \"public\".\"accounts\" ALTER COLUMN \"email_2\" SET NOT NULL"
        );
    }

    #[tokio::test]
    async fn test_duplicate_without_data_copy_leaves_column_nullable() {
        let (engine, backend) = engine_with(MockBackend::new(vec![
            email_table(),
            email_table_with_copy(),
        ]));

        engine
            .duplicate_column(TABLE_OID, 1, None, false, false)
            .await
            .unwrap();

        let executed = backend.executed();
        // only the ADD COLUMN transaction; no update, no SET NOT NULL
        assert_eq!(executed.len(), 1);
        assert!(executed[0][0].contains("ADD COLUMN \"email_2\""));
    }

    #[tokio::test]
    async fn test_duplicate_never_copies_uniqueness_constraints() {
        let backend = MockBackend::new(vec![email_table(), email_table_with_copy()])
            .with_constraints(vec![
                ColumnConstraint {
                    name: "accounts_email_key".to_string(),
                    kind: ConstraintKind::Unique,
                    definition: "UNIQUE (email)".to_string(),
                },
                ColumnConstraint {
                    name: "accounts_pkey".to_string(),
                    kind: ConstraintKind::PrimaryKey,
                    definition: "PRIMARY KEY (email)".to_string(),
                },
                ColumnConstraint {
                    name: "email_not_empty".to_string(),
                    kind: ConstraintKind::Check,
                    definition: "CHECK ((email <> ''::text))".to_string(),
                },
            ]);
        let (engine, backend) = engine_with(backend);

        engine
            .duplicate_column(TABLE_OID, 1, None, false, true)
            .await
            .unwrap();

        let executed = backend.executed();
        assert_eq!(executed.len(), 2);
        let followup = &executed[1];
        assert_eq!(followup.len(), 1);
        assert_eq!(
            followup[0],
            "ALTER TABLE \"public\".\"accounts\" ADD CONSTRAINT \"email_not_empty_email_2\" \
             CHECK ((\"email_2\" <> ''::text))"
        );
    }

    #[tokio::test]
    async fn test_duplicate_with_explicit_name() {
        let (engine, backend) = engine_with(MockBackend::new(vec![
            email_table(),
            {
                let mut t = email_table();
                t.columns.push(column("backup_email", DbType::Email, true));
                t
            },
        ]));

        let copy = engine
            .duplicate_column(TABLE_OID, 1, Some("backup_email".to_string()), false, false)
            .await
            .unwrap();

        assert_eq!(copy.name, "backup_email");
        assert!(backend.executed()[0][0].contains("ADD COLUMN \"backup_email\""));
    }

    // =========================================================================
    // Constraint definition rewriting
    // =========================================================================

    #[test]
    fn test_rewrite_bare_identifier() {
        assert_eq!(
            rewrite_constraint_definition("CHECK ((email <> ''))", "email", "email_2"),
            "CHECK ((\"email_2\" <> ''))"
        );
    }

    #[test]
    fn test_rewrite_quoted_identifier() {
        assert_eq!(
            rewrite_constraint_definition("CHECK ((\"email\" <> ''))", "email", "email_2"),
            "CHECK ((\"email_2\" <> ''))"
        );
    }

    #[test]
    fn test_rewrite_leaves_string_literals_alone() {
        assert_eq!(
            rewrite_constraint_definition(
                "CHECK ((status <> 'email'::text))",
                "email",
                "email_2"
            ),
            "CHECK ((status <> 'email'::text))"
        );
    }

    #[test]
    fn test_rewrite_respects_identifier_boundaries() {
        assert_eq!(
            rewrite_constraint_definition(
                "CHECK ((email_domain <> email))",
                "email",
                "email_2"
            ),
            "CHECK ((email_domain <> \"email_2\"))"
        );
    }
}
