//! PostgreSQL backend over a deadpool-postgres connection pool.

use std::collections::BTreeSet;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::debug;

use crate::backend::SchemaBackend;
use crate::config::ConnectionConfig;
use crate::error::{classify_db_error, Result, TypeshiftError};
use crate::schema::{Column, ColumnConstraint, ConstraintKind, Table};
use crate::types::{catalog, DbType, TypeOptions, TYPE_SCHEMA};

/// Live PostgreSQL implementation of the collaborator contracts.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Build a pool from configuration and wrap it.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| TypeshiftError::pool(e.to_string(), "building connection pool"))?;

        Ok(PgBackend { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        PgBackend { pool }
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| TypeshiftError::pool(e.to_string(), "acquiring connection"))
    }
}

#[async_trait]
impl SchemaBackend for PgBackend {
    async fn table_by_oid(&self, oid: u32) -> Result<Table> {
        let conn = self.get_conn().await?;

        let table_row = conn
            .query_one(
                "SELECT c.relname, n.nspname
                 FROM pg_class c
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE c.oid = $1",
                &[&oid],
            )
            .await?;
        let name: String = table_row.get(0);
        let schema: String = table_row.get(1);

        let column_rows = conn
            .query(
                "SELECT a.attname,
                        format_type(a.atttypid, a.atttypmod) AS data_type,
                        a.attnotnull,
                        COALESCE(pk.is_primary, false) AS is_primary
                 FROM pg_attribute a
                 LEFT JOIN (
                     SELECT unnest(conkey) AS attnum, true AS is_primary
                     FROM pg_constraint
                     WHERE conrelid = $1 AND contype = 'p'
                 ) pk ON pk.attnum = a.attnum
                 WHERE a.attrelid = $1 AND a.attnum > 0 AND NOT a.attisdropped
                 ORDER BY a.attnum",
                &[&oid],
            )
            .await?;

        let fk_rows = conn
            .query(
                "SELECT a.attname, rn.nspname || '.' || rc.relname AS ref_table
                 FROM pg_constraint con
                 JOIN pg_class rc ON rc.oid = con.confrelid
                 JOIN pg_namespace rn ON rn.oid = rc.relnamespace
                 JOIN pg_attribute a
                   ON a.attrelid = con.conrelid AND a.attnum = ANY (con.conkey)
                 WHERE con.conrelid = $1 AND con.contype = 'f'",
                &[&oid],
            )
            .await?;

        let mut columns = Vec::with_capacity(column_rows.len());
        for (index, row) in column_rows.iter().enumerate() {
            let column_name: String = row.get(0);
            let reported_type: String = row.get(1);
            let not_null: bool = row.get(2);
            let is_primary: bool = row.get(3);

            let (base_name, type_options) = parse_type_name(&reported_type);
            let foreign_keys = fk_rows
                .iter()
                .filter(|fk| fk.get::<_, String>(0) == column_name)
                .map(|fk| fk.get::<_, String>(1))
                .collect();

            columns.push(Column {
                name: column_name,
                data_type: DbType::lookup(&base_name),
                type_name: base_name,
                type_options,
                is_nullable: !not_null,
                is_primary_key: is_primary,
                foreign_keys,
                ordinal_pos: index,
                table_oid: Some(oid),
            });
        }

        Ok(Table {
            oid,
            schema,
            name,
            columns,
        })
    }

    async fn available_types(&self) -> Result<BTreeSet<DbType>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT t.typname
                 FROM pg_type t
                 JOIN pg_namespace n ON n.oid = t.typnamespace
                 WHERE n.nspname = $1 AND t.typtype IN ('d', 'c')",
                &[&TYPE_SCHEMA],
            )
            .await?;

        let mut available = catalog::native_types();
        for row in rows {
            match row.get::<_, String>(0).as_str() {
                "email" => {
                    available.insert(DbType::Email);
                }
                "money" => {
                    available.insert(DbType::Money);
                }
                "uri" => {
                    available.insert(DbType::Uri);
                }
                _ => {}
            }
        }
        Ok(available)
    }

    async fn constraints_on_column(
        &self,
        table_oid: u32,
        column: &str,
    ) -> Result<Vec<ColumnConstraint>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT con.conname,
                        con.contype::text,
                        pg_get_constraintdef(con.oid) AS definition
                 FROM pg_constraint con
                 WHERE con.conrelid = $1
                   AND EXISTS (
                       SELECT 1 FROM pg_attribute a
                       WHERE a.attrelid = con.conrelid
                         AND a.attname = $2
                         AND a.attnum = ANY (con.conkey)
                   )",
                &[&table_oid, &column],
            )
            .await?;

        let mut constraints = Vec::new();
        for row in rows {
            let code: String = row.get(1);
            let Some(kind) = code.chars().next().and_then(ConstraintKind::from_catalog_code)
            else {
                continue;
            };
            constraints.push(ColumnConstraint {
                name: row.get(0),
                kind,
                definition: row.get(2),
            });
        }
        Ok(constraints)
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await?;
        for statement in statements {
            debug!("executing: {}", statement);
            tx.batch_execute(statement).await.map_err(classify_db_error)?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Split a catalog-reported type name into its base name and parameters,
/// e.g. `character varying(255)` into `character varying` + length 255,
/// `numeric(10,2)` into `numeric` + precision/scale.
pub(crate) fn parse_type_name(reported: &str) -> (String, TypeOptions) {
    let Some(open) = reported.find('(') else {
        return (reported.trim().to_string(), TypeOptions::default());
    };
    let Some(close) = reported.rfind(')').filter(|close| *close > open) else {
        return (reported.trim().to_string(), TypeOptions::default());
    };

    let mut base = reported[..open].trim().to_string();
    let trailing = reported[close + 1..].trim();
    if !trailing.is_empty() {
        base.push(' ');
        base.push_str(trailing);
    }

    let args: Vec<u32> = reported[open + 1..close]
        .split(',')
        .filter_map(|arg| arg.trim().parse().ok())
        .collect();

    let options = match DbType::lookup(&base) {
        Some(DbType::Numeric) | Some(DbType::Decimal) => match args.as_slice() {
            [precision] => TypeOptions {
                precision: Some(*precision),
                ..Default::default()
            },
            [precision, scale] => TypeOptions::precision_scale(*precision, *scale),
            _ => TypeOptions::default(),
        },
        Some(DbType::Char) | Some(DbType::Varchar) => match args.as_slice() {
            [length] => TypeOptions::with_length(*length),
            _ => TypeOptions::default(),
        },
        _ => TypeOptions::default(),
    };

    (base, options)
}
