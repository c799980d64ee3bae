//! Turns registry entries into installed, overloaded server-side functions.
//!
//! Each (source, target) pair becomes one `CREATE OR REPLACE FUNCTION`
//! statement, executed in its own transaction. Installation is idempotent:
//! re-running replaces functions in place. A failure aborts the remainder of
//! the batch but leaves previously installed functions installed; there is no
//! cross-function rollback.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::backend::SchemaBackend;
use crate::cast::bodies::{body_map_for_target, TypeBodyMap};
use crate::error::Result;
use crate::types::{cast_function_name, DbType, TYPE_SCHEMA};

/// Assemble the creation statement for one cast function overload.
pub fn assemble_cast_function(source: DbType, target: DbType, body: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {schema}.{name}({argument})\nRETURNS {returns}\nAS $$\n{body}\n$$ LANGUAGE plpgsql;",
        schema = TYPE_SCHEMA,
        name = cast_function_name(target.canonical()),
        argument = source.canonical(),
        returns = target.canonical(),
        body = body,
    )
}

/// Install every overload of one target's cast function.
pub async fn install_cast_functions(
    target: DbType,
    type_body_map: &TypeBodyMap,
    backend: &dyn SchemaBackend,
) -> Result<()> {
    for (source, body) in type_body_map {
        debug!(
            "installing cast function overload {} -> {}",
            source.canonical(),
            target.canonical()
        );
        let sql = assemble_cast_function(*source, target, body);
        backend.execute_in_transaction(&[sql]).await?;
    }
    Ok(())
}

/// The installation sequence. Order is irrelevant to correctness (no body
/// calls another cast function); this keeps re-runs deterministic.
pub fn cast_targets(available: &BTreeSet<DbType>) -> Vec<DbType> {
    let sequence = [
        DbType::Boolean,
        DbType::Date,
        DbType::Decimal,
        DbType::DoublePrecision,
        DbType::Float,
        DbType::Numeric,
        DbType::Real,
        DbType::Email,
        DbType::BigInt,
        DbType::Integer,
        DbType::SmallInt,
        DbType::Interval,
        DbType::TimeWithoutTimeZone,
        DbType::TimeWithTimeZone,
        DbType::Money,
        DbType::Char,
        DbType::Text,
        DbType::Varchar,
        DbType::Uri,
    ];
    sequence
        .into_iter()
        .filter(|target| available.contains(target))
        .collect()
}

/// Install the cast functions for every target type the deployment supports.
pub async fn install_all_casts(backend: &dyn SchemaBackend) -> Result<()> {
    let available = backend.available_types().await?;
    for target in cast_targets(&available) {
        let Some(type_body_map) = body_map_for_target(target, &available) else {
            continue;
        };
        info!(
            "installing {} cast function overloads for target {}",
            type_body_map.len(),
            target.canonical()
        );
        install_cast_functions(target, &type_body_map, backend).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::catalog::{all_types, native_types};

    #[test]
    fn test_assemble_cast_function_shape() {
        let sql = assemble_cast_function(
            DbType::Text,
            DbType::Boolean,
            "BEGIN\n  RETURN $1::boolean;\nEND;",
        );
        assert!(sql.starts_with(
            "CREATE OR REPLACE FUNCTION typeshift_types.cast_to_boolean(text)"
        ));
        assert!(sql.contains("RETURNS boolean"));
        assert!(sql.contains("$$ LANGUAGE plpgsql;"));
    }

    #[test]
    fn test_assemble_multiword_types() {
        let sql = assemble_cast_function(
            DbType::Varchar,
            DbType::DoublePrecision,
            "BEGIN\n  RETURN $1::double precision;\nEND;",
        );
        assert!(sql.contains("typeshift_types.cast_to_double_precision(varchar)"));
        assert!(sql.contains("RETURNS double precision"));
    }

    #[test]
    fn test_assemble_custom_target_uses_qualified_return() {
        let sql = assemble_cast_function(DbType::Text, DbType::Email, "body");
        assert!(sql.contains("typeshift_types.cast_to_email(text)"));
        assert!(sql.contains("RETURNS typeshift_types.email"));
    }

    #[test]
    fn test_cast_targets_cover_all_but_name() {
        let targets = cast_targets(&all_types());
        assert!(!targets.contains(&DbType::Name));
        assert_eq!(targets.len(), DbType::ALL.len() - 1);
    }

    #[test]
    fn test_cast_targets_respect_availability() {
        let targets = cast_targets(&native_types());
        assert!(!targets.contains(&DbType::Email));
        assert!(!targets.contains(&DbType::Money));
        assert!(!targets.contains(&DbType::Uri));
        assert!(targets.contains(&DbType::Boolean));
    }
}
