//! Identifier validation and quoting.
//!
//! SQL identifiers (table, column and schema names) cannot be passed as
//! parameters in prepared statements, only data values can. Every piece of
//! dynamic DDL this crate assembles goes through these functions:
//! identifiers are validated for suspicious patterns, then quoted with
//! PostgreSQL double-quote rules.

use crate::error::{Result, TypeshiftError};

/// PostgreSQL truncates identifiers at 63 bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier before it is interpolated into DDL.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the PostgreSQL length limit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TypeshiftError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(TypeshiftError::Config(format!(
            "Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TypeshiftError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema, quoting both parts.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}
