//! Error types for the cast and alteration engine.

use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Main error type for cast installation and column alteration.
#[derive(Error, Debug)]
pub enum TypeshiftError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or statement error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Requested type string does not resolve in the type catalog
    #[error("Type '{0}' is not supported")]
    UnsupportedType(String),

    /// An installed conversion routine rejected a value
    /// (not a boolean, not a uri, cannot cast without loss, is a numeric)
    #[error("Cast rejected: {0}")]
    CastRejected(String),

    /// Engine-reported constraint violation (NOT NULL, CHECK, UNIQUE)
    #[error("Constraint violated: {0}")]
    ConstraintViolated(String),

    /// The exactly-one-attribute changeset contract was violated
    #[error("Malformed changeset: {0}")]
    MalformedChangeset(String),

    /// Ordinal index did not resolve against a fresh reflection
    #[error("Table {table} has no column at index {index}")]
    ColumnOutOfRange { table: String, index: usize },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TypeshiftError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        TypeshiftError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a ColumnOutOfRange error
    pub fn column_out_of_range(table: impl Into<String>, index: usize) -> Self {
        TypeshiftError::ColumnOutOfRange {
            table: table.into(),
            index,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Classify a statement error by SQLSTATE.
///
/// Conversion routines signal rejection with RAISE EXCEPTION (P0001); the
/// engine reports NOT NULL / CHECK / UNIQUE violations with their own codes.
/// Everything else stays a plain database error.
pub fn classify_db_error(err: tokio_postgres::Error) -> TypeshiftError {
    if let Some(db_err) = err.as_db_error() {
        let code = db_err.code();
        let message = db_err.message().to_string();
        if *code == SqlState::RAISE_EXCEPTION {
            return TypeshiftError::CastRejected(message);
        }
        if *code == SqlState::NOT_NULL_VIOLATION
            || *code == SqlState::CHECK_VIOLATION
            || *code == SqlState::UNIQUE_VIOLATION
        {
            return TypeshiftError::ConstraintViolated(message);
        }
    }
    TypeshiftError::Database(err)
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, TypeshiftError>;
