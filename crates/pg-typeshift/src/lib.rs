//! # pg-typeshift
//!
//! PostgreSQL type-cast graph and column alteration engine.
//!
//! This library sits between an application and PostgreSQL and solves two
//! coupled problems:
//!
//! - **Safe column alteration**: change a populated column's name, type,
//!   nullability or existence without losing or corrupting data, one
//!   transaction per operation.
//! - **A reviewed cast graph**: every supported source/target type pair gets
//!   its own installed PL/pgSQL conversion routine with explicit semantics,
//!   including ones PostgreSQL does not natively provide (strict text to
//!   boolean, rejection of lossy numeric narrowing, TLD-validated URIs). The
//!   graph is deliberately not transitively closed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_typeshift::{AlterEngine, AlterRequest, ConnectionConfig, TypeOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::load("config.yaml")?;
//!     let engine = AlterEngine::connect(&config)?;
//!
//!     // install custom types and every cast function (idempotent)
//!     engine.install().await?;
//!
//!     // retype column 2 of a table to numeric(10, 2); existing values are
//!     // cast through the installed conversion routine, and the change rolls
//!     // back if any value is rejected
//!     let request = AlterRequest {
//!         new_type: Some("numeric".to_string()),
//!         type_options: Some(TypeOptions::precision_scale(10, 2)),
//!         ..Default::default()
//!     };
//!     let column = engine.alter_column(16384, 2, request).await?;
//!     println!("column {} is now {}", column.name, column.compiled_type());
//!     Ok(())
//! }
//! ```

pub mod alter;
pub mod backend;
pub mod cast;
pub mod config;
pub mod error;
pub mod ident;
pub mod schema;
pub mod types;

// Re-exports for convenient access
pub use alter::{AlterEngine, AlterRequest, ColumnChange, ColumnSpec};
pub use backend::{PgBackend, SchemaBackend};
pub use cast::{cast_expression, full_cast_map, install_all_casts, valid_target_types};
pub use config::ConnectionConfig;
pub use error::{Result, TypeshiftError};
pub use schema::{Column, ColumnConstraint, ConstraintKind, Table};
pub use types::{DbType, TypeOptions};
