//! DDL for the custom types the engine installs.
//!
//! Each custom type is native storage plus validation: email is a domain over
//! text with a format check, money is a composite of amount and currency
//! code, uri is a domain over text checked by scheme/authority extraction
//! helpers. The uri cast additionally consults a table of known top-level
//! domains, seeded here.
//!
//! All statements are idempotent: domains and composite types are created
//! inside a DO block that swallows duplicate_object, helpers use CREATE OR
//! REPLACE, the TLD table uses IF NOT EXISTS / ON CONFLICT DO NOTHING.

use crate::backend::SchemaBackend;
use crate::error::Result;
use crate::types::TYPE_SCHEMA;

/// Table of known top-level domains consulted by the uri cast.
pub const TLD_TABLE: &str = "typeshift_types.top_level_domains";

/// Seed list for the TLD table.
const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "info", "biz", "name", "pro", "app", "dev",
    "io", "ai", "co", "me", "tv", "cc", "xyz", "online", "site", "store", "tech", "cloud", "ac",
    "ad", "ae", "ar", "at", "au", "be", "br", "ca", "ch", "cn", "cz", "de", "dk", "es", "eu",
    "fi", "fr", "gr", "hk", "hu", "ie", "il", "in", "it", "jp", "kr", "mx", "nl", "no", "nz",
    "pl", "pt", "ru", "se", "sg", "tr", "tw", "ua", "uk", "us", "za",
];

/// Statement creating the schema that holds types, helpers and cast
/// functions.
pub fn schema_ddl() -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", TYPE_SCHEMA)
}

/// DDL for the email domain.
pub fn email_ddl() -> Vec<String> {
    vec![format!(
        r#"DO $d$ BEGIN
  CREATE DOMAIN {schema}.email AS text
    CHECK (value ~ '^[a-zA-Z0-9.!#$%&''*+/=?^_`{{|}}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{{0,61}}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{{0,61}}[a-zA-Z0-9])?)*$');
EXCEPTION WHEN duplicate_object THEN NULL;
END $d$;"#,
        schema = TYPE_SCHEMA
    )]
}

/// DDL for the money composite type: an amount and a 3-letter currency code.
pub fn money_ddl() -> Vec<String> {
    vec![format!(
        r#"DO $d$ BEGIN
  CREATE TYPE {schema}.money AS (value numeric, currency char(3));
EXCEPTION WHEN duplicate_object THEN NULL;
END $d$;"#,
        schema = TYPE_SCHEMA
    )]
}

/// DDL for the uri domain, its component-extraction helpers, and the TLD
/// table with its seed rows. Helpers come first since the domain check calls
/// them.
pub fn uri_ddl() -> Vec<String> {
    let mut statements = vec![
        format!(
            r#"CREATE OR REPLACE FUNCTION {schema}.uri_scheme(text) RETURNS text AS $f$
  SELECT (regexp_match($1, '^([^:/?#]+):'))[1]
$f$ LANGUAGE sql IMMUTABLE RETURNS NULL ON NULL INPUT;"#,
            schema = TYPE_SCHEMA
        ),
        format!(
            r#"CREATE OR REPLACE FUNCTION {schema}.uri_authority(text) RETURNS text AS $f$
  SELECT (regexp_match($1, '^(?:[^:/?#]+:)?//([^/?#]*)'))[1]
$f$ LANGUAGE sql IMMUTABLE RETURNS NULL ON NULL INPUT;"#,
            schema = TYPE_SCHEMA
        ),
        format!(
            r#"DO $d$ BEGIN
  CREATE DOMAIN {schema}.uri AS text CHECK (
    value IS NULL
    OR ({schema}.uri_scheme(value) IS NOT NULL
        AND {schema}.uri_authority(value) IS NOT NULL)
  );
EXCEPTION WHEN duplicate_object THEN NULL;
END $d$;"#,
            schema = TYPE_SCHEMA
        ),
        format!("CREATE TABLE IF NOT EXISTS {} (tld text PRIMARY KEY)", TLD_TABLE),
    ];

    let values = KNOWN_TLDS
        .iter()
        .map(|tld| format!("('{}')", tld))
        .collect::<Vec<_>>()
        .join(", ");
    statements.push(format!(
        "INSERT INTO {} (tld) VALUES {} ON CONFLICT (tld) DO NOTHING",
        TLD_TABLE, values
    ));

    statements
}

/// Install the type schema and all three custom types.
///
/// Each type's statements run in one transaction; a failure in one type does
/// not roll back types already installed.
pub async fn install_custom_types(backend: &dyn SchemaBackend) -> Result<()> {
    backend
        .execute_in_transaction(&[schema_ddl()])
        .await?;
    for ddl in [email_ddl(), money_ddl(), uri_ddl()] {
        backend.execute_in_transaction(&ddl).await?;
    }
    Ok(())
}
