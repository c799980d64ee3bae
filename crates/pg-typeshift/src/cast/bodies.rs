//! The cast body registry: for each target type, the PL/pgSQL routine body
//! converting each admissible source type.
//!
//! This is pure data, parameterized only by which types the deployment
//! reports as available. The set of (source, target) pairs defined here IS
//! the cast graph: it is deliberately not transitively closed, because every
//! supported conversion carries its own reviewed semantics.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    compiled, DbType, TypeOptions, DECIMAL_TYPES, INTEGER_TYPES, NUMBER_TYPES, TEXT_TYPES,
};

/// Mapping from source type to conversion-routine body, for one fixed target.
pub type TypeBodyMap = BTreeMap<DbType, String>;

/// The body map for a target type, or `None` for types that are never cast
/// targets (the catalog `name` type).
pub fn body_map_for_target(target: DbType, available: &BTreeSet<DbType>) -> Option<TypeBodyMap> {
    match target {
        DbType::Boolean => Some(boolean_body_map()),
        DbType::SmallInt | DbType::Integer | DbType::BigInt => Some(integer_body_map(target)),
        DbType::Decimal
        | DbType::DoublePrecision
        | DbType::Float
        | DbType::Numeric
        | DbType::Real => Some(decimal_number_body_map(target)),
        DbType::Date => Some(date_body_map()),
        DbType::TimeWithoutTimeZone | DbType::TimeWithTimeZone => Some(time_body_map(target)),
        DbType::Interval => Some(interval_body_map()),
        DbType::Email => Some(email_body_map()),
        DbType::Money => Some(money_body_map()),
        DbType::Uri => Some(uri_body_map()),
        DbType::Char | DbType::Text | DbType::Varchar => Some(textual_body_map(available)),
        DbType::Name => None,
    }
}

/// The unconditional native cast. It exists as a named, overloadable function
/// purely so that resolution and callers can treat every pair uniformly.
fn default_cast_body(target: DbType) -> String {
    format!(
        "BEGIN\n  RETURN $1::{};\nEND;",
        compiled(target, &TypeOptions::default())
    )
}

fn default_body_map(sources: &[DbType], target: DbType) -> TypeBodyMap {
    sources
        .iter()
        .map(|source| (*source, default_cast_body(target)))
        .collect()
}

/// boolean <- boolean: identity.
/// boolean <- textual: only t/true/1 and f/false/0 (word forms
/// case-insensitive), anything else raises.
/// boolean <- numeric: only 0 and 1, anything else raises. This is stricter
/// than the engine's native behavior.
pub fn boolean_body_map() -> TypeBodyMap {
    let not_boolean = "RAISE EXCEPTION '% is not a boolean', $1;";

    let number_body = format!(
        "BEGIN\n  IF $1<>0 AND $1<>1 THEN\n    {}\n  END IF;\n  RETURN $1<>0;\nEND;",
        not_boolean
    );

    let text_body = format!(
        "DECLARE\nistrue boolean;\nBEGIN\n  SELECT lower($1)='t' OR lower($1)='true' OR $1='1' INTO istrue;\n  IF istrue OR lower($1)='f' OR lower($1)='false' OR $1='0' THEN\n    RETURN istrue;\n  END IF;\n  {}\nEND;",
        not_boolean
    );

    let mut map = default_body_map(&[DbType::Boolean], DbType::Boolean);
    map.extend(
        NUMBER_TYPES
            .iter()
            .map(|source| (*source, number_body.clone())),
    );
    map.extend(TEXT_TYPES.iter().map(|source| (*source, text_body.clone())));
    map
}

/// Integer targets use the native cast from integer and textual sources, a
/// cast-then-compare guard from the decimal family (any fractional part or
/// overflow raises instead of rounding), and 1/0 from boolean.
pub fn integer_body_map(target: DbType) -> TypeBodyMap {
    debug_assert!(INTEGER_TYPES.contains(&target));
    let target_name = target.canonical();

    let no_rounding_body = format!(
        "DECLARE integer_res {target};\nBEGIN\n  SELECT $1::{target} INTO integer_res;\n  IF integer_res = $1 THEN\n    RETURN integer_res;\n  END IF;\n  RAISE EXCEPTION '% cannot be cast to {target} without loss', $1;\nEND;",
        target = target_name
    );

    let mut map = default_body_map(INTEGER_TYPES, target);
    map.extend(default_body_map(TEXT_TYPES, target));
    map.extend(
        DECIMAL_TYPES
            .iter()
            .map(|source| (*source, no_rounding_body.clone())),
    );
    map.insert(DbType::Boolean, boolean_to_number_body(target));
    map
}

/// Decimal/floating targets use the native cast from all numeric and textual
/// sources; the only special source is boolean (true -> 1, false -> 0).
pub fn decimal_number_body_map(target: DbType) -> TypeBodyMap {
    debug_assert!(DECIMAL_TYPES.contains(&target));
    let mut map = default_body_map(NUMBER_TYPES, target);
    map.extend(default_body_map(TEXT_TYPES, target));
    map.insert(DbType::Boolean, boolean_to_number_body(target));
    map
}

fn boolean_to_number_body(target: DbType) -> String {
    format!(
        "BEGIN\n  IF $1 THEN\n    RETURN 1::{target};\n  END IF;\n  RETURN 0::{target};\nEND;",
        target = target.canonical()
    )
}

/// interval <- interval: identity.
/// interval <- textual: a string that parses as a number is rejected (the
/// numeric reading is assumed intended); only when the numeric parse fails
/// with invalid_text_representation (22P02) is the string parsed as an
/// interval.
pub fn interval_body_map() -> TypeBodyMap {
    let text_body = "BEGIN\n  PERFORM $1::numeric;\n  RAISE EXCEPTION '% is a numeric', $1;\n  EXCEPTION\n    WHEN sqlstate '22P02' THEN\n      RETURN $1::interval;\nEND;"
        .to_string();

    let mut map = default_body_map(&[DbType::Interval], DbType::Interval);
    map.extend(TEXT_TYPES.iter().map(|source| (*source, text_body.clone())));
    map
}

/// Dates use the native cast from date and textual sources. Text parsing
/// follows the server's DateStyle setting (DMY/MDY/YMD), an externally
/// configured ambiguity this registry does not resolve.
pub fn date_body_map() -> TypeBodyMap {
    let mut map = default_body_map(&[DbType::Date], DbType::Date);
    map.extend(default_body_map(TEXT_TYPES, DbType::Date));
    map
}

/// Time targets use the native cast from text, varchar and both time types.
pub fn time_body_map(target: DbType) -> TypeBodyMap {
    debug_assert!(matches!(
        target,
        DbType::TimeWithoutTimeZone | DbType::TimeWithTimeZone
    ));
    default_body_map(
        &[
            DbType::Text,
            DbType::Varchar,
            DbType::TimeWithoutTimeZone,
            DbType::TimeWithTimeZone,
        ],
        target,
    )
}

/// email <- email: identity. email <- textual: native cast; the domain's own
/// check constraint does the validation, not the cast body.
pub fn email_body_map() -> TypeBodyMap {
    let mut map = default_body_map(&[DbType::Email], DbType::Email);
    map.extend(default_body_map(TEXT_TYPES, DbType::Email));
    map
}

/// Numbers become money as (amount, 'USD'); textual sources cast through
/// numeric first. The currency code is fixed.
pub fn money_body_map() -> TypeBodyMap {
    let number_body =
        "BEGIN\n  RETURN ROW($1, 'USD')::typeshift_types.money;\nEND;".to_string();
    let text_body =
        "BEGIN\n  RETURN ROW($1::numeric, 'USD')::typeshift_types.money;\nEND;".to_string();

    let mut map = default_body_map(&[DbType::Money], DbType::Money);
    map.extend(
        NUMBER_TYPES
            .iter()
            .map(|source| (*source, number_body.clone())),
    );
    map.extend(TEXT_TYPES.iter().map(|source| (*source, text_body.clone())));
    map
}

/// The uri cast tries the identity cast first; on a domain check violation
/// (23514) it retries with an http:// prefix, lower-cases, extracts the
/// authority, takes the trailing segment after the last dot, and accepts only
/// if that suffix is a known top-level domain.
pub fn uri_body_map() -> TypeBodyMap {
    let body = r#"DECLARE uri_res typeshift_types.uri := 'https://example.com';
DECLARE uri_tld text;
BEGIN
  RETURN $1::typeshift_types.uri;
  EXCEPTION WHEN SQLSTATE '23514' THEN
      SELECT lower(('http://' || $1)::typeshift_types.uri) INTO uri_res;
      SELECT (regexp_match(typeshift_types.uri_authority(uri_res), '(?<=\.)(?:.(?!\.))+$'))[1]
        INTO uri_tld;
      IF EXISTS(SELECT 1 FROM typeshift_types.top_level_domains WHERE tld = uri_tld) THEN
        RETURN uri_res;
      END IF;
  RAISE EXCEPTION '% is not a uri', $1;
END;"#
        .to_string();

    let mut sources: Vec<DbType> = vec![DbType::Uri];
    sources.extend_from_slice(TEXT_TYPES);
    sources.into_iter().map(|source| (source, body.clone())).collect()
}

/// Textual targets accept every type the deployment supports, all with the
/// same body: cast through text and let the function's declared return type
/// narrow the result.
pub fn textual_body_map(available: &BTreeSet<DbType>) -> TypeBodyMap {
    let body = "BEGIN\n  RETURN $1::text;\nEND;".to_string();
    available
        .iter()
        .map(|source| (*source, body.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::catalog::all_types;

    #[test]
    fn test_boolean_sources() {
        let map = boolean_body_map();
        assert!(map.contains_key(&DbType::Boolean));
        for source in NUMBER_TYPES {
            assert!(map.contains_key(source), "missing {}", source);
        }
        for source in TEXT_TYPES {
            assert!(map.contains_key(source), "missing {}", source);
        }
        // no date/interval edge into boolean
        assert!(!map.contains_key(&DbType::Date));
        assert!(!map.contains_key(&DbType::Interval));
    }

    #[test]
    fn test_boolean_text_body_accept_set() {
        let map = boolean_body_map();
        let body = map.get(&DbType::Varchar).unwrap();
        assert!(body.contains("lower($1)='t'"));
        assert!(body.contains("lower($1)='true'"));
        assert!(body.contains("$1='1'"));
        assert!(body.contains("lower($1)='f'"));
        assert!(body.contains("lower($1)='false'"));
        assert!(body.contains("$1='0'"));
        assert!(body.contains("RAISE EXCEPTION '% is not a boolean'"));
    }

    #[test]
    fn test_boolean_number_body_rejects_non_binary() {
        let map = boolean_body_map();
        let body = map.get(&DbType::Numeric).unwrap();
        assert!(body.contains("IF $1<>0 AND $1<>1 THEN"));
        assert!(body.contains("RETURN $1<>0;"));
    }

    #[test]
    fn test_boolean_identity_is_default() {
        let map = boolean_body_map();
        assert_eq!(
            map.get(&DbType::Boolean).unwrap(),
            "BEGIN\n  RETURN $1::boolean;\nEND;"
        );
    }

    #[test]
    fn test_integer_from_decimal_guards_loss() {
        for target in INTEGER_TYPES {
            let map = integer_body_map(*target);
            for source in DECIMAL_TYPES {
                let body = map.get(source).unwrap();
                assert!(body.contains("IF integer_res = $1 THEN"));
                assert!(body.contains(&format!(
                    "cannot be cast to {} without loss",
                    target.canonical()
                )));
            }
        }
    }

    #[test]
    fn test_integer_from_text_is_default() {
        let map = integer_body_map(DbType::Integer);
        assert_eq!(
            map.get(&DbType::Text).unwrap(),
            "BEGIN\n  RETURN $1::integer;\nEND;"
        );
    }

    #[test]
    fn test_integer_from_boolean_is_one_zero() {
        let map = integer_body_map(DbType::BigInt);
        let body = map.get(&DbType::Boolean).unwrap();
        assert!(body.contains("RETURN 1::bigint;"));
        assert!(body.contains("RETURN 0::bigint;"));
    }

    #[test]
    fn test_decimal_targets_take_all_numbers_and_boolean() {
        for target in DECIMAL_TYPES {
            let map = decimal_number_body_map(*target);
            for source in NUMBER_TYPES {
                assert!(map.contains_key(source));
            }
            assert!(map.contains_key(&DbType::Boolean));
            // no loss guard on widening casts
            assert!(!map.get(&DbType::Integer).unwrap().contains("without loss"));
        }
    }

    #[test]
    fn test_interval_text_guard_rejects_numbers_first() {
        let map = interval_body_map();
        let body = map.get(&DbType::Text).unwrap();
        let perform = body.find("PERFORM $1::numeric").unwrap();
        let raise = body.find("RAISE EXCEPTION '% is a numeric'").unwrap();
        let fallback = body.find("RETURN $1::interval").unwrap();
        assert!(perform < raise && raise < fallback);
        assert!(body.contains("WHEN sqlstate '22P02'"));
    }

    #[test]
    fn test_interval_identity() {
        let map = interval_body_map();
        assert_eq!(
            map.get(&DbType::Interval).unwrap(),
            "BEGIN\n  RETURN $1::interval;\nEND;"
        );
    }

    #[test]
    fn test_time_sources_exclude_char() {
        let map = time_body_map(DbType::TimeWithTimeZone);
        assert!(map.contains_key(&DbType::Text));
        assert!(map.contains_key(&DbType::Varchar));
        assert!(map.contains_key(&DbType::TimeWithoutTimeZone));
        assert!(map.contains_key(&DbType::TimeWithTimeZone));
        assert!(!map.contains_key(&DbType::Char));
    }

    #[test]
    fn test_money_wraps_every_numeric_source_with_usd() {
        let map = money_body_map();
        for source in NUMBER_TYPES {
            assert_eq!(
                map.get(source).unwrap(),
                "BEGIN\n  RETURN ROW($1, 'USD')::typeshift_types.money;\nEND;"
            );
        }
    }

    #[test]
    fn test_money_text_goes_through_numeric() {
        let map = money_body_map();
        for source in TEXT_TYPES {
            assert!(map
                .get(source)
                .unwrap()
                .contains("ROW($1::numeric, 'USD')"));
        }
    }

    #[test]
    fn test_uri_retry_checks_tld_table() {
        let map = uri_body_map();
        let body = map.get(&DbType::Text).unwrap();
        assert!(body.contains("EXCEPTION WHEN SQLSTATE '23514'"));
        assert!(body.contains("'http://' || $1"));
        assert!(body.contains("typeshift_types.uri_authority"));
        assert!(body.contains("FROM typeshift_types.top_level_domains"));
        assert!(body.contains("RAISE EXCEPTION '% is not a uri'"));
    }

    #[test]
    fn test_textual_targets_take_everything_available() {
        let available = all_types();
        let map = textual_body_map(&available);
        assert_eq!(map.len(), available.len());
        for body in map.values() {
            assert_eq!(body, "BEGIN\n  RETURN $1::text;\nEND;");
        }
    }

    #[test]
    fn test_name_is_never_a_target() {
        assert!(body_map_for_target(DbType::Name, &all_types()).is_none());
    }
}
