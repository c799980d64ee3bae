//! Read-only cast resolution: which targets a column can become, and the
//! expression that converts it.

use std::collections::{BTreeMap, BTreeSet};

use crate::cast::bodies::body_map_for_target;
use crate::error::Result;
use crate::ident::quote_ident;
use crate::schema::Column;
use crate::types::{compiled, qualified_cast_function_name, DbType, TypeOptions};

/// Every registered (source, target) cast edge for a deployment.
pub fn defined_cast_edges(available: &BTreeSet<DbType>) -> BTreeSet<(DbType, DbType)> {
    let mut edges = BTreeSet::new();
    for target in available {
        let Some(body_map) = body_map_for_target(*target, available) else {
            continue;
        };
        for source in body_map.keys() {
            if available.contains(source) {
                edges.insert((*source, *target));
            }
        }
    }
    edges
}

/// The complete directed cast graph, keyed by source type. Only explicitly
/// registered one-hop edges appear; the graph is never transitively closed.
pub fn full_cast_map(available: &BTreeSet<DbType>) -> BTreeMap<DbType, Vec<DbType>> {
    let mut map: BTreeMap<DbType, Vec<DbType>> = BTreeMap::new();
    for (source, target) in defined_cast_edges(available) {
        map.entry(source).or_default().push(target);
    }
    map
}

/// Every type this column can be retyped to, excluding its own type.
///
/// Returns `None`, not an empty set, when the column is not alterable at
/// all: the engine's reserved default column, a detached descriptor, or a
/// column whose reported type is outside the vocabulary.
pub fn valid_target_types(
    column: &Column,
    available: &BTreeSet<DbType>,
) -> Option<BTreeSet<DbType>> {
    if column.is_reserved() || !column.is_attached() {
        return None;
    }
    let current = column.data_type?;
    let targets: BTreeSet<DbType> = full_cast_map(available)
        .remove(&current)
        .unwrap_or_default()
        .into_iter()
        .filter(|target| *target != current)
        .collect();
    if targets.is_empty() {
        None
    } else {
        Some(targets)
    }
}

/// The SQL expression converting a column's value to the target type.
///
/// When the current and target canonical forms are equal this is the bare
/// column reference (identity short-circuit, no needless function-call
/// layer). Otherwise it invokes the canonically named cast function; when
/// type options are supplied the result gains an additional native cast to
/// the fully parameterized target.
pub fn cast_expression(
    column_name: &str,
    current: DbType,
    target: DbType,
    options: &TypeOptions,
) -> Result<String> {
    let column_ref = quote_ident(column_name)?;
    let expr = if current.canonical() == target.canonical() {
        column_ref
    } else {
        format!("{}({})", qualified_cast_function_name(target), column_ref)
    };
    if options.is_empty() {
        Ok(expr)
    } else {
        Ok(format!("{}::{}", expr, compiled(target, options)))
    }
}
