//! Supported-type maps for a given deployment.
//!
//! Which types a database actually exposes depends on which custom types were
//! installed there, so every map here is parameterized by the deployment's
//! available type set as reported by the backend.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{Result, TypeshiftError};
use crate::types::DbType;

/// The types valid as alteration targets for a deployment, keyed by friendly
/// or canonical name.
pub fn supported_alter_types(
    available: &BTreeSet<DbType>,
    friendly_names: bool,
) -> BTreeMap<String, DbType> {
    available
        .iter()
        .map(|ty| {
            let key = if friendly_names {
                ty.friendly().to_string()
            } else {
                ty.canonical().to_string()
            };
            (key, *ty)
        })
        .collect()
}

/// A lookup map that accepts friendly names, canonical names, and upper- and
/// lower-case variants of both.
pub fn robust_type_map(available: &BTreeSet<DbType>) -> HashMap<String, DbType> {
    let mut map = HashMap::new();
    for ty in available {
        for key in [ty.friendly(), ty.canonical()] {
            map.insert(key.to_string(), *ty);
            map.insert(key.to_uppercase(), *ty);
        }
    }
    map
}

/// Resolve a type string against the deployment's available types.
///
/// This is the no-fallback boundary: an unknown string surfaces immediately
/// as an unsupported-type error.
pub fn resolve_type(available: &BTreeSet<DbType>, name: &str) -> Result<DbType> {
    DbType::lookup(name)
        .filter(|ty| available.contains(ty))
        .ok_or_else(|| TypeshiftError::UnsupportedType(name.to_string()))
}

/// The full native vocabulary, for deployments where every custom type is
/// installed. Tests and the mock backend use this.
pub fn all_types() -> BTreeSet<DbType> {
    DbType::ALL.iter().copied().collect()
}

/// The native-only vocabulary, for deployments without the custom types.
pub fn native_types() -> BTreeSet<DbType> {
    DbType::ALL
        .iter()
        .copied()
        .filter(|ty| !ty.is_custom())
        .collect()
}
