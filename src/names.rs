//! The name mangler: deterministic mapping from logical relation names to the
//! physical names used during evaluation.
//!
//! Five total functions with pairwise disjoint ranges. `@info_` is reserved
//! for provenance info relations, which evaluate with arity zero.

use crate::data::ast::QualifiedName;

pub const DELTA_PREFIX: &str = "@delta_";
pub const NEW_PREFIX: &str = "@new_";
pub const REJECT_PREFIX: &str = "@reject_";
pub const DELETE_PREFIX: &str = "@delete_";
pub const INFO_PREFIX: &str = "@info_";

pub fn concrete_name(name: &QualifiedName) -> String {
    name.to_string()
}

/// Name of the relation holding the previous iteration's additions.
pub fn delta_name(name: &QualifiedName) -> String {
    format!("{}{}", DELTA_PREFIX, name)
}

/// Name of the relation accumulating the current iteration's additions.
pub fn new_name(name: &QualifiedName) -> String {
    format!("{}{}", NEW_PREFIX, name)
}

pub fn reject_name(name: &QualifiedName) -> String {
    format!("{}{}", REJECT_PREFIX, name)
}

pub fn delete_name(name: &QualifiedName) -> String {
    format!("{}{}", DELETE_PREFIX, name)
}

pub fn is_info_name(name: &str) -> bool {
    name.starts_with(INFO_PREFIX)
}

/// Strips an evaluation prefix (`@delta_` or `@new_`) to recover the logical
/// relation name.
pub fn strip_evaluation_prefix(name: &str) -> &str {
    name.strip_prefix(DELTA_PREFIX)
        .or_else(|| name.strip_prefix(NEW_PREFIX))
        .unwrap_or(name)
}
