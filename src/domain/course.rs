//! The normalized course entity.

/// A course unit normalized for graph emission.
///
/// Created once per occurrence during tree parsing and stored in the
/// resolver registry keyed by `id` (last writer wins); never mutated after
/// creation except for prerequisite-list filtering during finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// The Sisu course-unit group id.
    pub id: String,

    /// The dotted course code, e.g. `"COMP.CS.100"`.
    pub code: String,

    /// The display name (Finnish preferred, English fallback).
    pub name: String,

    /// The graph-node identifier derived from the code. Suffixed when a
    /// duplicate key would collide.
    pub key: String,

    /// Compulsory-prerequisite group ids, in declaration order.
    pub compulsory: Vec<String>,

    /// Recommended-prerequisite group ids, in declaration order.
    pub recommended: Vec<String>,
}

impl Course {
    /// Derives a graph-safe node key from a dotted course code.
    #[must_use]
    pub fn key_for(code: &str) -> String {
        code.replace('.', "_")
    }
}
