//! Optimizer-facing index definitions

use serde::Serialize;

use crate::metadata::DistributionAndPaths;
use crate::path::PathExpr;
use crate::requirement::Requirement;

/// Maximum number of key components a reverse-field mask can describe
pub const MAX_INDEX_FIELDS: usize = 32;

/// Sort behaviour of one key component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollationOp {
    Ascending,
    Descending,
    /// Grouped but unordered (hashed)
    Clustered,
}

impl CollationOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollationOp::Ascending => "Ascending",
            CollationOp::Descending => "Descending",
            CollationOp::Clustered => "Clustered",
        }
    }
}

/// One `(path, op)` component of a collation spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexCollationEntry {
    pub path: PathExpr,
    pub op: CollationOp,
}

impl IndexCollationEntry {
    pub fn new(path: PathExpr, op: CollationOp) -> Self {
        Self { path, op }
    }
}

/// Ordered key components; order matches the physical key
pub type IndexCollationSpec = Vec<IndexCollationEntry>;

/// Index as seen by the search engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDefinition {
    pub collation_spec: IndexCollationSpec,
    /// Base-0 index version
    pub version: i64,
    /// Bit `i` set iff key component `i` sorts descending
    pub reverse_field_mask: u32,
    pub is_multikey: bool,
    pub distribution: DistributionAndPaths,
    /// No-op unless the index is partial
    pub partial_requirement: Requirement,
}

impl IndexDefinition {
    /// Returns true if component `i` is stored descending
    pub fn is_reversed(&self, component: usize) -> bool {
        component < MAX_INDEX_FIELDS && self.reverse_field_mask & (1u32 << component) != 0
    }

    /// Returns true if the index carries a partial filter requirement
    pub fn is_partial(&self) -> bool {
        !self.partial_requirement.is_noop()
    }
}

/// Builds the reverse-field mask from component directions
pub fn reverse_field_mask(ops: &[CollationOp]) -> u32 {
    ops.iter()
        .take(MAX_INDEX_FIELDS)
        .enumerate()
        .filter(|(_, op)| **op == CollationOp::Descending)
        .fold(0u32, |mask, (i, _)| mask | (1u32 << i))
}
