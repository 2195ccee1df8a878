//! Data distribution of a scan or index

use serde::Serialize;

use crate::path::PathExpr;

/// How rows are spread over execution partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    /// All rows on one partition
    Centralized,
    /// Rows spread over partitions in an unknown way
    UnknownPartitioning,
}

/// Distribution plus the paths rows are aligned on (empty for both kinds here)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionAndPaths {
    pub kind: DistributionType,
    pub paths: Vec<PathExpr>,
}

impl DistributionAndPaths {
    pub fn centralized() -> Self {
        Self {
            kind: DistributionType::Centralized,
            paths: Vec::new(),
        }
    }

    pub fn unknown_partitioning() -> Self {
        Self {
            kind: DistributionType::UnknownPartitioning,
            paths: Vec::new(),
        }
    }

    /// Local parallelism only: a single partition is centralized
    pub fn from_partitions(number_of_partitions: usize) -> Self {
        if number_of_partitions == 1 {
            Self::centralized()
        } else {
            Self::unknown_partitioning()
        }
    }
}

impl Default for DistributionAndPaths {
    fn default() -> Self {
        Self::centralized()
    }
}
