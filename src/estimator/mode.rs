//! Cardinality estimation mode selection

use std::fmt;

use serde::Serialize;

use crate::errors::{OptimizerError, OptimizerResult};

/// Configured cardinality estimation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CeMode {
    Heuristic,
    Histogram,
    Sampling,
}

impl CeMode {
    /// Parses the knob value; anything unknown is a configuration error
    pub fn parse(mode: &str) -> OptimizerResult<Self> {
        match mode {
            "heuristic" => Ok(CeMode::Heuristic),
            "histogram" => Ok(CeMode::Histogram),
            "sampling" => Ok(CeMode::Sampling),
            other => Err(OptimizerError::configuration(format!(
                "unknown cardinality estimator mode '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CeMode::Heuristic => "heuristic",
            CeMode::Histogram => "histogram",
            CeMode::Sampling => "sampling",
        }
    }

    /// Mode actually used for one run.
    ///
    /// Sampling needs an existing collection with more rows than
    /// `sample_size_min`; otherwise the heuristic is used instead.
    pub fn effective(self, collection_exists: bool, row_count: u64, sample_size_min: u64) -> Self {
        match self {
            CeMode::Sampling if collection_exists && row_count > sample_size_min => CeMode::Sampling,
            CeMode::Sampling => CeMode::Heuristic,
            other => other,
        }
    }
}

impl fmt::Display for CeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
