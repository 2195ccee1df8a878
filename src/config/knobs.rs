//! Optimizer knobs
//!
//! Every knob is optional in the JSON file and falls back to its default.
//! Knobs are read once into `QueryHints`; nothing reads them afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};
use crate::estimator::CeMode;
use crate::explain::ExplainVersion;
use crate::observability::{log_event_with_fields, Event};

/// Knob snapshot as stored in a knob file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerKnobs {
    #[serde(default)]
    pub disable_scan: bool,
    #[serde(default)]
    pub disable_indexes: bool,
    #[serde(default)]
    pub disable_hash_join_rid_intersect: bool,
    #[serde(default)]
    pub disable_merge_join_rid_intersect: bool,
    #[serde(default)]
    pub disable_group_by_and_union_rid_intersect: bool,
    #[serde(default)]
    pub keep_rejected_plans: bool,
    #[serde(default)]
    pub disable_branch_and_bound: bool,
    #[serde(default)]
    pub fast_index_null_handling: bool,
    #[serde(default)]
    pub disable_yielding_tolerant_plans: bool,

    #[serde(default = "default_eq_prefixes")]
    pub min_index_eq_prefixes: u64,
    #[serde(default = "default_eq_prefixes")]
    pub max_index_eq_prefixes: u64,

    /// Number of chunks a sample is split into
    #[serde(default = "default_sample_chunks")]
    pub sample_chunks: u64,
    #[serde(default = "default_true")]
    pub enable_not_pushdown: bool,
    #[serde(default)]
    pub sampling_ce_fallback_for_filter_node: bool,
    /// Lower sample size bound; also the row count sampling requires
    #[serde(default = "default_sample_size_min")]
    pub sample_size_min: u64,
    #[serde(default = "default_sample_size_max")]
    pub sample_size_max: u64,
    #[serde(default = "default_true")]
    pub enable_sqrt_sample_size: bool,
    /// Sample from the start of the collection instead of at random
    #[serde(default)]
    pub sampling_scan_start_of_collection: bool,

    /// One of: heuristic, histogram, sampling
    #[serde(default = "default_ce_mode")]
    pub cardinality_estimator_mode: String,
    /// One of: v1, v2, v2compact, bson-internal, bson-user-facing
    #[serde(default = "default_explain_version")]
    pub explain_version: String,
    /// Degree of parallelism; 1 means centralized
    #[serde(default = "default_dop")]
    pub default_dop: u64,
    #[serde(default = "default_true")]
    pub use_descriptive_var_names: bool,

    /// Test hook: every optimization fails with "optimizer disabled"
    #[serde(default)]
    pub fail_constructing_executor: bool,
}

fn default_true() -> bool {
    true
}

fn default_eq_prefixes() -> u64 {
    1
}

fn default_sample_chunks() -> u64 {
    10
}

fn default_sample_size_min() -> u64 {
    100
}

fn default_sample_size_max() -> u64 {
    10_000
}

fn default_ce_mode() -> String {
    "sampling".to_string()
}

fn default_explain_version() -> String {
    "v2".to_string()
}

fn default_dop() -> u64 {
    1
}

impl Default for OptimizerKnobs {
    fn default() -> Self {
        Self {
            disable_scan: false,
            disable_indexes: false,
            disable_hash_join_rid_intersect: false,
            disable_merge_join_rid_intersect: false,
            disable_group_by_and_union_rid_intersect: false,
            keep_rejected_plans: false,
            disable_branch_and_bound: false,
            fast_index_null_handling: false,
            disable_yielding_tolerant_plans: false,
            min_index_eq_prefixes: default_eq_prefixes(),
            max_index_eq_prefixes: default_eq_prefixes(),
            sample_chunks: default_sample_chunks(),
            enable_not_pushdown: true,
            sampling_ce_fallback_for_filter_node: false,
            sample_size_min: default_sample_size_min(),
            sample_size_max: default_sample_size_max(),
            enable_sqrt_sample_size: true,
            sampling_scan_start_of_collection: false,
            cardinality_estimator_mode: default_ce_mode(),
            explain_version: default_explain_version(),
            default_dop: default_dop(),
            use_descriptive_var_names: true,
            fail_constructing_executor: false,
        }
    }
}

impl OptimizerKnobs {
    /// Reads and validates a knob file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let knobs = Self::from_json_str(&content)?;

        let path_str = path.display().to_string();
        log_event_with_fields(
            Event::KnobsLoaded,
            &[
                ("path", path_str.as_str()),
                ("ce_mode", knobs.cardinality_estimator_mode.as_str()),
            ],
        );
        Ok(knobs)
    }

    /// Parses and validates knobs from a JSON string
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let knobs: OptimizerKnobs = serde_json::from_str(content)?;
        knobs.validate()?;
        Ok(knobs)
    }

    /// Checks every knob with a restricted domain
    pub fn validate(&self) -> ConfigResult<()> {
        if CeMode::parse(&self.cardinality_estimator_mode).is_err() {
            return Err(ConfigError::invalid(
                "cardinality_estimator_mode",
                format!(
                    "'{}' is not one of heuristic, histogram, sampling",
                    self.cardinality_estimator_mode
                ),
            ));
        }
        if ExplainVersion::parse(&self.explain_version).is_err() {
            return Err(ConfigError::invalid(
                "explain_version",
                format!("unknown explain version '{}'", self.explain_version),
            ));
        }
        if self.default_dop == 0 {
            return Err(ConfigError::invalid("default_dop", "must be at least 1"));
        }
        if self.sample_chunks == 0 {
            return Err(ConfigError::invalid("sample_chunks", "must be at least 1"));
        }
        if self.sample_size_min > self.sample_size_max {
            return Err(ConfigError::invalid(
                "sample_size_min",
                format!(
                    "{} exceeds sample_size_max {}",
                    self.sample_size_min, self.sample_size_max
                ),
            ));
        }
        if self.min_index_eq_prefixes == 0 || self.min_index_eq_prefixes > self.max_index_eq_prefixes {
            return Err(ConfigError::invalid(
                "min_index_eq_prefixes",
                "must be at least 1 and not exceed max_index_eq_prefixes",
            ));
        }
        Ok(())
    }
}
