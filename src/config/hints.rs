//! Per-run query hints
//!
//! A `QueryHints` value is the immutable snapshot of the knobs taken at the
//! start of one optimization run. The only in-run mutation is the index
//! hint override of `disable_scan`, applied to the run's own copy.

use serde::Serialize;

use super::knobs::OptimizerKnobs;

/// Which indexes the index model builder may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableIndexOptions {
    /// All supported indexes are modeled
    Enabled,
    /// No index is modeled and the multikeyness trie stays empty
    DisableAll,
    /// Partial indexes are modeled without their filter requirement
    DisablePartialOnly,
}

impl DisableIndexOptions {
    pub fn from_knob(disable_indexes: bool) -> Self {
        if disable_indexes {
            DisableIndexOptions::DisableAll
        } else {
            DisableIndexOptions::Enabled
        }
    }
}

/// Hints handed to the search engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHints {
    pub disable_scan: bool,
    pub disable_indexes: DisableIndexOptions,
    pub disable_hash_join_rid_intersect: bool,
    pub disable_merge_join_rid_intersect: bool,
    pub disable_group_by_and_union_rid_intersect: bool,
    pub keep_rejected_plans: bool,
    pub disable_branch_and_bound: bool,
    pub fast_index_null_handling: bool,
    pub disable_yielding_tolerant_plans: bool,
    pub min_index_eq_prefixes: u64,
    pub max_index_eq_prefixes: u64,
    pub num_sampling_chunks: u64,
    pub enable_not_pushdown: bool,
    pub force_sampling_ce_fallback_for_filter_node: bool,
    pub sample_size_min: u64,
    pub sample_size_max: u64,
    pub enable_sqrt_sample_size: bool,
}

impl QueryHints {
    /// Snapshots the knobs for one run
    pub fn from_knobs(knobs: &OptimizerKnobs) -> Self {
        Self {
            disable_scan: knobs.disable_scan,
            disable_indexes: DisableIndexOptions::from_knob(knobs.disable_indexes),
            disable_hash_join_rid_intersect: knobs.disable_hash_join_rid_intersect,
            disable_merge_join_rid_intersect: knobs.disable_merge_join_rid_intersect,
            disable_group_by_and_union_rid_intersect: knobs
                .disable_group_by_and_union_rid_intersect,
            keep_rejected_plans: knobs.keep_rejected_plans,
            disable_branch_and_bound: knobs.disable_branch_and_bound,
            fast_index_null_handling: knobs.fast_index_null_handling,
            disable_yielding_tolerant_plans: knobs.disable_yielding_tolerant_plans,
            min_index_eq_prefixes: knobs.min_index_eq_prefixes,
            max_index_eq_prefixes: knobs.max_index_eq_prefixes,
            num_sampling_chunks: knobs.sample_chunks,
            enable_not_pushdown: knobs.enable_not_pushdown,
            force_sampling_ce_fallback_for_filter_node: knobs
                .sampling_ce_fallback_for_filter_node,
            sample_size_min: knobs.sample_size_min,
            sample_size_max: knobs.sample_size_max,
            enable_sqrt_sample_size: knobs.enable_sqrt_sample_size,
        }
    }

    /// Hints for the inner sampling phase manager: defaults everywhere
    /// except the sampling parameters.
    pub fn for_sampling(&self) -> Self {
        let mut hints = QueryHints::from_knobs(&OptimizerKnobs::default());
        hints.num_sampling_chunks = self.num_sampling_chunks;
        hints.sample_size_min = self.sample_size_min;
        hints.sample_size_max = self.sample_size_max;
        hints.enable_sqrt_sample_size = self.enable_sqrt_sample_size;
        hints
    }
}

impl Default for QueryHints {
    fn default() -> Self {
        Self::from_knobs(&OptimizerKnobs::default())
    }
}
