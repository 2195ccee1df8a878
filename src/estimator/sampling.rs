//! Sampling-based cardinality estimation
//!
//! Selectivities of filter nodes are measured by running the predicate over
//! a random sample of the collection. The sub-plans are optimized by an
//! inner phase manager whose metadata has no indexes and no orphan
//! filtering, so the sample always sees raw physical rows.

use std::sync::Arc;

use serde::Serialize;

use super::heuristic::HeuristicEstimator;
use super::{propagate, CardinalityEstimator};
use crate::config::QueryHints;
use crate::errors::OptimizerResult;
use crate::metadata::Metadata;
use crate::phase::PhaseManager;
use crate::plan::LogicalNode;

/// Shape of the sample drawn for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleSize {
    pub total_rows: u64,
    pub chunks: u64,
    pub rows_per_chunk: u64,
}

impl SampleSize {
    /// `sqrt(n)` (or the configured maximum) clamped to the configured
    /// bounds and to the collection size, split into chunks of at least
    /// one row.
    pub fn compute(collection_size: u64, hints: &QueryHints) -> Self {
        let wanted = if hints.enable_sqrt_sample_size {
            (collection_size as f64).sqrt().round() as u64
        } else {
            hints.sample_size_max
        };
        // min may exceed max for hints not derived from validated knobs
        let total_rows = wanted
            .max(hints.sample_size_min)
            .min(hints.sample_size_max)
            .min(collection_size)
            .max(1);
        let chunks = hints.num_sampling_chunks.clamp(1, total_rows);
        Self {
            total_rows,
            chunks,
            rows_per_chunk: (total_rows / chunks).max(1),
        }
    }
}

/// Runs sampling sub-plans to completion.
///
/// The call is synchronous; `sampler` carries the index-free metadata and
/// the reduced phase set the sub-plan must be optimized with.
pub trait SamplingExecutor {
    /// Fraction of sampled rows of `node`'s input that pass `node`, or
    /// `None` when the sample could not be taken
    fn estimate_selectivity(
        &self,
        sampler: &PhaseManager,
        node: &LogicalNode,
        sample: &SampleSize,
    ) -> OptimizerResult<Option<f64>>;
}

/// Estimator measuring filter selectivities on a sample
pub struct SamplingEstimator {
    sampler: PhaseManager,
    executor: Arc<dyn SamplingExecutor>,
    sample: SampleSize,
    /// Filter nodes always use the heuristic
    force_filter_fallback: bool,
    fallback: HeuristicEstimator,
}

impl SamplingEstimator {
    pub fn new(
        sampler: PhaseManager,
        executor: Arc<dyn SamplingExecutor>,
        sample: SampleSize,
        force_filter_fallback: bool,
    ) -> Self {
        Self {
            sampler,
            executor,
            sample,
            force_filter_fallback,
            fallback: HeuristicEstimator::new(),
        }
    }

    /// The inner phase manager used for sample sub-plans
    pub fn sampler(&self) -> &PhaseManager {
        &self.sampler
    }

    pub fn sample(&self) -> &SampleSize {
        &self.sample
    }

    fn selectivity(&self, node: &LogicalNode, input: f64) -> OptimizerResult<f64> {
        let use_heuristic =
            self.force_filter_fallback && matches!(node, LogicalNode::Filter { .. });
        if use_heuristic {
            return Ok(self.fallback.selectivity(node, input));
        }
        match self.executor.estimate_selectivity(&self.sampler, node, &self.sample)? {
            Some(selectivity) => Ok(selectivity.clamp(0.0, 1.0)),
            None => Ok(self.fallback.selectivity(node, input)),
        }
    }
}

impl CardinalityEstimator for SamplingEstimator {
    fn name(&self) -> &'static str {
        "sampling"
    }

    fn estimate(&self, node: &LogicalNode, metadata: &Metadata) -> OptimizerResult<f64> {
        propagate(
            node,
            metadata,
            &|leaf: &LogicalNode, md: &Metadata| self.fallback.leaf(leaf, md),
            &|n: &LogicalNode, _: &Metadata, input: f64| self.selectivity(n, input),
        )
    }
}
