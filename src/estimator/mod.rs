//! Cardinality estimation
//!
//! One estimator is constructed per run from the configured mode and never
//! re-selected afterwards. The heuristic estimator is always available and
//! backs every other strategy.
//!
//! # Strategies
//!
//! - Heuristic: fixed selectivities per interval shape
//! - Histogram: per-path histograms from a statistics source
//! - Sampling: selectivity measured by running the predicate over a sample

mod heuristic;
mod histogram;
mod mode;
mod sampling;

pub use heuristic::{
    interval_selectivity, requirement_selectivity, HeuristicEstimator, CLOSED_RANGE_SELECTIVITY,
    DEFAULT_FILTER_SELECTIVITY, DEFAULT_ROW_COUNT, OPEN_RANGE_SELECTIVITY,
};
pub use histogram::{CollectionStatistics, Histogram, HistogramBucket, HistogramEstimator};
pub use mode::CeMode;
pub use sampling::{SampleSize, SamplingEstimator, SamplingExecutor};

use crate::errors::OptimizerResult;
use crate::metadata::Metadata;
use crate::plan::LogicalNode;

/// Estimates the output cardinality of a logical subtree
pub trait CardinalityEstimator {
    /// Short name used in logs and explain output
    fn name(&self) -> &'static str;

    fn estimate(&self, node: &LogicalNode, metadata: &Metadata) -> OptimizerResult<f64>;
}

/// Walks a unary logical tree bottom-up.
///
/// `leaf` estimates scans, `selectivity` is applied at `Filter` and
/// `Sargable` nodes with the input cardinality; everything else is
/// structural.
pub(crate) fn propagate<L, S>(
    node: &LogicalNode,
    metadata: &Metadata,
    leaf: &L,
    selectivity: &S,
) -> OptimizerResult<f64>
where
    L: Fn(&LogicalNode, &Metadata) -> OptimizerResult<f64>,
    S: Fn(&LogicalNode, &Metadata, f64) -> OptimizerResult<f64>,
{
    match node {
        LogicalNode::Scan { .. } | LogicalNode::ValueScan { .. } => leaf(node, metadata),
        LogicalNode::Filter { child, .. } | LogicalNode::Sargable { child, .. } => {
            let input = propagate(child, metadata, leaf, selectivity)?;
            Ok(input * selectivity(node, metadata, input)?)
        }
        LogicalNode::Evaluation { child, .. } | LogicalNode::Root { child, .. } => {
            propagate(child, metadata, leaf, selectivity)
        }
        LogicalNode::LimitSkip { limit, skip, child } => {
            let input = propagate(child, metadata, leaf, selectivity)?;
            let remaining = (input - *skip as f64).max(0.0);
            Ok(limit.map_or(remaining, |l| remaining.min(l as f64)))
        }
    }
}
