//! Estimator selection and phase manager construction

use std::sync::Arc;

use super::manager::{CostModelCoefficients, PhaseManager};
use super::phases::PhaseSet;
use crate::config::QueryHints;
use crate::errors::{OptimizerError, OptimizerResult};
use crate::estimator::{
    CardinalityEstimator, CeMode, CollectionStatistics, HeuristicEstimator, HistogramEstimator,
    SampleSize, SamplingEstimator, SamplingExecutor,
};
use crate::metadata::{Metadata, ScanOrder};
use crate::observability::{log_event_with_fields, Event};

/// External cardinality sources available to a run
#[derive(Clone, Default)]
pub struct EstimationSources {
    pub sampling: Option<Arc<dyn SamplingExecutor>>,
    pub statistics: Option<Arc<dyn CollectionStatistics>>,
}

/// Inputs to `create_phase_manager`
pub struct PhaseManagerInputs<'a> {
    pub metadata: Metadata,
    pub hints: QueryHints,
    pub require_rid: bool,
    pub cost_model: CostModelCoefficients,
    /// Row count of the main collection
    pub collection_size: u64,
    /// Sample from the start of the collection instead of random positions
    pub sampling_scan_start_of_collection: bool,
    pub sources: &'a EstimationSources,
}

/// Copy of `metadata` for sampling: no indexes, no orphan filtering, and
/// forward or random scan order everywhere.
pub fn sampling_metadata(metadata: &Metadata, scan_start_of_collection: bool) -> Metadata {
    let mut sampling = metadata.clone();
    let scan_order = if scan_start_of_collection {
        ScanOrder::Forward
    } else {
        ScanOrder::Random
    };
    for definition in sampling.scan_defs.values_mut() {
        definition.index_defs.clear();
        definition.scan_order = scan_order;
        if let Some(sharding) = definition.sharding.as_mut() {
            sharding.may_contain_orphans = false;
        }
    }
    sampling
}

/// Builds the phase manager for `mode`, which must already be gated by
/// `CeMode::effective`.
pub fn create_phase_manager(mode: CeMode, inputs: PhaseManagerInputs<'_>) -> OptimizerResult<PhaseManager> {
    let estimator: Box<dyn CardinalityEstimator> = match mode {
        CeMode::Heuristic => Box::new(HeuristicEstimator::new()),
        CeMode::Histogram => {
            let statistics = inputs.sources.statistics.clone().ok_or_else(|| {
                OptimizerError::configuration("histogram estimation requires a statistics source")
            })?;
            Box::new(HistogramEstimator::new(statistics))
        }
        CeMode::Sampling => {
            let executor = inputs.sources.sampling.clone().ok_or_else(|| {
                OptimizerError::configuration("sampling estimation requires a sampling executor")
            })?;
            let sampler = PhaseManager::new(
                PhaseSet::sampling(),
                sampling_metadata(&inputs.metadata, inputs.sampling_scan_start_of_collection),
                inputs.hints.for_sampling(),
                false,
                Box::new(HeuristicEstimator::new()),
                inputs.cost_model.clone(),
            );
            let sample = SampleSize::compute(inputs.collection_size, &inputs.hints);
            Box::new(SamplingEstimator::new(
                sampler,
                executor,
                sample,
                inputs.hints.force_sampling_ce_fallback_for_filter_node,
            ))
        }
    };
    log_event_with_fields(
        Event::EstimatorSelected,
        &[
            ("mode", mode.as_str()),
            ("collection_size", inputs.collection_size.to_string().as_str()),
        ],
    );

    let phases = PhaseSet::production();
    log_event_with_fields(
        Event::PhasesConfigured,
        &[
            ("phases", phases.to_string().as_str()),
            ("require_rid", if inputs.require_rid { "true" } else { "false" }),
        ],
    );
    Ok(PhaseManager::new(
        phases,
        inputs.metadata,
        inputs.hints,
        inputs.require_rid,
        estimator,
        inputs.cost_model,
    ))
}
