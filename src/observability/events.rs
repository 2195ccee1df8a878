//! Observable events of one optimization run

use std::fmt;

/// Lifecycle events emitted by the optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Entry point
    /// Optimization attempt begins
    OptimizerBegin,
    /// The request was handed back to an alternate planner
    OptimizerFallback,

    // Metadata
    /// Metadata for all referenced collections assembled
    MetadataBuilt,
    /// An index descriptor was not modeled
    IndexSkipped,
    /// An index descriptor became an index definition
    IndexModeled,

    // Estimation and search
    /// Cardinality estimator chosen
    EstimatorSelected,
    /// Phase manager configured
    PhasesConfigured,
    /// Search engine returned a winning plan
    SearchComplete,
    /// Search engine returned no plan
    PlanNotFound,

    // Lowering
    /// Physical plan lowered to an operator tree
    PlanLowered,
    /// Executor parameters assembled
    ExecutorReady,

    // Configuration
    /// Knob file loaded and validated
    KnobsLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::OptimizerBegin => "OPTIMIZER_BEGIN",
            Event::OptimizerFallback => "OPTIMIZER_FALLBACK",
            Event::MetadataBuilt => "METADATA_BUILT",
            Event::IndexSkipped => "INDEX_SKIPPED",
            Event::IndexModeled => "INDEX_MODELED",
            Event::EstimatorSelected => "ESTIMATOR_SELECTED",
            Event::PhasesConfigured => "PHASES_CONFIGURED",
            Event::SearchComplete => "SEARCH_COMPLETE",
            Event::PlanNotFound => "PLAN_NOT_FOUND",
            Event::PlanLowered => "PLAN_LOWERED",
            Event::ExecutorReady => "EXECUTOR_READY",
            Event::KnobsLoaded => "KNOBS_LOADED",
        }
    }

    /// Per-index and per-node events are only interesting when tracing
    pub fn is_trace(&self) -> bool {
        matches!(self, Event::IndexModeled)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
