//! Phase configuration
//!
//! Assembles the phase sequence, hints and cardinality estimator handed to
//! the search engine. In sampling mode two managers are built: an inner one
//! that only sees raw scans, wrapped by the estimator of the outer one.

mod configure;
mod manager;
mod phases;

pub use configure::{create_phase_manager, sampling_metadata, EstimationSources, PhaseManagerInputs};
pub use manager::{
    CostModelCoefficients, MemoStats, PhaseManager, PlanSearch, SearchOutcome, SearchRequest,
};
pub use phases::{OptPhase, PhaseSet};
