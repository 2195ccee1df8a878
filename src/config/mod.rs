//! Optimizer configuration
//!
//! Knobs are loaded from JSON (`OptimizerKnobs::load`), validated, and
//! snapshotted into `QueryHints` once per run.

mod errors;
mod hints;
mod knobs;

pub use errors::{ConfigError, ConfigResult};
pub use hints::{DisableIndexOptions, QueryHints};
pub use knobs::OptimizerKnobs;
