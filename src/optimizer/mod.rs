//! Optimizer entry point
//!
//! Order of work for one query:
//!
//! 1. Fail-point check
//! 2. Command and collection validation
//! 3. Metadata assembly from the catalog
//! 4. Translation into a logical plan
//! 5. Estimator selection and phase configuration
//! 6. Search
//! 7. Lowering into executable parameters
//!
//! Unsupported features, defects and the test hook fall back to another
//! planner; configuration errors surface to the client. A search without
//! a plan is `Ok(None)`.

mod context;
mod entry;

pub use context::{
    FindFilterTranslator, OptimizerContext, QueryRequest, QueryShape, QueryTranslator,
    TranslationInput,
};
pub use entry::get_executor;
