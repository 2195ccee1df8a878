//! Plan representations
//!
//! The logical plan fed to the search engine, the physical plan it returns,
//! and the run-scoped name generator shared by translation and lowering.

mod logical;
mod physical;
mod prefix_id;

pub use logical::LogicalNode;
pub use physical::{NodeProps, PhysicalKind, PhysicalNode, PlanAndProps, ScalarExpr};
pub use prefix_id::PrefixId;
