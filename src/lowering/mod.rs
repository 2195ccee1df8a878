//! Plan lowering and executable assembly
//!
//! Turns the winning physical plan into a slot-bound operator tree:
//!
//! 1. Check that every projection is defined below its readers
//! 2. Bind the shard filter to a global slot for sharded collections
//! 3. Lower node by node, allocating slots from one generator
//! 4. Pick the result and row-id slots, attach yield policy and explain
//! 5. Prepare the tree
//!
//! # Invariants
//!
//! - Slot ids are never reused within one assembly
//! - The runtime environment has a single writer: the assembly step

mod executor;
mod lower;
mod shard;
mod slots;
mod stages;
mod variables;

pub use executor::{create_executor, ExecParams, ExecutorInputs, YieldPolicy};
pub use lower::{LoweredPlan, SlotBasedLowering};
pub use shard::{ShardFilter, ShardFilterProvider};
pub use slots::{
    RuntimeEnvironment, SharedBinding, SlotId, SlotIdGenerator, SlotVarMap, SHARD_FILTERER_SLOT,
};
pub use stages::{OperatorTree, Stage, StageExpr};
pub use variables::VariableEnvironment;
