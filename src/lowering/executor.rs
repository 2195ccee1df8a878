//! Executable plan assembly
//!
//! # Invariants
//!
//! - A successful assembly always has a result slot
//! - A row-id slot is present whenever the caller required one
//! - The operator tree is prepared before it is returned

use std::time::Duration;

use super::lower::SlotBasedLowering;
use super::shard::ShardFilterProvider;
use super::slots::{RuntimeEnvironment, SharedBinding, SlotId, SlotIdGenerator, SHARD_FILTERER_SLOT};
use super::stages::OperatorTree;
use super::variables::VariableEnvironment;
use crate::catalog::Namespace;
use crate::errors::{OptimizerError, OptimizerResult};
use crate::explain::{ExplainArtifact, ExplainVersion};
use crate::metadata::Metadata;
use crate::observability::{log_event_with_fields, Event, Timer};
use crate::phase::MemoStats;
use crate::plan::{PhysicalNode, PlanAndProps};

/// How a running plan gives up control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YieldPolicy {
    /// Yield periodically and check for interrupts
    #[default]
    YieldAuto,
    /// Check for interrupts only
    InterruptOnly,
}

/// Everything the execution layer needs to run one plan
#[derive(Debug, Clone)]
pub struct ExecParams {
    pub namespace: Namespace,
    pub tree: OperatorTree,
    pub result_slot: SlotId,
    pub rid_slot: Option<SlotId>,
    pub runtime_env: RuntimeEnvironment,
    /// Absent for cross-partition parallel plans
    pub yield_policy: Option<YieldPolicy>,
    pub explain: ExplainArtifact,
    pub stats: MemoStats,
    pub planning_time: Duration,
    pub generated_by_optimizer: bool,
}

/// Inputs of one assembly
pub struct ExecutorInputs<'a> {
    pub namespace: &'a Namespace,
    pub scan_def_name: &'a str,
    pub metadata: &'a Metadata,
    pub plan: PlanAndProps,
    pub post_memo_plan: Option<&'a PhysicalNode>,
    pub stats: MemoStats,
    pub require_rid: bool,
    pub explain_version: ExplainVersion,
    /// Explain or profiled requests collect per-operator timing
    pub collect_timing: bool,
    pub shard_filters: Option<&'a dyn ShardFilterProvider>,
    pub planning_timer: Timer,
}

/// Lowers the winning plan and assembles the executable result
pub fn create_executor(inputs: ExecutorInputs<'_>) -> OptimizerResult<ExecParams> {
    let ExecutorInputs {
        namespace,
        scan_def_name,
        metadata,
        plan,
        post_memo_plan,
        stats,
        require_rid,
        explain_version,
        collect_timing,
        shard_filters,
        planning_timer,
    } = inputs;

    VariableEnvironment::build(&plan.plan)?;

    let mut generator = SlotIdGenerator::new();
    let mut runtime_env = RuntimeEnvironment::new();

    let is_sharded = metadata
        .scan_def(scan_def_name)
        .and_then(|def| def.sharding.as_ref())
        .map_or(false, |sharding| sharding.is_sharded);
    if is_sharded {
        let provider = shard_filters.ok_or_else(|| {
            OptimizerError::internal("sharded collection without a shard filter provider")
                .with_context(namespace.to_string())
        })?;
        let filter = provider.shard_filter(namespace)?;
        runtime_env.register_slot(
            SHARD_FILTERER_SLOT,
            SharedBinding::ShardFilter(filter),
            &mut generator,
        )?;
    }

    let lowered = SlotBasedLowering::new(metadata, &runtime_env, &mut generator)
        .lower_plan(&plan.plan)?
        .ok_or_else(|| OptimizerError::internal("Lowering did not produce a plan"))?;

    let result_slot = match lowered.output_slots.first() {
        Some(slot) => *slot,
        None => {
            return Err(OptimizerError::internal(
                "Lowering did not produce any output slots",
            ))
        }
    };

    if require_rid && lowered.rid_slot.is_none() {
        return Err(OptimizerError::internal("Cannot find RID slot"));
    }

    let result_slot_text = result_slot.to_string();
    log_event_with_fields(
        Event::PlanLowered,
        &[
            ("result_slot", result_slot_text.as_str()),
            ("root", lowered.root.name()),
        ],
    );

    let yield_policy = if metadata.is_parallel_execution() {
        None
    } else {
        Some(YieldPolicy::default())
    };

    let explain = ExplainArtifact::build(explain_version, post_memo_plan, &plan.plan)?;

    let mut tree = OperatorTree::new(lowered.root);
    tree.prepare(&runtime_env, collect_timing)?;
    let planning_time = planning_timer.elapsed();

    let planning_ms = planning_time.as_millis().to_string();
    log_event_with_fields(
        Event::ExecutorReady,
        &[
            ("namespace", namespace.to_string().as_str()),
            ("planning_ms", planning_ms.as_str()),
        ],
    );

    Ok(ExecParams {
        namespace: namespace.clone(),
        tree,
        result_slot,
        rid_slot: lowered.rid_slot,
        runtime_env,
        yield_policy,
        explain,
        stats,
        planning_time,
        generated_by_optimizer: true,
    })
}
