//! Executable operator tree
//!
//! Operators read and write runtime slots. A tree is handed to the
//! execution layer only after `OperatorTree::prepare` has checked that
//! every slot it reads is produced below the reader or bound globally.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::slots::{RuntimeEnvironment, SlotId};
use crate::errors::{OptimizerError, OptimizerResult};
use crate::metadata::{CollectionIdentity, DistributionType, ScanOrder};
use crate::path::PathExpr;
use crate::requirement::{CompareOp, IntervalSet};

/// Slot-bound scalar expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum StageExpr {
    Slot { slot: SlotId },
    Constant { value: Value },
    GetPath { input: Box<StageExpr>, path: PathExpr },
    Compare {
        op: CompareOp,
        lhs: Box<StageExpr>,
        rhs: Box<StageExpr>,
    },
    And { children: Vec<StageExpr> },
    Or { children: Vec<StageExpr> },
    Not { child: Box<StageExpr> },
    ShardFilter { filter_slot: SlotId, args: Vec<StageExpr> },
}

impl StageExpr {
    fn collect_slots(&self, out: &mut BTreeSet<SlotId>) {
        match self {
            StageExpr::Slot { slot } => {
                out.insert(*slot);
            }
            StageExpr::Constant { .. } => {}
            StageExpr::GetPath { input, .. } => input.collect_slots(out),
            StageExpr::Compare { lhs, rhs, .. } => {
                lhs.collect_slots(out);
                rhs.collect_slots(out);
            }
            StageExpr::And { children } | StageExpr::Or { children } => {
                for child in children {
                    child.collect_slots(out);
                }
            }
            StageExpr::Not { child } => child.collect_slots(out),
            StageExpr::ShardFilter { filter_slot, args } => {
                out.insert(*filter_slot);
                for arg in args {
                    arg.collect_slots(out);
                }
            }
        }
    }
}

/// Executable operator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Scan {
        collection: CollectionIdentity,
        result_slot: Option<SlotId>,
        rid_slot: Option<SlotId>,
        field_slots: BTreeMap<String, SlotId>,
        scan_order: ScanOrder,
    },
    IndexScan {
        collection: CollectionIdentity,
        index_name: String,
        intervals: IntervalSet,
        rid_slot: SlotId,
        reversed: bool,
    },
    /// Fetches documents by the row ids in `rid_slot`
    Seek {
        input: Box<Stage>,
        collection: CollectionIdentity,
        rid_slot: SlotId,
        result_slot: SlotId,
    },
    Values {
        slot: SlotId,
        rows: Vec<Value>,
    },
    Filter {
        input: Box<Stage>,
        predicate: StageExpr,
    },
    Project {
        input: Box<Stage>,
        slot: SlotId,
        expr: StageExpr,
    },
    LimitSkip {
        input: Box<Stage>,
        limit: Option<u64>,
        skip: u64,
    },
    /// Branch `i` delivers `input_slots[i]`, renamed to `output_slots`
    Union {
        inputs: Vec<Stage>,
        input_slots: Vec<Vec<SlotId>>,
        output_slots: Vec<SlotId>,
    },
    Exchange {
        input: Box<Stage>,
        partitions: usize,
        distribution: DistributionType,
    },
}

impl Stage {
    /// Checks slot reads and returns the slots visible above this stage
    fn check(&self, env: &RuntimeEnvironment) -> OptimizerResult<BTreeSet<SlotId>> {
        let ensure = |reads: &BTreeSet<SlotId>, visible: &BTreeSet<SlotId>, stage: &str| {
            match reads.iter().find(|s| !visible.contains(*s) && !env.is_bound(**s)) {
                Some(slot) => Err(OptimizerError::internal("unbound slot")
                    .with_context(format!("{} reads {} which nothing produces", stage, slot))),
                None => Ok(()),
            }
        };

        match self {
            Stage::Scan {
                result_slot,
                rid_slot,
                field_slots,
                ..
            } => Ok(result_slot
                .iter()
                .chain(rid_slot.iter())
                .chain(field_slots.values())
                .copied()
                .collect()),
            Stage::IndexScan { rid_slot, .. } => Ok(BTreeSet::from([*rid_slot])),
            Stage::Seek {
                input,
                rid_slot,
                result_slot,
                ..
            } => {
                let mut visible = input.check(env)?;
                ensure(&BTreeSet::from([*rid_slot]), &visible, "seek")?;
                visible.insert(*result_slot);
                Ok(visible)
            }
            Stage::Values { slot, .. } => Ok(BTreeSet::from([*slot])),
            Stage::Filter { input, predicate } => {
                let visible = input.check(env)?;
                let mut reads = BTreeSet::new();
                predicate.collect_slots(&mut reads);
                ensure(&reads, &visible, "filter")?;
                Ok(visible)
            }
            Stage::Project { input, slot, expr } => {
                let mut visible = input.check(env)?;
                let mut reads = BTreeSet::new();
                expr.collect_slots(&mut reads);
                ensure(&reads, &visible, "project")?;
                visible.insert(*slot);
                Ok(visible)
            }
            Stage::LimitSkip { input, .. } | Stage::Exchange { input, .. } => input.check(env),
            Stage::Union {
                inputs,
                input_slots,
                output_slots,
            } => {
                if inputs.len() != input_slots.len() {
                    return Err(OptimizerError::internal("union branch count mismatch"));
                }
                for (branch, slots) in inputs.iter().zip(input_slots) {
                    let visible = branch.check(env)?;
                    ensure(&slots.iter().copied().collect(), &visible, "union")?;
                }
                Ok(output_slots.iter().copied().collect())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Scan { .. } => "scan",
            Stage::IndexScan { .. } => "ixscan",
            Stage::Seek { .. } => "seek",
            Stage::Values { .. } => "values",
            Stage::Filter { .. } => "filter",
            Stage::Project { .. } => "project",
            Stage::LimitSkip { .. } => "limitskip",
            Stage::Union { .. } => "union",
            Stage::Exchange { .. } => "exchange",
        }
    }
}

/// Root of an executable tree plus its readiness state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorTree {
    pub root: Stage,
    ready: bool,
    collect_timing: bool,
}

impl OperatorTree {
    pub fn new(root: Stage) -> Self {
        Self {
            root,
            ready: false,
            collect_timing: false,
        }
    }

    /// Validates slot bindings and marks the tree ready to open
    pub fn prepare(&mut self, env: &RuntimeEnvironment, collect_timing: bool) -> OptimizerResult<()> {
        self.root.check(env)?;
        self.collect_timing = collect_timing;
        self.ready = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn collects_timing(&self) -> bool {
        self.collect_timing
    }
}
