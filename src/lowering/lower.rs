//! Physical plan to operator tree lowering

use std::collections::BTreeMap;

use super::slots::{RuntimeEnvironment, SlotId, SlotIdGenerator, SlotVarMap, SHARD_FILTERER_SLOT};
use super::stages::{Stage, StageExpr};
use crate::errors::{OptimizerError, OptimizerResult};
use crate::metadata::{Metadata, ScanDefinition};
use crate::plan::{PhysicalKind, PhysicalNode, ScalarExpr};

/// Output of lowering a `Root` node
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredPlan {
    pub root: Stage,
    /// Slots of the root projections, in projection order
    pub output_slots: Vec<SlotId>,
    pub rid_slot: Option<SlotId>,
    pub slot_map: SlotVarMap,
}

/// Lowers one physical plan, allocating slots from a shared generator
pub struct SlotBasedLowering<'a> {
    metadata: &'a Metadata,
    env: &'a RuntimeEnvironment,
    generator: &'a mut SlotIdGenerator,
    slot_map: SlotVarMap,
}

impl<'a> SlotBasedLowering<'a> {
    pub fn new(
        metadata: &'a Metadata,
        env: &'a RuntimeEnvironment,
        generator: &'a mut SlotIdGenerator,
    ) -> Self {
        Self {
            metadata,
            env,
            generator,
            slot_map: SlotVarMap::new(),
        }
    }

    /// Lowers a plan rooted at a `Root` node; any other root yields `None`
    pub fn lower_plan(mut self, plan: &PhysicalNode) -> OptimizerResult<Option<LoweredPlan>> {
        let (projections, child) = match &plan.kind {
            PhysicalKind::Root { projections, child } => (projections, child),
            _ => return Ok(None),
        };

        let root = self.lower(child)?;
        let output_slots = projections
            .iter()
            .map(|p| self.slot_of(p))
            .collect::<OptimizerResult<Vec<_>>>()?;
        let rid_slot = match &plan.props.rid_projection {
            Some(rid) => self.slot_map.get(rid).copied(),
            None => None,
        };
        Ok(Some(LoweredPlan {
            root,
            output_slots,
            rid_slot,
            slot_map: self.slot_map,
        }))
    }

    fn slot_of(&self, projection: &str) -> OptimizerResult<SlotId> {
        self.slot_map.get(projection).copied().ok_or_else(|| {
            OptimizerError::internal("free variable")
                .with_context(format!("projection '{}' has no slot", projection))
        })
    }

    fn bind(&mut self, projection: &str) -> SlotId {
        let slot = self.generator.generate();
        self.slot_map.insert(projection.to_string(), slot);
        slot
    }

    fn scan_def(&self, name: &str) -> OptimizerResult<&'a ScanDefinition> {
        self.metadata.scan_def(name).ok_or_else(|| {
            OptimizerError::internal("unknown scan definition").with_context(name.to_string())
        })
    }

    fn lower(&mut self, node: &PhysicalNode) -> OptimizerResult<Stage> {
        match &node.kind {
            PhysicalKind::PhysicalScan {
                scan_def_name,
                projection,
                rid_projection,
                fields,
            } => {
                let definition = self.scan_def(scan_def_name)?;
                let result_slot = projection.as_deref().map(|p| self.bind(p));
                let rid_slot = rid_projection.as_deref().map(|p| self.bind(p));
                let mut field_slots = BTreeMap::new();
                for (field, projection) in fields {
                    field_slots.insert(field.clone(), self.bind(projection));
                }
                Ok(Stage::Scan {
                    collection: definition.identity.clone(),
                    result_slot,
                    rid_slot,
                    field_slots,
                    scan_order: definition.scan_order,
                })
            }
            PhysicalKind::IndexScan {
                scan_def_name,
                index_name,
                intervals,
                rid_projection,
                reversed,
            } => {
                let definition = self.scan_def(scan_def_name)?;
                if !definition.index_defs.contains_key(index_name) {
                    return Err(OptimizerError::internal("unknown index")
                        .with_context(format!("{} on {}", index_name, scan_def_name)));
                }
                Ok(Stage::IndexScan {
                    collection: definition.identity.clone(),
                    index_name: index_name.clone(),
                    intervals: intervals.clone(),
                    rid_slot: self.bind(rid_projection),
                    reversed: *reversed,
                })
            }
            PhysicalKind::Seek {
                scan_def_name,
                rid_projection,
                projection,
                child,
            } => {
                let input = self.lower(child)?;
                let definition = self.scan_def(scan_def_name)?;
                let rid_slot = self.slot_of(rid_projection)?;
                Ok(Stage::Seek {
                    input: Box::new(input),
                    collection: definition.identity.clone(),
                    rid_slot,
                    result_slot: self.bind(projection),
                })
            }
            PhysicalKind::ValueScan { projection, rows } => Ok(Stage::Values {
                slot: self.bind(projection),
                rows: rows.clone(),
            }),
            PhysicalKind::Filter { predicate, child } => {
                let input = self.lower(child)?;
                Ok(Stage::Filter {
                    input: Box::new(input),
                    predicate: self.lower_expr(predicate)?,
                })
            }
            PhysicalKind::Evaluation {
                projection,
                expr,
                child,
            } => {
                let input = self.lower(child)?;
                let expr = self.lower_expr(expr)?;
                Ok(Stage::Project {
                    input: Box::new(input),
                    slot: self.bind(projection),
                    expr,
                })
            }
            PhysicalKind::LimitSkip { limit, skip, child } => Ok(Stage::LimitSkip {
                input: Box::new(self.lower(child)?),
                limit: *limit,
                skip: *skip,
            }),
            PhysicalKind::Union {
                projections,
                children,
            } => {
                let mut inputs = Vec::with_capacity(children.len());
                let mut input_slots = Vec::with_capacity(children.len());
                for child in children {
                    inputs.push(self.lower(child)?);
                    let slots = projections
                        .iter()
                        .map(|p| self.slot_of(p))
                        .collect::<OptimizerResult<Vec<_>>>()?;
                    input_slots.push(slots);
                }
                let output_slots = projections.iter().map(|p| self.bind(p)).collect();
                Ok(Stage::Union {
                    inputs,
                    input_slots,
                    output_slots,
                })
            }
            PhysicalKind::Exchange {
                distribution,
                child,
            } => Ok(Stage::Exchange {
                input: Box::new(self.lower(child)?),
                partitions: self.metadata.number_of_partitions,
                distribution: distribution.kind,
            }),
            PhysicalKind::Root { .. } => Err(OptimizerError::internal("nested root node")),
        }
    }

    fn lower_expr(&self, expr: &ScalarExpr) -> OptimizerResult<StageExpr> {
        Ok(match expr {
            ScalarExpr::Variable { name } => StageExpr::Slot {
                slot: self.slot_of(name)?,
            },
            ScalarExpr::Constant { value } => StageExpr::Constant {
                value: value.clone(),
            },
            ScalarExpr::GetPath { input, path } => StageExpr::GetPath {
                input: Box::new(self.lower_expr(input)?),
                path: path.clone(),
            },
            ScalarExpr::Compare { op, lhs, rhs } => StageExpr::Compare {
                op: *op,
                lhs: Box::new(self.lower_expr(lhs)?),
                rhs: Box::new(self.lower_expr(rhs)?),
            },
            ScalarExpr::And { children } => StageExpr::And {
                children: self.lower_exprs(children)?,
            },
            ScalarExpr::Or { children } => StageExpr::Or {
                children: self.lower_exprs(children)?,
            },
            ScalarExpr::Not { child } => StageExpr::Not {
                child: Box::new(self.lower_expr(child)?),
            },
            ScalarExpr::ShardFilter { args } => {
                let filter_slot = self.env.get_slot(SHARD_FILTERER_SLOT).ok_or_else(|| {
                    OptimizerError::internal("shard filter used without a shardFilterer slot")
                })?;
                StageExpr::ShardFilter {
                    filter_slot,
                    args: self.lower_exprs(args)?,
                }
            }
        })
    }

    fn lower_exprs(&self, exprs: &[ScalarExpr]) -> OptimizerResult<Vec<StageExpr>> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }
}
