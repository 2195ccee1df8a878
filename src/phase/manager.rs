//! Phase manager and the search engine boundary

use std::collections::BTreeMap;

use serde::Serialize;

use super::phases::PhaseSet;
use crate::config::QueryHints;
use crate::errors::OptimizerResult;
use crate::estimator::CardinalityEstimator;
use crate::metadata::Metadata;
use crate::observability::{log_event_with_fields, Event};
use crate::plan::{LogicalNode, PhysicalNode, PlanAndProps};

/// Cost model parameters, passed through to the search engine untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostModelCoefficients {
    pub values: BTreeMap<String, f64>,
}

/// Memo statistics reported after a search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoStats {
    pub groups: u64,
    pub logical_nodes: u64,
    pub physical_nodes: u64,
    pub estimated_cost: f64,
    pub estimated_cardinality: f64,
}

/// Everything the search engine receives for one search
pub struct SearchRequest<'a> {
    pub plan: &'a LogicalNode,
    pub metadata: &'a Metadata,
    pub hints: &'a QueryHints,
    pub phases: &'a PhaseSet,
    pub estimator: &'a dyn CardinalityEstimator,
    pub require_rid: bool,
    pub cost_model: &'a CostModelCoefficients,
}

/// Result of one search
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Candidate plans, best first; empty when nothing was found
    pub plans: Vec<PlanAndProps>,
    /// Winning plan as it left the memo, before path lowering
    pub post_memo_plan: Option<PhysicalNode>,
    pub stats: MemoStats,
}

/// Cost-based search engine
pub trait PlanSearch {
    fn optimize(&self, request: SearchRequest<'_>) -> OptimizerResult<SearchOutcome>;
}

/// Configured search for one run: phases, metadata, hints and estimator
pub struct PhaseManager {
    phases: PhaseSet,
    metadata: Metadata,
    hints: QueryHints,
    require_rid: bool,
    estimator: Box<dyn CardinalityEstimator>,
    cost_model: CostModelCoefficients,
    post_memo_plan: Option<PhysicalNode>,
    memo_stats: MemoStats,
}

impl PhaseManager {
    pub fn new(
        phases: PhaseSet,
        metadata: Metadata,
        hints: QueryHints,
        require_rid: bool,
        estimator: Box<dyn CardinalityEstimator>,
        cost_model: CostModelCoefficients,
    ) -> Self {
        Self {
            phases,
            metadata,
            hints,
            require_rid,
            estimator,
            cost_model,
            post_memo_plan: None,
            memo_stats: MemoStats::default(),
        }
    }

    pub fn phases(&self) -> &PhaseSet {
        &self.phases
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn hints(&self) -> &QueryHints {
        &self.hints
    }

    pub fn require_rid(&self) -> bool {
        self.require_rid
    }

    pub fn estimator(&self) -> &dyn CardinalityEstimator {
        self.estimator.as_ref()
    }

    pub fn cost_model(&self) -> &CostModelCoefficients {
        &self.cost_model
    }

    /// Plan as it left the memo in the last search
    pub fn post_memo_plan(&self) -> Option<&PhysicalNode> {
        self.post_memo_plan.as_ref()
    }

    pub fn memo_stats(&self) -> &MemoStats {
        &self.memo_stats
    }

    /// Runs the search; `Ok(None)` means no plan was found
    pub fn optimize(
        &mut self,
        search: &dyn PlanSearch,
        plan: &LogicalNode,
    ) -> OptimizerResult<Option<PlanAndProps>> {
        let outcome = search.optimize(SearchRequest {
            plan,
            metadata: &self.metadata,
            hints: &self.hints,
            phases: &self.phases,
            estimator: self.estimator.as_ref(),
            require_rid: self.require_rid,
            cost_model: &self.cost_model,
        })?;

        self.post_memo_plan = outcome.post_memo_plan;
        self.memo_stats = outcome.stats;
        log_event_with_fields(
            Event::SearchComplete,
            &[
                ("candidates", outcome.plans.len().to_string().as_str()),
                ("estimator", self.estimator.name()),
                ("groups", self.memo_stats.groups.to_string().as_str()),
                ("logical_nodes", self.memo_stats.logical_nodes.to_string().as_str()),
                ("physical_nodes", self.memo_stats.physical_nodes.to_string().as_str()),
                ("estimated_cost", self.memo_stats.estimated_cost.to_string().as_str()),
                (
                    "estimated_cardinality",
                    self.memo_stats.estimated_cardinality.to_string().as_str(),
                ),
            ],
        );
        Ok(outcome.plans.into_iter().next())
    }
}
