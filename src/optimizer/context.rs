//! Collaborators and request shape of one optimization

use std::collections::BTreeSet;

use serde_json::Value;

use crate::catalog::{Catalog, Namespace};
use crate::config::OptimizerKnobs;
use crate::errors::{OptimizerError, OptimizerResult};
use crate::lowering::ShardFilterProvider;
use crate::metadata::{FindRequestOptions, Metadata};
use crate::observability::MetricsRegistry;
use crate::phase::{CostModelCoefficients, EstimationSources, PlanSearch};
use crate::plan::{LogicalNode, PrefixId};
use crate::requirement::FilterExpr;

/// User query handed to the translator
#[derive(Debug, Clone, Copy)]
pub enum QueryShape<'a> {
    /// Find filter; `None` matches everything
    Find(Option<&'a Value>),
    Pipeline(&'a Value),
}

/// Everything a translator may read or allocate from
pub struct TranslationInput<'a> {
    /// Root over the main collection's scan
    pub initial: LogicalNode,
    pub scan_projection: &'a str,
    pub metadata: &'a Metadata,
    pub query: QueryShape<'a>,
    pub prefix_id: &'a mut PrefixId,
}

/// Turns user query syntax into the logical plan fed to the search engine
pub trait QueryTranslator {
    fn translate(&self, input: TranslationInput<'_>) -> OptimizerResult<LogicalNode>;
}

/// Translator for find requests: places the filter over the main scan.
///
/// Pipelines are rejected as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindFilterTranslator;

impl QueryTranslator for FindFilterTranslator {
    fn translate(&self, input: TranslationInput<'_>) -> OptimizerResult<LogicalNode> {
        let filter = match input.query {
            QueryShape::Find(filter) => filter,
            QueryShape::Pipeline(_) => {
                return Err(OptimizerError::unsupported("pipeline translation"));
            }
        };
        let filter = match filter {
            Some(filter) if filter.as_object().map_or(false, |m| !m.is_empty()) => {
                FilterExpr::parse(filter)?.normalize()
            }
            _ => return Ok(input.initial),
        };

        match input.initial {
            LogicalNode::Root { projections, child } => Ok(LogicalNode::Root {
                projections,
                child: Box::new(LogicalNode::Filter {
                    projection: input.scan_projection.to_string(),
                    filter,
                    child,
                }),
            }),
            _ => Err(OptimizerError::internal("initial plan has no root")),
        }
    }
}

/// Long-lived collaborators shared by every optimization
pub struct OptimizerContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub knobs: &'a OptimizerKnobs,
    pub search: &'a dyn PlanSearch,
    pub translator: &'a dyn QueryTranslator,
    pub sources: EstimationSources,
    pub shard_filters: Option<&'a dyn ShardFilterProvider>,
    pub cost_model: CostModelCoefficients,
    pub metrics: Option<&'a MetricsRegistry>,
}

impl<'a> OptimizerContext<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        knobs: &'a OptimizerKnobs,
        search: &'a dyn PlanSearch,
        translator: &'a dyn QueryTranslator,
    ) -> Self {
        Self {
            catalog,
            knobs,
            search,
            translator,
            sources: EstimationSources::default(),
            shard_filters: None,
            cost_model: CostModelCoefficients::default(),
            metrics: None,
        }
    }

    pub fn with_sources(mut self, sources: EstimationSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_shard_filters(mut self, provider: &'a dyn ShardFilterProvider) -> Self {
        self.shard_filters = Some(provider);
        self
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// One query to optimize. Exactly one of `find` and `pipeline` is set.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub namespace: Namespace,
    pub find: Option<FindRequestOptions>,
    pub pipeline: Option<Value>,
    /// Other collections the query reads
    pub involved: BTreeSet<Namespace>,
    /// Hint for pipelines; find requests carry theirs in `find.hint`
    pub hint: Option<Value>,
    /// Profiled requests collect per-operator timing like explains do
    pub profiled: bool,
}

impl QueryRequest {
    pub fn find(namespace: Namespace, options: FindRequestOptions) -> Self {
        Self {
            namespace,
            find: Some(options),
            ..Self::default()
        }
    }

    pub fn pipeline(namespace: Namespace, pipeline: Value) -> Self {
        Self {
            namespace,
            pipeline: Some(pipeline),
            ..Self::default()
        }
    }

    pub fn with_involved(mut self, namespace: Namespace) -> Self {
        self.involved.insert(namespace);
        self
    }

    pub(crate) fn hint_value(&self) -> Option<&Value> {
        match &self.find {
            Some(find) => find.hint.as_ref().or(self.hint.as_ref()),
            None => self.hint.as_ref(),
        }
    }

    pub(crate) fn collect_timing(&self) -> bool {
        self.profiled || self.find.as_ref().map_or(false, |f| f.explain)
    }

    pub(crate) fn require_rid(&self) -> bool {
        self.find.as_ref().map_or(false, |f| f.force_generate_record_id)
    }
}
