//! Executor Assembly Tests
//!
//! End-to-end tests of `get_executor` against an in-memory catalog, a
//! scripted search engine and a recording shard-filter provider:
//! - Successful assembly and its slots
//! - No plan found is `Ok(None)`
//! - Fail point, request shape and validation errors
//! - Estimator selection and the sampling metadata
//! - Shard filter binding

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use docplan::catalog::{CollectionFacts, CollectionSnapshot, InMemoryCatalog, IndexDescriptor, KeyPattern, Namespace};
use docplan::config::OptimizerKnobs;
use docplan::errors::{OptimizerErrorCode, OptimizerResult};
use docplan::estimator::{Histogram, HistogramBucket, CollectionStatistics, SampleSize, SamplingExecutor};
use docplan::explain::ExplainVersion;
use docplan::lowering::{ShardFilter, ShardFilterProvider, SlotId, YieldPolicy, SHARD_FILTERER_SLOT};
use docplan::metadata::{FindRequestOptions, ScanOrder};
use docplan::observability::MetricsRegistry;
use docplan::optimizer::{get_executor, FindFilterTranslator, OptimizerContext, QueryRequest};
use docplan::path::PathExpr;
use docplan::phase::{EstimationSources, MemoStats, PhaseManager, PlanSearch, SearchOutcome, SearchRequest};
use docplan::plan::{LogicalNode, NodeProps, PhysicalKind, PhysicalNode, PlanAndProps, ScalarExpr};
use serde_json::json;
use uuid::Uuid;

// =============================================================================
// Helper Types
// =============================================================================

/// What the scripted search saw
#[derive(Debug, Default, Clone)]
struct SearchLog {
    estimator: String,
    scan_defs: usize,
    index_count: usize,
    require_rid: bool,
    phases: usize,
    disable_scan: bool,
}

/// Search engine that returns a fixed plan shape over the main scan
#[derive(Default)]
struct ScriptedSearch {
    no_plan: bool,
    with_rid: bool,
    shard_filtered: bool,
    log: RefCell<Option<SearchLog>>,
}

impl PlanSearch for ScriptedSearch {
    fn optimize(&self, request: SearchRequest<'_>) -> OptimizerResult<SearchOutcome> {
        request.estimator.estimate(request.plan, request.metadata)?;
        let index_count = request
            .metadata
            .scan_defs
            .values()
            .map(|def| def.index_defs.len())
            .sum();
        *self.log.borrow_mut() = Some(SearchLog {
            estimator: request.estimator.name().to_string(),
            scan_defs: request.metadata.scan_defs.len(),
            index_count,
            require_rid: request.require_rid,
            phases: request.phases.len(),
            disable_scan: request.hints.disable_scan,
        });
        if self.no_plan {
            return Ok(SearchOutcome::default());
        }

        let leaf = match request.plan.scan_def_name() {
            Some(name) => PhysicalNode::new(PhysicalKind::PhysicalScan {
                scan_def_name: name.to_string(),
                projection: Some("scan_0".into()),
                rid_projection: if self.with_rid { Some("rid_0".into()) } else { None },
                fields: BTreeMap::new(),
            }),
            None => PhysicalNode::new(PhysicalKind::ValueScan {
                projection: "scan_0".into(),
                rows: Vec::new(),
            }),
        };
        let body = if self.shard_filtered {
            PhysicalNode::filter(
                ScalarExpr::ShardFilter {
                    args: vec![ScalarExpr::get_path(ScalarExpr::variable("scan_0"), PathExpr::get("a", PathExpr::Identity))],
                },
                leaf,
            )
        } else {
            leaf
        };
        let mut root = PhysicalNode::root(&["scan_0"], body.clone());
        if self.with_rid {
            root = root.with_props(NodeProps {
                rid_projection: Some("rid_0".into()),
                ..NodeProps::default()
            });
        }
        Ok(SearchOutcome {
            plans: vec![PlanAndProps::new(root)],
            post_memo_plan: Some(body),
            stats: MemoStats {
                groups: 3,
                logical_nodes: 4,
                physical_nodes: 5,
                estimated_cost: 12.5,
                estimated_cardinality: 100.0,
            },
        })
    }
}

/// Shard filter provider that records every lookup
#[derive(Default)]
struct RecordingShardFilters {
    lookups: RefCell<Vec<Namespace>>,
}

impl ShardFilterProvider for RecordingShardFilters {
    fn shard_filter(&self, namespace: &Namespace) -> OptimizerResult<ShardFilter> {
        self.lookups.borrow_mut().push(namespace.clone());
        Ok(ShardFilter::new(namespace.clone(), vec!["a".into()]))
    }
}

/// Sampling executor that checks the sampler never sees indexes
#[derive(Default)]
struct CheckingSampler {
    calls: RefCell<Vec<(usize, ScanOrder, u64)>>,
}

impl SamplingExecutor for CheckingSampler {
    fn estimate_selectivity(
        &self,
        sampler: &PhaseManager,
        _node: &LogicalNode,
        sample: &SampleSize,
    ) -> OptimizerResult<Option<f64>> {
        let metadata = sampler.metadata();
        let indexes = metadata.scan_defs.values().map(|d| d.index_defs.len()).sum();
        let order = metadata
            .scan_defs
            .values()
            .next()
            .map_or(ScanOrder::Forward, |d| d.scan_order);
        self.calls.borrow_mut().push((indexes, order, sample.total_rows));
        Ok(Some(0.5))
    }
}

struct FixedStatistics;

impl CollectionStatistics for FixedStatistics {
    fn histogram(&self, _scan_def_name: &str, _path: &PathExpr) -> Option<Histogram> {
        Some(Histogram {
            lower_bound: 0.0,
            buckets: vec![HistogramBucket {
                upper_bound: 10.0,
                row_count: 10.0,
                distinct: 10.0,
            }],
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn orders() -> Namespace {
    Namespace::new("shop", "orders")
}

fn catalog(record_count: u64, sharded: bool) -> InMemoryCatalog {
    let mut facts = CollectionFacts::new(Uuid::new_v4(), record_count);
    if sharded {
        facts = facts.sharded(KeyPattern::from_json(&json!({"a": 1})).unwrap());
    }
    let snapshot = CollectionSnapshot::new(facts)
        .with_index(IndexDescriptor::new("x_1", KeyPattern::from_json(&json!({"x": 1})).unwrap()));
    InMemoryCatalog::new().with_collection(orders(), snapshot)
}

fn heuristic_knobs() -> OptimizerKnobs {
    OptimizerKnobs {
        cardinality_estimator_mode: "heuristic".to_string(),
        ..OptimizerKnobs::default()
    }
}

fn find(filter: serde_json::Value) -> QueryRequest {
    QueryRequest::find(
        orders(),
        FindRequestOptions {
            filter: Some(filter),
            ..FindRequestOptions::default()
        },
    )
}

// =============================================================================
// Assembly Tests
// =============================================================================

/// A found plan becomes prepared executable parameters.
#[test]
fn test_successful_assembly() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let metrics = MetricsRegistry::new();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_metrics(&metrics);

    let params = get_executor(&ctx, &find(json!({"x": {"$gt": 3}}))).unwrap().unwrap();

    assert_eq!(params.namespace, orders());
    assert_eq!(params.result_slot, SlotId(1));
    assert_eq!(params.rid_slot, None);
    assert_eq!(params.yield_policy, Some(YieldPolicy::YieldAuto));
    assert!(params.tree.is_ready());
    assert!(!params.tree.collects_timing());
    assert!(params.generated_by_optimizer);
    assert_eq!(params.stats.groups, 3);
    assert_eq!(params.explain.version, ExplainVersion::V2);

    let log = search.log.borrow().clone().unwrap();
    assert_eq!(log.estimator, "heuristic");
    assert_eq!(log.scan_defs, 1);
    assert_eq!(log.index_count, 1);
    assert_eq!(log.phases, 7);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.optimizations_attempted, 1);
    assert_eq!(snapshot.executors_built, 1);
    assert_eq!(snapshot.indexes_modeled, 1);
}

/// Zero candidate plans is not an error.
#[test]
fn test_no_plan_found_is_none() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch {
        no_plan: true,
        ..ScriptedSearch::default()
    };
    let translator = FindFilterTranslator;
    let metrics = MetricsRegistry::new();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_metrics(&metrics);

    assert!(get_executor(&ctx, &find(json!({}))).unwrap().is_none());
    assert_eq!(metrics.snapshot().no_plan_found, 1);
    assert_eq!(metrics.snapshot().executors_built, 0);
}

/// A missing main collection plans over an empty value scan.
#[test]
fn test_missing_collection_plans_value_scan() {
    let catalog = InMemoryCatalog::new();
    let knobs = OptimizerKnobs::default();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let params = get_executor(&ctx, &find(json!({}))).unwrap().unwrap();
    assert_eq!(params.result_slot, SlotId(1));
    // Sampling is configured but the collection does not exist
    assert_eq!(search.log.borrow().as_ref().unwrap().estimator, "heuristic");
}

/// Requiring a record id needs a row-id slot in the plan.
#[test]
fn test_record_id_requirement() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let translator = FindFilterTranslator;
    let mut request = find(json!({}));
    if let Some(find) = request.find.as_mut() {
        find.force_generate_record_id = true;
    }

    let without_rid = ScriptedSearch::default();
    let ctx = OptimizerContext::new(&catalog, &knobs, &without_rid, &translator);
    let err = get_executor(&ctx, &request).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::InternalInvariantViolation);
    assert_eq!(err.message(), "Cannot find RID slot");
    assert!(without_rid.log.borrow().as_ref().unwrap().require_rid);

    let with_rid = ScriptedSearch {
        with_rid: true,
        ..ScriptedSearch::default()
    };
    let ctx = OptimizerContext::new(&catalog, &knobs, &with_rid, &translator);
    let params = get_executor(&ctx, &request).unwrap().unwrap();
    assert_eq!(params.rid_slot, Some(SlotId(2)));
}

/// Explain requests collect timing and explain the post-memo plan.
#[test]
fn test_explain_request() {
    let catalog = catalog(50, false);
    let knobs = OptimizerKnobs {
        explain_version: "v2compact".to_string(),
        ..heuristic_knobs()
    };
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);
    let mut request = find(json!({}));
    if let Some(find) = request.find.as_mut() {
        find.explain = true;
    }

    let params = get_executor(&ctx, &request).unwrap().unwrap();
    assert!(params.tree.collects_timing());
    assert_eq!(params.explain.to_string(), "PhysicalScan");
}

/// Parallel metadata gets no yield policy.
#[test]
fn test_parallel_plan_has_no_yield_policy() {
    let catalog = catalog(50, false);
    let knobs = OptimizerKnobs {
        default_dop: 4,
        ..heuristic_knobs()
    };
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let params = get_executor(&ctx, &find(json!({}))).unwrap().unwrap();
    assert_eq!(params.yield_policy, None);
}

// =============================================================================
// Error Tests
// =============================================================================

/// The test hook disables the optimizer before any work.
#[test]
fn test_fail_point() {
    let catalog = catalog(50, false);
    let knobs = OptimizerKnobs {
        fail_constructing_executor: true,
        ..heuristic_knobs()
    };
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let err = get_executor(&ctx, &find(json!({}))).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::DisabledByFailPoint);
    assert!(err.falls_back());
    assert!(search.log.borrow().is_none());
}

/// Find and pipeline together (or neither) is a defect.
#[test]
fn test_exactly_one_query_form() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let mut both = find(json!({}));
    both.pipeline = Some(json!([]));
    let err = get_executor(&ctx, &both).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::InternalInvariantViolation);

    let neither = QueryRequest {
        namespace: orders(),
        ..QueryRequest::default()
    };
    assert!(get_executor(&ctx, &neither).is_err());
}

/// Unsupported options are rejected before the search runs.
#[test]
fn test_validation_runs_before_search() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let metrics = MetricsRegistry::new();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_metrics(&metrics);

    let mut request = find(json!({}));
    if let Some(find) = request.find.as_mut() {
        find.tailable = true;
    }
    let err = get_executor(&ctx, &request).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::UnsupportedFeature);
    assert!(search.log.borrow().is_none());
    assert_eq!(metrics.snapshot().unsupported_rejections, 1);
    assert_eq!(metrics.snapshot().indexes_modeled, 0);
}

/// A hint on a multi-collection query is unsupported.
#[test]
fn test_hint_with_involved_collections() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let mut request = find(json!({})).with_involved(Namespace::new("shop", "items"));
    if let Some(find) = request.find.as_mut() {
        find.hint = Some(json!({"x": 1}));
    }
    let err = get_executor(&ctx, &request).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::UnsupportedFeature);
}

/// An index hint forces index plans; a natural hint forces a scan.
#[test]
fn test_hint_overrides_disable_scan() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let translator = FindFilterTranslator;

    let search = ScriptedSearch::default();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);
    let mut request = find(json!({}));
    if let Some(find) = request.find.as_mut() {
        find.hint = Some(json!({"$hint": "x_1"}));
    }
    get_executor(&ctx, &request).unwrap();
    assert!(search.log.borrow().as_ref().unwrap().disable_scan);

    let search = ScriptedSearch::default();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);
    let mut request = find(json!({}));
    if let Some(find) = request.find.as_mut() {
        find.hint = Some(json!({"$natural": 1}));
    }
    get_executor(&ctx, &request).unwrap();
    let log = search.log.borrow().clone().unwrap();
    assert!(!log.disable_scan);
    assert_eq!(log.index_count, 0);
}

/// Pipelines need a translator that understands them.
#[test]
fn test_pipeline_with_find_translator() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let request = QueryRequest::pipeline(orders(), json!([{"$match": {"x": 1}}]));
    let err = get_executor(&ctx, &request).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::UnsupportedFeature);
}

// =============================================================================
// Estimator Selection Tests
// =============================================================================

/// Sampling wraps an index-free, random-order sampler.
#[test]
fn test_sampling_selected_for_large_collection() {
    let catalog = catalog(10_000, true);
    let knobs = OptimizerKnobs::default();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let sampler = Arc::new(CheckingSampler::default());
    let sampling: Arc<dyn SamplingExecutor> = sampler.clone();
    let shard_filters = RecordingShardFilters::default();
    let metrics = MetricsRegistry::new();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator)
        .with_sources(EstimationSources {
            sampling: Some(sampling),
            statistics: None,
        })
        .with_shard_filters(&shard_filters)
        .with_metrics(&metrics);

    get_executor(&ctx, &find(json!({"x": {"$gt": 3}}))).unwrap().unwrap();

    assert_eq!(search.log.borrow().as_ref().unwrap().estimator, "sampling");
    assert_eq!(search.log.borrow().as_ref().unwrap().index_count, 1);
    let calls = sampler.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (0, ScanOrder::Random, 100));
    assert_eq!(metrics.snapshot().sampling_selected, 1);
}

/// Below the minimum size sampling is never chosen.
#[test]
fn test_small_collection_uses_heuristic() {
    let catalog = catalog(100, false);
    let knobs = OptimizerKnobs::default();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    get_executor(&ctx, &find(json!({}))).unwrap().unwrap();
    assert_eq!(search.log.borrow().as_ref().unwrap().estimator, "heuristic");
}

/// Sampling without a sampling executor is a configuration error.
#[test]
fn test_sampling_without_executor() {
    let catalog = catalog(10_000, false);
    let knobs = OptimizerKnobs::default();
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let err = get_executor(&ctx, &find(json!({}))).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::ConfigurationError);
    assert!(!err.falls_back());
}

/// Histogram mode needs a statistics source.
#[test]
fn test_histogram_mode() {
    let catalog = catalog(50, false);
    let knobs = OptimizerKnobs {
        cardinality_estimator_mode: "histogram".to_string(),
        ..OptimizerKnobs::default()
    };
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;

    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);
    let err = get_executor(&ctx, &find(json!({}))).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::ConfigurationError);

    let statistics: Arc<dyn CollectionStatistics> = Arc::new(FixedStatistics);
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_sources(EstimationSources {
        sampling: None,
        statistics: Some(statistics),
    });
    get_executor(&ctx, &find(json!({"x": {"$lt": 5}}))).unwrap().unwrap();
    assert_eq!(search.log.borrow().as_ref().unwrap().estimator, "histogram");
}

/// An unknown mode string is fatal.
#[test]
fn test_unknown_estimator_mode() {
    let catalog = catalog(50, false);
    let knobs = OptimizerKnobs {
        cardinality_estimator_mode: "guess".to_string(),
        ..OptimizerKnobs::default()
    };
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator);

    let err = get_executor(&ctx, &find(json!({}))).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::ConfigurationError);
}

/// Caller-built knobs are validated before any planning work.
#[test]
fn test_inverted_sample_bounds_rejected() {
    let catalog = catalog(10_000, false);
    let knobs = OptimizerKnobs {
        sample_size_min: 500,
        sample_size_max: 100,
        ..OptimizerKnobs::default()
    };
    let search = ScriptedSearch::default();
    let translator = FindFilterTranslator;
    let sampling: Arc<dyn SamplingExecutor> = Arc::new(CheckingSampler::default());
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_sources(EstimationSources {
        sampling: Some(sampling),
        statistics: None,
    });

    let err = get_executor(&ctx, &find(json!({"x": {"$gt": 3}}))).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::ConfigurationError);
    assert!(err.message().contains("sample_size_min"));
    assert!(search.log.borrow().is_none());
}

// =============================================================================
// Shard Filter Tests
// =============================================================================

/// A sharded collection binds the shard filter once, before lowering.
#[test]
fn test_sharded_collection_binds_filter_once() {
    let catalog = catalog(50, true);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch {
        shard_filtered: true,
        ..ScriptedSearch::default()
    };
    let translator = FindFilterTranslator;
    let shard_filters = RecordingShardFilters::default();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_shard_filters(&shard_filters);

    let params = get_executor(&ctx, &find(json!({}))).unwrap().unwrap();
    assert_eq!(*shard_filters.lookups.borrow(), vec![orders()]);
    assert_eq!(params.runtime_env.get_slot(SHARD_FILTERER_SLOT), Some(SlotId(1)));
    assert_eq!(params.runtime_env.len(), 1);
    assert_eq!(params.result_slot, SlotId(2));
}

/// A shard filter in a plan over an unsharded collection is a defect.
#[test]
fn test_shard_filter_on_unsharded_collection() {
    let catalog = catalog(50, false);
    let knobs = heuristic_knobs();
    let search = ScriptedSearch {
        shard_filtered: true,
        ..ScriptedSearch::default()
    };
    let translator = FindFilterTranslator;
    let shard_filters = RecordingShardFilters::default();
    let ctx = OptimizerContext::new(&catalog, &knobs, &search, &translator).with_shard_filters(&shard_filters);

    let err = get_executor(&ctx, &find(json!({}))).unwrap_err();
    assert_eq!(err.code(), OptimizerErrorCode::InternalInvariantViolation);
    assert!(shard_filters.lookups.borrow().is_empty());
}
