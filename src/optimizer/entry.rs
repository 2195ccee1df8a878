//! Optimizer entry point

use super::context::{OptimizerContext, QueryRequest, QueryShape, TranslationInput};
use crate::config::QueryHints;
use crate::errors::{OptimizerError, OptimizerErrorCode, OptimizerResult};
use crate::estimator::CeMode;
use crate::explain::ExplainVersion;
use crate::lowering::{create_executor, ExecParams, ExecutorInputs};
use crate::metadata::{scan_def_name, validate_command_options, IndexHint, MetadataAssembler};
use crate::observability::{log_event_with_fields, Event, ObservationScope, Timer};
use crate::phase::{create_phase_manager, PhaseManagerInputs};
use crate::plan::{LogicalNode, PrefixId};

/// Optimizes one query into executable parameters.
///
/// `Ok(None)` means the search found no plan; like a fall-back error, the
/// caller should plan the query another way.
pub fn get_executor(
    ctx: &OptimizerContext<'_>,
    request: &QueryRequest,
) -> OptimizerResult<Option<ExecParams>> {
    let timer = Timer::new();
    if let Some(metrics) = ctx.metrics {
        metrics.increment_optimizations_attempted();
    }
    let namespace = request.namespace.to_string();
    log_event_with_fields(Event::OptimizerBegin, &[("namespace", namespace.as_str())]);
    let scope = ObservationScope::with_fields("OPTIMIZE", &[("namespace", namespace.as_str())]);

    match optimize(ctx, request, timer) {
        Ok(params) => {
            if let Some(metrics) = ctx.metrics {
                if params.is_some() {
                    metrics.increment_executors_built();
                }
            }
            scope.complete_with_fields(&[("plan_found", if params.is_some() { "true" } else { "false" })]);
            Ok(params)
        }
        Err(error) => {
            if error.code() == OptimizerErrorCode::UnsupportedFeature {
                if let Some(metrics) = ctx.metrics {
                    metrics.increment_unsupported_rejections();
                }
            }
            if error.falls_back() {
                log_event_with_fields(
                    Event::OptimizerFallback,
                    &[("code", error.code().code()), ("reason", error.message())],
                );
            }
            scope.fail(&error);
            Err(error)
        }
    }
}

fn optimize(
    ctx: &OptimizerContext<'_>,
    request: &QueryRequest,
    timer: Timer,
) -> OptimizerResult<Option<ExecParams>> {
    let knobs = ctx.knobs;

    // 1. Test hook, then the caller-built knobs
    if knobs.fail_constructing_executor {
        return Err(OptimizerError::disabled());
    }
    knobs.validate()?;

    // 2. Exactly one query form
    let query = match (&request.find, &request.pipeline) {
        (Some(find), None) => QueryShape::Find(find.filter.as_ref()),
        (None, Some(pipeline)) => QueryShape::Pipeline(pipeline),
        _ => {
            return Err(OptimizerError::internal(
                "exactly one of a find request and a pipeline must be set",
            ))
        }
    };

    // 3. Validation before any catalog work
    let hint = match request.hint_value() {
        Some(value) => IndexHint::parse(value)?,
        None => None,
    };
    let collection = ctx.catalog.collection(&request.namespace);
    validate_command_options(
        request.find.as_ref(),
        collection,
        hint.as_ref(),
        &request.involved,
    )?;

    // 4. Metadata
    let mut hints = QueryHints::from_knobs(knobs);
    let mut prefix_id = PrefixId::new(knobs.use_descriptive_var_names);
    let scan_projection = prefix_id.next_id("scan");
    let scan_def_name = scan_def_name(&request.namespace, collection);
    let number_of_partitions = usize::try_from(knobs.default_dop)
        .map_err(|_| OptimizerError::configuration("default_dop out of range"))?;

    let mut assembler = MetadataAssembler::new(ctx.catalog, number_of_partitions).with_hint(hint.as_ref());
    if let Some(metrics) = ctx.metrics {
        assembler = assembler.with_metrics(metrics);
    }
    let metadata = assembler.populate(
        &request.namespace,
        &scan_def_name,
        &scan_projection,
        &request.involved,
        &mut hints,
        &mut prefix_id,
    )?;

    // 5. Logical plan
    let exists = collection.is_some();
    let plan = ctx.translator.translate(TranslationInput {
        initial: LogicalNode::initial(&scan_projection, &scan_def_name, exists),
        scan_projection: &scan_projection,
        metadata: &metadata,
        query,
        prefix_id: &mut prefix_id,
    })?;

    // 6. Estimator and phases
    let collection_size = collection.map_or(0, |c| c.facts.record_count);
    let mode = CeMode::parse(&knobs.cardinality_estimator_mode)?.effective(
        exists,
        collection_size,
        hints.sample_size_min,
    );
    if mode == CeMode::Sampling {
        if let Some(metrics) = ctx.metrics {
            metrics.increment_sampling_selected();
        }
    }
    let require_rid = request.require_rid();
    let mut phase_manager = create_phase_manager(
        mode,
        PhaseManagerInputs {
            metadata,
            hints,
            require_rid,
            cost_model: ctx.cost_model.clone(),
            collection_size,
            sampling_scan_start_of_collection: knobs.sampling_scan_start_of_collection,
            sources: &ctx.sources,
        },
    )?;

    // 7. Search
    let best = match phase_manager.optimize(ctx.search, &plan)? {
        Some(best) => best,
        None => {
            log_event_with_fields(Event::PlanNotFound, &[("scan_def", scan_def_name.as_str())]);
            if let Some(metrics) = ctx.metrics {
                metrics.increment_no_plan_found();
            }
            return Ok(None);
        }
    };

    // 8. Lowering and assembly
    let explain_version = ExplainVersion::parse(&knobs.explain_version)?;
    let params = create_executor(ExecutorInputs {
        namespace: &request.namespace,
        scan_def_name: &scan_def_name,
        metadata: phase_manager.metadata(),
        plan: best,
        post_memo_plan: phase_manager.post_memo_plan(),
        stats: phase_manager.memo_stats().clone(),
        require_rid,
        explain_version,
        collect_timing: request.collect_timing(),
        shard_filters: ctx.shard_filters,
        planning_timer: timer,
    })?;
    Ok(Some(params))
}
