//! Heuristic cardinality estimation

use super::{propagate, CardinalityEstimator};
use crate::errors::OptimizerResult;
use crate::metadata::Metadata;
use crate::plan::LogicalNode;
use crate::requirement::{convert_to_requirement, Interval, IntervalSet, Requirement};

/// Row count assumed when a scan has no estimate
pub const DEFAULT_ROW_COUNT: f64 = 1000.0;
/// Selectivity of a range bounded on both sides
pub const CLOSED_RANGE_SELECTIVITY: f64 = 0.2;
/// Selectivity of a range open on one side
pub const OPEN_RANGE_SELECTIVITY: f64 = 0.33;
/// Selectivity of a filter with no requirement form
pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;

/// Selectivity of a single interval over `input` rows
pub fn interval_selectivity(interval: &Interval, input: f64) -> f64 {
    if interval.is_full() {
        1.0
    } else if interval.is_empty() {
        0.0
    } else if interval.is_point() {
        1.0 / input.max(1.0).sqrt()
    } else if interval.is_unbounded_range() {
        OPEN_RANGE_SELECTIVITY
    } else {
        CLOSED_RANGE_SELECTIVITY
    }
}

fn interval_set_selectivity(intervals: &IntervalSet, input: f64) -> f64 {
    intervals
        .intervals()
        .iter()
        .map(|i| interval_selectivity(i, input))
        .sum::<f64>()
        .min(1.0)
}

/// Product of the per-entry selectivities
pub fn requirement_selectivity(requirement: &Requirement, input: f64) -> f64 {
    requirement
        .iter()
        .map(|(_, intervals)| interval_set_selectivity(intervals, input))
        .product()
}

/// Always-available estimator with fixed selectivities
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    pub fn new() -> Self {
        HeuristicEstimator
    }

    /// Base-table cardinality of a scan leaf
    pub fn leaf(&self, node: &LogicalNode, metadata: &Metadata) -> OptimizerResult<f64> {
        Ok(match node {
            LogicalNode::Scan { scan_def_name, .. } => metadata
                .scan_def(scan_def_name)
                .and_then(|def| def.estimated_row_count)
                .unwrap_or(DEFAULT_ROW_COUNT),
            LogicalNode::ValueScan { rows, .. } => rows.len() as f64,
            _ => DEFAULT_ROW_COUNT,
        })
    }

    /// Selectivity of a `Filter` or `Sargable` node
    pub fn selectivity(&self, node: &LogicalNode, input: f64) -> f64 {
        match node {
            LogicalNode::Sargable { requirement, .. } => requirement_selectivity(requirement, input),
            LogicalNode::Filter {
                projection, filter, ..
            } => match convert_to_requirement(filter, projection) {
                Some(conversion) if !conversion.retain_predicate => {
                    requirement_selectivity(&conversion.requirement, input)
                }
                _ => DEFAULT_FILTER_SELECTIVITY,
            },
            _ => 1.0,
        }
    }
}

impl CardinalityEstimator for HeuristicEstimator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn estimate(&self, node: &LogicalNode, metadata: &Metadata) -> OptimizerResult<f64> {
        propagate(
            node,
            metadata,
            &|leaf: &LogicalNode, md: &Metadata| self.leaf(leaf, md),
            &|n: &LogicalNode, _: &Metadata, input: f64| Ok(self.selectivity(n, input)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Namespace;
    use crate::metadata::{DistributionAndPaths, ScanDefinition};
    use crate::requirement::{FilterExpr, KeyValue};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn metadata(rows: f64) -> Metadata {
        let mut def = ScanDefinition::missing(Namespace::new("test", "items"), DistributionAndPaths::centralized());
        def.exists = true;
        def.estimated_row_count = Some(rows);
        let mut scan_defs = BTreeMap::new();
        scan_defs.insert("items".to_string(), def);
        Metadata::new(scan_defs, 1)
    }

    fn scan() -> LogicalNode {
        LogicalNode::Scan {
            projection: "scan_0".into(),
            scan_def_name: "items".into(),
        }
    }

    fn filter(f: serde_json::Value) -> LogicalNode {
        LogicalNode::Filter {
            projection: "scan_0".into(),
            filter: FilterExpr::parse(&f).unwrap().normalize(),
            child: Box::new(scan()),
        }
    }

    #[test]
    fn test_interval_shapes() {
        assert_eq!(interval_selectivity(&Interval::full(), 100.0), 1.0);
        assert_eq!(interval_selectivity(&Interval::point(KeyValue::Number(1.0)), 100.0), 0.1);
        assert_eq!(
            interval_selectivity(&Interval::above(KeyValue::Number(1.0), false), 100.0),
            OPEN_RANGE_SELECTIVITY
        );
        let closed = Interval::above(KeyValue::Number(1.0), true)
            .intersect(&Interval::below(KeyValue::Number(5.0), true))
            .unwrap();
        assert_eq!(interval_selectivity(&closed, 100.0), CLOSED_RANGE_SELECTIVITY);
    }

    #[test]
    fn test_scan_uses_row_count() {
        let estimator = HeuristicEstimator::new();
        assert_eq!(estimator.estimate(&scan(), &metadata(400.0)).unwrap(), 400.0);
        let unknown = LogicalNode::Scan {
            projection: "scan_0".into(),
            scan_def_name: "other".into(),
        };
        assert_eq!(estimator.estimate(&unknown, &metadata(400.0)).unwrap(), DEFAULT_ROW_COUNT);
    }

    #[test]
    fn test_filter_estimates() {
        let estimator = HeuristicEstimator::new();
        let md = metadata(400.0);
        let point = estimator.estimate(&filter(json!({"a": 1})), &md).unwrap();
        assert!((point - 20.0).abs() < 1e-9);
        let conj = estimator
            .estimate(&filter(json!({"a": {"$gt": 1}, "b": {"$gt": 2}})), &md)
            .unwrap();
        assert!((conj - 400.0 * 0.33 * 0.33).abs() < 1e-9);
        let negated = estimator.estimate(&filter(json!({"a": {"$ne": 1}})), &md).unwrap();
        assert!((negated - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_limit_skip() {
        let node = LogicalNode::LimitSkip {
            limit: Some(10),
            skip: 395,
            child: Box::new(scan()),
        };
        assert_eq!(HeuristicEstimator::new().estimate(&node, &metadata(400.0)).unwrap(), 5.0);
    }
}
