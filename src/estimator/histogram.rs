//! Histogram-based cardinality estimation
//!
//! Paths with a numeric equi-depth histogram are estimated from it; every
//! other path falls back to the heuristic selectivities.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::heuristic::{interval_selectivity, HeuristicEstimator};
use super::{propagate, CardinalityEstimator};
use crate::errors::OptimizerResult;
use crate::metadata::Metadata;
use crate::path::PathExpr;
use crate::plan::LogicalNode;
use crate::requirement::{convert_to_requirement, Interval, KeyValue, Requirement, TypeBracket};

/// One bucket of an equi-depth histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive upper bound of the bucket
    pub upper_bound: f64,
    pub row_count: f64,
    pub distinct: f64,
}

/// Numeric histogram of one path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Smallest value observed
    pub lower_bound: f64,
    /// Buckets in ascending `upper_bound` order
    pub buckets: Vec<HistogramBucket>,
}

impl Histogram {
    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|b| b.row_count).sum()
    }

    /// Rows with a value at most `x`, interpolated linearly within a bucket
    fn rows_below(&self, x: f64) -> f64 {
        let mut previous = self.lower_bound;
        let mut rows = 0.0;
        for bucket in &self.buckets {
            if x >= bucket.upper_bound {
                rows += bucket.row_count;
            } else {
                if x > previous && bucket.upper_bound > previous {
                    rows += bucket.row_count * (x - previous) / (bucket.upper_bound - previous);
                }
                break;
            }
            previous = bucket.upper_bound;
        }
        rows
    }

    fn point_rows(&self, value: f64) -> f64 {
        let mut previous = self.lower_bound;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let in_bucket = if i == 0 {
                value >= previous && value <= bucket.upper_bound
            } else {
                value > previous && value <= bucket.upper_bound
            };
            if in_bucket {
                return bucket.row_count / bucket.distinct.max(1.0);
            }
            previous = bucket.upper_bound;
        }
        0.0
    }

    /// Fraction of rows inside `interval`, or `None` for non-numeric bounds
    pub fn interval_selectivity(&self, interval: &Interval) -> Option<f64> {
        let total = self.total();
        if total <= 0.0 {
            return Some(0.0);
        }
        let low = numeric_bound(&interval.low.value)?;
        let high = numeric_bound(&interval.high.value)?;
        if interval.is_point() {
            return Some((self.point_rows(low) / total).min(1.0));
        }
        let rows = self.rows_below(high) - self.rows_below(low);
        Some((rows / total).clamp(0.0, 1.0))
    }
}

fn numeric_bound(value: &KeyValue) -> Option<f64> {
    match value {
        KeyValue::Number(n) => Some(*n),
        KeyValue::BracketMin(TypeBracket::Number) => Some(f64::NEG_INFINITY),
        KeyValue::BracketMax(TypeBracket::Number) => Some(f64::INFINITY),
        _ => None,
    }
}

/// Historical per-collection statistics
pub trait CollectionStatistics {
    /// Histogram of `path` in the collection behind `scan_def_name`
    fn histogram(&self, scan_def_name: &str, path: &PathExpr) -> Option<Histogram>;
}

/// Histogram estimator with heuristic fallback
pub struct HistogramEstimator {
    statistics: Arc<dyn CollectionStatistics>,
    fallback: HeuristicEstimator,
}

impl HistogramEstimator {
    pub fn new(statistics: Arc<dyn CollectionStatistics>) -> Self {
        Self {
            statistics,
            fallback: HeuristicEstimator::new(),
        }
    }

    fn requirement_selectivity(&self, scan_def_name: Option<&str>, requirement: &Requirement, input: f64) -> f64 {
        requirement
            .iter()
            .map(|(key, intervals)| {
                let histogram = scan_def_name.and_then(|name| self.statistics.histogram(name, &key.path));
                let selectivity: f64 = intervals
                    .intervals()
                    .iter()
                    .map(|interval| {
                        histogram
                            .as_ref()
                            .and_then(|h| h.interval_selectivity(interval))
                            .unwrap_or_else(|| interval_selectivity(interval, input))
                    })
                    .sum();
                selectivity.min(1.0)
            })
            .product()
    }

    fn selectivity(&self, node: &LogicalNode, input: f64) -> f64 {
        let scan_def_name = node.scan_def_name();
        match node {
            LogicalNode::Sargable { requirement, .. } => {
                self.requirement_selectivity(scan_def_name, requirement, input)
            }
            LogicalNode::Filter {
                projection, filter, ..
            } => match convert_to_requirement(filter, projection) {
                Some(conversion) if !conversion.retain_predicate => {
                    self.requirement_selectivity(scan_def_name, &conversion.requirement, input)
                }
                _ => self.fallback.selectivity(node, input),
            },
            _ => 1.0,
        }
    }
}

impl CardinalityEstimator for HistogramEstimator {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn estimate(&self, node: &LogicalNode, metadata: &Metadata) -> OptimizerResult<f64> {
        propagate(
            node,
            metadata,
            &|leaf: &LogicalNode, md: &Metadata| self.fallback.leaf(leaf, md),
            &|n: &LogicalNode, _: &Metadata, input: f64| Ok(self.selectivity(n, input)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Namespace;
    use crate::metadata::{DistributionAndPaths, ScanDefinition};
    use crate::path::FieldPath;
    use crate::requirement::FilterExpr;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn histogram() -> Histogram {
        Histogram {
            lower_bound: 0.0,
            buckets: vec![
                HistogramBucket { upper_bound: 10.0, row_count: 50.0, distinct: 10.0 },
                HistogramBucket { upper_bound: 20.0, row_count: 50.0, distinct: 5.0 },
            ],
        }
    }

    struct FixedStatistics;

    impl CollectionStatistics for FixedStatistics {
        fn histogram(&self, scan_def_name: &str, path: &PathExpr) -> Option<Histogram> {
            let a = PathExpr::traversing(&FieldPath::parse("a").unwrap());
            if scan_def_name == "items" && *path == a {
                Some(histogram())
            } else {
                None
            }
        }
    }

    #[test]
    fn test_histogram_selectivities() {
        let h = histogram();
        let point = h.interval_selectivity(&Interval::point(KeyValue::Number(15.0))).unwrap();
        assert!((point - 0.1).abs() < 1e-9);
        let above = h.interval_selectivity(&Interval::above(KeyValue::Number(10.0), false)).unwrap();
        assert!((above - 0.5).abs() < 1e-9);
        let below = h.interval_selectivity(&Interval::below(KeyValue::Number(5.0), true)).unwrap();
        assert!((below - 0.25).abs() < 1e-9);
        assert!(h
            .interval_selectivity(&Interval::point(KeyValue::String("x".into())))
            .is_none());
    }

    #[test]
    fn test_estimator_uses_histogram_then_heuristic() {
        let mut def = ScanDefinition::missing(Namespace::new("test", "items"), DistributionAndPaths::centralized());
        def.estimated_row_count = Some(100.0);
        let mut scan_defs = BTreeMap::new();
        scan_defs.insert("items".to_string(), def);
        let metadata = Metadata::new(scan_defs, 1);

        let filter = |f: serde_json::Value| LogicalNode::Filter {
            projection: "scan_0".into(),
            filter: FilterExpr::parse(&f).unwrap(),
            child: Box::new(LogicalNode::Scan {
                projection: "scan_0".into(),
                scan_def_name: "items".into(),
            }),
        };

        let estimator = HistogramEstimator::new(Arc::new(FixedStatistics));
        let on_a = estimator.estimate(&filter(json!({"a": {"$gt": 10}})), &metadata).unwrap();
        assert!((on_a - 50.0).abs() < 1e-9);
        let on_b = estimator.estimate(&filter(json!({"b": {"$gt": 10}})), &metadata).unwrap();
        assert!((on_b - 33.0).abs() < 1e-9);
    }
}
