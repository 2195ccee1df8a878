//! Filter to requirement translation
//!
//! Translation is exact or it reports what went wrong:
//! - `None`: the filter has no requirement form at all
//! - `Some` with `retain_predicate`: the requirement over-approximates the
//!   filter and the original predicate would have to be re-checked

use serde_json::Value;

use super::filter::{CompareOp, FilterExpr};
use super::interval::{Interval, IntervalSet, KeyValue};
use super::requirements::{PartialSchemaKey, Requirement};
use crate::path::PathExpr;

/// Result of a successful translation
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub requirement: Requirement,
    pub retain_predicate: bool,
}

impl Conversion {
    fn exact(requirement: Requirement) -> Self {
        Self {
            requirement,
            retain_predicate: false,
        }
    }

    fn approximate() -> Self {
        Self {
            requirement: Requirement::noop(),
            retain_predicate: true,
        }
    }
}

/// Translates a normalized filter bound to `projection`
pub fn convert_to_requirement(filter: &FilterExpr, projection: &str) -> Option<Conversion> {
    match filter {
        FilterExpr::AlwaysTrue => Some(Conversion::exact(Requirement::noop())),
        FilterExpr::Compare { path, op, operand } => {
            let key = PartialSchemaKey::new(projection, PathExpr::traversing(path));
            match op {
                CompareOp::Ne | CompareOp::Nin => Some(Conversion::approximate()),
                _ => {
                    let intervals = comparison_intervals(*op, operand)?;
                    Some(Conversion::exact(Requirement::single(key, intervals)))
                }
            }
        }
        FilterExpr::Not(_) | FilterExpr::Nor(_) => Some(Conversion::approximate()),
        FilterExpr::And(children) => {
            let mut requirement = Requirement::noop();
            let mut retain_predicate = false;
            for child in children {
                let conversion = convert_to_requirement(child, projection)?;
                retain_predicate |= conversion.retain_predicate;
                requirement = requirement.intersect(conversion.requirement);
            }
            Some(Conversion {
                requirement,
                retain_predicate,
            })
        }
        FilterExpr::Or(children) => convert_disjunction(children, projection),
    }
}

/// A disjunction converts only when every branch constrains the same key
fn convert_disjunction(children: &[FilterExpr], projection: &str) -> Option<Conversion> {
    let mut conversions = Vec::with_capacity(children.len());
    for child in children {
        conversions.push(convert_to_requirement(child, projection)?);
    }
    // An unconstrained branch makes the whole disjunction unconstrained
    if conversions
        .iter()
        .any(|c| !c.retain_predicate && c.requirement.is_noop())
    {
        return Some(Conversion::exact(Requirement::noop()));
    }
    if conversions.iter().any(|c| c.retain_predicate) {
        return Some(Conversion::approximate());
    }

    let mut shared_key: Option<PartialSchemaKey> = None;
    let mut union = IntervalSet::empty();
    for conversion in &conversions {
        let (key, intervals) = conversion.requirement.single_entry()?;
        match &shared_key {
            Some(existing) if existing != key => return None,
            Some(_) => {}
            None => shared_key = Some(key.clone()),
        }
        union = union.union(intervals);
    }

    let key = shared_key?;
    Some(Conversion::exact(Requirement::single(key, union)))
}

fn comparison_intervals(op: CompareOp, operand: &Value) -> Option<IntervalSet> {
    match op {
        CompareOp::Exists => match operand.as_bool() {
            Some(true) => Some(IntervalSet::full()),
            _ => None,
        },
        CompareOp::In => {
            let values = operand.as_array()?;
            let points = values
                .iter()
                .map(|v| KeyValue::from_json(v).map(Interval::point))
                .collect::<Option<Vec<_>>>()?;
            Some(IntervalSet::new(points))
        }
        _ => {
            let value = KeyValue::from_json(operand)?;
            let interval = match op {
                CompareOp::Eq => Interval::point(value),
                CompareOp::Gt => Interval::above(value, false),
                CompareOp::Gte => Interval::above(value, true),
                CompareOp::Lt => Interval::below(value, false),
                CompareOp::Lte => Interval::below(value, true),
                _ => return None,
            };
            Some(IntervalSet::single(interval))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FieldPath;
    use serde_json::json;

    fn convert(filter: Value) -> Option<Conversion> {
        let expr = FilterExpr::parse(&filter).unwrap().normalize();
        convert_to_requirement(&expr, "<root>")
    }

    fn key(field: &str) -> PartialSchemaKey {
        PartialSchemaKey::new("<root>", PathExpr::traversing(&FieldPath::parse(field).unwrap()))
    }

    #[test]
    fn test_equality_is_exact_point() {
        let conversion = convert(json!({"status": "active"})).unwrap();
        assert!(!conversion.retain_predicate);
        let intervals = conversion.requirement.get(&key("status")).unwrap();
        assert_eq!(intervals.intervals().len(), 1);
        assert!(intervals.intervals()[0].is_point());
    }

    #[test]
    fn test_conjunction_intersects() {
        let conversion = convert(json!({"a": {"$gte": 1, "$lt": 10}, "b": true})).unwrap();
        assert!(!conversion.retain_predicate);
        assert_eq!(conversion.requirement.len(), 2);
        assert_eq!(conversion.requirement.get(&key("a")).unwrap().to_string(), "[1, 10)");
    }

    #[test]
    fn test_single_key_disjunction_is_union() {
        let conversion = convert(json!({"$or": [{"a": 1}, {"a": {"$gt": 5}}]})).unwrap();
        assert!(!conversion.retain_predicate);
        assert_eq!(conversion.requirement.get(&key("a")).unwrap().intervals().len(), 2);
    }

    #[test]
    fn test_multi_key_disjunction_not_convertible() {
        assert!(convert(json!({"$or": [{"a": 1}, {"b": 1}]})).is_none());
    }

    #[test]
    fn test_negations_need_retained_predicate() {
        for filter in [
            json!({"a": {"$ne": 1}}),
            json!({"a": {"$nin": [1, 2]}}),
            json!({"a": {"$not": {"$gt": 1}}}),
            json!({"$nor": [{"a": 1}]}),
        ] {
            let conversion = convert(filter).unwrap();
            assert!(conversion.retain_predicate);
        }
    }

    #[test]
    fn test_non_convertible_operands() {
        assert!(convert(json!({"a": {"$exists": false}})).is_none());
        assert!(convert(json!({"a": {"b": 1}})).is_none());
        assert!(convert(json!({"a": [1, 2]})).is_none());
        assert!(convert(json!({"a": {"$in": [1, [2]]}})).is_none());
    }

    #[test]
    fn test_exists_true_keeps_full_interval() {
        let conversion = convert(json!({"a": {"$exists": true}})).unwrap();
        assert!(!conversion.retain_predicate);
        assert!(!conversion.requirement.is_noop());
        assert_eq!(conversion.requirement.get(&key("a")), Some(&IntervalSet::full()));
    }

    #[test]
    fn test_in_is_union_of_points() {
        let conversion = convert(json!({"a": {"$in": [3, 1, 2]}})).unwrap();
        let intervals = conversion.requirement.get(&key("a")).unwrap();
        assert_eq!(intervals.intervals().len(), 3);
        assert!(intervals.intervals().iter().all(Interval::is_point));
    }
}
