//! Match filter expressions
//!
//! Parses the JSON filter of a partial index (`{a: {$gt: 5}, $or: [...]}`)
//! into a small boolean expression tree and normalizes it.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::errors::{OptimizerError, OptimizerResult};
use crate::path::FieldPath;

/// Comparison operators accepted in a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
}

impl CompareOp {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "$eq" => Some(CompareOp::Eq),
            "$ne" => Some(CompareOp::Ne),
            "$gt" => Some(CompareOp::Gt),
            "$gte" => Some(CompareOp::Gte),
            "$lt" => Some(CompareOp::Lt),
            "$lte" => Some(CompareOp::Lte),
            "$in" => Some(CompareOp::In),
            "$nin" => Some(CompareOp::Nin),
            "$exists" => Some(CompareOp::Exists),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Gt => "$gt",
            CompareOp::Gte => "$gte",
            CompareOp::Lt => "$lt",
            CompareOp::Lte => "$lte",
            CompareOp::In => "$in",
            CompareOp::Nin => "$nin",
            CompareOp::Exists => "$exists",
        }
    }
}

/// Operators that are never planned by this optimizer
const BANNED_OPERATORS: &[&str] = &["$where", "$expr", "$text"];

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Empty filter
    AlwaysTrue,
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Nor(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare {
        path: FieldPath,
        op: CompareOp,
        operand: Value,
    },
}

impl FilterExpr {
    /// Parses a filter document
    pub fn parse(filter: &Value) -> OptimizerResult<Self> {
        let object = filter
            .as_object()
            .ok_or_else(|| OptimizerError::bad_value("filter must be an object"))?;

        let mut children = Vec::new();
        for (key, value) in object {
            if let Some(op) = key.strip_prefix('$') {
                children.push(parse_top_level(op, key, value)?);
            } else {
                children.push(parse_field(key, value)?);
            }
        }

        Ok(match children.len() {
            0 => FilterExpr::AlwaysTrue,
            1 => children.remove(0),
            _ => FilterExpr::And(children),
        })
    }

    /// Flattens nested `$and`/`$or`, unwraps single-child logical nodes and
    /// sorts children into a canonical order.
    pub fn normalize(self) -> Self {
        match self {
            FilterExpr::And(children) => {
                let mut flat = Vec::new();
                for child in children {
                    match child.normalize() {
                        FilterExpr::And(inner) => flat.extend(inner),
                        FilterExpr::AlwaysTrue => {}
                        other => flat.push(other),
                    }
                }
                rebuild(flat, FilterExpr::And, FilterExpr::AlwaysTrue)
            }
            FilterExpr::Or(children) => {
                let mut flat = Vec::new();
                for child in children {
                    match child.normalize() {
                        FilterExpr::Or(inner) => flat.extend(inner),
                        FilterExpr::AlwaysTrue => return FilterExpr::AlwaysTrue,
                        other => flat.push(other),
                    }
                }
                rebuild(flat, FilterExpr::Or, FilterExpr::AlwaysTrue)
            }
            FilterExpr::Nor(children) => {
                let mut children: Vec<FilterExpr> =
                    children.into_iter().map(FilterExpr::normalize).collect();
                sort_canonical(&mut children);
                FilterExpr::Nor(children)
            }
            FilterExpr::Not(child) => FilterExpr::Not(Box::new(child.normalize())),
            other => other,
        }
    }

    /// Canonical JSON form, used for ordering and for explain output
    pub fn to_json(&self) -> Value {
        match self {
            FilterExpr::AlwaysTrue => json!({}),
            FilterExpr::And(c) => json!({"$and": c.iter().map(FilterExpr::to_json).collect::<Vec<_>>()}),
            FilterExpr::Or(c) => json!({"$or": c.iter().map(FilterExpr::to_json).collect::<Vec<_>>()}),
            FilterExpr::Nor(c) => json!({"$nor": c.iter().map(FilterExpr::to_json).collect::<Vec<_>>()}),
            FilterExpr::Not(c) => json!({"$not": c.to_json()}),
            FilterExpr::Compare { path, op, operand } => {
                let mut inner = Map::new();
                inner.insert(op.as_str().to_string(), operand.clone());
                let mut outer = Map::new();
                outer.insert(path.to_string(), Value::Object(inner));
                Value::Object(outer)
            }
        }
    }
}

impl Serialize for FilterExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn rebuild(
    mut children: Vec<FilterExpr>,
    wrap: fn(Vec<FilterExpr>) -> FilterExpr,
    empty: FilterExpr,
) -> FilterExpr {
    match children.len() {
        0 => empty,
        1 => children.remove(0),
        _ => {
            sort_canonical(&mut children);
            wrap(children)
        }
    }
}

fn sort_canonical(children: &mut [FilterExpr]) {
    children.sort_by_cached_key(|c| c.to_json().to_string());
}

fn parse_top_level(op: &str, key: &str, value: &Value) -> OptimizerResult<FilterExpr> {
    if BANNED_OPERATORS.contains(&key) {
        return Err(OptimizerError::unsupported(format!(
            "special features banned: {}",
            key
        )));
    }
    let wrap: fn(Vec<FilterExpr>) -> FilterExpr = match op {
        "and" => FilterExpr::And,
        "or" => FilterExpr::Or,
        "nor" => FilterExpr::Nor,
        _ => {
            return Err(OptimizerError::unsupported(format!(
                "unknown top level operator: {}",
                key
            )))
        }
    };
    let branches = value
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| OptimizerError::bad_value(format!("{} must be a nonempty array", key)))?;
    let children = branches
        .iter()
        .map(FilterExpr::parse)
        .collect::<OptimizerResult<Vec<_>>>()?;
    Ok(wrap(children))
}

fn parse_field(field: &str, value: &Value) -> OptimizerResult<FilterExpr> {
    let path = FieldPath::parse(field)?;

    let operators = match value.as_object() {
        Some(obj) if obj.keys().next().map_or(false, |k| k.starts_with('$')) => obj,
        _ => {
            return Ok(FilterExpr::Compare {
                path,
                op: CompareOp::Eq,
                operand: value.clone(),
            })
        }
    };

    let mut children = Vec::new();
    for (name, operand) in operators {
        children.push(parse_operator(&path, name, operand)?);
    }
    Ok(match children.len() {
        1 => children.remove(0),
        _ => FilterExpr::And(children),
    })
}

fn parse_operator(path: &FieldPath, name: &str, operand: &Value) -> OptimizerResult<FilterExpr> {
    if name == "$not" {
        let inner = operand
            .as_object()
            .filter(|o| !o.is_empty() && o.keys().all(|k| k.starts_with('$')))
            .ok_or_else(|| OptimizerError::bad_value("$not needs an operator object"))?;
        let mut children = Vec::new();
        for (inner_name, inner_operand) in inner {
            children.push(parse_operator(path, inner_name, inner_operand)?);
        }
        let negated = match children.len() {
            1 => children.remove(0),
            _ => FilterExpr::And(children),
        };
        return Ok(FilterExpr::Not(Box::new(negated)));
    }

    if BANNED_OPERATORS.contains(&name) {
        return Err(OptimizerError::unsupported(format!(
            "special features banned: {}",
            name
        )));
    }
    let op = CompareOp::parse(name)
        .ok_or_else(|| OptimizerError::unsupported(format!("unknown operator: {}", name)))?;
    if matches!(op, CompareOp::In | CompareOp::Nin) && !operand.is_array() {
        return Err(OptimizerError::bad_value(format!("{} needs an array", name)));
    }
    Ok(FilterExpr::Compare {
        path: path.clone(),
        op,
        operand: operand.clone(),
    })
}
