//! Physical plan produced by the search engine
//!
//! Every node carries its `NodeProps`. The row id projection requested by
//! the caller is read from the props of the `Root` node.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::metadata::DistributionAndPaths;
use crate::path::PathExpr;
use crate::requirement::{CompareOp, IntervalSet};

/// Scalar expression over projections
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ScalarExpr {
    Variable { name: String },
    Constant { value: Value },
    /// Navigates `path` inside the value of `input`
    GetPath { input: Box<ScalarExpr>, path: PathExpr },
    Compare {
        op: CompareOp,
        lhs: Box<ScalarExpr>,
        rhs: Box<ScalarExpr>,
    },
    And { children: Vec<ScalarExpr> },
    Or { children: Vec<ScalarExpr> },
    Not { child: Box<ScalarExpr> },
    /// Orphan check on shard key values; reads the shared shard filter
    ShardFilter { args: Vec<ScalarExpr> },
}

impl ScalarExpr {
    pub fn variable(name: impl Into<String>) -> Self {
        ScalarExpr::Variable { name: name.into() }
    }

    pub fn constant(value: Value) -> Self {
        ScalarExpr::Constant { value }
    }

    pub fn get_path(input: ScalarExpr, path: PathExpr) -> Self {
        ScalarExpr::GetPath {
            input: Box::new(input),
            path,
        }
    }

    pub fn compare(op: CompareOp, lhs: ScalarExpr, rhs: ScalarExpr) -> Self {
        ScalarExpr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Collects every projection the expression reads
    pub fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            ScalarExpr::Variable { name } => {
                out.insert(name.as_str());
            }
            ScalarExpr::Constant { .. } => {}
            ScalarExpr::GetPath { input, .. } => input.collect_variables(out),
            ScalarExpr::Compare { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            ScalarExpr::And { children } | ScalarExpr::Or { children } => {
                for child in children {
                    child.collect_variables(out);
                }
            }
            ScalarExpr::Not { child } => child.collect_variables(out),
            ScalarExpr::ShardFilter { args } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }

    /// True if the expression needs the shared shard filter
    pub fn uses_shard_filter(&self) -> bool {
        match self {
            ScalarExpr::ShardFilter { .. } => true,
            ScalarExpr::Variable { .. } | ScalarExpr::Constant { .. } => false,
            ScalarExpr::GetPath { input, .. } => input.uses_shard_filter(),
            ScalarExpr::Compare { lhs, rhs, .. } => lhs.uses_shard_filter() || rhs.uses_shard_filter(),
            ScalarExpr::And { children } | ScalarExpr::Or { children } => {
                children.iter().any(ScalarExpr::uses_shard_filter)
            }
            ScalarExpr::Not { child } => child.uses_shard_filter(),
        }
    }
}

/// Physical properties the search engine attaches to a node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeProps {
    /// Estimated output cardinality
    pub planned_ce: f64,
    /// Estimated cost of the subtree
    pub cost: f64,
    /// Projection holding the row id, if the node delivers one
    pub rid_projection: Option<String>,
}

/// Physical operator kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum PhysicalKind {
    /// Collection scan; `projection` binds the whole document
    PhysicalScan {
        scan_def_name: String,
        projection: Option<String>,
        rid_projection: Option<String>,
        /// Top-level field to projection bindings
        fields: BTreeMap<String, String>,
    },
    /// Index range scan delivering row ids
    IndexScan {
        scan_def_name: String,
        index_name: String,
        intervals: IntervalSet,
        rid_projection: String,
        reversed: bool,
    },
    /// Fetches the document for every row id produced by `child`
    Seek {
        scan_def_name: String,
        rid_projection: String,
        projection: String,
        child: Box<PhysicalNode>,
    },
    ValueScan {
        projection: String,
        rows: Vec<Value>,
    },
    Filter {
        predicate: ScalarExpr,
        child: Box<PhysicalNode>,
    },
    Evaluation {
        projection: String,
        expr: ScalarExpr,
        child: Box<PhysicalNode>,
    },
    LimitSkip {
        limit: Option<u64>,
        skip: u64,
        child: Box<PhysicalNode>,
    },
    /// Every child delivers all of `projections`
    Union {
        projections: Vec<String>,
        children: Vec<PhysicalNode>,
    },
    Exchange {
        distribution: DistributionAndPaths,
        child: Box<PhysicalNode>,
    },
    Root {
        projections: Vec<String>,
        child: Box<PhysicalNode>,
    },
}

/// Physical node with its properties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicalNode {
    #[serde(flatten)]
    pub kind: PhysicalKind,
    pub props: NodeProps,
}

impl PhysicalNode {
    pub fn new(kind: PhysicalKind) -> Self {
        Self {
            kind,
            props: NodeProps::default(),
        }
    }

    pub fn with_props(mut self, props: NodeProps) -> Self {
        self.props = props;
        self
    }

    /// Full scan binding the document to `projection`
    pub fn scan(scan_def_name: &str, projection: &str) -> Self {
        Self::new(PhysicalKind::PhysicalScan {
            scan_def_name: scan_def_name.to_string(),
            projection: Some(projection.to_string()),
            rid_projection: None,
            fields: BTreeMap::new(),
        })
    }

    pub fn filter(predicate: ScalarExpr, child: PhysicalNode) -> Self {
        Self::new(PhysicalKind::Filter {
            predicate,
            child: Box::new(child),
        })
    }

    pub fn evaluation(projection: &str, expr: ScalarExpr, child: PhysicalNode) -> Self {
        Self::new(PhysicalKind::Evaluation {
            projection: projection.to_string(),
            expr,
            child: Box::new(child),
        })
    }

    pub fn root(projections: &[&str], child: PhysicalNode) -> Self {
        Self::new(PhysicalKind::Root {
            projections: projections.iter().map(|p| p.to_string()).collect(),
            child: Box::new(child),
        })
    }

    pub fn children(&self) -> Vec<&PhysicalNode> {
        match &self.kind {
            PhysicalKind::PhysicalScan { .. }
            | PhysicalKind::IndexScan { .. }
            | PhysicalKind::ValueScan { .. } => Vec::new(),
            PhysicalKind::Seek { child, .. }
            | PhysicalKind::Filter { child, .. }
            | PhysicalKind::Evaluation { child, .. }
            | PhysicalKind::LimitSkip { child, .. }
            | PhysicalKind::Exchange { child, .. }
            | PhysicalKind::Root { child, .. } => vec![child.as_ref()],
            PhysicalKind::Union { children, .. } => children.iter().collect(),
        }
    }

    /// Projections this node itself introduces
    pub fn local_definitions(&self) -> Vec<&str> {
        match &self.kind {
            PhysicalKind::PhysicalScan {
                projection,
                rid_projection,
                fields,
                ..
            } => projection
                .iter()
                .chain(rid_projection.iter())
                .map(String::as_str)
                .chain(fields.values().map(String::as_str))
                .collect(),
            PhysicalKind::IndexScan { rid_projection, .. } => vec![rid_projection.as_str()],
            PhysicalKind::Seek { projection, .. } => vec![projection.as_str()],
            PhysicalKind::ValueScan { projection, .. } => vec![projection.as_str()],
            PhysicalKind::Evaluation { projection, .. } => vec![projection.as_str()],
            PhysicalKind::Union { projections, .. } => projections.iter().map(String::as_str).collect(),
            PhysicalKind::Filter { .. }
            | PhysicalKind::LimitSkip { .. }
            | PhysicalKind::Exchange { .. }
            | PhysicalKind::Root { .. } => Vec::new(),
        }
    }

    /// Projections this node reads from its children
    pub fn local_references(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        match &self.kind {
            PhysicalKind::Seek { rid_projection, .. } => {
                out.insert(rid_projection.as_str());
            }
            PhysicalKind::Filter { predicate, .. } => predicate.collect_variables(&mut out),
            PhysicalKind::Evaluation { expr, .. } => expr.collect_variables(&mut out),
            PhysicalKind::Root { projections, .. } => {
                out.extend(projections.iter().map(String::as_str));
            }
            _ => {}
        }
        out
    }

    /// True if any expression in the subtree needs the shard filter
    pub fn uses_shard_filter(&self) -> bool {
        let local = match &self.kind {
            PhysicalKind::Filter { predicate, .. } => predicate.uses_shard_filter(),
            PhysicalKind::Evaluation { expr, .. } => expr.uses_shard_filter(),
            _ => false,
        };
        local || self.children().into_iter().any(PhysicalNode::uses_shard_filter)
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            PhysicalKind::PhysicalScan { .. } => "PhysicalScan",
            PhysicalKind::IndexScan { .. } => "IndexScan",
            PhysicalKind::Seek { .. } => "Seek",
            PhysicalKind::ValueScan { .. } => "ValueScan",
            PhysicalKind::Filter { .. } => "Filter",
            PhysicalKind::Evaluation { .. } => "Evaluation",
            PhysicalKind::LimitSkip { .. } => "LimitSkip",
            PhysicalKind::Union { .. } => "Union",
            PhysicalKind::Exchange { .. } => "Exchange",
            PhysicalKind::Root { .. } => "Root",
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            PhysicalKind::PhysicalScan {
                scan_def_name,
                projection,
                rid_projection,
                ..
            } => format!(
                "{} doc={} rid={}",
                scan_def_name,
                projection.as_deref().unwrap_or("-"),
                rid_projection.as_deref().unwrap_or("-")
            ),
            PhysicalKind::IndexScan {
                scan_def_name,
                index_name,
                intervals,
                reversed,
                ..
            } => format!(
                "{}.{} {}{}",
                scan_def_name,
                index_name,
                intervals,
                if *reversed { " reversed" } else { "" }
            ),
            PhysicalKind::Seek {
                scan_def_name,
                projection,
                ..
            } => format!("{} doc={}", scan_def_name, projection),
            PhysicalKind::ValueScan { projection, rows } => {
                format!("[{}] rows={}", projection, rows.len())
            }
            PhysicalKind::Filter { predicate, .. } => {
                let mut vars = BTreeSet::new();
                predicate.collect_variables(&mut vars);
                format!("reads {:?}", vars)
            }
            PhysicalKind::Evaluation { projection, .. } => format!("[{}]", projection),
            PhysicalKind::LimitSkip { limit, skip, .. } => match limit {
                Some(limit) => format!("limit={} skip={}", limit, skip),
                None => format!("skip={}", skip),
            },
            PhysicalKind::Union { projections, children } => {
                format!("[{}] branches={}", projections.join(", "), children.len())
            }
            PhysicalKind::Exchange { distribution, .. } => format!("{:?}", distribution.kind),
            PhysicalKind::Root { projections, .. } => format!("[{}]", projections.join(", ")),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} {} (ce={}, cost={})",
            "",
            self.name(),
            self.describe(),
            self.props.planned_ce,
            self.props.cost,
            indent = depth * 4
        )?;
        for child in self.children() {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PhysicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// A candidate plan returned by the search engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanAndProps {
    pub plan: PhysicalNode,
}

impl PlanAndProps {
    pub fn new(plan: PhysicalNode) -> Self {
        Self { plan }
    }

    /// Properties of the plan's root node
    pub fn props(&self) -> &NodeProps {
        &self.plan.props
    }
}
