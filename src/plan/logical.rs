//! Logical plan handed to the search engine

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::path::PathExpr;
use crate::requirement::{FilterExpr, Requirement};

/// Abstract plan node before search.
///
/// Every node except `Root` produces at least one projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum LogicalNode {
    /// Full scan of a scan definition binding each document to `projection`
    Scan {
        projection: String,
        scan_def_name: String,
    },
    /// Inline rows bound to `projection`; empty for a missing collection
    ValueScan {
        projection: String,
        rows: Vec<Value>,
    },
    /// Keeps rows whose `projection` satisfies `filter`
    Filter {
        projection: String,
        filter: FilterExpr,
        child: Box<LogicalNode>,
    },
    /// Interval requirement over paths of known projections
    Sargable {
        requirement: Requirement,
        scan_projection: String,
        child: Box<LogicalNode>,
    },
    /// Binds `path` of `source` to a new `projection`
    Evaluation {
        projection: String,
        source: String,
        path: PathExpr,
        child: Box<LogicalNode>,
    },
    LimitSkip {
        limit: Option<u64>,
        skip: u64,
        child: Box<LogicalNode>,
    },
    /// Output projections of the whole query
    Root {
        projections: Vec<String>,
        child: Box<LogicalNode>,
    },
}

impl LogicalNode {
    /// Initial plan over the main collection: a scan when it exists,
    /// otherwise an empty value scan with the same projection.
    pub fn initial(scan_projection: &str, scan_def_name: &str, collection_exists: bool) -> Self {
        let scan = if collection_exists {
            LogicalNode::Scan {
                projection: scan_projection.to_string(),
                scan_def_name: scan_def_name.to_string(),
            }
        } else {
            LogicalNode::ValueScan {
                projection: scan_projection.to_string(),
                rows: Vec::new(),
            }
        };
        LogicalNode::Root {
            projections: vec![scan_projection.to_string()],
            child: Box::new(scan),
        }
    }

    /// Returns the child of a unary node
    pub fn child(&self) -> Option<&LogicalNode> {
        match self {
            LogicalNode::Scan { .. } | LogicalNode::ValueScan { .. } => None,
            LogicalNode::Filter { child, .. }
            | LogicalNode::Sargable { child, .. }
            | LogicalNode::Evaluation { child, .. }
            | LogicalNode::LimitSkip { child, .. }
            | LogicalNode::Root { child, .. } => Some(child),
        }
    }

    /// Name of the scan definition at the leaf, if the leaf is a scan
    pub fn scan_def_name(&self) -> Option<&str> {
        match self {
            LogicalNode::Scan { scan_def_name, .. } => Some(scan_def_name),
            other => other.child().and_then(LogicalNode::scan_def_name),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LogicalNode::Scan { .. } => "Scan",
            LogicalNode::ValueScan { .. } => "ValueScan",
            LogicalNode::Filter { .. } => "Filter",
            LogicalNode::Sargable { .. } => "Sargable",
            LogicalNode::Evaluation { .. } => "Evaluation",
            LogicalNode::LimitSkip { .. } => "LimitSkip",
            LogicalNode::Root { .. } => "Root",
        }
    }
}

impl fmt::Display for LogicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut node = Some(self);
        let mut depth = 0;
        while let Some(current) = node {
            write!(f, "{:indent$}{}", "", current.name(), indent = depth * 4)?;
            match current {
                LogicalNode::Scan {
                    projection,
                    scan_def_name,
                } => write!(f, " [{}] {}", projection, scan_def_name)?,
                LogicalNode::ValueScan { projection, rows } => {
                    write!(f, " [{}] rows={}", projection, rows.len())?
                }
                LogicalNode::Filter { projection, filter, .. } => {
                    write!(f, " [{}] {}", projection, filter.to_json())?
                }
                LogicalNode::Sargable { requirement, .. } => write!(f, " {}", requirement)?,
                LogicalNode::Evaluation {
                    projection,
                    source,
                    path,
                    ..
                } => write!(f, " [{}] {}: {}", projection, source, path)?,
                LogicalNode::LimitSkip { limit, skip, .. } => match limit {
                    Some(limit) => write!(f, " limit={} skip={}", limit, skip)?,
                    None => write!(f, " skip={}", skip)?,
                },
                LogicalNode::Root { projections, .. } => write!(f, " [{}]", projections.join(", "))?,
            }
            writeln!(f)?;
            node = current.child();
            depth += 1;
        }
        Ok(())
    }
}
