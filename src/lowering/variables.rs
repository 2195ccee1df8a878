//! Variable environment of a physical plan

use std::collections::BTreeSet;

use crate::errors::{OptimizerError, OptimizerResult};
use crate::plan::{PhysicalKind, PhysicalNode};

/// Projections defined by a plan, checked for free variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableEnvironment {
    defined: BTreeSet<String>,
}

impl VariableEnvironment {
    /// Walks the plan; every projection a node reads must be defined below it
    pub fn build(plan: &PhysicalNode) -> OptimizerResult<Self> {
        let defined = visible(plan)?;
        Ok(Self {
            defined: defined.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn is_defined(&self, projection: &str) -> bool {
        self.defined.contains(projection)
    }

    pub fn defined(&self) -> impl Iterator<Item = &str> {
        self.defined.iter().map(String::as_str)
    }
}

/// Projections visible above `node`
fn visible(node: &PhysicalNode) -> OptimizerResult<BTreeSet<&str>> {
    let mut below = BTreeSet::new();
    if let PhysicalKind::Union {
        projections,
        children,
    } = &node.kind
    {
        for child in children {
            let child_visible = visible(child)?;
            if let Some(missing) = projections.iter().find(|p| !child_visible.contains(p.as_str())) {
                return Err(free_variable(missing, node));
            }
        }
    } else {
        for child in node.children() {
            below.extend(visible(child)?);
        }
    }

    if let Some(missing) = node.local_references().into_iter().find(|r| !below.contains(r)) {
        return Err(free_variable(missing, node));
    }

    below.extend(node.local_definitions());
    Ok(below)
}

fn free_variable(name: &str, node: &PhysicalNode) -> OptimizerError {
    OptimizerError::internal("free variable")
        .with_context(format!("'{}' referenced by {} is not defined below it", name, node.name()))
}
