//! Explain output for lowered plans
//!
//! Text versions (`v1`, `v2`, `v2compact`) explain the plan as it left the
//! memo; the BSON-style versions explain the winning physical plan.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::errors::{OptimizerError, OptimizerResult};
use crate::plan::PhysicalNode;

/// Explain representation selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExplainVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v2")]
    V2,
    #[serde(rename = "v2compact")]
    V2Compact,
    #[serde(rename = "bson-internal")]
    BsonInternal,
    #[serde(rename = "bson-user-facing")]
    BsonUserFacing,
}

impl ExplainVersion {
    pub fn parse(version: &str) -> OptimizerResult<Self> {
        match version {
            "v1" => Ok(ExplainVersion::V1),
            "v2" => Ok(ExplainVersion::V2),
            "v2compact" => Ok(ExplainVersion::V2Compact),
            "bson-internal" => Ok(ExplainVersion::BsonInternal),
            "bson-user-facing" => Ok(ExplainVersion::BsonUserFacing),
            other => Err(OptimizerError::configuration(format!(
                "unknown explain version '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainVersion::V1 => "v1",
            ExplainVersion::V2 => "v2",
            ExplainVersion::V2Compact => "v2compact",
            ExplainVersion::BsonInternal => "bson-internal",
            ExplainVersion::BsonUserFacing => "bson-user-facing",
        }
    }

    /// Whether this version explains the post-memo plan
    pub fn uses_post_memo_plan(&self) -> bool {
        matches!(
            self,
            ExplainVersion::V1 | ExplainVersion::V2 | ExplainVersion::V2Compact
        )
    }
}

/// Explain output kept with the executable plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainArtifact {
    pub version: ExplainVersion,
    pub rendered: Value,
}

impl ExplainArtifact {
    /// Renders `post_memo` for text versions and `winning` for BSON versions.
    ///
    /// A search engine that reports no post-memo plan is explained with the
    /// winning plan instead.
    pub fn build(
        version: ExplainVersion,
        post_memo: Option<&PhysicalNode>,
        winning: &PhysicalNode,
    ) -> OptimizerResult<Self> {
        let plan = if version.uses_post_memo_plan() {
            post_memo.unwrap_or(winning)
        } else {
            winning
        };
        let rendered = match version {
            ExplainVersion::V1 => Value::String(render_v1(plan)),
            ExplainVersion::V2 => Value::String(plan.to_string()),
            ExplainVersion::V2Compact => Value::String(render_compact(plan)),
            ExplainVersion::BsonInternal => to_value(plan)?,
            ExplainVersion::BsonUserFacing => {
                let mut value = to_value(plan)?;
                strip_props(&mut value);
                value
            }
        };
        Ok(Self { version, rendered })
    }
}

impl fmt::Display for ExplainArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rendered {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{}", other),
        }
    }
}

fn to_value(plan: &PhysicalNode) -> OptimizerResult<Value> {
    serde_json::to_value(plan)
        .map_err(|e| OptimizerError::internal(format!("plan not serializable: {}", e)))
}

fn render_v1(plan: &PhysicalNode) -> String {
    fn walk(node: &PhysicalNode, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(node.name());
        out.push('\n');
        for child in node.children() {
            walk(child, depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(plan, 0, &mut out);
    out
}

fn render_compact(plan: &PhysicalNode) -> String {
    fn walk(node: &PhysicalNode, out: &mut Vec<String>) {
        out.push(node.name().to_string());
        for child in node.children() {
            walk(child, out);
        }
    }
    let mut names = Vec::new();
    walk(plan, &mut names);
    names.join(" -> ")
}

fn strip_props(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("props");
            for child in map.values_mut() {
                strip_props(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_props(item);
            }
        }
        _ => {}
    }
}
