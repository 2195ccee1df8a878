//! Shard filtering capability

use serde::Serialize;

use crate::catalog::Namespace;
use crate::errors::OptimizerResult;

/// Ownership filter for one sharded collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardFilter {
    pub namespace: Namespace,
    /// Shard key field paths in key order
    pub shard_key_fields: Vec<String>,
}

impl ShardFilter {
    pub fn new(namespace: Namespace, shard_key_fields: Vec<String>) -> Self {
        Self {
            namespace,
            shard_key_fields,
        }
    }
}

/// Source of shard filters; consulted once per assembly
pub trait ShardFilterProvider {
    fn shard_filter(&self, namespace: &Namespace) -> OptimizerResult<ShardFilter>;
}
