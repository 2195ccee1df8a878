//! Scan definitions and the per-query metadata snapshot

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::distribution::DistributionAndPaths;
use crate::catalog::Namespace;
use crate::errors::{OptimizerError, OptimizerResult};
use crate::index::{IndexCollationSpec, IndexDefinition};
use crate::path::MultikeynessTrie;

/// Option key naming the scan type
pub const SCAN_TYPE_OPTION: &str = "type";
/// Option key naming the database
pub const DATABASE_OPTION: &str = "database";
/// Option key naming the collection
pub const COLLECTION_OPTION: &str = "collection";

/// Physical iteration order of a collection scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    Forward,
    Reverse,
    /// Random order, used for sampling
    Random,
}

/// Sharding facts of the primary collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardingMetadata {
    /// Shard key components as non-traversing paths
    pub shard_key: IndexCollationSpec,
    pub is_sharded: bool,
    /// Whether a scan may see orphan documents and needs shard filtering
    pub may_contain_orphans: bool,
}

impl ShardingMetadata {
    pub fn new(shard_key: IndexCollationSpec, is_sharded: bool) -> Self {
        Self {
            shard_key,
            is_sharded,
            may_contain_orphans: is_sharded,
        }
    }

    pub fn unsharded() -> Self {
        Self::new(Vec::new(), false)
    }
}

/// Namespace plus catalog id; the id is absent for a missing collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionIdentity {
    pub namespace: Namespace,
    pub uuid: Option<Uuid>,
}

/// Everything the search engine knows about one scannable collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanDefinition {
    pub options: BTreeMap<String, String>,
    pub identity: CollectionIdentity,
    pub index_defs: BTreeMap<String, IndexDefinition>,
    pub multikeyness: MultikeynessTrie,
    pub distribution: DistributionAndPaths,
    pub exists: bool,
    pub estimated_row_count: Option<f64>,
    pub sharding: Option<ShardingMetadata>,
    pub scan_order: ScanOrder,
}

impl ScanDefinition {
    /// Definition for a collection that does not exist
    pub fn missing(namespace: Namespace, distribution: DistributionAndPaths) -> Self {
        Self {
            options: scan_options(&namespace),
            identity: CollectionIdentity {
                namespace,
                uuid: None,
            },
            index_defs: BTreeMap::new(),
            multikeyness: MultikeynessTrie::new(),
            distribution,
            exists: false,
            estimated_row_count: None,
            sharding: None,
            scan_order: ScanOrder::Forward,
        }
    }

    /// True when the scan may return orphans that must be filtered
    pub fn needs_shard_filter(&self) -> bool {
        self.sharding
            .as_ref()
            .map_or(false, |s| s.is_sharded && s.may_contain_orphans)
    }
}

/// Options every scan definition carries
pub fn scan_options(namespace: &Namespace) -> BTreeMap<String, String> {
    let mut options = BTreeMap::new();
    options.insert(SCAN_TYPE_OPTION.to_string(), "local".to_string());
    options.insert(DATABASE_OPTION.to_string(), namespace.db.clone());
    options.insert(COLLECTION_OPTION.to_string(), namespace.coll.clone());
    options
}

/// Read-only snapshot for one optimization run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub scan_defs: BTreeMap<String, ScanDefinition>,
    pub number_of_partitions: usize,
}

impl Metadata {
    pub fn new(scan_defs: BTreeMap<String, ScanDefinition>, number_of_partitions: usize) -> Self {
        Self {
            scan_defs,
            number_of_partitions,
        }
    }

    /// More than one partition means cross-partition parallel execution
    pub fn is_parallel_execution(&self) -> bool {
        self.number_of_partitions > 1
    }

    pub fn scan_def(&self, name: &str) -> Option<&ScanDefinition> {
        self.scan_defs.get(name)
    }

    /// Canonical JSON encoding
    pub fn to_json(&self) -> OptimizerResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| OptimizerError::internal(format!("metadata not serializable: {}", e)))
    }

    /// SHA-256 of the canonical JSON encoding, hex encoded
    pub fn fingerprint(&self) -> OptimizerResult<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| OptimizerError::internal(format!("metadata not serializable: {}", e)))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
