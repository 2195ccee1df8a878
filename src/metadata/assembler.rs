//! Metadata assembler
//!
//! Builds one scan definition for the main collection and one for every
//! other collection the query references, then wraps them in `Metadata`.
//! Missing collections still get a definition (`exists = false`) so that
//! queries over them type-check and plan to an empty scan.

use std::collections::{BTreeMap, BTreeSet};

use super::distribution::DistributionAndPaths;
use super::hint::IndexHint;
use super::scan_def::{scan_options, CollectionIdentity, Metadata, ScanDefinition, ScanOrder, ShardingMetadata};
use crate::catalog::{Catalog, CollectionSnapshot, Namespace};
use crate::config::QueryHints;
use crate::errors::OptimizerResult;
use crate::index::{shard_key_spec, IndexModelBuilder, IndexSpecs};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::plan::PrefixId;

/// Uuid placeholder in the main scan definition name of a missing collection
pub const MISSING_UUID: &str = "<missing_uuid>";

/// Name of the main collection's scan definition: `<coll>_<uuid>`
pub fn scan_def_name(namespace: &Namespace, collection: Option<&CollectionSnapshot>) -> String {
    match collection {
        Some(snapshot) => format!("{}_{}", namespace.coll, snapshot.facts.uuid),
        None => format!("{}_{}", namespace.coll, MISSING_UUID),
    }
}

/// Assembles the metadata snapshot of one optimization run
pub struct MetadataAssembler<'a> {
    catalog: &'a dyn Catalog,
    hint: Option<&'a IndexHint>,
    number_of_partitions: usize,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> MetadataAssembler<'a> {
    pub fn new(catalog: &'a dyn Catalog, number_of_partitions: usize) -> Self {
        Self {
            catalog,
            hint: None,
            number_of_partitions,
            metrics: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<&'a IndexHint>) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the metadata for `namespace` plus every involved collection.
    ///
    /// Secondary scan projections are drawn from `prefix_id` in namespace
    /// order. `hints.disable_scan` may be overwritten by the index hint.
    pub fn populate(
        &self,
        namespace: &Namespace,
        scan_def_name: &str,
        scan_projection: &str,
        involved: &BTreeSet<Namespace>,
        hints: &mut QueryHints,
        prefix_id: &mut PrefixId,
    ) -> OptimizerResult<Metadata> {
        let mut scan_defs = BTreeMap::new();
        let main = self.main_scan_def(namespace, scan_projection, hints)?;
        scan_defs.insert(scan_def_name.to_string(), main);

        for secondary in involved.iter().filter(|ns| *ns != namespace) {
            let projection = prefix_id.next_id("scan");
            let definition = self.secondary_scan_def(secondary, &projection, hints)?;
            scan_defs.insert(secondary.coll.clone(), definition);
        }

        let metadata = Metadata::new(scan_defs, self.number_of_partitions);
        log_event_with_fields(
            Event::MetadataBuilt,
            &[
                ("namespace", namespace.to_string().as_str()),
                ("scan_defs", metadata.scan_defs.len().to_string().as_str()),
                ("partitions", self.number_of_partitions.to_string().as_str()),
            ],
        );
        Ok(metadata)
    }

    fn main_scan_def(
        &self,
        namespace: &Namespace,
        scan_projection: &str,
        hints: &mut QueryHints,
    ) -> OptimizerResult<ScanDefinition> {
        let distribution = DistributionAndPaths::from_partitions(self.number_of_partitions);
        let scan_order = if self.hint.map_or(false, IndexHint::is_reverse_natural) {
            ScanOrder::Reverse
        } else {
            ScanOrder::Forward
        };
        let snapshot = match self.catalog.collection(namespace) {
            Some(snapshot) => snapshot,
            None => {
                let mut missing = ScanDefinition::missing(namespace.clone(), distribution);
                missing.sharding = Some(ShardingMetadata::unsharded());
                missing.scan_order = scan_order;
                return Ok(missing);
            }
        };

        let specs = self.index_specs(snapshot, scan_projection, hints)?;
        let facts = &snapshot.facts;
        let shard_key = match (&facts.shard_key_pattern, facts.is_sharded) {
            (Some(pattern), true) => shard_key_spec(pattern)?,
            _ => Vec::new(),
        };

        Ok(ScanDefinition {
            options: scan_options(namespace),
            identity: CollectionIdentity {
                namespace: namespace.clone(),
                uuid: Some(facts.uuid),
            },
            index_defs: specs.indexes,
            multikeyness: specs.multikeyness,
            distribution,
            exists: true,
            estimated_row_count: Some(facts.record_count as f64),
            sharding: Some(ShardingMetadata::new(shard_key, facts.is_sharded)),
            scan_order,
        })
    }

    /// Secondary collections scan forward and carry no sharding facts
    fn secondary_scan_def(
        &self,
        namespace: &Namespace,
        scan_projection: &str,
        hints: &mut QueryHints,
    ) -> OptimizerResult<ScanDefinition> {
        let distribution = DistributionAndPaths::from_partitions(self.number_of_partitions);
        let snapshot = match self.catalog.collection(namespace) {
            Some(snapshot) => snapshot,
            None => return Ok(ScanDefinition::missing(namespace.clone(), distribution)),
        };

        let specs = self.index_specs(snapshot, scan_projection, hints)?;
        Ok(ScanDefinition {
            options: scan_options(namespace),
            identity: CollectionIdentity {
                namespace: namespace.clone(),
                uuid: Some(snapshot.facts.uuid),
            },
            index_defs: specs.indexes,
            multikeyness: specs.multikeyness,
            distribution,
            exists: true,
            estimated_row_count: Some(snapshot.facts.record_count as f64),
            sharding: None,
            scan_order: ScanOrder::Forward,
        })
    }

    fn index_specs(
        &self,
        snapshot: &CollectionSnapshot,
        scan_projection: &str,
        hints: &mut QueryHints,
    ) -> OptimizerResult<IndexSpecs> {
        let specs = IndexModelBuilder::new(scan_projection, hints.disable_indexes)
            .with_hint(self.hint)
            .build(&snapshot.indexes, &mut hints.disable_scan)?;
        if let Some(metrics) = self.metrics {
            metrics.add_indexes_modeled(specs.indexes.len() as u64);
            metrics.add_indexes_skipped(specs.skipped as u64);
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CollectionFacts, InMemoryCatalog, IndexDescriptor, KeyPattern};
    use crate::index::CollationOp;
    use crate::metadata::DistributionType;
    use serde_json::json;
    use uuid::Uuid;

    fn catalog() -> InMemoryCatalog {
        let uuid = Uuid::parse_str("6d1f0b7e-2c4a-4e8e-9a63-0f6f4b0c1a11").unwrap();
        let index = IndexDescriptor::new("x_1_y_-1", KeyPattern::from_json(&json!({"x": 1, "y": -1})).unwrap());
        InMemoryCatalog::new().with_collection(
            Namespace::new("test", "items"),
            CollectionSnapshot::new(CollectionFacts::new(uuid, 500)).with_index(index),
        )
    }

    fn populate(
        catalog: &InMemoryCatalog,
        hint: Option<&IndexHint>,
        involved: &BTreeSet<Namespace>,
        partitions: usize,
    ) -> Metadata {
        let ns = Namespace::new("test", "items");
        let name = scan_def_name(&ns, catalog.collection(&ns));
        let mut hints = QueryHints::default();
        let mut prefix_id = PrefixId::new(true);
        let projection = prefix_id.next_id("scan");
        MetadataAssembler::new(catalog, partitions)
            .with_hint(hint)
            .populate(&ns, &name, &projection, involved, &mut hints, &mut prefix_id)
            .unwrap()
    }

    #[test]
    fn test_scan_def_name() {
        let catalog = catalog();
        let ns = Namespace::new("test", "items");
        assert_eq!(
            scan_def_name(&ns, catalog.collection(&ns)),
            "items_6d1f0b7e-2c4a-4e8e-9a63-0f6f4b0c1a11"
        );
        let missing = Namespace::new("test", "nope");
        assert_eq!(scan_def_name(&missing, None), "nope_<missing_uuid>");
    }

    #[test]
    fn test_main_collection() {
        let metadata = populate(&catalog(), None, &BTreeSet::new(), 1);
        assert_eq!(metadata.scan_defs.len(), 1);
        let def = metadata.scan_defs.values().next().unwrap();
        assert!(def.exists);
        assert_eq!(def.estimated_row_count, Some(500.0));
        assert_eq!(def.scan_order, ScanOrder::Forward);
        assert_eq!(def.distribution.kind, DistributionType::Centralized);
        let index = &def.index_defs["x_1_y_-1"];
        let ops: Vec<CollationOp> = index.collation_spec.iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![CollationOp::Ascending, CollationOp::Descending]);
        assert!(!def.sharding.as_ref().unwrap().is_sharded);
    }

    #[test]
    fn test_reverse_natural_hint() {
        let hint = IndexHint::Natural { direction: json!(-1) };
        let metadata = populate(&catalog(), Some(&hint), &BTreeSet::new(), 4);
        let def = metadata.scan_defs.values().next().unwrap();
        assert_eq!(def.scan_order, ScanOrder::Reverse);
        assert!(def.index_defs.is_empty());
        assert_eq!(def.distribution.kind, DistributionType::UnknownPartitioning);
        assert!(metadata.is_parallel_execution());
    }

    #[test]
    fn test_missing_primary_honors_reverse_natural_hint() {
        let hint = IndexHint::Natural { direction: json!(-1) };
        let metadata = populate(&InMemoryCatalog::new(), Some(&hint), &BTreeSet::new(), 1);
        let def = metadata.scan_defs.values().next().unwrap();
        assert!(!def.exists);
        assert_eq!(def.scan_order, ScanOrder::Reverse);
        assert_eq!(def.sharding, Some(ShardingMetadata::unsharded()));
        assert_eq!(def.estimated_row_count, None);
    }

    #[test]
    fn test_missing_secondary_collection() {
        let mut involved = BTreeSet::new();
        involved.insert(Namespace::new("test", "orders"));
        let metadata = populate(&catalog(), None, &involved, 1);

        let orders = metadata.scan_def("orders").unwrap();
        assert!(!orders.exists);
        assert!(orders.index_defs.is_empty());
        assert!(orders.multikeyness.is_empty());
        assert_eq!(orders.estimated_row_count, None);
        assert_eq!(orders.scan_order, ScanOrder::Forward);
    }

    #[test]
    fn test_sharded_main_collection() {
        let uuid = Uuid::new_v4();
        let shard_key = KeyPattern::from_json(&json!({"a": 1, "b": "hashed"})).unwrap();
        let catalog = InMemoryCatalog::new().with_collection(
            Namespace::new("test", "items"),
            CollectionSnapshot::new(CollectionFacts::new(uuid, 10).sharded(shard_key)),
        );
        let metadata = populate(&catalog, None, &BTreeSet::new(), 1);
        let def = metadata.scan_defs.values().next().unwrap();
        let sharding = def.sharding.as_ref().unwrap();
        assert!(sharding.is_sharded);
        assert!(def.needs_shard_filter());
        let fields: Vec<(String, CollationOp)> = sharding
            .shard_key
            .iter()
            .map(|e| (e.path.to_string(), e.op))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("Get [a] Id".to_string(), CollationOp::Ascending),
                ("Get [b] Id".to_string(), CollationOp::Clustered),
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let catalog = catalog();
        let a = populate(&catalog, None, &BTreeSet::new(), 1);
        let b = populate(&catalog, None, &BTreeSet::new(), 1);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
