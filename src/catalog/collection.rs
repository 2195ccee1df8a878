//! Collection facts and the read-only catalog interface

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::descriptor::{IndexDescriptor, KeyPattern};
use crate::errors::{OptimizerError, OptimizerResult};

/// Database + collection name
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Namespace {
    pub db: String,
    pub coll: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    /// Parses `db.coll`; the collection part may itself contain dots
    pub fn parse(full: &str) -> OptimizerResult<Self> {
        match full.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(OptimizerError::bad_value(format!(
                "invalid namespace '{}', expected <db>.<collection>",
                full
            ))),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// Point-in-time facts about an existing collection
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectionFacts {
    pub uuid: Uuid,
    #[serde(default)]
    pub record_count: u64,
    #[serde(default)]
    pub is_sharded: bool,
    #[serde(default)]
    pub shard_key_pattern: Option<KeyPattern>,
    #[serde(default)]
    pub is_clustered: bool,
    #[serde(default)]
    pub is_capped: bool,
    #[serde(default)]
    pub has_timeseries_options: bool,
    #[serde(default)]
    pub default_collation: Option<Value>,
}

impl CollectionFacts {
    /// Facts for a plain unsharded collection
    pub fn new(uuid: Uuid, record_count: u64) -> Self {
        Self {
            uuid,
            record_count,
            is_sharded: false,
            shard_key_pattern: None,
            is_clustered: false,
            is_capped: false,
            has_timeseries_options: false,
            default_collation: None,
        }
    }

    /// Marks the collection sharded on the given key pattern
    pub fn sharded(mut self, shard_key: KeyPattern) -> Self {
        self.is_sharded = true;
        self.shard_key_pattern = Some(shard_key);
        self
    }

    /// Returns true if the collection declares a default collation
    pub fn has_default_collation(&self) -> bool {
        match &self.default_collation {
            None => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }
}

/// Snapshot of one collection: its facts and ready index descriptors
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectionSnapshot {
    pub facts: CollectionFacts,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

impl CollectionSnapshot {
    pub fn new(facts: CollectionFacts) -> Self {
        Self {
            facts,
            indexes: Vec::new(),
        }
    }

    /// Adds a ready index
    pub fn with_index(mut self, descriptor: IndexDescriptor) -> Self {
        self.indexes.push(descriptor);
        self
    }
}

/// Read-only catalog access for the duration of one optimization run
pub trait Catalog {
    /// Returns the collection snapshot, or `None` if the collection does not exist
    fn collection(&self, namespace: &Namespace) -> Option<&CollectionSnapshot>;
}

/// Catalog held entirely in memory, keyed by namespace
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, CollectionSnapshot>")]
pub struct InMemoryCatalog {
    collections: BTreeMap<Namespace, CollectionSnapshot>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a collection
    pub fn insert(&mut self, namespace: Namespace, snapshot: CollectionSnapshot) {
        self.collections.insert(namespace, snapshot);
    }

    /// Builder-style insert
    pub fn with_collection(mut self, namespace: Namespace, snapshot: CollectionSnapshot) -> Self {
        self.insert(namespace, snapshot);
        self
    }

    /// Number of registered collections
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn collection(&self, namespace: &Namespace) -> Option<&CollectionSnapshot> {
        self.collections.get(namespace)
    }
}

impl TryFrom<BTreeMap<String, CollectionSnapshot>> for InMemoryCatalog {
    type Error = OptimizerError;

    fn try_from(raw: BTreeMap<String, CollectionSnapshot>) -> Result<Self, Self::Error> {
        let mut catalog = InMemoryCatalog::new();
        for (name, snapshot) in raw {
            catalog.insert(Namespace::parse(&name)?, snapshot);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_parse() {
        let ns = Namespace::parse("shop.orders.archive").unwrap();
        assert_eq!(ns.db, "shop");
        assert_eq!(ns.coll, "orders.archive");
        assert_eq!(ns.to_string(), "shop.orders.archive");

        assert!(Namespace::parse("nodot").is_err());
        assert!(Namespace::parse(".coll").is_err());
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog: InMemoryCatalog = serde_json::from_value(json!({
            "shop.orders": {
                "facts": {
                    "uuid": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                    "record_count": 42
                },
                "indexes": [{"name": "x_1", "key": {"x": 1}}]
            }
        }))
        .unwrap();

        let snapshot = catalog
            .collection(&Namespace::new("shop", "orders"))
            .unwrap();
        assert_eq!(snapshot.facts.record_count, 42);
        assert_eq!(snapshot.indexes.len(), 1);
        assert!(catalog.collection(&Namespace::new("shop", "missing")).is_none());
    }

    #[test]
    fn test_default_collation_detection() {
        let mut facts = CollectionFacts::new(Uuid::nil(), 0);
        assert!(!facts.has_default_collation());
        facts.default_collation = Some(json!({"locale": "en"}));
        assert!(facts.has_default_collation());
    }
}
