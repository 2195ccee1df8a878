//! Raw index descriptors as supplied by the catalog
//!
//! These are read-only inputs; the index model builder turns them into
//! optimizer-facing index definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{OptimizerError, OptimizerResult};

/// Ordered key pattern, e.g. `{a: 1, b: -1}` or `{c: "hashed"}`.
///
/// Field order is significant and preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct KeyPattern {
    elements: Vec<(String, Value)>,
}

impl KeyPattern {
    /// Builds a key pattern from `(field, spec)` pairs
    pub fn new(elements: Vec<(String, Value)>) -> Self {
        Self { elements }
    }

    /// Parses a key pattern from a JSON object
    pub fn from_json(value: &Value) -> OptimizerResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| OptimizerError::bad_value("key pattern must be an object"))?;
        if object.is_empty() {
            return Err(OptimizerError::bad_value("key pattern cannot be empty"));
        }
        Ok(Self {
            elements: object.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    /// Returns the `(field, spec)` pairs in key order
    pub fn elements(&self) -> &[(String, Value)] {
        &self.elements
    }

    /// Number of key components
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when the pattern has no components
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Order-sensitive equality where numeric specs compare by value
    /// (`{a: 1}` equals `{a: 1.0}`).
    pub fn same_as(&self, other: &KeyPattern) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|((lf, lv), (rf, rv))| lf == rf && spec_equal(lv, rv))
    }

    /// Converts back to a JSON object
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (field, spec) in &self.elements {
            map.insert(field.clone(), spec.clone());
        }
        Value::Object(map)
    }
}

fn spec_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

impl TryFrom<Value> for KeyPattern {
    type Error = OptimizerError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        KeyPattern::from_json(&value)
    }
}

impl From<KeyPattern> for Value {
    fn from(pattern: KeyPattern) -> Self {
        pattern.to_json()
    }
}

/// Physical index type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    BTree,
    Hashed,
    Text,
    Geo2d,
    Geo2dSphere,
    Wildcard,
}

impl IndexType {
    /// Infers the index type from the special string values of a key pattern
    pub fn infer(pattern: &KeyPattern) -> Self {
        for (_, spec) in pattern.elements() {
            match spec.as_str() {
                Some("hashed") => return IndexType::Hashed,
                Some("text") => return IndexType::Text,
                Some("2d") => return IndexType::Geo2d,
                Some("2dsphere") => return IndexType::Geo2dSphere,
                _ => {}
            }
        }
        IndexType::BTree
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::BTree => "btree",
            IndexType::Hashed => "hashed",
            IndexType::Text => "text",
            IndexType::Geo2d => "2d",
            IndexType::Geo2dSphere => "2dsphere",
            IndexType::Wildcard => "wildcard",
        }
    }
}

/// Catalog index descriptor plus its multikey state
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawIndexDescriptor")]
pub struct IndexDescriptor {
    /// Index name, unique within a collection
    pub name: String,
    /// Key pattern
    pub key_pattern: KeyPattern,
    /// Hidden indexes are never planned
    pub hidden: bool,
    /// Sparse index
    pub sparse: bool,
    /// Hashed `_id` index
    pub hashed_id: bool,
    /// Partial filter expression, if the index is partial
    pub partial_filter: Option<Value>,
    /// Non-default collation spec
    pub collation: Option<Value>,
    /// TTL expiry
    pub expire_after_seconds: Option<i64>,
    /// On-disk index version (1-based)
    pub version: i32,
    /// Physical index type
    pub index_type: IndexType,
    /// Whether any key of this index has been multikey
    pub multikey: bool,
    /// Per key component, the path positions known to be arrays
    pub multikey_paths: Vec<BTreeSet<usize>>,
}

impl IndexDescriptor {
    /// Creates a plain, non-multikey, ready B-tree style descriptor
    pub fn new(name: impl Into<String>, key_pattern: KeyPattern) -> Self {
        let index_type = IndexType::infer(&key_pattern);
        let multikey_paths = vec![BTreeSet::new(); key_pattern.len()];
        Self {
            name: name.into(),
            key_pattern,
            hidden: false,
            sparse: false,
            hashed_id: false,
            partial_filter: None,
            collation: None,
            expire_after_seconds: None,
            version: 2,
            index_type,
            multikey: false,
            multikey_paths,
        }
    }

    /// Marks the index multikey with the given per-component path positions
    pub fn with_multikey_paths(mut self, paths: Vec<BTreeSet<usize>>) -> Self {
        self.multikey = paths.iter().any(|p| !p.is_empty());
        self.multikey_paths = paths;
        self
    }

    /// Sets the partial filter expression
    pub fn with_partial_filter(mut self, filter: Value) -> Self {
        self.partial_filter = Some(filter);
        self
    }

    /// Returns true if the index is partial
    pub fn is_partial(&self) -> bool {
        self.partial_filter.is_some()
    }

    /// Returns true if the index has a non-default collation
    pub fn has_collation(&self) -> bool {
        match &self.collation {
            None => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }

    /// Reason this index cannot be modeled at all, if any
    pub fn unsupported_reason(&self) -> Option<&'static str> {
        if self.expire_after_seconds.is_some() {
            Some("TTL index")
        } else if self.sparse {
            Some("sparse index")
        } else if self.index_type != IndexType::BTree {
            Some("non-btree index type")
        } else if self.has_collation() {
            Some("index with non-simple collation")
        } else {
            None
        }
    }
}

/// Wire shape accepted from JSON catalog fixtures
#[derive(Debug, Deserialize)]
struct RawIndexDescriptor {
    name: String,
    key: KeyPattern,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    sparse: bool,
    #[serde(default)]
    hashed_id: bool,
    #[serde(default)]
    partial_filter_expression: Option<Value>,
    #[serde(default)]
    collation: Option<Value>,
    #[serde(default)]
    expire_after_seconds: Option<i64>,
    #[serde(default = "default_index_version")]
    v: i32,
    #[serde(default)]
    index_type: Option<IndexType>,
    #[serde(default)]
    multikey_paths: Option<Vec<BTreeSet<usize>>>,
}

fn default_index_version() -> i32 {
    2
}

impl From<RawIndexDescriptor> for IndexDescriptor {
    fn from(raw: RawIndexDescriptor) -> Self {
        let index_type = raw.index_type.unwrap_or_else(|| IndexType::infer(&raw.key));
        let multikey_paths = raw
            .multikey_paths
            .unwrap_or_else(|| vec![BTreeSet::new(); raw.key.len()]);
        Self {
            name: raw.name,
            hidden: raw.hidden,
            sparse: raw.sparse,
            hashed_id: raw.hashed_id,
            partial_filter: raw.partial_filter_expression,
            collation: raw.collation,
            expire_after_seconds: raw.expire_after_seconds,
            version: raw.v,
            index_type,
            multikey: multikey_paths.iter().any(|p| !p.is_empty()),
            multikey_paths,
            key_pattern: raw.key,
        }
    }
}
