//! Index model builder
//!
//! Turns the catalog's index descriptors for one collection into index
//! definitions plus the collection-wide multikeyness trie.
//!
//! Per descriptor, in order:
//! 1. hidden indexes and the hashed `_id` index are skipped
//! 2. unsupported indexes fail the run, unless a `$natural` hint is active
//! 3. a hint marks non-matching indexes as excluded (still inspected)
//! 4. wildcard components and non-±1 directions skip the index
//! 5. paths get a `Traverse` at every multikey position of this index
//! 6. partial filters become requirements; they must translate exactly
//! 7. only non-partial indexes feed the multikeyness trie
//! 8. excluded indexes, or all indexes under `$natural`, are not returned

use std::collections::BTreeMap;

use serde::Serialize;

use super::definition::{
    reverse_field_mask, CollationOp, IndexCollationEntry, IndexDefinition, MAX_INDEX_FIELDS,
};
use crate::catalog::{IndexDescriptor, KeyPattern};
use crate::config::DisableIndexOptions;
use crate::errors::{OptimizerError, OptimizerResult};
use crate::metadata::{DistributionAndPaths, IndexHint};
use crate::observability::{log_event_with_fields, Event};
use crate::path::{FieldPath, MultikeynessTrie, PathExpr};
use crate::requirement::{convert_to_requirement, FilterExpr, Requirement, ROOT_PROJECTION};

/// Output of the builder for one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexSpecs {
    pub indexes: BTreeMap<String, IndexDefinition>,
    pub multikeyness: MultikeynessTrie,
    /// Descriptors that were not modeled at all
    #[serde(skip)]
    pub skipped: usize,
}

/// Builds index specs for one collection
pub struct IndexModelBuilder<'a> {
    scan_projection: &'a str,
    hint: Option<&'a IndexHint>,
    disable: DisableIndexOptions,
}

impl<'a> IndexModelBuilder<'a> {
    /// `scan_projection` is the projection partial requirements are bound to
    pub fn new(scan_projection: &'a str, disable: DisableIndexOptions) -> Self {
        Self {
            scan_projection,
            hint: None,
            disable,
        }
    }

    pub fn with_hint(mut self, hint: Option<&'a IndexHint>) -> Self {
        self.hint = hint;
        self
    }

    /// Builds the index map and trie.
    ///
    /// When a hint is present, `disable_scan` is overwritten: a `$natural`
    /// hint allows the collection scan, any other hint forbids it.
    pub fn build(
        &self,
        descriptors: &[IndexDescriptor],
        disable_scan: &mut bool,
    ) -> OptimizerResult<IndexSpecs> {
        let mut specs = IndexSpecs::default();
        if self.disable == DisableIndexOptions::DisableAll {
            return Ok(specs);
        }

        let has_natural_hint = self.hint.map_or(false, IndexHint::is_natural);
        if self.hint.is_some() {
            *disable_scan = !has_natural_hint;
        }

        for descriptor in descriptors {
            match self.model_index(descriptor, has_natural_hint)? {
                Modeled::Skipped(reason) => {
                    specs.skipped += 1;
                    log_event_with_fields(
                        Event::IndexSkipped,
                        &[("index", descriptor.name.as_str()), ("reason", reason)],
                    );
                }
                Modeled::Built { definition, excluded } => {
                    if definition.partial_requirement.is_noop() {
                        for entry in &definition.collation_spec {
                            specs.multikeyness.add(&entry.path);
                        }
                    }
                    if !excluded && !has_natural_hint {
                        log_event_with_fields(
                            Event::IndexModeled,
                            &[("index", descriptor.name.as_str())],
                        );
                        specs.indexes.insert(descriptor.name.clone(), definition);
                    }
                }
            }
        }

        specs.multikeyness.clear_root();
        Ok(specs)
    }

    fn model_index(
        &self,
        descriptor: &IndexDescriptor,
        has_natural_hint: bool,
    ) -> OptimizerResult<Modeled> {
        if descriptor.hidden {
            return Ok(Modeled::Skipped("hidden"));
        }
        if descriptor.hashed_id {
            return Ok(Modeled::Skipped("hashed _id index"));
        }
        if let Some(reason) = descriptor.unsupported_reason() {
            if has_natural_hint {
                return Ok(Modeled::Skipped(reason));
            }
            return Err(OptimizerError::unsupported("Unsupported index type")
                .with_context(format!("index {}: {}", descriptor.name, reason)));
        }

        let excluded = self
            .hint
            .map_or(false, |h| !h.is_natural() && !h.matches_index(&descriptor.name, &descriptor.key_pattern));

        if descriptor.multikey_paths.is_empty() {
            return Err(OptimizerError::internal("Multikey paths cannot be empty.")
                .with_context(format!("index {}", descriptor.name)));
        }
        if descriptor.key_pattern.len() > MAX_INDEX_FIELDS {
            return Err(OptimizerError::unsupported(format!(
                "index with more than {} key components",
                MAX_INDEX_FIELDS
            ))
            .with_context(format!("index {}", descriptor.name)));
        }

        let collation_spec = match self.collation_spec(descriptor)? {
            Some(spec) => spec,
            None => return Ok(Modeled::Skipped("wildcard component or invalid key direction")),
        };

        let partial_requirement = match self.partial_requirement(descriptor)? {
            Some(requirement) => requirement,
            None => return Ok(Modeled::Skipped("partial filter has no requirement form")),
        };

        let ops: Vec<CollationOp> = collation_spec.iter().map(|e| e.op).collect();
        let definition = IndexDefinition {
            reverse_field_mask: reverse_field_mask(&ops),
            collation_spec,
            version: i64::from(descriptor.version) - 1,
            is_multikey: descriptor.multikey,
            distribution: DistributionAndPaths::centralized(),
            partial_requirement,
        };
        Ok(Modeled::Built {
            definition,
            excluded,
        })
    }

    /// `None` when the key pattern cannot be modeled
    fn collation_spec(
        &self,
        descriptor: &IndexDescriptor,
    ) -> OptimizerResult<Option<Vec<IndexCollationEntry>>> {
        let mut spec = Vec::with_capacity(descriptor.key_pattern.len());
        for (position, (field, direction)) in descriptor.key_pattern.elements().iter().enumerate() {
            let field_path = FieldPath::parse(field)?;
            if field_path.has_wildcard() {
                return Ok(None);
            }
            let op = match key_direction(direction) {
                Some(op) => op,
                None => return Ok(None),
            };

            let multikey_positions = descriptor.multikey_paths.get(position);
            let path = PathExpr::build(field_path.components(), |i| {
                descriptor.multikey && multikey_positions.map_or(false, |p| p.contains(&i))
            });
            spec.push(IndexCollationEntry::new(path, op));
        }
        Ok(Some(spec))
    }

    /// `Ok(None)` when a partial filter has no requirement form
    fn partial_requirement(&self, descriptor: &IndexDescriptor) -> OptimizerResult<Option<Requirement>> {
        let filter = match &descriptor.partial_filter {
            Some(filter) if self.disable != DisableIndexOptions::DisablePartialOnly => filter,
            _ => return Ok(Some(Requirement::noop())),
        };

        let expr = FilterExpr::parse(filter)
            .map_err(|e| e.with_context(format!("partial filter of index {}", descriptor.name)))?
            .normalize();
        let conversion = match convert_to_requirement(&expr, ROOT_PROJECTION) {
            Some(conversion) => conversion,
            None => return Ok(None),
        };
        if conversion.retain_predicate {
            return Err(OptimizerError::internal(
                "Should not be seeing a partial index filter where we need to over-approximate",
            )
            .with_context(format!("index {}", descriptor.name)));
        }
        Ok(Some(
            conversion
                .requirement
                .rebind(ROOT_PROJECTION, self.scan_projection),
        ))
    }
}

enum Modeled {
    Skipped(&'static str),
    Built {
        definition: IndexDefinition,
        excluded: bool,
    },
}

/// Only 1 and -1 (after truncation) are valid B-tree directions
fn key_direction(spec: &serde_json::Value) -> Option<CollationOp> {
    match spec.as_f64().map(f64::trunc) {
        Some(d) if d == 1.0 => Some(CollationOp::Ascending),
        Some(d) if d == -1.0 => Some(CollationOp::Descending),
        _ => None,
    }
}

/// Key pattern components as `(plain path, collation op)`, used for shard keys
pub fn shard_key_spec(pattern: &KeyPattern) -> OptimizerResult<Vec<IndexCollationEntry>> {
    pattern
        .elements()
        .iter()
        .map(|(field, spec)| {
            let op = if spec.as_str() == Some("hashed") {
                CollationOp::Clustered
            } else {
                CollationOp::Ascending
            };
            Ok(IndexCollationEntry::new(PathExpr::plain(&FieldPath::parse(field)?), op))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OptimizerErrorCode;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn descriptor(name: &str, key: serde_json::Value) -> IndexDescriptor {
        IndexDescriptor::new(name, KeyPattern::from_json(&key).unwrap())
    }

    fn build(descriptors: &[IndexDescriptor]) -> OptimizerResult<IndexSpecs> {
        let mut disable_scan = false;
        IndexModelBuilder::new("scan_0", DisableIndexOptions::Enabled).build(descriptors, &mut disable_scan)
    }

    fn positions(p: &[usize]) -> BTreeSet<usize> {
        p.iter().copied().collect()
    }

    #[test]
    fn test_compound_index() {
        let specs = build(&[descriptor("x_1_y_-1", json!({"x": 1, "y": -1}))]).unwrap();
        let definition = &specs.indexes["x_1_y_-1"];
        let ops: Vec<CollationOp> = definition.collation_spec.iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![CollationOp::Ascending, CollationOp::Descending]);
        assert_eq!(definition.reverse_field_mask, 0b10);
        assert_eq!(definition.version, 1);
        assert!(!specs.multikeyness.is_multikey);
        assert!(!specs.multikeyness.may_be_multikey(&["x"]));
    }

    #[test]
    fn test_multikey_positions_become_traverse() {
        let index = descriptor("a.b_1", json!({"a.b": 1}))
            .with_multikey_paths(vec![positions(&[0])]);
        let specs = build(&[index]).unwrap();
        let path = &specs.indexes["a.b_1"].collation_spec[0].path;
        assert_eq!(path.to_string(), "Get [a] Traverse Get [b] Id");
        assert!(specs.multikeyness.lookup(&["a"]).unwrap().is_multikey);
        assert!(!specs.multikeyness.lookup(&["a", "b"]).unwrap().is_multikey);
    }

    #[test]
    fn test_hidden_and_hashed_id_skipped() {
        let mut hidden = descriptor("a_1", json!({"a": 1}));
        hidden.hidden = true;
        let mut hashed_id = descriptor("_id_hashed", json!({"_id": "hashed"}));
        hashed_id.hashed_id = true;

        let specs = build(&[hidden, hashed_id]).unwrap();
        assert!(specs.indexes.is_empty());
        assert_eq!(specs.skipped, 2);
    }

    #[test]
    fn test_unsupported_index_fails_without_natural_hint() {
        let mut sparse = descriptor("a_1", json!({"a": 1}));
        sparse.sparse = true;
        let err = build(&[sparse.clone()]).unwrap_err();
        assert_eq!(err.code(), OptimizerErrorCode::UnsupportedFeature);

        let hint = IndexHint::Natural { direction: json!(1) };
        let mut disable_scan = true;
        let specs = IndexModelBuilder::new("scan_0", DisableIndexOptions::Enabled)
            .with_hint(Some(&hint))
            .build(&[sparse], &mut disable_scan)
            .unwrap();
        assert!(specs.indexes.is_empty());
        assert!(!disable_scan);
    }

    #[test]
    fn test_wildcard_and_bad_direction_skipped() {
        let specs = build(&[
            descriptor("wc", json!({"a.$**": 1})),
            descriptor("two", json!({"a": 2})),
            descriptor("ok", json!({"a": -1.0})),
        ])
        .unwrap();
        assert_eq!(specs.indexes.keys().collect::<Vec<_>>(), vec!["ok"]);
        assert_eq!(specs.skipped, 2);
    }

    #[test]
    fn test_name_hint_excludes_others_but_keeps_multikey_evidence() {
        let a = descriptor("a_1", json!({"a": 1}));
        let b = descriptor("b_1", json!({"b": 1})).with_multikey_paths(vec![positions(&[0])]);
        let hint = IndexHint::Name { name: "a_1".into() };
        let mut disable_scan = false;

        let specs = IndexModelBuilder::new("scan_0", DisableIndexOptions::Enabled)
            .with_hint(Some(&hint))
            .build(&[a, b], &mut disable_scan)
            .unwrap();
        assert_eq!(specs.indexes.keys().collect::<Vec<_>>(), vec!["a_1"]);
        assert!(specs.multikeyness.lookup(&["b"]).unwrap().is_multikey);
        assert!(disable_scan);
    }

    #[test]
    fn test_natural_hint_returns_no_indexes() {
        let hint = IndexHint::Natural { direction: json!(-1) };
        let mut disable_scan = true;
        let specs = IndexModelBuilder::new("scan_0", DisableIndexOptions::Enabled)
            .with_hint(Some(&hint))
            .build(&[descriptor("a_1", json!({"a": 1}))], &mut disable_scan)
            .unwrap();
        assert!(specs.indexes.is_empty());
        assert!(specs.multikeyness.lookup(&["a"]).is_some());
        assert!(!disable_scan);
    }

    #[test]
    fn test_disable_all() {
        let mut disable_scan = false;
        let specs = IndexModelBuilder::new("scan_0", DisableIndexOptions::DisableAll)
            .build(
                &[descriptor("a_1", json!({"a": 1})).with_multikey_paths(vec![positions(&[0])])],
                &mut disable_scan,
            )
            .unwrap();
        assert!(specs.indexes.is_empty());
        assert!(specs.multikeyness.is_empty());
    }

    #[test]
    fn test_partial_index_requirement_bound_to_scan() {
        let index = descriptor("a_1_partial", json!({"a": 1}))
            .with_partial_filter(json!({"status": "active"}))
            .with_multikey_paths(vec![positions(&[0])]);
        let specs = build(&[index]).unwrap();

        let definition = &specs.indexes["a_1_partial"];
        assert!(definition.is_partial());
        let (key, _) = definition.partial_requirement.single_entry().unwrap();
        assert_eq!(key.projection, "scan_0");
        // Partial-only evidence is not collection-wide
        assert!(specs.multikeyness.lookup(&["a"]).is_none());
    }

    #[test]
    fn test_exists_partial_filter_stays_partial() {
        let index = descriptor("a_1_partial", json!({"a": 1}))
            .with_partial_filter(json!({"a": {"$exists": true}}));
        let specs = build(&[index]).unwrap();

        let definition = &specs.indexes["a_1_partial"];
        assert!(definition.is_partial());
        let (key, intervals) = definition.partial_requirement.single_entry().unwrap();
        assert_eq!(key.projection, "scan_0");
        assert!(intervals.is_full());
        assert!(specs.multikeyness.lookup(&["a"]).is_none());
    }

    #[test]
    fn test_partial_disabled_only_drops_requirement() {
        let index = descriptor("a_1_partial", json!({"a": 1}))
            .with_partial_filter(json!({"status": "active"}));
        let mut disable_scan = false;
        let specs = IndexModelBuilder::new("scan_0", DisableIndexOptions::DisablePartialOnly)
            .build(&[index], &mut disable_scan)
            .unwrap();
        assert!(!specs.indexes["a_1_partial"].is_partial());
        assert!(specs.multikeyness.lookup(&["a"]).is_some());
    }

    #[test]
    fn test_partial_filter_not_convertible_skips_index() {
        let index = descriptor("p", json!({"a": 1}))
            .with_partial_filter(json!({"$or": [{"a": 1}, {"b": 1}]}));
        let specs = build(&[index]).unwrap();
        assert!(specs.indexes.is_empty());
        assert_eq!(specs.skipped, 1);
    }

    #[test]
    fn test_partial_filter_over_approximation_is_internal_error() {
        let index = descriptor("p", json!({"a": 1})).with_partial_filter(json!({"a": {"$ne": 5}}));
        let err = build(&[index]).unwrap_err();
        assert_eq!(err.code(), OptimizerErrorCode::InternalInvariantViolation);
    }

    #[test]
    fn test_empty_multikey_paths_is_internal_error() {
        let mut index = descriptor("a_1", json!({"a": 1}));
        index.multikey_paths.clear();
        let err = build(&[index]).unwrap_err();
        assert_eq!(err.code(), OptimizerErrorCode::InternalInvariantViolation);
    }

    #[test]
    fn test_shard_key_spec() {
        let pattern = KeyPattern::from_json(&json!({"a": 1, "b": "hashed"})).unwrap();
        let spec = shard_key_spec(&pattern).unwrap();
        assert_eq!(spec[0].op, CollationOp::Ascending);
        assert_eq!(spec[1].op, CollationOp::Clustered);
        assert_eq!(spec[1].path.traverse_count(), 0);
    }
}
