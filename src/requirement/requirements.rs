//! Partial schema requirements
//!
//! A requirement is a conjunction of `(projection, path) -> interval set`
//! entries. The empty requirement is the no-op: it constrains nothing.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeSeq;
use serde::Serialize;

use super::interval::IntervalSet;
use crate::path::PathExpr;

/// Projection name a partial filter is bound to before it is attached to a scan
pub const ROOT_PROJECTION: &str = "<root>";

/// Key of one requirement entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PartialSchemaKey {
    pub projection: String,
    pub path: PathExpr,
}

impl PartialSchemaKey {
    pub fn new(projection: impl Into<String>, path: PathExpr) -> Self {
        Self {
            projection: projection.into(),
            path,
        }
    }
}

impl fmt::Display for PartialSchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.projection, self.path)
    }
}

/// Conjunction of interval constraints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    entries: BTreeMap<PartialSchemaKey, IntervalSet>,
}

impl Requirement {
    /// The always-true requirement
    pub fn noop() -> Self {
        Self::default()
    }

    /// Single-entry requirement
    pub fn single(key: PartialSchemaKey, intervals: IntervalSet) -> Self {
        let mut requirement = Self::noop();
        requirement.add(key, intervals);
        requirement
    }

    /// True when no constraint is present
    pub fn is_noop(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when some entry can never be satisfied
    pub fn is_unsatisfiable(&self) -> bool {
        self.entries.values().any(IntervalSet::is_empty)
    }

    /// Conjoins `intervals` onto the entry for `key`.
    ///
    /// A full interval set is stored too: it still requires the path to
    /// exist, so only a requirement without entries is the no-op.
    pub fn add(&mut self, key: PartialSchemaKey, intervals: IntervalSet) {
        match self.entries.get_mut(&key) {
            Some(existing) => *existing = existing.intersect(&intervals),
            None => {
                self.entries.insert(key, intervals);
            }
        }
    }

    /// Conjunction of two requirements
    pub fn intersect(mut self, other: Requirement) -> Requirement {
        for (key, intervals) in other.entries {
            self.add(key, intervals);
        }
        self
    }

    /// Moves every entry bound to `from` onto `to`
    pub fn rebind(self, from: &str, to: &str) -> Requirement {
        let mut out = Requirement::noop();
        for (mut key, intervals) in self.entries {
            if key.projection == from {
                key.projection = to.to_string();
            }
            out.add(key, intervals);
        }
        out
    }

    /// Number of constrained keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&PartialSchemaKey, &IntervalSet)> {
        self.entries.iter()
    }

    /// Returns the only entry, if there is exactly one
    pub fn single_entry(&self) -> Option<(&PartialSchemaKey, &IntervalSet)> {
        if self.entries.len() == 1 {
            self.entries.iter().next()
        } else {
            None
        }
    }

    /// Interval set for a key, if constrained
    pub fn get(&self, key: &PartialSchemaKey) -> Option<&IntervalSet> {
        self.entries.get(key)
    }
}

#[derive(Serialize)]
struct EntryView<'a> {
    projection: &'a str,
    path: String,
    intervals: &'a IntervalSet,
}

impl Serialize for Requirement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (key, intervals) in &self.entries {
            seq.serialize_element(&EntryView {
                projection: &key.projection,
                path: key.path.to_string(),
                intervals,
            })?;
        }
        seq.end()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return write!(f, "<noop>");
        }
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{{{}, {}}}", k, v))
            .collect();
        write!(f, "{}", parts.join(" ^ "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FieldPath;
    use crate::requirement::interval::{Interval, KeyValue};

    fn key(proj: &str, field: &str) -> PartialSchemaKey {
        PartialSchemaKey::new(proj, PathExpr::traversing(&FieldPath::parse(field).unwrap()))
    }

    fn point(n: f64) -> IntervalSet {
        IntervalSet::single(Interval::point(KeyValue::Number(n)))
    }

    #[test]
    fn test_noop() {
        assert!(Requirement::noop().is_noop());
        assert_eq!(Requirement::noop().to_string(), "<noop>");
    }

    #[test]
    fn test_full_interval_is_a_constraint() {
        let requirement = Requirement::single(key("p", "a"), IntervalSet::full());
        assert!(!requirement.is_noop());
        assert_eq!(requirement.get(&key("p", "a")), Some(&IntervalSet::full()));
    }

    #[test]
    fn test_intersect_same_key() {
        let left = Requirement::single(key("p", "a"), point(1.0).union(&point(2.0)));
        let right = Requirement::single(key("p", "a"), point(2.0));
        let both = left.intersect(right);
        assert_eq!(both.len(), 1);
        assert_eq!(both.get(&key("p", "a")), Some(&point(2.0)));
    }

    #[test]
    fn test_contradiction_is_unsatisfiable() {
        let both = Requirement::single(key("p", "a"), point(1.0))
            .intersect(Requirement::single(key("p", "a"), point(2.0)));
        assert!(both.is_unsatisfiable());
    }

    #[test]
    fn test_rebind() {
        let requirement = Requirement::single(key(ROOT_PROJECTION, "a"), point(1.0))
            .intersect(Requirement::single(key("other", "b"), point(1.0)));
        let rebound = requirement.rebind(ROOT_PROJECTION, "scan_0");
        assert!(rebound.get(&key("scan_0", "a")).is_some());
        assert!(rebound.get(&key("other", "b")).is_some());
        assert!(rebound.get(&key(ROOT_PROJECTION, "a")).is_none());
    }

    #[test]
    fn test_serialize_as_entry_list() {
        let requirement = Requirement::single(key("p", "a"), point(3.0));
        let value = serde_json::to_value(&requirement).unwrap();
        assert_eq!(value[0]["projection"], "p");
        assert_eq!(value[0]["path"], "Get [a] Traverse Id");
    }
}
