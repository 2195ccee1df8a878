//! Collection-wide multikeyness trie
//!
//! Each node corresponds to a path prefix counted from the document root
//! and records whether that prefix is known to hold an array in at least
//! one document. The root (the whole document) is never an array.

use std::collections::BTreeMap;

use serde::Serialize;

use super::expr::PathExpr;

/// Prefix trie of array-valued paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultikeynessTrie {
    /// Child nodes keyed by field name
    pub children: BTreeMap<String, MultikeynessTrie>,
    /// Whether this prefix is known to be array-valued
    pub is_multikey: bool,
}

impl MultikeynessTrie {
    /// Creates an empty trie
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the shape of an index key path.
    ///
    /// Every `Get` visited creates (or reuses) a node; a `Traverse` marks the
    /// node it sits under as multikey. Nodes created without a `Traverse`
    /// are evidence that the prefix is *not* an array.
    pub fn add(&mut self, path: &PathExpr) {
        let mut current = self;
        let mut node = path;
        loop {
            match node {
                PathExpr::Identity => return,
                PathExpr::Get { field, child } => {
                    current = current.children.entry(field.clone()).or_default();
                    node = child;
                }
                PathExpr::Traverse { child } => {
                    current.is_multikey = true;
                    node = child;
                }
            }
        }
    }

    /// Resets the root flag; the whole document cannot be an array
    pub fn clear_root(&mut self) {
        self.is_multikey = false;
    }

    /// Returns true when the trie has no recorded paths
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && !self.is_multikey
    }

    /// Looks up the node for a sequence of field names
    pub fn lookup(&self, fields: &[&str]) -> Option<&MultikeynessTrie> {
        let mut current = self;
        for field in fields {
            current = current.children.get(*field)?;
        }
        Some(current)
    }

    /// Conservative answer to "may any prefix of this path be an array?".
    ///
    /// Paths without recorded evidence are assumed multikey.
    pub fn may_be_multikey(&self, fields: &[&str]) -> bool {
        let mut current = self;
        for field in fields {
            match current.children.get(*field) {
                Some(child) => {
                    if child.is_multikey {
                        return true;
                    }
                    current = child;
                }
                None => return true,
            }
        }
        false
    }

    /// Merges the evidence of another trie into this one
    pub fn merge(&mut self, other: &MultikeynessTrie) {
        self.is_multikey |= other.is_multikey;
        for (field, child) in &other.children {
            self.children.entry(field.clone()).or_default().merge(child);
        }
    }
}
