//! Path expressions
//!
//! A path describes how a value is reached from the document root:
//! `Get` descends into a named field, `Traverse` applies the rest of the
//! path to every element of an array, `Identity` ends the path.
//!
//! Paths are built leaf-to-root and are immutable once built.

use std::fmt;

use serde::Serialize;

use crate::errors::{OptimizerError, OptimizerResult};

/// Field path wildcard component (wildcard indexes are not modeled)
pub const WILDCARD_COMPONENT: &str = "$**";

/// A dotted field path split into its components
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    components: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path such as `a.b.c`.
    ///
    /// Empty paths and empty components are rejected.
    pub fn parse(dotted: &str) -> OptimizerResult<Self> {
        if dotted.is_empty() {
            return Err(OptimizerError::bad_value("field path cannot be empty"));
        }
        let components: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if components.iter().any(String::is_empty) {
            return Err(OptimizerError::bad_value(format!(
                "field path '{}' contains an empty component",
                dotted
            )));
        }
        Ok(Self { components })
    }

    /// Returns the path components
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns the number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false for a parsed path
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns true if any component is the wildcard `$**`
    pub fn has_wildcard(&self) -> bool {
        self.components.iter().any(|c| c == WILDCARD_COMPONENT)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("."))
    }
}

/// Path algebra node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PathExpr {
    /// End of path
    Identity,
    /// Descend into a named field
    Get { field: String, child: Box<PathExpr> },
    /// Apply the child path to each array element
    Traverse { child: Box<PathExpr> },
}

impl PathExpr {
    /// Creates a `Get` node
    pub fn get(field: impl Into<String>, child: PathExpr) -> Self {
        PathExpr::Get {
            field: field.into(),
            child: Box::new(child),
        }
    }

    /// Creates a `Traverse` node
    pub fn traverse(child: PathExpr) -> Self {
        PathExpr::Traverse {
            child: Box::new(child),
        }
    }

    /// Builds a path leaf-to-root, inserting a `Traverse` below the `Get`
    /// of every component `i` for which `traverse_at(i)` holds.
    pub fn build(components: &[String], traverse_at: impl Fn(usize) -> bool) -> Self {
        let mut path = PathExpr::Identity;
        for i in (0..components.len()).rev() {
            if traverse_at(i) {
                path = PathExpr::traverse(path);
            }
            path = PathExpr::get(components[i].clone(), path);
        }
        path
    }

    /// Non-traversing path (`Get a Get b Id`)
    pub fn plain(field_path: &FieldPath) -> Self {
        Self::build(field_path.components(), |_| false)
    }

    /// Path with array traversal at every component, as used by match
    /// predicates (`Get a Traverse Get b Traverse Id`)
    pub fn traversing(field_path: &FieldPath) -> Self {
        Self::build(field_path.components(), |_| true)
    }

    /// Returns true for the identity path
    pub fn is_identity(&self) -> bool {
        matches!(self, PathExpr::Identity)
    }

    /// Returns the field names visited by the path, in order
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                PathExpr::Identity => return out,
                PathExpr::Get { field, child } => {
                    out.push(field.as_str());
                    current = child;
                }
                PathExpr::Traverse { child } => current = child,
            }
        }
    }

    /// Returns the number of `Traverse` nodes on the path
    pub fn traverse_count(&self) -> usize {
        match self {
            PathExpr::Identity => 0,
            PathExpr::Get { child, .. } => child.traverse_count(),
            PathExpr::Traverse { child } => 1 + child.traverse_count(),
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathExpr::Identity => write!(f, "Id"),
            PathExpr::Get { field, child } => write!(f, "Get [{}] {}", field, child),
            PathExpr::Traverse { child } => write!(f, "Traverse {}", child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_field_path() {
        let path = fp("a.b.c");
        assert_eq!(path.components(), &["a", "b", "c"]);
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "a.b.c");
    }

    #[test]
    fn test_parse_rejects_empty_components() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse(".a").is_err());
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(fp("a.$**").has_wildcard());
        assert!(fp("$**").has_wildcard());
        assert!(!fp("a.b").has_wildcard());
    }

    #[test]
    fn test_build_inserts_traverse_below_get() {
        let path = PathExpr::build(fp("a.b").components(), |i| i == 0);
        let expected = PathExpr::get(
            "a",
            PathExpr::traverse(PathExpr::get("b", PathExpr::Identity)),
        );
        assert_eq!(path, expected);
        assert_eq!(path.to_string(), "Get [a] Traverse Get [b] Id");
    }

    #[test]
    fn test_plain_and_traversing() {
        let plain = PathExpr::plain(&fp("x.y"));
        assert_eq!(plain.traverse_count(), 0);
        assert_eq!(plain.fields(), vec!["x", "y"]);

        let traversing = PathExpr::traversing(&fp("x.y"));
        assert_eq!(traversing.traverse_count(), 2);
        assert_eq!(traversing.fields(), vec!["x", "y"]);
    }

    #[test]
    fn test_identity() {
        assert!(PathExpr::Identity.is_identity());
        assert!(PathExpr::Identity.fields().is_empty());
    }
}
