//! Path algebra
//!
//! Field access and array traversal, shared by the index model, the
//! partial-filter requirements and the multikeyness trie.

mod expr;
mod trie;

pub use expr::{FieldPath, PathExpr, WILDCARD_COMPONENT};
pub use trie::MultikeynessTrie;
