//! Index model
//!
//! Optimizer-facing index definitions and the builder that derives them,
//! together with the multikeyness trie, from catalog descriptors.
//!
//! # Invariants
//!
//! - The trie root is never multikey
//! - Result keys are unique index names, iterated in name order
//! - Multikey evidence from partial indexes never reaches the trie

mod builder;
mod definition;

pub use builder::{shard_key_spec, IndexModelBuilder, IndexSpecs};
pub use definition::{
    reverse_field_mask, CollationOp, IndexCollationEntry, IndexCollationSpec, IndexDefinition,
    MAX_INDEX_FIELDS,
};
