//! Catalog inputs
//!
//! The storage layer is an external collaborator. This module only defines
//! the read-only shapes the optimizer consumes: index descriptors,
//! collection facts, and a lookup trait.

mod collection;
mod descriptor;

pub use collection::{Catalog, CollectionFacts, CollectionSnapshot, InMemoryCatalog, Namespace};
pub use descriptor::{IndexDescriptor, IndexType, KeyPattern};
