//! Metadata construction
//!
//! Validation of request and collection options, hint parsing, and the
//! assembly of the per-query `Metadata` snapshot handed to the search
//! engine.
//!
//! # Invariants
//!
//! - Validation runs before any catalog work
//! - Every referenced collection gets a scan definition, existing or not
//! - Output is deterministic for a fixed catalog snapshot and hints
//! - Only the main collection carries sharding facts and a non-forward order

mod assembler;
mod distribution;
mod hint;
mod scan_def;
mod validate;

pub use assembler::{scan_def_name, MetadataAssembler, MISSING_UUID};
pub use distribution::{DistributionAndPaths, DistributionType};
pub use hint::{IndexHint, NAME_HINT_FIELD, NATURAL_HINT_FIELD};
pub use scan_def::{
    scan_options, CollectionIdentity, Metadata, ScanDefinition, ScanOrder, ShardingMetadata,
    COLLECTION_OPTION, DATABASE_OPTION, SCAN_TYPE_OPTION,
};
pub use validate::{validate_command_options, validate_find_command_options, FindRequestOptions};
