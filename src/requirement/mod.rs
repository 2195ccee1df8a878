//! Partial-index requirements
//!
//! A partial index filter is parsed, normalized, and translated into an
//! interval-based requirement keyed by `(projection, path)`. Translation
//! must be exact for the index to be usable.

mod filter;
mod interval;
mod requirements;
mod translate;

pub use filter::{CompareOp, FilterExpr};
pub use interval::{Bound, Interval, IntervalSet, KeyValue, TypeBracket};
pub use requirements::{PartialSchemaKey, Requirement, ROOT_PROJECTION};
pub use translate::{convert_to_requirement, Conversion};
