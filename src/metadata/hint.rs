//! Index and natural-order hints

use serde::Serialize;
use serde_json::Value;

use crate::catalog::KeyPattern;
use crate::errors::{OptimizerError, OptimizerResult};

/// Field name of a natural-order hint
pub const NATURAL_HINT_FIELD: &str = "$natural";
/// Field name of a by-name index hint
pub const NAME_HINT_FIELD: &str = "$hint";

/// A parsed hint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexHint {
    /// `{$natural: d}`: force a collection scan. `direction` is the raw
    /// value; validation accepts only 1 and -1.
    Natural { direction: Value },
    /// `{$hint: "name"}`
    Name { name: String },
    /// Any other object: an index key pattern
    KeyPattern { pattern: KeyPattern },
}

impl IndexHint {
    /// Parses a hint object. An empty object means no hint.
    pub fn parse(hint: &Value) -> OptimizerResult<Option<Self>> {
        let object = hint
            .as_object()
            .ok_or_else(|| OptimizerError::bad_value("hint must be an object"))?;
        let (field, value) = match object.iter().next() {
            Some(first) => first,
            None => return Ok(None),
        };

        if field == NATURAL_HINT_FIELD {
            return Ok(Some(IndexHint::Natural {
                direction: value.clone(),
            }));
        }
        if field == NAME_HINT_FIELD {
            if let Some(name) = value.as_str() {
                return Ok(Some(IndexHint::Name {
                    name: name.to_string(),
                }));
            }
        }
        Ok(Some(IndexHint::KeyPattern {
            pattern: KeyPattern::from_json(hint)?,
        }))
    }

    /// True for a `$natural` hint
    pub fn is_natural(&self) -> bool {
        matches!(self, IndexHint::Natural { .. })
    }

    /// True for a `$natural` hint whose value is not exactly 1 or -1
    pub fn has_invalid_natural_param(&self) -> bool {
        match self {
            IndexHint::Natural { direction } => !matches!(direction.as_f64(), Some(d) if d == 1.0 || d == -1.0),
            _ => false,
        }
    }

    /// True for `$natural` with a negative direction
    pub fn is_reverse_natural(&self) -> bool {
        match self {
            IndexHint::Natural { direction } => direction.as_f64().map_or(false, |d| d.trunc() < 0.0),
            _ => false,
        }
    }

    /// Whether the hint selects the given index
    pub fn matches_index(&self, name: &str, key_pattern: &KeyPattern) -> bool {
        match self {
            IndexHint::Natural { .. } => false,
            IndexHint::Name { name: hinted } => hinted == name,
            IndexHint::KeyPattern { pattern } => pattern.same_as(key_pattern),
        }
    }
}
