//! Command and collection option validation
//!
//! Runs before any catalog work. Each rejected option is an
//! `UnsupportedFeature`, except a malformed `$natural` hint (`BadValue`).

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{json, Value};

use super::hint::IndexHint;
use crate::catalog::{CollectionSnapshot, Namespace};
use crate::errors::{OptimizerError, OptimizerResult};

/// Find-command options inspected by the optimizer
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FindRequestOptions {
    pub filter: Option<Value>,
    pub hint: Option<Value>,
    pub request_resume_token: bool,
    pub allow_partial_results: bool,
    pub allow_speculative_majority_read: bool,
    pub await_data: bool,
    pub collation: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub no_cursor_timeout: bool,
    pub read_once: bool,
    pub return_key: bool,
    pub legacy_runtime_constants: Option<Value>,
    pub show_record_id: bool,
    pub tailable: bool,
    pub term: Option<i64>,
    /// Ask for a record id slot in the lowered plan
    pub force_generate_record_id: bool,
    pub explain: bool,
}

fn is_empty_object(value: &Option<Value>) -> bool {
    match value {
        None => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn reject_if(condition: bool, what: &str) -> OptimizerResult<()> {
    if condition {
        return Err(OptimizerError::unsupported(format!("{} unsupported", what)));
    }
    Ok(())
}

/// Rejects find options this optimizer cannot honour
pub fn validate_find_command_options(request: &FindRequestOptions) -> OptimizerResult<()> {
    reject_if(request.request_resume_token, "$_requestResumeToken")?;
    reject_if(request.allow_partial_results, "allowPartialResults")?;
    reject_if(request.allow_speculative_majority_read, "allowSpeculativeMajorityRead")?;
    reject_if(request.await_data, "awaitData")?;

    let simple_collation = request.collation.as_ref() == Some(&json!({"locale": "simple"}));
    reject_if(!is_empty_object(&request.collation) && !simple_collation, "collation")?;

    reject_if(!is_empty_object(&request.min), "min")?;
    reject_if(!is_empty_object(&request.max), "max")?;
    reject_if(request.no_cursor_timeout, "noCursorTimeout")?;
    reject_if(request.read_once, "readOnce")?;
    reject_if(request.return_key, "returnKey")?;
    reject_if(request.legacy_runtime_constants.is_some(), "runtimeConstants")?;
    reject_if(request.show_record_id, "showRecordId")?;
    reject_if(request.tailable, "tailable")?;
    reject_if(request.term.is_some(), "term")?;
    Ok(())
}

/// Validates the request, the hint and the main collection's options.
///
/// A missing main collection (`None`) passes the collection checks.
pub fn validate_command_options(
    find: Option<&FindRequestOptions>,
    collection: Option<&CollectionSnapshot>,
    hint: Option<&IndexHint>,
    involved: &BTreeSet<Namespace>,
) -> OptimizerResult<()> {
    if let Some(find) = find {
        validate_find_command_options(find)?;
    }

    if let Some(hint) = hint {
        if !involved.is_empty() {
            return Err(OptimizerError::unsupported(
                "hints apply only to single-collection queries",
            ));
        }
        if hint.has_invalid_natural_param() {
            return Err(OptimizerError::bad_value(
                "$natural hint cannot be set to a value other than -1 or 1",
            ));
        }
    }

    if let Some(collection) = collection {
        let facts = &collection.facts;
        reject_if(facts.has_default_collation(), "Collection-default collation")?;
        reject_if(facts.is_clustered, "Clustered collection")?;
        reject_if(facts.has_timeseries_options, "Timeseries collection")?;
        reject_if(facts.is_capped, "Capped collection")?;
    }
    Ok(())
}
