//! CLI command implementations
//!
//! Commands are thin: they load files, call the library and print JSON.
//! Nothing here plans a query.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::{json, Value};

use crate::catalog::{Catalog, InMemoryCatalog, Namespace};
use crate::config::{OptimizerKnobs, QueryHints};
use crate::metadata::{scan_def_name, validate_command_options, IndexHint, MetadataAssembler};
use crate::observability::{Logger, Severity};
use crate::plan::PrefixId;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_catalog, write_pretty};

/// Run the parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    // stdout carries the report; only warnings and worse are logged
    Logger::set_min_severity(Severity::Warn);

    let report = match command {
        Command::Metadata {
            catalog,
            collection,
            knobs,
            hint,
            involved,
        } => {
            let catalog = read_catalog(&catalog)?;
            let knobs = load_knobs(knobs.as_deref())?;
            metadata(&catalog, &knobs, &collection, hint.as_deref(), &involved)?
        }
        Command::Knobs { knobs } => knobs_report(&knobs)?,
    };
    write_pretty(&report)
}

fn load_knobs(path: Option<&Path>) -> CliResult<OptimizerKnobs> {
    match path {
        Some(path) => Ok(OptimizerKnobs::load(path)?),
        None => Ok(OptimizerKnobs::default()),
    }
}

fn parse_namespace(name: &str) -> CliResult<Namespace> {
    Namespace::parse(name).map_err(|e| CliError::argument_error(e.to_string()))
}

/// Validates the command, assembles metadata and reports it with its fingerprint
pub fn metadata(
    catalog: &InMemoryCatalog,
    knobs: &OptimizerKnobs,
    collection: &str,
    hint: Option<&str>,
    involved: &[String],
) -> CliResult<Value> {
    let namespace = parse_namespace(collection)?;
    let involved = involved
        .iter()
        .map(|name| parse_namespace(name))
        .collect::<CliResult<BTreeSet<_>>>()?;

    let hint_value = match hint {
        Some(text) => Some(
            serde_json::from_str::<Value>(text)
                .map_err(|e| CliError::argument_error(format!("hint is not JSON: {}", e)))?,
        ),
        None => None,
    };
    let hint = match &hint_value {
        Some(value) => IndexHint::parse(value)?,
        None => None,
    };

    let snapshot = catalog.collection(&namespace);
    validate_command_options(None, snapshot, hint.as_ref(), &involved)?;

    let mut hints = QueryHints::from_knobs(knobs);
    let mut prefix_id = PrefixId::new(knobs.use_descriptive_var_names);
    let scan_projection = prefix_id.next_id("scan");
    let name = scan_def_name(&namespace, snapshot);
    let partitions = usize::try_from(knobs.default_dop)
        .map_err(|_| CliError::argument_error("default_dop out of range"))?;

    let metadata = MetadataAssembler::new(catalog, partitions)
        .with_hint(hint.as_ref())
        .populate(
            &namespace,
            &name,
            &scan_projection,
            &involved,
            &mut hints,
            &mut prefix_id,
        )?;

    Ok(json!({
        "scan_def_name": name,
        "scan_projection": scan_projection,
        "fingerprint": metadata.fingerprint()?,
        "hints": serde_json::to_value(&hints)?,
        "metadata": metadata.to_json()?,
    }))
}

/// Loads and validates a knob file, reporting the knobs and derived hints
pub fn knobs_report(path: &Path) -> CliResult<Value> {
    let knobs = OptimizerKnobs::load(path)?;
    let hints = QueryHints::from_knobs(&knobs);
    Ok(json!({
        "knobs": serde_json::to_value(&knobs)?,
        "hints": serde_json::to_value(&hints)?,
    }))
}
