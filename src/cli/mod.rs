//! CLI module for docplan
//!
//! Provides command-line interface for:
//! - metadata: assemble and print optimizer metadata from a catalog file
//! - knobs: validate a knob file and print the derived query hints

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{knobs_report, metadata, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_catalog, write_pretty};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
