//! CLI argument definitions using clap
//!
//! Commands:
//! - docplan metadata --catalog <path> --collection <db.coll> [--knobs <path>] [--hint <json>] [--involved <db.coll>]...
//! - docplan knobs --knobs <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docplan - metadata construction and plan assembly for a document query optimizer
#[derive(Parser, Debug)]
#[command(name = "docplan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assemble and print the optimizer metadata for one collection
    Metadata {
        /// Catalog file: JSON object keyed by "db.coll"
        #[arg(long)]
        catalog: PathBuf,

        /// Main collection as "db.coll"
        #[arg(long)]
        collection: String,

        /// Knob file; defaults apply when omitted
        #[arg(long)]
        knobs: Option<PathBuf>,

        /// Index or natural hint as a JSON object
        #[arg(long)]
        hint: Option<String>,

        /// Other collections the query reads, as "db.coll"
        #[arg(long)]
        involved: Vec<String>,
    },

    /// Validate a knob file and print the resulting query hints
    Knobs {
        /// Path to the knob file
        #[arg(long)]
        knobs: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata_command() {
        let cli = Cli::try_parse_from([
            "docplan",
            "metadata",
            "--catalog",
            "catalog.json",
            "--collection",
            "shop.orders",
            "--involved",
            "shop.items",
            "--involved",
            "shop.users",
        ])
        .unwrap();
        match cli.command {
            Command::Metadata {
                collection,
                involved,
                knobs,
                ..
            } => {
                assert_eq!(collection, "shop.orders");
                assert_eq!(involved, vec!["shop.items", "shop.users"]);
                assert!(knobs.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_knobs_requires_path() {
        assert!(Cli::try_parse_from(["docplan", "knobs"]).is_err());
    }
}
