//! CLI argument definitions using clap
//!
//! Commands:
//! - pagedsearch scan --input <rows.json> --type <type>
//! - pagedsearch lookup --input <rows.json> --type <type> --id <id>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pagedsearch - page through remote search results in windows
#[derive(Parser, Debug)]
#[command(name = "pagedsearch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a search over a JSON row file and print every result
    Scan {
        /// JSON file holding an array of rows
        #[arg(long)]
        input: PathBuf,

        /// Record type the rows belong to
        #[arg(long = "type")]
        record_type: String,

        /// Path to engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Equality filter, as name=value (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Column to project (repeatable)
        #[arg(long = "column")]
        columns: Vec<String>,

        /// Pull results in batches of this size instead of whole windows
        #[arg(long)]
        batch: Option<usize>,
    },

    /// Look up fields of a single record
    Lookup {
        /// JSON file holding an array of rows
        #[arg(long)]
        input: PathBuf,

        /// Record type of the record
        #[arg(long = "type")]
        record_type: String,

        /// Record id
        #[arg(long)]
        id: String,

        /// Field to return (repeatable)
        #[arg(long = "column")]
        columns: Vec<String>,
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
    fn test_parse_scan_with_repeated_flags() {
        let cli = Cli::parse_from([
            "pagedsearch",
            "scan",
            "--input",
            "rows.json",
            "--type",
            "customer",
            "--filter",
            "status=open",
            "--filter",
            "region=emea",
            "--column",
            "name",
            "--batch",
            "50",
        ]);

        match cli.command {
            Command::Scan {
                record_type,
                filters,
                columns,
                batch,
                config,
                ..
            } => {
                assert_eq!(record_type, "customer");
                assert_eq!(filters, vec!["status=open", "region=emea"]);
                assert_eq!(columns, vec!["name"]);
                assert_eq!(batch, Some(50));
                assert!(config.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_lookup_requires_id() {
        let parsed = Cli::try_parse_from([
            "pagedsearch",
            "lookup",
            "--input",
            "rows.json",
            "--type",
            "customer",
        ]);
        assert!(parsed.is_err());
    }
}
