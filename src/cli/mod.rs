//! CLI module for pagedsearch
//!
//! Provides command-line interface for:
//! - scan: Page through a search over a JSON row file
//! - lookup: Fetch fields of one record

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{lookup, run, run_command, scan, ScanOptions};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_rows, write_error, write_line};
