//! JSON I/O handling for CLI
//!
//! - Input: a JSON file holding an array of row objects
//! - Output: one JSON value per line on stdout
//! - Errors: one JSON object on stderr

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::source::Row;

use super::errors::{CliError, CliResult};

/// Read the rows of an input file
pub fn read_rows(path: &Path) -> CliResult<Vec<Row>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;

    match serde_json::from_str(&content)? {
        Value::Array(rows) => Ok(rows),
        _ => Err(CliError::io_error(format!(
            "{} must hold a JSON array of rows",
            path.display()
        ))),
    }
}

/// Write one JSON line to `out`
pub fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Write an error object to stderr
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stderr = io::stderr();
    write_line(&mut stderr, &response)?;
    stderr.flush()?;

    Ok(())
}
