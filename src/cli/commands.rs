//! CLI command implementations
//!
//! Both commands run against an `InMemorySource` loaded from the input file,
//! on a tokio runtime created per invocation.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::observability::{Logger, ObservationScope};
use crate::query::{ColumnSpec, FilterSpec};
use crate::search::Search;
use crate::source::{InMemorySource, RemoteSource};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_rows, write_line};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cmd {
        Command::Scan {
            input,
            record_type,
            config,
            filters,
            columns,
            batch,
        } => {
            let options = ScanOptions {
                input,
                record_type,
                config,
                filters,
                columns,
                batch,
            };
            scan(&options, &mut out)
        }
        Command::Lookup {
            input,
            record_type,
            id,
            columns,
        } => lookup(&input, &record_type, &id, &columns, &mut out),
    }
}

/// Arguments of the scan command
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub input: PathBuf,
    pub record_type: String,
    pub config: Option<PathBuf>,
    pub filters: Vec<String>,
    pub columns: Vec<String>,
    pub batch: Option<usize>,
}

/// Print every matching row as a JSON line, then a summary line
pub fn scan<W: Write>(options: &ScanOptions, out: &mut W) -> CliResult<()> {
    let config = load_config(options.config.as_deref())?;
    Logger::set_min_severity(config.severity());

    let filters = options
        .filters
        .iter()
        .map(|f| parse_filter(f))
        .collect::<CliResult<Vec<_>>>()?;
    if options.batch == Some(0) {
        return Err(CliError::invalid_argument("--batch must be > 0"));
    }

    let source = source_for(&options.input, &options.record_type)?;
    let runtime = runtime()?;

    let scope = ObservationScope::with_fields("scan", &[("type", options.record_type.as_str())]);
    let outcome = runtime.block_on(async {
        let mut search = Search::create_with_config(source, options.record_type.clone(), &config)?;
        search.add_filters(filters)?;
        search.add_columns(options.columns.iter().map(ColumnSpec::new))?;

        let mut printed = 0usize;
        let mut write_failure = None;
        match options.batch {
            Some(size) => loop {
                let rows = search.get_next(size).await?;
                if rows.is_empty() {
                    break;
                }
                for row in &rows {
                    write_line(out, row)?;
                }
                printed += rows.len();
            },
            None => {
                search
                    .for_each(|row| {
                        if write_failure.is_none() {
                            match write_line(out, &row) {
                                Ok(()) => printed += 1,
                                Err(e) => write_failure = Some(e),
                            }
                        }
                    })
                    .await?;
            }
        }
        if let Some(e) = write_failure {
            return Err(e);
        }

        let summary = json!({
            "summary": {
                "rows": printed,
                "remaining_usage": search.remaining_usage(),
                "metrics": search.metrics(),
            }
        });
        write_line(out, &summary)?;
        Ok::<usize, CliError>(printed)
    });

    match outcome {
        Ok(printed) => {
            let rows = printed.to_string();
            scope.complete_with_fields(&[("rows", rows.as_str())]);
            Ok(())
        }
        Err(e) => {
            scope.fail(e.message());
            Err(e)
        }
    }
}

/// Print the requested fields of one record as a JSON object
pub fn lookup<W: Write>(
    input: &Path,
    record_type: &str,
    id: &str,
    columns: &[String],
    out: &mut W,
) -> CliResult<()> {
    let source = source_for(input, record_type)?;
    let runtime = runtime()?;

    let fields = runtime.block_on(async {
        let search = Search::create(source, record_type);
        search.lookup_fields(record_type, id, columns).await
    })?;

    write_line(out, &Value::Object(fields))
}

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn source_for(input: &Path, record_type: &str) -> CliResult<Arc<dyn RemoteSource>> {
    let rows = read_rows(input)?;
    Ok(Arc::new(InMemorySource::new().with_records(record_type, rows)))
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Parse `name=value` into an equality filter
///
/// Values that parse as JSON (numbers, booleans) are compared as such,
/// anything else as a string.
fn parse_filter(raw: &str) -> CliResult<FilterSpec> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::invalid_argument(format!("Filter '{}' is not name=value", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "Filter '{}' has no field name",
            raw
        )));
    }

    let value = serde_json::from_str::<Value>(value)
        .ok()
        .filter(|v| !v.is_object() && !v.is_array())
        .unwrap_or_else(|| Value::String(value.to_string()));
    Ok(FilterSpec::is(name, value))
}
