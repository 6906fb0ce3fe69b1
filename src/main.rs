//! Purpose: `colfile` CLI entry point.
//! Role: Binary crate root; parses args, installs logging, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (JSON, JSON lines, CSV files, or text dumps).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Logging goes to stderr and defaults to `warn` unless `RUST_LOG` says otherwise.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod bench;
mod command_dispatch;
mod csv_table;
mod inspect;

use colfile::api::{
    ColumnDescriptor, Error, ErrorKind, Reader, Table, ValidationReport, WriteOptions, Writer,
    to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `colfile --help`."));
            }
        },
    };

    init_tracing();
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_io_hint)
        .map_err(add_corrupt_hint)
        .map_err(add_internal_hint)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "colfile",
    version,
    about = "Self-describing columnar files with per-column compression",
    long_about = None,
    after_help = r#"EXAMPLES
  $ colfile import people.csv people.cff
  $ colfile cat people.cff -c name -c salary
  $ colfile export people.cff subset.csv -c id -c city
  $ colfile inspect people.cff --header-only
  $ colfile verify people.cff

Set RUST_LOG=debug to trace per-column encode and decode steps."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Encode a CSV (or JSON array of objects) into a columnar file")]
    Import {
        #[arg(help = "Input CSV file with a header row", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(help = "Output columnar file", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(
            long,
            default_value_t = colfile::api::DEFAULT_COMPRESSION_LEVEL,
            help = "DEFLATE compression level (0-9)"
        )]
        level: u32,
        #[arg(long, help = "Treat input as a JSON array of objects instead of CSV")]
        json: bool,
    },
    #[command(about = "Decode selected columns back to CSV")]
    Export {
        #[arg(help = "Input columnar file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(help = "Output CSV file", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(short = 'c', long = "column", help = "Column to export (repeatable; default all)")]
        columns: Vec<String>,
    },
    #[command(about = "Print rows as JSON lines")]
    Cat {
        #[arg(help = "Input columnar file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(short = 'c', long = "column", help = "Column to include (repeatable; default all)")]
        columns: Vec<String>,
    },
    #[command(about = "Print row count and column descriptors as JSON")]
    Schema {
        #[arg(help = "Input columnar file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },
    #[command(about = "Dump header and column block bytes")]
    Inspect {
        #[arg(help = "Input columnar file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, help = "Stop after the header region")]
        header_only: bool,
        #[arg(long, help = "Show the first bytes of every column block")]
        show_data: bool,
        #[arg(long, help = "Show the first bytes of one column block")]
        column: Option<String>,
    },
    #[command(about = "Check block layout and decode every column")]
    Verify {
        #[arg(help = "Input columnar file", value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },
    #[command(about = "Compare CSV and columnar read times on synthetic data")]
    Bench {
        #[arg(long, default_value_t = 100_000, help = "Rows of synthetic data")]
        rows: usize,
        #[arg(long, default_value_t = 5, help = "Timed runs per measurement")]
        runs: usize,
        #[arg(long, default_value = "salary", help = "Column used for single-column reads")]
        column: String,
        #[arg(long, help = "Scratch directory (default: .scratch/colfile-bench-*)", value_hint = ValueHint::DirPath)]
        work_dir: Option<PathBuf>,
        #[arg(long, default_value = "both", help = "Output format: json|table|both")]
        format: String,
    },
}

fn open_reader(path: &Path) -> Result<Reader<io::BufReader<std::fs::File>>, Error> {
    Reader::open_path(path).map_err(|err| add_open_hint(err, path))
}

fn read_json_table(path: &Path) -> Result<Table, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let value: Value = serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("input is not valid JSON")
            .with_path(path)
            .with_source(err)
    })?;
    Table::from_json(&value).map_err(|err| err.with_path(path))
}

fn import_summary(path: &Path, rows: u64, descriptors: &[ColumnDescriptor], bytes: usize) -> Value {
    json!({
        "path": path.display().to_string(),
        "rows": rows,
        "columns": descriptors.iter().map(descriptor_json).collect::<Vec<_>>(),
        "bytes": bytes,
    })
}

fn descriptor_json(desc: &ColumnDescriptor) -> Value {
    json!({
        "name": desc.name,
        "type": desc.column_type.name(),
        "offset": desc.offset,
        "compressed_size": desc.compressed_size,
        "uncompressed_size": desc.uncompressed_size,
    })
}

fn report_json(path: &Path, report: &ValidationReport) -> Result<Value, Error> {
    let mut value = serde_json::to_value(report).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode validation report")
            .with_source(err)
    })?;
    if let Value::Object(map) = &mut value {
        map.insert("path".to_string(), json!(path.display().to_string()));
    }
    Ok(value)
}

fn write_options(level: u32) -> WriteOptions {
    WriteOptions::default().with_compression_level(level)
}

fn encode_to_file(table: &Table, output: &Path, level: u32) -> Result<Value, Error> {
    let encoded = Writer::new(write_options(level)).write_file(output, table)?;
    Ok(import_summary(
        output,
        encoded.header.row_count,
        &encoded.descriptors,
        encoded.len(),
    ))
}

fn add_open_hint(err: Error, path: &Path) -> Error {
    if err.hint().is_some() {
        return err;
    }
    let err = if err.path().is_none() {
        err.with_path(path)
    } else {
        err
    };
    match err.kind() {
        ErrorKind::InvalidMagic => {
            err.with_hint("Not a colfile file. Create one with `colfile import`.")
        }
        ErrorKind::UnsupportedVersion => {
            err.with_hint("File was written by a different format version.")
        }
        _ => err,
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Io => err.with_hint("I/O error. Check the path, permissions, and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    let damaged = matches!(
        err.kind(),
        ErrorKind::Corrupt | ErrorKind::IntegrityMismatch
    );
    if !damaged || err.hint().is_some() {
        return err;
    }
    err.with_hint("File appears damaged. Run `colfile verify` for a per-column report.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::Io => "i/o error",
        ErrorKind::Corrupt => "corrupt data",
        ErrorKind::InvalidMagic => "not a colfile file",
        ErrorKind::UnsupportedVersion => "unsupported format version",
        ErrorKind::UnknownTypeTag => "unknown column type tag",
        ErrorKind::ColumnNotFound => "column not found",
        ErrorKind::IntegrityMismatch => "block size mismatch",
        ErrorKind::EmptyInput => "empty input",
        ErrorKind::NonUniformLength => "columns have different lengths",
        ErrorKind::InvalidValueForType => "value does not fit column type",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(column) = err.column() {
        lines.push(format!("column: {column}"));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!("offset: {offset}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{add_corrupt_hint, add_open_hint, error_json, error_message};
    use colfile::api::{Error, ErrorKind};
    use std::path::Path;

    #[test]
    fn error_json_carries_context() {
        let err = Error::new(ErrorKind::ColumnNotFound)
            .with_message("column 'zip' not found")
            .with_column("zip")
            .with_path("/tmp/a.cff");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "ColumnNotFound");
        assert_eq!(value["error"]["column"], "zip");
        assert_eq!(value["error"]["path"], "/tmp/a.cff");
        assert!(value["error"].get("offset").is_none());
    }

    #[test]
    fn fallback_messages_cover_format_kinds() {
        let err = Error::new(ErrorKind::InvalidMagic);
        assert_eq!(error_message(&err), "not a colfile file");
    }

    #[test]
    fn hints_do_not_override_existing_ones() {
        let err = add_open_hint(Error::new(ErrorKind::InvalidMagic), Path::new("x.cff"));
        assert!(err.hint().is_some_and(|h| h.contains("colfile import")));
        assert_eq!(err.path(), Some(Path::new("x.cff")));

        let kept = add_corrupt_hint(Error::new(ErrorKind::Corrupt).with_hint("custom"));
        assert_eq!(kept.hint(), Some("custom"));
        let added = add_corrupt_hint(Error::new(ErrorKind::IntegrityMismatch));
        assert!(added.hint().is_some_and(|h| h.contains("verify")));
    }
}
