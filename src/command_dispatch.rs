//! Purpose: Hold top-level CLI command dispatch for `colfile`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command reaches the file only through `colfile::api`.
//! Invariants: `verify` exits with the `Corrupt` code when the report has issues.

use super::*;

use std::io::Write;

use crate::bench::{BenchArgs, BenchFormat, run_bench};
use crate::csv_table::{read_csv_table, write_csv_columns};
use crate::inspect::{InspectOptions, render_inspection};

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Import {
            input,
            output,
            level,
            json,
        } => {
            let table = if json {
                read_json_table(&input)?
            } else {
                read_csv_table(&input)?
            };
            let summary = encode_to_file(&table, &output, level)?;
            emit_json(summary);
            Ok(RunOutcome::ok())
        }
        Command::Export {
            input,
            output,
            columns,
        } => {
            let mut reader = open_reader(&input)?;
            let owned = selected_columns(&reader, columns);
            let order: Vec<&str> = owned.iter().map(String::as_str).collect();
            let batch = reader.read_columns(Some(&order))?;
            let row_count = row_count_usize(reader.row_count())?;
            write_csv_columns(&output, &batch, &order, row_count)?;
            Ok(RunOutcome::ok())
        }
        Command::Cat { input, columns } => {
            let mut reader = open_reader(&input)?;
            let rows = if columns.is_empty() {
                reader.read_all()?
            } else {
                let names: Vec<&str> = columns.iter().map(String::as_str).collect();
                let row_count = row_count_usize(reader.row_count())?;
                reader.read_columns(Some(&names))?.into_rows(row_count)
            };

            let mut stdout = io::stdout().lock();
            for row in rows {
                let line = serde_json::to_string(&row.to_json()).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode row")
                        .with_source(err)
                })?;
                if let Err(err) = writeln!(stdout, "{line}") {
                    if err.kind() == io::ErrorKind::BrokenPipe {
                        break;
                    }
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to write output")
                        .with_source(err));
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Schema { input } => {
            let reader = open_reader(&input)?;
            emit_json(json!({
                "path": input.display().to_string(),
                "rows": reader.row_count(),
                "preamble_len": reader.preamble_len(),
                "columns": reader.descriptors().iter().map(descriptor_json).collect::<Vec<_>>(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Inspect {
            input,
            header_only,
            show_data,
            column,
        } => {
            let mut reader = open_reader(&input)?;
            if let Some(name) = column.as_deref() {
                if reader.descriptor(name).is_none() {
                    return Err(Error::new(ErrorKind::ColumnNotFound)
                        .with_message(format!("column '{name}' not found"))
                        .with_column(name)
                        .with_path(&input));
                }
            }
            let options = InspectOptions {
                header_only,
                show_data,
                column,
            };
            let label = input.display().to_string();
            print!("{}", render_inspection(&label, &mut reader, &options)?);
            Ok(RunOutcome::ok())
        }
        Command::Verify { input } => {
            let mut reader = open_reader(&input)?;
            let report = colfile::api::validate(&mut reader)?;
            emit_json(report_json(&input, &report)?);
            if report.is_ok() {
                Ok(RunOutcome::ok())
            } else {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Corrupt)))
            }
        }
        Command::Bench {
            rows,
            runs,
            column,
            work_dir,
            format,
        } => {
            let format = BenchFormat::parse(&format)?;
            run_bench(
                BenchArgs {
                    work_dir,
                    rows,
                    runs,
                    column,
                    format,
                },
                env!("CARGO_PKG_VERSION"),
            )?;
            Ok(RunOutcome::ok())
        }
    }
}

/// Requested names in the caller's order, or every column in file order.
fn selected_columns<R: io::Read + io::Seek>(reader: &Reader<R>, requested: Vec<String>) -> Vec<String> {
    if requested.is_empty() {
        reader.column_names().into_iter().map(str::to_string).collect()
    } else {
        requested
    }
}

fn row_count_usize(rows: u64) -> Result<usize, Error> {
    usize::try_from(rows).map_err(|_| {
        Error::new(ErrorKind::Corrupt).with_message(format!("row count {rows} exceeds address space"))
    })
}
