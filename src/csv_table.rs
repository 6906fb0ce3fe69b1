//! Purpose: Convert between CSV files and the in-memory table model for `import`/`export`.
//! Exports: `read_csv_table`, `write_csv_columns`.
//! Role: Thin collaborator around the `csv` crate; all type decisions stay in the writer.
//! Invariants: Every CSV cell enters as text; empty cells enter as empty text.
//! Invariants: Export writes columns in the order the caller asked for them.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use colfile::api::{ColumnBatch, ColumnValues, Error, ErrorKind, Row, Table, Value};

const READ_BUFFER_BYTES: usize = 128 * 1024;

pub(crate) fn read_csv_table(path: &Path) -> Result<Table, Error> {
    let file = File::open(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let mut reader = csv::Reader::from_reader(BufReader::with_capacity(READ_BUFFER_BYTES, file));
    let headers = reader
        .headers()
        .map_err(|err| csv_error(err, path))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| csv_error(err, path))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name, Value::from(cell)))
            .collect();
        rows.push(row);
    }
    Ok(Table::Rows(rows))
}

pub(crate) fn write_csv_columns(
    path: &Path,
    batch: &ColumnBatch,
    order: &[&str],
    row_count: usize,
) -> Result<(), Error> {
    let file = File::create(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer
        .write_record(order)
        .map_err(|err| csv_error(err, path))?;

    let columns = order
        .iter()
        .map(|name| {
            batch.get(name).ok_or_else(|| {
                Error::new(ErrorKind::Internal)
                    .with_message("export column missing from decoded batch")
                    .with_column(*name)
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut record = Vec::with_capacity(columns.len());
    for idx in 0..row_count {
        record.clear();
        for column in &columns {
            record.push(render_cell(column, idx));
        }
        writer
            .write_record(&record)
            .map_err(|err| csv_error(err, path))?;
    }
    let mut inner = writer
        .into_inner()
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_message(err.to_string()))?;
    inner
        .flush()
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
}

/// Floats keep a decimal point so a re-import infers FLOAT64 again.
pub(crate) fn render_cell(column: &ColumnValues, idx: usize) -> String {
    match column {
        ColumnValues::Int32(values) => values.get(idx).map(|v| v.to_string()),
        ColumnValues::Float64(values) => values.get(idx).map(|v| format!("{v:?}")),
        ColumnValues::String(values) => values.get(idx).cloned(),
    }
    .unwrap_or_default()
}

fn csv_error(err: csv::Error, path: &Path) -> Error {
    let kind = if err.is_io_error() {
        ErrorKind::Io
    } else {
        ErrorKind::Usage
    };
    Error::new(kind)
        .with_message("malformed CSV input")
        .with_path(path)
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{read_csv_table, render_cell, write_csv_columns};
    use colfile::api::{ColumnValues, Reader, Table, Value, Writer};

    #[test]
    fn csv_cells_enter_as_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "id,name,score\n1,Alice,95.5\n2,,87.0\n").expect("write");

        let Table::Rows(rows) = read_csv_table(&path).expect("read") else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::from("1")));
        assert_eq!(rows[1].get("name"), Some(&Value::from("")));
    }

    #[test]
    fn floats_render_with_decimal_point() {
        let column = ColumnValues::Float64(vec![87.0, 95.5]);
        assert_eq!(render_cell(&column, 0), "87.0");
        assert_eq!(render_cell(&column, 1), "95.5");
    }

    #[test]
    fn export_writes_requested_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv_in = dir.path().join("in.csv");
        let cff = dir.path().join("data.cff");
        let csv_out = dir.path().join("out.csv");
        std::fs::write(&csv_in, "id,name\n1,a\n2,b\n").expect("write");

        let table = read_csv_table(&csv_in).expect("read");
        Writer::default().write_file(&cff, &table).expect("encode");
        let mut reader = Reader::open_path(&cff).expect("open");
        let batch = reader.read_columns(None).expect("columns");
        write_csv_columns(&csv_out, &batch, &["name", "id"], 2).expect("export");

        let text = std::fs::read_to_string(&csv_out).expect("read back");
        assert_eq!(text, "name,id\na,1\nb,2\n");
    }
}
