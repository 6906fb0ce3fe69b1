// Benchmark harness for colfile.
//
// Purpose:
// - Compare single-column reads from CSV against selective reads from the columnar file.
// - Emit machine-readable JSON to stdout and a human-readable table to stderr.
//
// Design notes:
// - Data is synthetic and deterministic so runs are comparable over time.
// - Each timing repeats the full open+read path; readers are not reused across runs.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use colfile::api::{Error, ErrorKind, Reader, Writer};

use crate::csv_table::read_csv_table;

const DEPARTMENTS: [&str; 5] = ["Engineering", "Marketing", "Sales", "HR", "Finance"];
const CITIES: [&str; 5] = ["New York", "San Francisco", "London", "Tokyo", "Sydney"];
const COUNTRIES: [&str; 5] = ["USA", "USA", "UK", "Japan", "Australia"];

#[derive(Clone, Debug)]
pub struct BenchArgs {
    pub work_dir: Option<PathBuf>,
    pub rows: usize,
    pub runs: usize,
    pub column: String,
    pub format: BenchFormat,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BenchFormat {
    Json,
    Table,
    Both,
}

impl BenchFormat {
    pub fn parse(input: &str) -> Result<Self, Error> {
        match input.trim() {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            "both" => Ok(Self::Both),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("invalid --format (use json|table|both)")),
        }
    }
}

pub fn run_bench(args: BenchArgs, program_version: &str) -> Result<(), Error> {
    if args.rows == 0 || args.runs == 0 {
        return Err(Error::new(ErrorKind::Usage).with_message("--rows and --runs must be positive"));
    }
    let start = SystemTime::now();
    let work_dir = args.work_dir.clone().unwrap_or_else(default_work_dir);
    std::fs::create_dir_all(&work_dir)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(&work_dir).with_source(err))?;

    let csv_path = work_dir.join("bench.csv");
    let cff_path = work_dir.join("bench.cff");
    generate_csv(&csv_path, args.rows)?;

    let convert_start = Instant::now();
    let table = read_csv_table(&csv_path)?;
    Writer::default().write_file(&cff_path, &table)?;
    let convert = convert_start.elapsed();
    drop(table);

    let mut results = vec![result_entry("convert", args.rows, 1, convert, Some("csv parse + encode"))];

    let csv_column = time_runs(args.runs, || csv_column_read(&csv_path, &args.column))?;
    results.push(result_entry("csv_column", args.rows, args.runs, csv_column, None));

    let cff_column = time_runs(args.runs, || {
        let mut reader = Reader::open_path(&cff_path)?;
        let values = reader.read_column(&args.column)?;
        Ok(values.len())
    })?;
    results.push(result_entry("cff_column", args.rows, args.runs, cff_column, Some("selective read")));

    let csv_full = time_runs(args.runs, || {
        let mut reader = csv_reader(&csv_path)?;
        let mut count = 0usize;
        for record in reader.records() {
            record.map_err(|err| csv_io_error(err, &csv_path))?;
            count += 1;
        }
        Ok(count)
    })?;
    results.push(result_entry("csv_full", args.rows, args.runs, csv_full, None));

    let cff_full = time_runs(args.runs, || {
        let mut reader = Reader::open_path(&cff_path)?;
        Ok(reader.read_all()?.len())
    })?;
    results.push(result_entry("cff_full", args.rows, args.runs, cff_full, Some("all columns to rows")));

    let csv_bytes = file_len(&csv_path)?;
    let cff_bytes = file_len(&cff_path)?;
    let output = json!({
        "name": "colfile",
        "version": program_version,
        "ts": rfc3339_now(start),
        "system": system_json(),
        "params": {
            "rows": args.rows,
            "runs": args.runs,
            "column": args.column,
            "work_dir": work_dir.display().to_string(),
            "debug_build": cfg!(debug_assertions),
        },
        "sizes": {
            "csv_bytes": csv_bytes,
            "cff_bytes": cff_bytes,
            "ratio": if csv_bytes == 0 { 0.0 } else { cff_bytes as f64 / csv_bytes as f64 },
        },
        "speedup": {
            "column_read": speedup(csv_column, cff_column),
            "full_read": speedup(csv_full, cff_full),
        },
        "results": results,
    });

    emit_bench_output(output, args.format)
}

pub(crate) fn generate_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let io_err = |err: csv::Error| csv_io_error(err, path);

    writer
        .write_record(["id", "name", "age", "salary", "department", "city", "country"])
        .map_err(io_err)?;
    for i in 0..rows {
        let dept = i % DEPARTMENTS.len();
        writer
            .write_record([
                (i + 1).to_string(),
                format!("Person_{i}"),
                (25 + i % 40).to_string(),
                format!("{:?}", 50000.0 + i as f64 * 100.5),
                DEPARTMENTS[dept].to_string(),
                CITIES[dept].to_string(),
                COUNTRIES[dept].to_string(),
            ])
            .map_err(io_err)?;
    }
    writer.flush().map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
}

fn csv_column_read(path: &Path, column: &str) -> Result<usize, Error> {
    let mut reader = csv_reader(path)?;
    let headers = reader.headers().map_err(|err| csv_io_error(err, path))?.clone();
    let idx = headers.iter().position(|name| name == column).ok_or_else(|| {
        Error::new(ErrorKind::ColumnNotFound)
            .with_message(format!("column '{column}' not found"))
            .with_column(column)
            .with_path(path)
    })?;
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| csv_io_error(err, path))?;
        values.push(record.get(idx).unwrap_or_default().to_string());
    }
    Ok(values.len())
}

fn csv_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>, Error> {
    let file = File::open(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    Ok(csv::Reader::from_reader(BufReader::new(file)))
}

fn csv_io_error(err: csv::Error, path: &Path) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("csv i/o failed")
        .with_path(path)
        .with_source(err)
}

/// Average wall time over `runs`; the closure returns a value count so work is not optimized away.
fn time_runs<F>(runs: usize, mut f: F) -> Result<Duration, Error>
where
    F: FnMut() -> Result<usize, Error>,
{
    let mut total = Duration::ZERO;
    let mut sink = 0usize;
    for _ in 0..runs {
        let start = Instant::now();
        sink = sink.wrapping_add(f()?);
        total += start.elapsed();
    }
    std::hint::black_box(sink);
    Ok(total / runs as u32)
}

fn result_entry(bench: &str, rows: usize, runs: usize, avg: Duration, notes: Option<&str>) -> Value {
    json!({
        "bench": bench,
        "rows": rows,
        "runs": runs,
        "avg_ms": avg.as_secs_f64() * 1000.0,
        "notes": notes.unwrap_or(""),
    })
}

fn speedup(baseline: Duration, candidate: Duration) -> f64 {
    let candidate = candidate.as_secs_f64();
    if candidate == 0.0 {
        0.0
    } else {
        baseline.as_secs_f64() / candidate
    }
}

fn emit_bench_output(value: Value, format: BenchFormat) -> Result<(), Error> {
    match format {
        BenchFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string()));
            Ok(())
        }
        BenchFormat::Table => emit_table(&value),
        BenchFormat::Both => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string()));
            emit_table(&value)
        }
    }
}

fn emit_table(value: &Value) -> Result<(), Error> {
    let mut stderr = io::stderr().lock();
    let write_err = |err: io::Error| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write bench table")
            .with_source(err)
    };

    writeln!(stderr, "colfile bench (table)").map_err(write_err)?;
    let results = value
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::new(ErrorKind::Internal).with_message("bench results missing"))?;

    writeln!(
        stderr,
        "{:>12}  {:>10}  {:>6}  {:>10}  {}",
        "bench", "rows", "runs", "avg ms", "notes"
    )
    .map_err(write_err)?;
    for item in results {
        let bench = item.get("bench").and_then(|v| v.as_str()).unwrap_or("?");
        let rows = item.get("rows").and_then(|v| v.as_u64()).unwrap_or(0);
        let runs = item.get("runs").and_then(|v| v.as_u64()).unwrap_or(0);
        let avg_ms = item.get("avg_ms").and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
        let notes = item.get("notes").and_then(|v| v.as_str()).unwrap_or("");
        writeln!(stderr, "{bench:>12}  {rows:>10}  {runs:>6}  {avg_ms:>10.3}  {notes}")
            .map_err(write_err)?;
    }

    let csv_bytes = value.pointer("/sizes/csv_bytes").and_then(|v| v.as_u64()).unwrap_or(0);
    let cff_bytes = value.pointer("/sizes/cff_bytes").and_then(|v| v.as_u64()).unwrap_or(0);
    writeln!(
        stderr,
        "size: csv {} vs columnar {}",
        format_bytes(csv_bytes),
        format_bytes(cff_bytes)
    )
    .map_err(write_err)?;
    Ok(())
}

fn file_len(path: &Path) -> Result<u64, Error> {
    std::fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
}

fn system_json() -> Value {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpus": cpus,
    })
}

fn default_work_dir() -> PathBuf {
    let pid = std::process::id();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis();
    PathBuf::from(".scratch").join(format!("colfile-bench-{pid}-{ts}"))
}

fn rfc3339_now(ts: SystemTime) -> String {
    let dur = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = dur.as_secs() as i64;
    let nsec = dur.subsec_nanos();
    let tm = time::OffsetDateTime::from_unix_timestamp(secs).unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    let tm = tm.replace_nanosecond(nsec).unwrap_or(tm);
    tm.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn format_bytes(value: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    let v = value as f64;
    if v >= MB {
        format!("{:.1}MiB", v / MB)
    } else if v >= KB {
        format!("{:.1}KiB", v / KB)
    } else {
        format!("{value}B")
    }
}
