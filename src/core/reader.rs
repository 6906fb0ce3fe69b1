//! Purpose: Open a columnar stream and materialize whole tables or selected columns on demand.
//! Exports: `Reader`.
//! Role: Decoder half of the format; parses the preamble once, then reads blocks per call.
//! Invariants: The parsed header and descriptors never change for the lifetime of a handle.
//! Invariants: Only requested blocks are read and inflated; nothing is cached between calls.
//! Invariants: A selective read either returns every requested column or fails as a whole.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::codec;
use crate::core::error::{Error, ErrorKind};
use crate::core::format::{self, ColumnDescriptor, ColumnType, FileHeader};
use crate::core::value::{ColumnBatch, ColumnValues, Row};

pub struct Reader<R> {
    inner: R,
    path: Option<PathBuf>,
    header: FileHeader,
    descriptors: Vec<ColumnDescriptor>,
}

impl Reader<BufReader<File>> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
        let mut reader =
            Reader::open(BufReader::new(file)).map_err(|err| err.with_path(path))?;
        reader.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            rows = reader.header.row_count,
            columns = reader.header.column_count,
            "opened columnar file"
        );
        Ok(reader)
    }
}

impl<R: Read + Seek> Reader<R> {
    pub fn open(mut inner: R) -> Result<Self, Error> {
        inner.seek(SeekFrom::Start(0)).map_err(Error::io)?;
        let (header, descriptors) = format::read_preamble(&mut inner)?;
        Ok(Self {
            inner,
            path: None,
            header,
            descriptors,
        })
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    pub fn row_count(&self) -> u64 {
        self.header.row_count
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.descriptors.iter().find(|desc| desc.name == name)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Byte length of header plus descriptor table.
    pub fn preamble_len(&self) -> usize {
        format::preamble_len(self.descriptors.iter().map(|desc| desc.name.as_str()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|desc| desc.name.as_str()).collect()
    }

    /// Column name to type, in file order.
    pub fn schema(&self) -> Vec<(&str, ColumnType)> {
        self.descriptors
            .iter()
            .map(|desc| (desc.name.as_str(), desc.column_type))
            .collect()
    }

    pub fn read_column(&mut self, name: &str) -> Result<ColumnValues, Error> {
        let idx = self.index_of(name)?;
        self.materialize(idx)
    }

    /// Reads the named columns (all when `names` is `None`), returned in file order.
    pub fn read_columns(&mut self, names: Option<&[&str]>) -> Result<ColumnBatch, Error> {
        let selected: Vec<usize> = match names {
            None => (0..self.descriptors.len()).collect(),
            Some(names) => {
                let mut selected = Vec::with_capacity(names.len());
                for name in names {
                    selected.push(self.index_of(name)?);
                }
                selected.sort_unstable();
                selected.dedup();
                selected
            }
        };

        let mut batch = ColumnBatch::default();
        for idx in selected {
            let values = self.materialize(idx)?;
            batch.push(self.descriptors[idx].name.clone(), values);
        }
        Ok(batch)
    }

    pub fn read_all(&mut self) -> Result<Vec<Row>, Error> {
        let row_count = self.row_count_usize()?;
        let batch = self.read_columns(None)?;
        Ok(batch.into_rows(row_count))
    }

    /// Reads one block verbatim, still compressed.
    pub fn read_raw_block(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        let idx = self.index_of(name)?;
        let desc = self.descriptors[idx].clone();
        self.read_block(&desc)
    }

    /// At most `max_len` leading bytes of a compressed block.
    pub fn read_raw_prefix(&mut self, name: &str, max_len: u64) -> Result<Vec<u8>, Error> {
        let idx = self.index_of(name)?;
        let desc = self.descriptors[idx].clone();
        self.read_range(desc.offset, desc.compressed_size.min(max_len))
            .map_err(|err| self.with_context(err, &desc))
    }

    /// Header and descriptor table exactly as stored.
    pub fn read_preamble_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.preamble_len() as u64;
        self.read_range(0, len)
    }

    /// The wrapped stream, for callers that instrument it (see `CountingReader`).
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Total stream length, leaving the cursor at the end.
    pub fn stream_len(&mut self) -> Result<u64, Error> {
        self.inner.seek(SeekFrom::End(0)).map_err(Error::io)
    }

    fn index_of(&self, name: &str) -> Result<usize, Error> {
        self.descriptors
            .iter()
            .position(|desc| desc.name == name)
            .ok_or_else(|| {
                let mut err = Error::new(ErrorKind::ColumnNotFound)
                    .with_message(format!("column '{name}' not found"))
                    .with_column(name)
                    .with_hint(format!("Available columns: {}", self.column_names().join(", ")));
                if let Some(path) = &self.path {
                    err = err.with_path(path);
                }
                err
            })
    }

    fn row_count_usize(&self) -> Result<usize, Error> {
        usize::try_from(self.header.row_count).map_err(|_| {
            Error::new(ErrorKind::Corrupt).with_message("row count exceeds addressable memory")
        })
    }

    fn materialize(&mut self, idx: usize) -> Result<ColumnValues, Error> {
        let row_count = self.row_count_usize()?;
        let desc = self.descriptors[idx].clone();
        let block = self.read_block(&desc)?;
        let raw = codec::decompress(&block, desc.uncompressed_size)
            .map_err(|err| self.with_context(err, &desc))?;
        let values = codec::deserialize_column(desc.column_type, &raw, row_count)
            .map_err(|err| self.with_context(err, &desc))?;
        debug!(
            column = desc.name.as_str(),
            column_type = desc.column_type.name(),
            offset = desc.offset,
            compressed = desc.compressed_size,
            "decoded column"
        );
        Ok(values)
    }

    fn read_block(&mut self, desc: &ColumnDescriptor) -> Result<Vec<u8>, Error> {
        self.read_range(desc.offset, desc.compressed_size)
            .map_err(|err| self.with_context(err, desc))
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, Error> {
        self.inner.seek(SeekFrom::Start(offset)).map_err(Error::io)?;
        let mut buf = Vec::new();
        (&mut self.inner)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(Error::io)?;
        if buf.len() as u64 != len {
            return Err(Error::new(ErrorKind::IntegrityMismatch).with_message(format!(
                "stream truncated: expected {len} bytes at offset {offset}, found {}",
                buf.len()
            )));
        }
        Ok(buf)
    }

    fn with_context(&self, err: Error, desc: &ColumnDescriptor) -> Error {
        let err = err.with_column(desc.name.as_str()).with_offset(desc.offset);
        match &self.path {
            Some(path) => err.with_path(path),
            None => err,
        }
    }
}

impl<R> std::fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

/// Wraps a reader and counts bytes pulled through it; used to prove untouched blocks stay unread.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.bytes_read += read as u64;
        Ok(read)
    }
}

impl<R: Seek> Seek for CountingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::{CountingReader, Reader};
    use crate::core::error::ErrorKind;
    use crate::core::format::ColumnType;
    use crate::core::value::{ColumnValues, Row, Table, Value};
    use crate::core::writer::encode;
    use std::io::Cursor;

    fn people_bytes() -> Vec<u8> {
        let table = Table::Rows(vec![
            Row::new().with("id", 1).with("name", "Alice").with("score", 95.5),
            Row::new().with("id", 2).with("name", "Bob").with("score", 87.0),
        ]);
        encode(&table).expect("encode")
    }

    #[test]
    fn schema_reflects_descriptors() {
        let reader = Reader::open(Cursor::new(people_bytes())).expect("open");
        assert_eq!(reader.row_count(), 2);
        assert_eq!(reader.column_names(), ["id", "name", "score"]);
        assert_eq!(
            reader.schema(),
            [
                ("id", ColumnType::Int32),
                ("name", ColumnType::String),
                ("score", ColumnType::Float64),
            ]
        );
    }

    #[test]
    fn selective_read_touches_only_requested_block() {
        let bytes = people_bytes();
        let mut reader = Reader::open(CountingReader::new(Cursor::new(bytes))).expect("open");
        let after_open = reader.inner.bytes_read();
        let name_size = reader.descriptor("name").expect("desc").compressed_size;

        let batch = reader.read_columns(Some(&["name"][..])).expect("read");
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.get("name"),
            Some(&ColumnValues::String(vec!["Alice".to_string(), "Bob".to_string()]))
        );
        assert_eq!(reader.inner.bytes_read() - after_open, name_size);
    }

    #[test]
    fn raw_prefix_reads_only_the_requested_bytes() {
        let mut reader =
            Reader::open(CountingReader::new(Cursor::new(people_bytes()))).expect("open");
        let after_open = reader.inner.bytes_read();
        let full = reader.read_raw_block("name").expect("block");
        let after_block = reader.inner.bytes_read();
        assert_eq!(after_block - after_open, full.len() as u64);

        let prefix = reader.read_raw_prefix("name", 4).expect("prefix");
        assert_eq!(prefix, full[..4]);
        assert_eq!(reader.inner.bytes_read() - after_block, 4);

        let whole = reader.read_raw_prefix("name", 1 << 20).expect("whole");
        assert_eq!(whole, full);
    }

    #[test]
    fn unknown_column_aborts_without_reading() {
        let mut reader =
            Reader::open(CountingReader::new(Cursor::new(people_bytes()))).expect("open");
        let after_open = reader.inner.bytes_read();
        let err = reader
            .read_columns(Some(&["name", "doesnotexist"][..]))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
        assert_eq!(err.column(), Some("doesnotexist"));
        assert_eq!(reader.inner.bytes_read(), after_open);
    }

    #[test]
    fn repeated_reads_return_same_values() {
        let mut reader = Reader::open(Cursor::new(people_bytes())).expect("open");
        let first = reader.read_column("score").expect("first");
        let second = reader.read_column("score").expect("second");
        assert_eq!(first, second);
        assert_eq!(first, ColumnValues::Float64(vec![95.5, 87.0]));
    }

    #[test]
    fn read_all_zips_rows() {
        let mut reader = Reader::open(Cursor::new(people_bytes())).expect("open");
        let rows = reader.read_all().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Alice")));
        assert_eq!(rows[1].get("id"), Some(&Value::Int(2)));
        assert_eq!(rows[1].get("score"), Some(&Value::Float(87.0)));
    }

    #[test]
    fn truncated_block_is_integrity_mismatch() {
        let mut bytes = people_bytes();
        bytes.truncate(bytes.len() - 3);
        let mut reader = Reader::open(Cursor::new(bytes)).expect("open");
        let err = reader.read_column("score").expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
        // Earlier blocks are still intact.
        reader.read_column("id").expect("id intact");
    }

    #[test]
    fn wrong_uncompressed_size_is_integrity_mismatch() {
        let bytes = people_bytes();
        let mut reader = Reader::open(Cursor::new(bytes.clone())).expect("open");
        let desc = reader.descriptor("id").expect("desc").clone();
        drop(reader);

        // uncompressed_size is the last u64 of the first descriptor
        let field_at = 20 + 4 + desc.name.len() + 1 + 8 + 8;
        let mut patched = bytes;
        patched[field_at..field_at + 8].copy_from_slice(&(desc.uncompressed_size + 4).to_le_bytes());
        reader = Reader::open(Cursor::new(patched)).expect("open");
        let err = reader.read_column("id").expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
        assert_eq!(err.column(), Some("id"));
    }
}
