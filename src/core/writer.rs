//! Purpose: Turn an in-memory table into one self-describing columnar byte stream.
//! Exports: `Writer`, `WriteOptions`, `Encoded`.
//! Role: Encoder half of the format; the reader shares only `core::format` with it.
//! Invariants: Columns are compressed before offsets are assigned; no backpatching.
//! Invariants: Blocks are laid out consecutively in declaration order right after the preamble.
//! Invariants: File output is a plain truncate-and-write; a failed write can leave a partial file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::core::codec::{self, DEFAULT_COMPRESSION_LEVEL};
use crate::core::error::{Error, ErrorKind};
use crate::core::format::{self, ColumnDescriptor, FileHeader};
use crate::core::value::Table;

const MAX_COMPRESSION_LEVEL: u32 = 9;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteOptions {
    pub compression_level: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl WriteOptions {
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "compression level {} out of range",
                    self.compression_level
                ))
                .with_hint("Use a level between 0 (store) and 9 (smallest)."));
        }
        Ok(())
    }
}

/// A fully laid-out file: preamble plus every compressed block.
#[derive(Clone, Debug)]
pub struct Encoded {
    pub header: FileHeader,
    pub descriptors: Vec<ColumnDescriptor>,
    pub bytes: Vec<u8>,
}

impl Encoded {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Clone, Debug, Default)]
pub struct Writer {
    options: WriteOptions,
}

impl Writer {
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    pub fn encode(&self, table: &Table) -> Result<Encoded, Error> {
        self.options.validate()?;
        let columns = table.columns()?;
        let row_count = columns[0].values.len();

        let mut descriptors = Vec::with_capacity(columns.len());
        let mut blocks = Vec::with_capacity(columns.len());
        for column in &columns {
            let column_type = codec::infer_type(column.values.iter().copied());
            let raw = codec::serialize_column(column.name, column_type, &column.values)?;
            let block = codec::compress(&raw, self.options.compression_level)
                .map_err(|err| err.with_column(column.name))?;
            debug!(
                column = column.name,
                column_type = column_type.name(),
                uncompressed = raw.len(),
                compressed = block.len(),
                "encoded column"
            );
            descriptors.push(ColumnDescriptor {
                name: column.name.to_string(),
                column_type,
                offset: 0,
                compressed_size: block.len() as u64,
                uncompressed_size: raw.len() as u64,
            });
            blocks.push(block);
        }

        let column_count = u32::try_from(descriptors.len()).map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("too many columns for one file")
        })?;
        let preamble_len = format::preamble_len(descriptors.iter().map(|desc| desc.name.as_str()));
        let mut next_offset = preamble_len as u64;
        for desc in descriptors.iter_mut() {
            desc.offset = next_offset;
            next_offset += desc.compressed_size;
        }

        let header = FileHeader {
            row_count: row_count as u64,
            column_count,
        };
        let mut bytes = format::encode_preamble(&header, &descriptors);
        bytes.reserve(next_offset as usize - bytes.len());
        for block in &blocks {
            bytes.extend_from_slice(block);
        }
        debug_assert_eq!(bytes.len() as u64, next_offset);

        Ok(Encoded {
            header,
            descriptors,
            bytes,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W, table: &Table) -> Result<Encoded, Error> {
        let encoded = self.encode(table)?;
        out.write_all(&encoded.bytes).map_err(Error::io)?;
        out.flush().map_err(Error::io)?;
        Ok(encoded)
    }

    pub fn write_file(&self, path: impl AsRef<Path>, table: &Table) -> Result<Encoded, Error> {
        let path = path.as_ref();
        // Nothing touches the destination until encoding succeeds.
        let encoded = self.encode(table)?;
        let mut file = File::create(path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
        file.write_all(&encoded.bytes)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
        file.flush()
            .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
        info!(
            path = %path.display(),
            rows = encoded.header.row_count,
            columns = encoded.header.column_count,
            bytes = encoded.len(),
            "wrote columnar file"
        );
        Ok(encoded)
    }
}

/// Encodes with default options.
pub fn encode(table: &Table) -> Result<Vec<u8>, Error> {
    Writer::default().encode(table).map(Encoded::into_bytes)
}
