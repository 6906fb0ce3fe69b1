//! Purpose: Define the stable public Rust API boundary for colfile.
//! Exports: Table model, writer, reader, validation report, and error types.
//! Role: Public, additive-only surface used by the CLI and library consumers.
//! Invariants: Everything the CLI needs is reachable from here.

pub use crate::core::codec::DEFAULT_COMPRESSION_LEVEL;
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{
    ColumnDescriptor, ColumnType, FORMAT_VERSION, FileHeader, MAGIC, preamble_len,
};
pub use crate::core::reader::{CountingReader, Reader};
pub use crate::core::validate::{ValidationIssue, ValidationReport, ValidationStatus, validate};
pub use crate::core::value::{ColumnBatch, ColumnValues, Row, Table, Value};
pub use crate::core::writer::{Encoded, WriteOptions, Writer, encode};
