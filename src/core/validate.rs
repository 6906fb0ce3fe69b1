//! Purpose: Check a file's descriptor layout and column blocks, producing a structured report.
//! Exports: `ValidationReport`, `ValidationStatus`, `ValidationIssue`, `validate`.
//! Role: Backs the `verify` command; the reader itself does not re-check layout on open.
//! Invariants: Validation never mutates the stream and collects every issue rather than stopping early.
//! Invariants: Issue codes are stable identifiers; messages are human-oriented.

use std::io::{Read, Seek};

use serde::Serialize;
use tracing::warn;

use crate::core::error::{Error, ErrorKind};
use crate::core::reader::Reader;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Ok,
    Corrupt,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Ok => "ok",
            ValidationStatus::Corrupt => "corrupt",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    pub column: Option<String>,
    pub offset: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub row_count: u64,
    pub column_count: usize,
    pub stream_len: u64,
    pub issue_count: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }
}

fn issue(
    code: &str,
    message: impl Into<String>,
    column: Option<&str>,
    offset: Option<u64>,
) -> ValidationIssue {
    ValidationIssue {
        code: code.to_string(),
        message: message.into(),
        column: column.map(str::to_string),
        offset,
    }
}

fn code_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::IntegrityMismatch => "integrity_mismatch",
        ErrorKind::Corrupt => "corrupt_block",
        ErrorKind::Io => "io",
        _ => "decode_failed",
    }
}

pub fn validate<R: Read + Seek>(reader: &mut Reader<R>) -> Result<ValidationReport, Error> {
    let stream_len = reader.stream_len()?;
    let preamble_len = reader.preamble_len() as u64;
    let descriptors = reader.descriptors().to_vec();
    let mut issues = Vec::new();

    if let Some(first) = descriptors.first() {
        if first.offset != preamble_len {
            issues.push(issue(
                "first_offset",
                format!(
                    "first block starts at {}, expected {preamble_len}",
                    first.offset
                ),
                Some(&first.name),
                Some(first.offset),
            ));
        }
    }

    for pair in descriptors.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.offset <= prev.offset {
            issues.push(issue(
                "offset_order",
                format!("offset {} does not increase past {}", next.offset, prev.offset),
                Some(&next.name),
                Some(next.offset),
            ));
        } else if next.offset < prev.end() {
            issues.push(issue(
                "overlap",
                format!("block overlaps the end of '{}' at {}", prev.name, prev.end()),
                Some(&next.name),
                Some(next.offset),
            ));
        }
    }

    for desc in &descriptors {
        if desc.end() > stream_len {
            issues.push(issue(
                "out_of_bounds",
                format!("block ends at {}, past stream length {stream_len}", desc.end()),
                Some(&desc.name),
                Some(desc.offset),
            ));
            continue;
        }
        if let Err(err) = reader.read_column(&desc.name) {
            issues.push(issue(
                code_for(err.kind()),
                err.message().unwrap_or("column failed to decode").to_string(),
                Some(&desc.name),
                Some(desc.offset),
            ));
        }
    }

    let status = if issues.is_empty() {
        ValidationStatus::Ok
    } else {
        warn!(issue_count = issues.len(), "validation found issues");
        ValidationStatus::Corrupt
    };
    Ok(ValidationReport {
        status,
        row_count: reader.row_count(),
        column_count: descriptors.len(),
        stream_len,
        issue_count: issues.len(),
        issues,
    })
}
