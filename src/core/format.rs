//! Purpose: Define the on-disk layout shared by the writer and the reader.
//! Exports: `MAGIC`, `FORMAT_VERSION`, `ColumnType`, `FileHeader`, `ColumnDescriptor`,
//! `encode_preamble`, `read_preamble`, `preamble_len`.
//! Role: Single source of truth for byte offsets; the writer and reader share no other state.
//! Invariants: All multi-byte integers are little-endian.
//! Invariants: Version list is additive; bump only for incompatible on-disk changes.

use std::io::{self, Read};

use crate::core::error::{Error, ErrorKind};

pub const MAGIC: [u8; 4] = *b"CFF1";
pub const FORMAT_VERSION: u32 = 1;
pub const SUPPORTED_FORMAT_VERSIONS: &[u32] = &[FORMAT_VERSION];

/// magic + version + row count + column count.
pub const FIXED_HEADER_LEN: usize = 4 + 4 + 8 + 4;
/// Per-descriptor bytes excluding the name itself.
pub const DESCRIPTOR_FIXED_LEN: usize = 4 + 1 + 8 + 8 + 8;

// Cap on up-front descriptor allocation; a corrupt count must not reserve gigabytes.
const MAX_PREALLOC_COLUMNS: usize = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ColumnType {
    Int32 = 1,
    Float64 = 2,
    String = 3,
}

impl ColumnType {
    pub fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            1 => Ok(ColumnType::Int32),
            2 => Ok(ColumnType::Float64),
            3 => Ok(ColumnType::String),
            _ => Err(Error::new(ErrorKind::UnknownTypeTag)
                .with_message(format!("unknown column type tag {tag}"))),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int32 => "INT32",
            ColumnType::Float64 => "FLOAT64",
            ColumnType::String => "STRING",
        }
    }

    /// Byte width of one value for fixed-width types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Int32 => Some(4),
            ColumnType::Float64 => Some(8),
            ColumnType::String => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileHeader {
    pub row_count: u64,
    pub column_count: u32,
}

impl FileHeader {
    pub fn encode(&self) -> [u8; FIXED_HEADER_LEN] {
        let mut buf = [0u8; FIXED_HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.row_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.column_count.to_le_bytes());
        buf
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                Error::new(ErrorKind::InvalidMagic)
                    .with_message("stream is shorter than the magic token")
            } else {
                Error::io(err)
            }
        })?;
        if magic != MAGIC {
            return Err(Error::new(ErrorKind::InvalidMagic).with_message(format!(
                "bad magic {:?} (expected {:?})",
                String::from_utf8_lossy(&magic),
                String::from_utf8_lossy(&MAGIC)
            )));
        }

        let mut rest = [0u8; FIXED_HEADER_LEN - 4];
        read_exact_or_corrupt(reader, &mut rest, "file header truncated", 4)?;
        let version = u32::from_le_bytes(read_4(&rest, 0));
        if !SUPPORTED_FORMAT_VERSIONS.contains(&version) {
            return Err(version_error(version));
        }
        Ok(Self {
            row_count: u64::from_le_bytes(read_8(&rest, 4)),
            column_count: u32::from_le_bytes(read_4(&rest, 12)),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl ColumnDescriptor {
    pub fn encoded_len(&self) -> usize {
        descriptor_len(&self.name)
    }

    /// One past the last byte of this column's block.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.compressed_size)
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let name = self.name.as_bytes();
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name);
        out.push(self.column_type.tag());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
    }

    pub fn read_from<R: Read>(reader: &mut R, at: u64) -> Result<Self, Error> {
        let mut len_buf = [0u8; 4];
        read_exact_or_corrupt(reader, &mut len_buf, "descriptor truncated", at)?;
        let name_len = u32::from_le_bytes(len_buf) as u64;

        let mut name_bytes = Vec::new();
        reader
            .by_ref()
            .take(name_len)
            .read_to_end(&mut name_bytes)
            .map_err(Error::io)?;
        if name_bytes.len() as u64 != name_len {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("column name truncated")
                .with_offset(at + 4));
        }
        let name = String::from_utf8(name_bytes).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("column name is not valid UTF-8")
                .with_offset(at + 4)
                .with_source(err)
        })?;

        let mut fixed = [0u8; 1 + 8 + 8 + 8];
        read_exact_or_corrupt(reader, &mut fixed, "descriptor truncated", at + 4 + name_len)?;
        let column_type = ColumnType::from_tag(fixed[0])
            .map_err(|err| err.with_column(name.as_str()).with_offset(at + 4 + name_len))?;

        Ok(Self {
            name,
            column_type,
            offset: u64::from_le_bytes(read_8(&fixed, 1)),
            compressed_size: u64::from_le_bytes(read_8(&fixed, 9)),
            uncompressed_size: u64::from_le_bytes(read_8(&fixed, 17)),
        })
    }
}

pub fn descriptor_len(name: &str) -> usize {
    DESCRIPTOR_FIXED_LEN + name.len()
}

/// Total byte length of header plus descriptor table; the first block starts here.
pub fn preamble_len<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    FIXED_HEADER_LEN + names.into_iter().map(descriptor_len).sum::<usize>()
}

pub fn encode_preamble(header: &FileHeader, descriptors: &[ColumnDescriptor]) -> Vec<u8> {
    let len = preamble_len(descriptors.iter().map(|desc| desc.name.as_str()));
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&header.encode());
    for desc in descriptors {
        desc.encode_into(&mut out);
    }
    out
}

/// Parses the header and every descriptor, leaving the reader positioned after the table.
pub fn read_preamble<R: Read>(reader: &mut R) -> Result<(FileHeader, Vec<ColumnDescriptor>), Error> {
    let header = FileHeader::read_from(reader)?;
    let count = header.column_count as usize;
    let mut descriptors = Vec::with_capacity(count.min(MAX_PREALLOC_COLUMNS));
    let mut at = FIXED_HEADER_LEN as u64;
    for _ in 0..count {
        let desc = ColumnDescriptor::read_from(reader, at)?;
        at += desc.encoded_len() as u64;
        descriptors.push(desc);
    }
    Ok((header, descriptors))
}

pub fn version_error(detected: u32) -> Error {
    let supported = SUPPORTED_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorKind::UnsupportedVersion)
        .with_message(format!(
            "unsupported format version {detected} (supported: {supported})"
        ))
        .with_hint("The file was written by a newer or foreign tool; re-export it from the source data.")
}

fn read_exact_or_corrupt<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &str,
    at: u64,
) -> Result<(), Error> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::new(ErrorKind::Corrupt).with_message(what).with_offset(at)
        } else {
            Error::io(err)
        }
    })
}

pub(crate) fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

pub(crate) fn read_8(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    out
}

#[cfg(test)]
mod tests {
    use super::{
        ColumnDescriptor, ColumnType, FIXED_HEADER_LEN, FileHeader, encode_preamble, preamble_len,
        read_preamble,
    };
    use crate::core::error::ErrorKind;
    use std::io::Cursor;

    fn sample() -> (FileHeader, Vec<ColumnDescriptor>) {
        let header = FileHeader {
            row_count: 2,
            column_count: 2,
        };
        let descriptors = vec![
            ColumnDescriptor {
                name: "id".to_string(),
                column_type: ColumnType::Int32,
                offset: 84,
                compressed_size: 10,
                uncompressed_size: 8,
            },
            ColumnDescriptor {
                name: "name".to_string(),
                column_type: ColumnType::String,
                offset: 94,
                compressed_size: 20,
                uncompressed_size: 20,
            },
        ];
        (header, descriptors)
    }

    #[test]
    fn preamble_len_matches_encoding() {
        let (header, descriptors) = sample();
        let bytes = encode_preamble(&header, &descriptors);
        assert_eq!(bytes.len(), preamble_len(["id", "name"]));
        assert_eq!(bytes.len(), 84);
        assert_eq!(&bytes[0..4], b"CFF1");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 2);
        // name_length of the first descriptor
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 2);
        assert_eq!(&bytes[24..26], b"id");
        assert_eq!(bytes[26], 1);
    }

    #[test]
    fn preamble_parses_back() {
        let (header, descriptors) = sample();
        let bytes = encode_preamble(&header, &descriptors);
        let (parsed_header, parsed) = read_preamble(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(parsed_header, header);
        assert_eq!(parsed, descriptors);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let (header, descriptors) = sample();
        let mut bytes = encode_preamble(&header, &descriptors);
        bytes[0..4].copy_from_slice(b"NOPE");
        let err = read_preamble(&mut Cursor::new(bytes)).expect_err("bad magic");
        assert_eq!(err.kind(), ErrorKind::InvalidMagic);
    }

    #[test]
    fn tiny_stream_is_invalid_magic() {
        let err = read_preamble(&mut Cursor::new(b"CF".to_vec())).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::InvalidMagic);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let (header, descriptors) = sample();
        let mut bytes = encode_preamble(&header, &descriptors);
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = read_preamble(&mut Cursor::new(bytes)).expect_err("version");
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert!(err.hint().is_some());
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let (header, descriptors) = sample();
        let mut bytes = encode_preamble(&header, &descriptors);
        bytes[26] = 9;
        let err = read_preamble(&mut Cursor::new(bytes)).expect_err("tag");
        assert_eq!(err.kind(), ErrorKind::UnknownTypeTag);
        assert_eq!(err.column(), Some("id"));
    }

    #[test]
    fn truncated_descriptor_table_is_corrupt() {
        let (header, descriptors) = sample();
        let bytes = encode_preamble(&header, &descriptors);
        let cut = bytes[..FIXED_HEADER_LEN + 10].to_vec();
        let err = read_preamble(&mut Cursor::new(cut)).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn type_tags_are_stable() {
        assert_eq!(ColumnType::Int32.tag(), 1);
        assert_eq!(ColumnType::Float64.tag(), 2);
        assert_eq!(ColumnType::String.tag(), 3);
        for ty in [ColumnType::Int32, ColumnType::Float64, ColumnType::String] {
            assert_eq!(ColumnType::from_tag(ty.tag()).expect("tag"), ty);
        }
    }
}
