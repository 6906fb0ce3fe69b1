//! Purpose: Render a human-readable layout dump (schema plus hex) for the `inspect` command.
//! Exports: `InspectOptions`, `render_inspection`, `hex_dump`.
//! Role: Diagnostic formatter; reads raw bytes through the reader, never decodes values.
//! Invariants: Output is plain text with no ANSI escapes; offsets print as 8-digit hex.
//! Invariants: Column blocks are shown compressed, capped at `BLOCK_PREVIEW_BYTES`.

use std::fmt::Write as _;
use std::io::{Read, Seek};

use colfile::api::{Error, Reader};

const BYTES_PER_LINE: usize = 16;
const BLOCK_PREVIEW_BYTES: usize = 128;
const RULE_WIDTH: usize = 70;

#[derive(Clone, Debug, Default)]
pub(crate) struct InspectOptions {
    pub header_only: bool,
    pub show_data: bool,
    pub column: Option<String>,
}

pub(crate) fn render_inspection<R: Read + Seek>(
    label: &str,
    reader: &mut Reader<R>,
    options: &InspectOptions,
) -> Result<String, Error> {
    let stream_len = reader.stream_len()?;
    let preamble = reader.read_preamble_bytes()?;
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Columnar file inspection: {label}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "File size: {stream_len} bytes");
    let _ = writeln!(out, "Rows: {}", reader.row_count());
    let _ = writeln!(out, "Columns: {}", reader.descriptors().len());
    let _ = writeln!(out);
    let _ = writeln!(out, "Schema:");
    for desc in reader.descriptors() {
        let _ = writeln!(
            out,
            "  {} {} offset={} compressed={} uncompressed={}",
            desc.name,
            desc.column_type.name(),
            desc.offset,
            desc.compressed_size,
            desc.uncompressed_size
        );
    }

    let header_end = preamble.len();
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "HEADER (0x00000000 - 0x{header_end:08x}, {header_end} bytes)"
    );
    let _ = writeln!(out, "{rule}");
    out.push_str(&hex_dump(&preamble, 0));

    if options.header_only {
        return Ok(out);
    }

    let descriptors = reader.descriptors().to_vec();
    for desc in &descriptors {
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "COLUMN: {} (offset=0x{:08x})", desc.name, desc.offset);
        let _ = writeln!(out, "Type: {}", desc.column_type.name());
        let _ = writeln!(out, "Compressed size: {} bytes", desc.compressed_size);
        let _ = writeln!(out, "Uncompressed size: {} bytes", desc.uncompressed_size);
        let _ = writeln!(out, "{rule}");

        let selected = options.column.as_deref() == Some(desc.name.as_str());
        if options.show_data || selected {
            let preview = reader.read_raw_prefix(&desc.name, BLOCK_PREVIEW_BYTES as u64)?;
            out.push_str(&hex_dump(&preview, desc.offset));
            let rest = desc.compressed_size - preview.len() as u64;
            if rest > 0 {
                let _ = writeln!(out, "  ... ({rest} more bytes)");
            }
        } else {
            let _ = writeln!(out, "(use --show-data to view column data)");
        }
    }
    Ok(out)
}

/// Classic 16-bytes-per-line dump; `base` is the absolute offset of `data[0]`.
pub(crate) fn hex_dump(data: &[u8], base: u64) -> String {
    let mut out = String::new();
    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let addr = base + (line * BYTES_PER_LINE) as u64;
        let _ = write!(out, "{addr:08x}  ");
        for idx in 0..BYTES_PER_LINE {
            match chunk.get(idx) {
                Some(byte) => {
                    let _ = write!(out, "{byte:02x} ");
                }
                None => out.push_str("   "),
            }
        }
        out.push_str(" |");
        for byte in chunk {
            out.push(if byte.is_ascii_graphic() || *byte == b' ' {
                *byte as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{BLOCK_PREVIEW_BYTES, InspectOptions, hex_dump, render_inspection};
    use colfile::api::{Reader, Row, Table, encode};
    use std::io::Cursor;

    #[test]
    fn hex_dump_pads_short_lines() {
        let dump = hex_dump(b"CFF1\x01\x00", 0);
        assert_eq!(
            dump,
            "00000000  43 46 46 31 01 00                                |CFF1..|\n"
        );
    }

    #[test]
    fn hex_dump_uses_absolute_offsets() {
        let data = [0u8; 20];
        let dump = hex_dump(&data, 0x40);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000040  "));
        assert!(lines[1].starts_with("00000050  "));
    }

    #[test]
    fn inspection_lists_every_column() {
        let table = Table::Rows(vec![Row::new().with("id", 7).with("tag", "x")]);
        let bytes = encode(&table).expect("encode");
        let mut reader = Reader::open(Cursor::new(bytes)).expect("open");

        let options = InspectOptions {
            column: Some("tag".to_string()),
            ..InspectOptions::default()
        };
        let text = render_inspection("mem", &mut reader, &options).expect("render");
        assert!(text.contains("Rows: 1"));
        assert!(text.contains("COLUMN: id"));
        assert!(text.contains("COLUMN: tag"));
        assert_eq!(text.matches("(use --show-data to view column data)").count(), 1);
    }

    #[test]
    fn show_data_previews_only_the_block_head() {
        let rows = (0..2000)
            .map(|idx| Row::new().with("note", format!("row-{idx}-{}", idx * 7919 % 1000)))
            .collect();
        let bytes = encode(&Table::Rows(rows)).expect("encode");
        let mut reader = Reader::open(Cursor::new(bytes)).expect("open");
        let compressed = reader.descriptor("note").expect("desc").compressed_size;
        assert!(compressed > BLOCK_PREVIEW_BYTES as u64);

        let options = InspectOptions {
            show_data: true,
            ..InspectOptions::default()
        };
        let text = render_inspection("mem", &mut reader, &options).expect("render");
        let more = format!("  ... ({} more bytes)", compressed - BLOCK_PREVIEW_BYTES as u64);
        assert!(text.contains(&more));
    }
}
