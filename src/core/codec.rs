// Per-column type inference, fixed-width/string serialization, and DEFLATE block compression.
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{ColumnType, read_4, read_8};
use crate::core::value::{ColumnValues, Value};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Picks the column type from the first value that is neither missing nor empty.
pub fn infer_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> ColumnType {
    values
        .into_iter()
        .find(|value| !value.is_missing())
        .map(type_of)
        .unwrap_or(ColumnType::String)
}

fn type_of(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) | Value::Int(_) => ColumnType::Int32,
        Value::Float(_) => ColumnType::Float64,
        Value::Text(text) => {
            let text = text.trim();
            if text.parse::<i64>().is_ok() {
                ColumnType::Int32
            } else if looks_like_float(text) {
                ColumnType::Float64
            } else {
                ColumnType::String
            }
        }
        Value::Missing => ColumnType::String,
    }
}

// Decimal-point literals only: "1e5", "inf" and "NaN" stay text.
fn looks_like_float(text: &str) -> bool {
    text.contains('.') && text.bytes().any(|b| b.is_ascii_digit()) && text.parse::<f64>().is_ok()
}

pub fn serialize_column(
    name: &str,
    column_type: ColumnType,
    values: &[&Value],
) -> Result<Vec<u8>, Error> {
    match column_type {
        ColumnType::Int32 => {
            let mut out = Vec::with_capacity(values.len() * 4);
            for (row, value) in values.iter().enumerate() {
                let int = coerce_i32(value).map_err(|reason| invalid(name, row, value, reason))?;
                out.extend_from_slice(&int.to_le_bytes());
            }
            Ok(out)
        }
        ColumnType::Float64 => {
            let mut out = Vec::with_capacity(values.len() * 8);
            for (row, value) in values.iter().enumerate() {
                let float = coerce_f64(value).map_err(|reason| invalid(name, row, value, reason))?;
                out.extend_from_slice(&float.to_le_bytes());
            }
            Ok(out)
        }
        ColumnType::String => serialize_strings(name, values),
    }
}

fn serialize_strings(name: &str, values: &[&Value]) -> Result<Vec<u8>, Error> {
    let mut offsets = Vec::with_capacity(values.len() + 1);
    let mut blob = Vec::new();
    offsets.push(0u32);
    for (row, value) in values.iter().enumerate() {
        match value {
            Value::Missing => {}
            Value::Text(text) => blob.extend_from_slice(text.as_bytes()),
            Value::Float(float) => blob.extend_from_slice(format!("{float:?}").as_bytes()),
            other => blob.extend_from_slice(other.to_string().as_bytes()),
        }
        let end = u32::try_from(blob.len())
            .map_err(|_| invalid(name, row, value, "string blob exceeds 4 GiB"))?;
        offsets.push(end);
    }

    let mut out = Vec::with_capacity(offsets.len() * 4 + blob.len());
    for offset in &offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&blob);
    Ok(out)
}

fn coerce_i32(value: &Value) -> Result<i32, &'static str> {
    match value {
        Value::Missing => Ok(0),
        Value::Bool(flag) => Ok(i32::from(*flag)),
        Value::Int(int) => i32::try_from(*int).map_err(|_| "integer out of INT32 range"),
        Value::Float(float) => truncate_to_i32(*float),
        Value::Text(text) if text.is_empty() => Ok(0),
        Value::Text(text) => {
            let text = text.trim();
            if let Ok(int) = text.parse::<i64>() {
                i32::try_from(int).map_err(|_| "integer out of INT32 range")
            } else if looks_like_float(text) {
                text.parse::<f64>()
                    .map_err(|_| "text is not an INT32 literal")
                    .and_then(truncate_to_i32)
            } else {
                Err("text is not an INT32 literal")
            }
        }
    }
}

fn truncate_to_i32(float: f64) -> Result<i32, &'static str> {
    let truncated = float.trunc();
    if !float.is_finite() {
        Err("non-finite float in INT32 column")
    } else if truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        Err("float out of INT32 range")
    } else {
        Ok(truncated as i32)
    }
}

fn coerce_f64(value: &Value) -> Result<f64, &'static str> {
    match value {
        Value::Missing => Ok(0.0),
        Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        Value::Int(int) => Ok(*int as f64),
        Value::Float(float) => Ok(*float),
        Value::Text(text) if text.is_empty() => Ok(0.0),
        Value::Text(text) => {
            let text = text.trim();
            if let Ok(int) = text.parse::<i64>() {
                Ok(int as f64)
            } else if looks_like_float(text) {
                text.parse::<f64>().map_err(|_| "text is not a FLOAT64 literal")
            } else {
                Err("text is not a FLOAT64 literal")
            }
        }
    }
}

fn invalid(name: &str, row: usize, value: &Value, reason: &str) -> Error {
    Error::new(ErrorKind::InvalidValueForType)
        .with_message(format!("row {row}: {reason} (value: {value:?})"))
        .with_column(name)
}

pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).map_err(Error::io)?;
    encoder.finish().map_err(Error::io)
}

/// Inflates a block, reading at most one byte past `expected_len` so oversize output is detected cheaply.
pub fn decompress(block: &[u8], expected_len: u64) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    ZlibDecoder::new(block)
        .take(expected_len.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("column block failed to decompress")
                .with_source(err)
        })?;
    if out.len() as u64 != expected_len {
        let shown = if out.len() as u64 > expected_len {
            format!("more than {expected_len}")
        } else {
            out.len().to_string()
        };
        return Err(Error::new(ErrorKind::IntegrityMismatch).with_message(format!(
            "decompressed size mismatch: expected {expected_len}, got {shown}"
        )));
    }
    Ok(out)
}

pub fn deserialize_column(
    column_type: ColumnType,
    data: &[u8],
    row_count: usize,
) -> Result<ColumnValues, Error> {
    match column_type {
        ColumnType::Int32 => {
            check_fixed_width(data, 4, row_count)?;
            Ok(ColumnValues::Int32(
                data.chunks_exact(4)
                    .map(|chunk| i32::from_le_bytes(read_4(chunk, 0)))
                    .collect(),
            ))
        }
        ColumnType::Float64 => {
            check_fixed_width(data, 8, row_count)?;
            Ok(ColumnValues::Float64(
                data.chunks_exact(8)
                    .map(|chunk| f64::from_le_bytes(read_8(chunk, 0)))
                    .collect(),
            ))
        }
        ColumnType::String => deserialize_strings(data, row_count).map(ColumnValues::String),
    }
}

fn check_fixed_width(data: &[u8], width: usize, row_count: usize) -> Result<(), Error> {
    let expected = row_count.checked_mul(width);
    if expected != Some(data.len()) {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "column holds {} bytes, expected {row_count} values of {width} bytes",
            data.len()
        )));
    }
    Ok(())
}

/// Splits a string block into its offset table and blob, validating every offset.
pub fn string_offsets(data: &[u8], row_count: usize) -> Result<(Vec<u32>, &[u8]), Error> {
    let table_len = row_count
        .checked_add(1)
        .and_then(|count| count.checked_mul(4))
        .filter(|len| *len <= data.len())
        .ok_or_else(|| {
            Error::new(ErrorKind::Corrupt).with_message("string offset table exceeds column data")
        })?;
    let (table, blob) = data.split_at(table_len);
    let offsets: Vec<u32> = table
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(read_4(chunk, 0)))
        .collect();

    if offsets.first() != Some(&0) {
        return Err(Error::new(ErrorKind::Corrupt).with_message("string offsets must start at 0"));
    }
    if offsets.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(Error::new(ErrorKind::Corrupt).with_message("string offsets decrease"));
    }
    if offsets.last().map(|last| *last as usize) != Some(blob.len()) {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message("last string offset does not match blob length"));
    }
    Ok((offsets, blob))
}

fn deserialize_strings(data: &[u8], row_count: usize) -> Result<Vec<String>, Error> {
    let (offsets, blob) = string_offsets(data, row_count)?;
    offsets
        .windows(2)
        .enumerate()
        .map(|(row, pair)| {
            let bytes = &blob[pair[0] as usize..pair[1] as usize];
            std::str::from_utf8(bytes).map(str::to_string).map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message(format!("row {row} is not valid UTF-8"))
                    .with_source(err)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_COMPRESSION_LEVEL, compress, decompress, deserialize_column, infer_type,
        serialize_column, string_offsets,
    };
    use crate::core::error::ErrorKind;
    use crate::core::format::ColumnType;
    use crate::core::value::{ColumnValues, Value};

    fn values(items: &[Value]) -> Vec<&Value> {
        items.iter().collect()
    }

    #[test]
    fn inference_uses_first_present_value() {
        let bools = [Value::from(true), Value::from(false), Value::from(true)];
        assert_eq!(infer_type(&bools), ColumnType::Int32);

        let floats = [Value::from("3.5"), Value::from("2.1")];
        assert_eq!(infer_type(&floats), ColumnType::Float64);

        let words = [Value::from("a"), Value::from("b")];
        assert_eq!(infer_type(&words), ColumnType::String);

        let blanks = [Value::from(""), Value::from(""), Value::Missing];
        assert_eq!(infer_type(&blanks), ColumnType::String);

        let late_int = [Value::Missing, Value::from(""), Value::from(7), Value::from("x")];
        assert_eq!(infer_type(&late_int), ColumnType::Int32);
    }

    #[test]
    fn numeric_looking_words_stay_strings() {
        for word in ["inf", "NaN", "infinity", "-", "1e5"] {
            assert_eq!(infer_type(&[Value::from(word)]), ColumnType::String, "{word}");
        }
    }

    #[test]
    fn bools_serialize_as_ints() {
        let items = [Value::from(true), Value::from(false), Value::from(true)];
        let bytes = serialize_column("flag", ColumnType::Int32, &values(&items)).expect("ser");
        let decoded = deserialize_column(ColumnType::Int32, &bytes, 3).expect("de");
        assert_eq!(decoded, ColumnValues::Int32(vec![1, 0, 1]));
    }

    #[test]
    fn missing_values_collapse_to_zero_or_empty() {
        let items = [Value::from(4), Value::Missing, Value::from("")];
        let bytes = serialize_column("n", ColumnType::Int32, &values(&items)).expect("ser");
        assert_eq!(
            deserialize_column(ColumnType::Int32, &bytes, 3).expect("de"),
            ColumnValues::Int32(vec![4, 0, 0])
        );

        let items = [Value::from(1.5), Value::Missing];
        let bytes = serialize_column("f", ColumnType::Float64, &values(&items)).expect("ser");
        assert_eq!(
            deserialize_column(ColumnType::Float64, &bytes, 2).expect("de"),
            ColumnValues::Float64(vec![1.5, 0.0])
        );

        let items = [Value::from("x"), Value::Missing, Value::from(3)];
        let bytes = serialize_column("s", ColumnType::String, &values(&items)).expect("ser");
        assert_eq!(
            deserialize_column(ColumnType::String, &bytes, 3).expect("de"),
            ColumnValues::String(vec!["x".to_string(), String::new(), "3".to_string()])
        );
    }

    #[test]
    fn late_incompatible_value_fails_at_serialization() {
        let items = [Value::from(1), Value::from("oops")];
        assert_eq!(infer_type(&items), ColumnType::Int32);
        let err = serialize_column("id", ColumnType::Int32, &values(&items)).expect_err("bad");
        assert_eq!(err.kind(), ErrorKind::InvalidValueForType);
        assert_eq!(err.column(), Some("id"));
        assert!(err.message().unwrap_or_default().contains("row 1"));
    }

    #[test]
    fn decimal_text_truncates_into_int_column() {
        let items = [Value::from("1"), Value::from("2.5"), Value::from("-3.9")];
        assert_eq!(infer_type(&items), ColumnType::Int32);
        let bytes = serialize_column("n", ColumnType::Int32, &values(&items)).expect("ser");
        assert_eq!(
            deserialize_column(ColumnType::Int32, &bytes, 3).expect("de"),
            ColumnValues::Int32(vec![1, 2, -3])
        );

        let items = [Value::from("1"), Value::from("1e5")];
        let err = serialize_column("n", ColumnType::Int32, &values(&items)).expect_err("exp");
        assert_eq!(err.kind(), ErrorKind::InvalidValueForType);
    }

    #[test]
    fn integer_text_fits_float_column() {
        let items = [Value::from("0.5"), Value::from("7")];
        assert_eq!(infer_type(&items), ColumnType::Float64);
        let bytes = serialize_column("f", ColumnType::Float64, &values(&items)).expect("ser");
        assert_eq!(
            deserialize_column(ColumnType::Float64, &bytes, 2).expect("de"),
            ColumnValues::Float64(vec![0.5, 7.0])
        );
    }

    #[test]
    fn non_text_values_render_into_string_column() {
        let items = [Value::from("a"), Value::from(87.0), Value::from(true)];
        let bytes = serialize_column("s", ColumnType::String, &values(&items)).expect("ser");
        assert_eq!(
            deserialize_column(ColumnType::String, &bytes, 3).expect("de"),
            ColumnValues::String(vec!["a".to_string(), "87.0".to_string(), "true".to_string()])
        );
    }

    #[test]
    fn out_of_range_int_is_rejected() {
        let items = [Value::from(i64::from(i32::MAX) + 1)];
        let err = serialize_column("big", ColumnType::Int32, &values(&items)).expect_err("range");
        assert_eq!(err.kind(), ErrorKind::InvalidValueForType);
    }

    #[test]
    fn string_layout_has_row_count_plus_one_offsets() {
        let items = [Value::from("ab"), Value::from(""), Value::from("héllo")];
        let bytes = serialize_column("s", ColumnType::String, &values(&items)).expect("ser");
        let (offsets, blob) = string_offsets(&bytes, 3).expect("offsets");
        assert_eq!(offsets, vec![0, 2, 2, 8]);
        assert_eq!(blob, "abhéllo".as_bytes());
    }

    #[test]
    fn decreasing_offsets_are_corrupt() {
        let mut bytes = Vec::new();
        for offset in [0u32, 3, 1] {
            bytes.extend_from_slice(&offset.to_le_bytes());
        }
        bytes.extend_from_slice(b"a");
        let err = deserialize_column(ColumnType::String, &bytes, 2).expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn fixed_width_length_must_match_rows() {
        let err = deserialize_column(ColumnType::Int32, &[0u8; 8], 3).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn decompress_checks_recorded_size() {
        let data = vec![7u8; 1000];
        let block = compress(&data, DEFAULT_COMPRESSION_LEVEL).expect("compress");
        assert_eq!(decompress(&block, 1000).expect("inflate"), data);

        let err = decompress(&block, 999).expect_err("too small");
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
        let err = decompress(&block, 1001).expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
    }

    #[test]
    fn garbage_block_fails_to_decompress() {
        let err = decompress(b"definitely not zlib", 10).expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
