// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use super::{Record, Table};
use crate::errors::StorageError;

/// Serialization used for snapshot files.
///
/// `pickle` is accepted in configuration so the name is recognised, but no
/// adapter exists for it and any attempt to use it fails with
/// [`StorageError::UnsupportedFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "jsonl")]
    JsonLines,
    #[serde(rename = "csv")]
    Csv,
    #[serde(rename = "parquet")]
    Parquet,
    #[serde(rename = "pickle")]
    Pickle,
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::JsonLines => "jsonl",
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Parquet => "parquet",
            SnapshotFormat::Pickle => "pickle",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SnapshotFormat::Pickle)
    }

    /// Parquet compresses internally; every other format is wrapped in gzip.
    pub fn uses_gzip(&self, compression: bool) -> bool {
        compression && !matches!(self, SnapshotFormat::Parquet)
    }

    pub fn from_extension(extension: &str) -> Result<Self, StorageError> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "jsonl" | "ndjson" => Ok(SnapshotFormat::JsonLines),
            "csv" => Ok(SnapshotFormat::Csv),
            "parquet" => Ok(SnapshotFormat::Parquet),
            "pickle" | "pkl" => Ok(SnapshotFormat::Pickle),
            other => Err(StorageError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Detect format and gzip wrapping from a file name such as
    /// `data.jsonl` or `data.csv.gz`.
    pub fn detect(path: &Path) -> Result<(Self, bool), StorageError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let (stem, gzipped) = match file_name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (file_name, false),
        };
        let extension = Path::new(stem)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Ok((Self::from_extension(extension)?, gzipped))
    }

    /// Persist `table` at `path`, returning the number of bytes written.
    pub fn write(&self, table: &Table, path: &Path, compression: bool) -> Result<u64, StorageError> {
        let encode_error = |message: String| StorageError::Encode {
            path: path.to_path_buf(),
            message,
        };

        let bytes = match self {
            SnapshotFormat::Json => {
                serde_json::to_vec_pretty(table.rows()).map_err(|e| encode_error(e.to_string()))?
            }
            SnapshotFormat::JsonLines => encode_json_lines(table).map_err(encode_error)?,
            SnapshotFormat::Csv => encode_csv(table).map_err(encode_error)?,
            SnapshotFormat::Parquet => {
                write_parquet(table, path, compression)?;
                let size = fs::metadata(path).map_err(|e| StorageError::io(path, e))?.len();
                return Ok(size);
            }
            SnapshotFormat::Pickle => {
                return Err(StorageError::UnsupportedFormat(self.to_string()));
            }
        };

        let bytes = if self.uses_gzip(compression) {
            let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
            encoder
                .write_all(&bytes)
                .and_then(|_| encoder.finish())
                .map_err(|e| StorageError::io(path, e))?
        } else {
            bytes
        };

        fs::write(path, &bytes).map_err(|e| StorageError::io(path, e))?;
        Ok(bytes.len() as u64)
    }

    /// Load the table stored at `path`.
    pub fn read(&self, path: &Path, gzipped: bool) -> Result<Table, StorageError> {
        let decode_error = |message: String| StorageError::Decode {
            path: path.to_path_buf(),
            message,
        };

        if let SnapshotFormat::Parquet = self {
            return read_parquet(path);
        }
        if let SnapshotFormat::Pickle = self {
            return Err(StorageError::UnsupportedFormat(self.to_string()));
        }

        let raw = fs::read(path).map_err(|e| StorageError::io(path, e))?;
        let bytes = if gzipped {
            let mut decoded = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| decode_error(format!("gzip: {}", e)))?;
            decoded
        } else {
            raw
        };

        match self {
            SnapshotFormat::Json => {
                let rows: Vec<Record> =
                    serde_json::from_slice(&bytes).map_err(|e| decode_error(e.to_string()))?;
                Ok(Table::from_rows(rows))
            }
            SnapshotFormat::JsonLines => decode_json_lines(&bytes).map_err(decode_error),
            SnapshotFormat::Csv => decode_csv(&bytes).map_err(decode_error),
            SnapshotFormat::Parquet | SnapshotFormat::Pickle => {
                Err(StorageError::UnsupportedFormat(self.to_string()))
            }
        }
    }
}

fn encode_json_lines(table: &Table) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    for row in table.rows() {
        serde_json::to_writer(&mut out, row).map_err(|e| e.to_string())?;
        out.push(b'\n');
    }
    Ok(out)
}

fn decode_json_lines(bytes: &[u8]) -> Result<Table, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    let mut table = Table::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: Record =
            serde_json::from_str(line).map_err(|e| format!("line {}: {}", line_no + 1, e))?;
        table.push(row);
    }
    Ok(table)
}

/// Strings are written as-is, null as an empty cell, anything else as JSON text.
fn encode_csv(table: &Table) -> Result<Vec<u8>, String> {
    let columns = table.columns();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns).map_err(|e| e.to_string())?;

    for row in table.rows() {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&cells).map_err(|e| e.to_string())?;
    }

    writer.into_inner().map_err(|e| e.to_string())
}

/// Every cell comes back as a string and every empty cell as null. CSV has no
/// way to tell an empty string from a missing value, so `""` written to a csv
/// snapshot reads back as null, the same as pandas does.
fn decode_csv(bytes: &[u8]) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let mut table = Table::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let mut row = Record::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            row.insert(header.to_string(), value);
        }
        table.push(row);
    }
    Ok(table)
}

/// Arrow type for a column: the narrowest of bool, int64, float64 that fits
/// every non-null value, otherwise UTF-8 (nested values as JSON text).
fn infer_column_type(values: &[Option<&Value>]) -> DataType {
    let present: Vec<&Value> = values.iter().flatten().copied().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        return DataType::Utf8;
    }
    if present.iter().all(|v| v.is_boolean()) {
        DataType::Boolean
    } else if present.iter().all(|v| v.is_i64()) {
        DataType::Int64
    } else if present.iter().all(|v| v.is_number()) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn build_array(data_type: &DataType, values: &[Option<&Value>]) -> ArrayRef {
    match data_type {
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| non_null(*v).and_then(Value::as_bool))
                .collect::<BooleanArray>(),
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| non_null(*v).and_then(Value::as_i64))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| non_null(*v).and_then(Value::as_f64))
                .collect::<Float64Array>(),
        ),
        _ => Arc::new(
            values
                .iter()
                .map(|v| {
                    non_null(*v).map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect::<StringArray>(),
        ),
    }
}

fn write_parquet(table: &Table, path: &Path, compression: bool) -> Result<(), StorageError> {
    let encode_error = |message: String| StorageError::Encode {
        path: path.to_path_buf(),
        message,
    };

    let columns = table.columns();
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for column in &columns {
        let values: Vec<Option<&Value>> = table.rows().iter().map(|r| r.get(column)).collect();
        let data_type = infer_column_type(&values);
        arrays.push(build_array(&data_type, &values));
        fields.push(Field::new(column, data_type, true));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(|e| encode_error(e.to_string()))?;

    let codec = if compression {
        ParquetCompression::SNAPPY
    } else {
        ParquetCompression::UNCOMPRESSED
    };
    let props = WriterProperties::builder().set_compression(codec).build();

    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer =
        ArrowWriter::try_new(file, schema, Some(props)).map_err(|e| encode_error(e.to_string()))?;
    writer.write(&batch).map_err(|e| encode_error(e.to_string()))?;
    writer.close().map_err(|e| encode_error(e.to_string()))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<Table, StorageError> {
    let decode_error = |message: String| StorageError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| decode_error(e.to_string()))?
        .build()
        .map_err(|e| decode_error(e.to_string()))?;

    let mut table = Table::new();
    for batch in reader {
        let batch = batch.map_err(|e| decode_error(e.to_string()))?;
        let schema = batch.schema();

        for row_index in 0..batch.num_rows() {
            let mut row = Record::new();
            for (field, column) in schema.fields().iter().zip(batch.columns()) {
                let value = arrow_value(column.as_ref(), row_index)
                    .ok_or_else(|| decode_error(format!("unsupported column type for '{}'", field.name())))?;
                row.insert(field.name().clone(), value);
            }
            table.push(row);
        }
    }
    Ok(table)
}

fn arrow_value(column: &dyn Array, index: usize) -> Option<Value> {
    if column.is_null(index) {
        return Some(Value::Null);
    }
    let any = column.as_any();
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Some(Value::String(a.value(index).to_string()));
    }
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Some(Value::from(a.value(index)));
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Some(Number::from_f64(a.value(index)).map_or(Value::Null, Value::Number));
    }
    if let Some(a) = any.downcast_ref::<BooleanArray>() {
        return Some(Value::Bool(a.value(index)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Table {
        let rows = vec![
            json!({"text": "alpha", "tokens": 3, "score": 0.5, "ok": true}),
            json!({"text": "", "tokens": 0, "score": 1.5, "ok": false}),
            json!({"text": null, "tokens": 7, "score": 2.0, "ok": true}),
        ];
        Table::from_rows(rows.into_iter().map(|r| r.as_object().cloned().unwrap()).collect())
    }

    #[test]
    fn test_detect() {
        struct TestCase {
            name: &'static str,
            file: &'static str,
            expected: Option<(SnapshotFormat, bool)>,
        }

        let test_cases = vec![
            TestCase {
                name: "plain jsonl",
                file: "a/b/input.jsonl",
                expected: Some((SnapshotFormat::JsonLines, false)),
            },
            TestCase {
                name: "gzipped csv",
                file: "step_3.csv.gz",
                expected: Some((SnapshotFormat::Csv, true)),
            },
            TestCase {
                name: "parquet",
                file: "x.parquet",
                expected: Some((SnapshotFormat::Parquet, false)),
            },
            TestCase {
                name: "unknown",
                file: "notes.docx",
                expected: None,
            },
        ];

        for tc in test_cases {
            let detected = SnapshotFormat::detect(Path::new(tc.file)).ok();
            assert_eq!(detected, tc.expected, "detect mismatch for '{}'", tc.name);
        }
    }

    #[test]
    fn test_typed_formats_preserve_values() {
        let dir = TempDir::new().unwrap();
        let table = sample();

        for (format, compressed) in [
            (SnapshotFormat::Json, false),
            (SnapshotFormat::JsonLines, true),
            (SnapshotFormat::Parquet, false),
            (SnapshotFormat::Parquet, true),
        ] {
            let path = dir
                .path()
                .join(format!("snap_{}_{}.{}", format, compressed, format.extension()));
            let size = format.write(&table, &path, compressed).unwrap();
            assert!(size > 0, "{} wrote nothing", format);

            let loaded = format.read(&path, format.uses_gzip(compressed)).unwrap();
            assert_eq!(loaded, table, "{} (compressed={}) changed values", format, compressed);
        }
    }

    #[test]
    fn test_csv_reads_cells_as_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snap.csv.gz");
        SnapshotFormat::Csv.write(&sample(), &path, true).unwrap();

        let loaded = SnapshotFormat::Csv.read(&path, true).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.rows()[0].get("text"), Some(&json!("alpha")));
        assert_eq!(loaded.rows()[0].get("tokens"), Some(&json!("3")));
        assert_eq!(loaded.rows()[2].get("text"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_strings_survive_only_typed_formats() {
        struct TestCase {
            name: &'static str,
            format: SnapshotFormat,
            file: &'static str,
            expected: Value,
        }

        let test_cases = vec![
            TestCase {
                name: "jsonl keeps the empty string",
                format: SnapshotFormat::JsonLines,
                file: "snap.jsonl",
                expected: json!(""),
            },
            TestCase {
                name: "csv reads it back as null",
                format: SnapshotFormat::Csv,
                file: "snap.csv",
                expected: Value::Null,
            },
        ];

        let table = Table::from_column("t", vec![Some("a"), Some(""), None]);
        let dir = TempDir::new().unwrap();
        for tc in test_cases {
            let path = dir.path().join(tc.file);
            tc.format.write(&table, &path, false).unwrap();
            let loaded = tc.format.read(&path, false).unwrap();
            assert_eq!(loaded.rows()[0].get("t"), Some(&json!("a")), "{}", tc.name);
            assert_eq!(loaded.rows()[1].get("t"), Some(&tc.expected), "{}", tc.name);
            assert_eq!(loaded.rows()[2].get("t"), Some(&Value::Null), "{}", tc.name);
        }
    }

    #[test]
    fn test_pickle_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snap.pickle");
        let err = SnapshotFormat::Pickle.write(&sample(), &path, false).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_malformed_jsonl_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"a\": 1}\nnot json\n").unwrap();

        let err = SnapshotFormat::JsonLines.read(&path, false).unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {}", err);
    }
}
