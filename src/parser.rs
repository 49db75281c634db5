//! Turns uploaded bytes into a [`RecordSet`].
//!
//! `parse` is a pure function of the bytes and declared format; reading from
//! disk (and decompressing) is done separately by [`read_path`].

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::record::{unique_headers, RecordSet};
use crate::value::Value;
use crate::{CompressionFormat, FileFormat};

/// Options for delimited text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub delimiter: u8,
    /// Keep going past rows polars cannot read instead of failing the whole file.
    pub ignore_errors: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            ignore_errors: true,
        }
    }
}

/// Raw bytes read from disk along with the extension that identifies their format
/// (compression suffix already removed).
#[derive(Debug, Clone)]
pub struct SourceBytes {
    pub bytes: Vec<u8>,
    pub extension: Option<String>,
}

/// Resolve a declared extension to a format, rejecting anything unsupported.
pub fn format_for_extension(extension: &str) -> Result<FileFormat, ParseError> {
    FileFormat::from_extension(extension).ok_or_else(|| ParseError::UnsupportedFormat {
        extension: extension.trim_start_matches('.').to_lowercase(),
    })
}

pub fn parse(bytes: &[u8], format: FileFormat) -> Result<RecordSet, ParseError> {
    parse_with_options(bytes, format, &ParseOptions::default())
}

pub fn parse_with_options(
    bytes: &[u8],
    format: FileFormat,
    options: &ParseOptions,
) -> Result<RecordSet, ParseError> {
    let set = match format {
        FileFormat::Csv => parse_csv(bytes, options)?,
        FileFormat::Excel => parse_excel(bytes)?,
        FileFormat::Json => parse_json(bytes)?,
    };
    debug!(
        source_format = ?format,
        rows = set.len(),
        columns = set.headers().len(),
        "parsed record set"
    );
    Ok(set)
}

/// Parse bytes whose format is given by a file extension such as `"csv"`.
pub fn parse_extension(
    bytes: &[u8],
    extension: &str,
    options: &ParseOptions,
) -> Result<RecordSet, ParseError> {
    let format = format_for_extension(extension)?;
    parse_with_options(bytes, format, options)
}

fn parse_csv(bytes: &[u8], options: &ParseOptions) -> Result<RecordSet, ParseError> {
    let df = match read_csv_frame(bytes, options, false) {
        Ok(df) => df,
        Err(e) if options.ignore_errors => {
            warn!(error = %e, "rows do not fit the header; re-reading leniently");
            read_csv_frame(bytes, options, true).map_err(ParseError::unparseable)?
        }
        Err(e) => return Err(ParseError::unparseable(e)),
    };
    frame_to_record_set(&df)
}

fn read_csv_frame(bytes: &[u8], options: &ParseOptions, lenient: bool) -> PolarsResult<DataFrame> {
    // No schema inference: every column is read as text so raw codes survive untouched.
    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_ignore_errors(lenient)
        .map_parse_options(|opts| {
            opts.with_separator(options.delimiter)
                .with_truncate_ragged_lines(lenient)
        });
    CsvReader::new(Cursor::new(bytes.to_vec()))
        .with_options(read_options)
        .finish()
}

fn parse_json(bytes: &[u8]) -> Result<RecordSet, ParseError> {
    let df = JsonReader::new(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(ParseError::unparseable)?;
    frame_to_record_set(&df)
}

fn frame_to_record_set(df: &DataFrame) -> Result<RecordSet, ParseError> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    if headers.is_empty() {
        return Err(ParseError::Unparseable("no columns found".to_string()));
    }
    let mut rows: Vec<Vec<Value>> = vec![Vec::with_capacity(headers.len()); df.height()];
    for column in df.get_columns() {
        for (row, cell) in rows.iter_mut().zip(column_cells(column)?) {
            row.push(cell);
        }
    }
    let before = rows.len();
    rows.retain(|row| row.iter().any(|v| !v.is_empty()));
    if rows.len() != before {
        debug!(skipped = before - rows.len(), "skipped blank rows");
    }
    Ok(RecordSet::new(unique_headers(headers), rows))
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn column_cells(column: &Column) -> Result<Vec<Value>, ParseError> {
    if is_numeric_dtype(column.dtype()) {
        let floats = column
            .cast(&DataType::Float64)
            .map_err(ParseError::unparseable)?;
        let ca = floats.f64().map_err(ParseError::unparseable)?;
        return Ok(ca
            .into_iter()
            .map(|v| v.map(Value::Number).unwrap_or_default())
            .collect());
    }
    let strings = column
        .cast(&DataType::String)
        .map_err(ParseError::unparseable)?;
    let ca = strings.str().map_err(ParseError::unparseable)?;
    Ok(ca
        .into_iter()
        .map(|v| v.map(Value::text).unwrap_or_default())
        .collect())
}

/// First sheet only; first row is the header.
fn parse_excel(bytes: &[u8]) -> Result<RecordSet, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Unparseable(format!("Excel: {}", e)))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| ParseError::Unparseable(format!("Excel: {}", e)))?,
        None => return Err(ParseError::EmptyWorkbook),
    };
    let mut rows = range.rows();
    let header_row = rows.next().ok_or(ParseError::EmptyWorkbook)?;
    // The range is as wide as the widest row; columns past the last header are dropped.
    let width = header_row
        .iter()
        .rposition(|c| !is_blank(c))
        .map_or(0, |last| last + 1);
    if width == 0 {
        return Err(ParseError::EmptyWorkbook);
    }
    let headers = unique_headers(
        header_row[..width]
            .iter()
            .map(|c| calamine::DataType::as_string(c).unwrap_or_else(|| c.to_string()))
            .collect(),
    );
    let mut dropped = 0usize;
    let data: Vec<Vec<Value>> = rows
        .map(|row| {
            if row.iter().skip(width).any(|c| !is_blank(c)) {
                dropped += 1;
            }
            row.iter().take(width).map(excel_cell).collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|v| !v.is_empty()))
        .collect();
    if dropped > 0 {
        warn!(rows = dropped, "cells beyond the header row were dropped");
    }
    Ok(RecordSet::new(headers, data))
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn excel_cell(cell: &Data) -> Value {
    use calamine::DataType;
    match cell {
        Data::Empty | Data::Error(_) => Value::Empty,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => Value::text(s.as_str()),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => Value::Text(format_datetime(dt)),
            None => Value::text(cell.to_string()),
        },
        other => Value::text(other.to_string()),
    }
}

fn format_datetime(dt: NaiveDateTime) -> String {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default();
    if dt.time() == midnight {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Read a file from disk, decompressing it when the extension (or `compression`)
/// says so. The returned extension is that of the inner data file, e.g. `csv`
/// for `records.csv.gz`.
pub fn read_path(
    path: &Path,
    compression: Option<CompressionFormat>,
) -> Result<SourceBytes, ParseError> {
    let raw = fs::read(path)?;
    let detected = CompressionFormat::from_extension(path);
    let compression = compression.or(detected);
    let bytes = match compression {
        Some(format) => decompress(&raw, format)?,
        None => raw,
    };
    // Only strip the suffix when it actually names the compression.
    let data_name = if detected.is_some() {
        path.file_stem().map(Path::new)
    } else {
        path.file_name().map(Path::new)
    };
    let extension = data_name
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    debug!(path = %path.display(), bytes = bytes.len(), ?compression, "read source file");
    Ok(SourceBytes { bytes, extension })
}

fn decompress(raw: &[u8], compression: CompressionFormat) -> std::io::Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    match compression {
        CompressionFormat::Gzip => {
            flate2::read::MultiGzDecoder::new(raw).read_to_end(&mut decompressed)?;
        }
        CompressionFormat::Zstd => {
            zstd::stream::read::Decoder::new(raw)?.read_to_end(&mut decompressed)?;
        }
        CompressionFormat::Bzip2 => {
            bzip2::read::BzDecoder::new(raw).read_to_end(&mut decompressed)?;
        }
        CompressionFormat::Xz => {
            xz2::read::XzDecoder::new(raw).read_to_end(&mut decompressed)?;
        }
    }
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_csv_keeps_raw_text() {
        let set = parse(b"id,age,sex\n1,034,1\n2,,2\n", FileFormat::Csv).unwrap();
        assert_eq!(set.headers(), &["id", "age", "sex"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.value(0, "age").as_str(), "034");
        assert!(set.value(1, "age").is_empty());
    }

    #[test]
    fn test_csv_skips_empty_lines() {
        let set = parse(b"a,b\n1,2\n\n3,4\n\n", FileFormat::Csv).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.value(1, "a").as_str(), "3");
    }

    #[test]
    fn test_csv_quoted_fields() {
        let set = parse(
            b"id,narrative\n1,\"fever, cough\"\n",
            FileFormat::Csv,
        )
        .unwrap();
        assert_eq!(set.value(0, "narrative").as_str(), "fever, cough");
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let options = ParseOptions {
            delimiter: b';',
            ..ParseOptions::default()
        };
        let set = parse_with_options(b"a;b\n1;2\n", FileFormat::Csv, &options).unwrap();
        assert_eq!(set.headers(), &["a", "b"]);
        assert_eq!(set.value(0, "b").as_str(), "2");
    }

    #[test]
    fn test_empty_csv_is_unparseable() {
        let err = parse(b"", FileFormat::Csv).unwrap_err();
        assert!(matches!(err, ParseError::Unparseable(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_extension(b"a,b\n1,2\n", "txt", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat { ref extension } if extension == "txt"));
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn test_json_array_of_objects() {
        let set = parse(
            br#"[{"id": 1, "cause": "Malaria"}, {"id": 2, "cause": null}]"#,
            FileFormat::Json,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        let id_col = set.column_position("id").unwrap();
        assert_eq!(set.records()[0].get(id_col), &Value::Number(1.0));
        assert_eq!(set.value(0, "cause").as_str(), "Malaria");
        assert!(set.value(1, "cause").is_empty());
    }

    #[test]
    fn test_csv_ragged_rows_keep_parsing() {
        let set = parse(b"a,b\n1,2\n3,4,5\n6\n", FileFormat::Csv).unwrap();
        assert_eq!(set.headers(), &["a", "b"]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.value(1, "b").as_str(), "4");
        assert_eq!(set.records()[1].values().len(), 2);
        assert_eq!(set.value(2, "a").as_str(), "6");
        assert!(set.value(2, "b").is_empty());
    }

    #[test]
    fn test_csv_ragged_rows_fail_without_ignore_errors() {
        let options = ParseOptions {
            ignore_errors: false,
            ..ParseOptions::default()
        };
        let err = parse_with_options(b"a,b\n1,2\n3,4,5\n", FileFormat::Csv, &options).unwrap_err();
        assert!(matches!(err, ParseError::Unparseable(_)));
    }

    #[test]
    fn test_excel_first_sheet_aligned_to_header() {
        let bytes = include_bytes!("../tests/fixtures/records.xlsx");
        let set = parse(bytes, FileFormat::Excel).unwrap();
        // the stray cell in column D has no header and is dropped
        assert_eq!(set.headers(), &["id", "age", "sex"]);
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.records()[0].values(),
            &[Value::Number(1.0), Value::Number(34.0), Value::text("Male")]
        );
        // short rows are padded with empty cells, blank rows skipped
        assert_eq!(set.value(1, "id").as_str(), "2");
        assert!(set.value(1, "age").is_empty());
        assert!(set.value(1, "sex").is_empty());
        assert_eq!(set.value(2, "sex").as_str(), "Female");
        assert!(set.column_position("note").is_none());
    }

    #[test]
    fn test_excel_empty_first_sheet() {
        let bytes = include_bytes!("../tests/fixtures/empty_first_sheet.xlsx");
        let err = parse(bytes, FileFormat::Excel).unwrap_err();
        assert!(matches!(err, ParseError::EmptyWorkbook));
    }

    #[test]
    fn test_blank_header_cells() {
        assert!(is_blank(&Data::Empty));
        assert!(is_blank(&Data::String("  ".to_string())));
        assert!(!is_blank(&Data::Int(0)));
    }

    #[test]
    fn test_garbage_excel_is_unparseable() {
        let err = parse(b"not a workbook", FileFormat::Excel).unwrap_err();
        assert!(matches!(err, ParseError::Unparseable(_)));
    }

    #[test]
    fn test_excel_cell_mapping() {
        assert_eq!(excel_cell(&Data::Int(3)), Value::Number(3.0));
        assert_eq!(excel_cell(&Data::Float(2.5)), Value::Number(2.5));
        assert_eq!(
            excel_cell(&Data::String("Male".to_string())),
            Value::text("Male")
        );
        assert_eq!(excel_cell(&Data::String(String::new())), Value::Empty);
        assert_eq!(excel_cell(&Data::Bool(true)), Value::text("true"));
        assert_eq!(excel_cell(&Data::Empty), Value::Empty);
    }

    #[test]
    fn test_format_datetime() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            format_datetime(date.and_hms_opt(0, 0, 0).unwrap()),
            "2024-03-01"
        );
        assert_eq!(
            format_datetime(date.and_hms_opt(13, 5, 9).unwrap()),
            "2024-03-01 13:05:09"
        );
    }

    #[test]
    fn test_read_path_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv.gz");
        let file = fs::File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"id,cause\n1,Malaria\n").unwrap();
        encoder.finish().unwrap();

        let source = read_path(&path, None).unwrap();
        assert_eq!(source.extension.as_deref(), Some("csv"));
        let set = parse(&source.bytes, FileFormat::Csv).unwrap();
        assert_eq!(set.value(0, "cause").as_str(), "Malaria");
    }

    #[test]
    fn test_read_path_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Records.CSV");
        fs::write(&path, b"a\n1\n").unwrap();
        let source = read_path(&path, None).unwrap();
        assert_eq!(source.extension.as_deref(), Some("csv"));
        assert_eq!(source.bytes, b"a\n1\n");
    }

    #[test]
    fn test_read_path_missing_file() {
        let err = read_path(Path::new("/nonexistent/records.csv"), None).unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }
}
