//! Write a view of a record set to CSV or JSON.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use tracing::debug;

use crate::record::RecordSet;
use crate::CompressionFormat;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Ndjson,
}

impl ExportFormat {
    pub const ALL: [Self; 3] = [Self::Csv, Self::Json, Self::Ndjson];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Ndjson => "NDJSON",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Ndjson => "jsonl",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            _ => None,
        }
    }

    /// Format and optional compression implied by a file name such as `out.csv.gz`.
    pub fn from_path(path: &Path) -> Option<(Self, Option<CompressionFormat>)> {
        let compression = CompressionFormat::from_extension(path);
        let data_name = match compression {
            Some(_) => Path::new(path.file_stem()?),
            None => path,
        };
        let ext = data_name.extension()?.to_str()?;
        Self::from_extension(ext).map(|format| (format, compression))
    }
}

/// Build a frame of string columns (empty cells become null) for the given rows.
fn to_frame(set: &RecordSet, rows: &[usize]) -> Result<DataFrame> {
    let columns: Vec<Column> = set
        .headers()
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|&pos| {
                    set.record(pos)
                        .map(|r| r.get(col))
                        .filter(|v| !v.is_empty())
                        .map(|v| v.as_str().into_owned())
                })
                .collect();
            Series::new(header.as_str().into(), values).into()
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn write_frame<W: Write>(df: &mut DataFrame, writer: W, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => CsvWriter::new(writer).include_header(true).finish(df)?,
        ExportFormat::Json => JsonWriter::new(writer)
            .with_json_format(JsonFormat::Json)
            .finish(df)?,
        ExportFormat::Ndjson => JsonWriter::new(writer)
            .with_json_format(JsonFormat::JsonLines)
            .finish(df)?,
    }
    Ok(())
}

/// Serialize `rows` of `set` (in that order) to bytes.
pub fn export(set: &RecordSet, rows: &[usize], format: ExportFormat) -> Result<Vec<u8>> {
    let mut df = to_frame(set, rows)?;
    let mut buf = Vec::new();
    write_frame(&mut df, &mut buf, format)?;
    Ok(buf)
}

/// Write `rows` of `set` to `path`, compressing when asked.
pub fn export_to_path(
    set: &RecordSet,
    rows: &[usize],
    path: &Path,
    format: ExportFormat,
    compression: Option<CompressionFormat>,
) -> Result<()> {
    if set.headers().is_empty() {
        return Err(eyre!("Nothing to export: no columns loaded"));
    }
    let mut df = to_frame(set, rows)?;
    let file = File::create(path)?;
    let writer: Box<dyn Write> = match compression {
        None => Box::new(file),
        Some(CompressionFormat::Gzip) => Box::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        )),
        Some(CompressionFormat::Zstd) => Box::new(zstd::Encoder::new(file, 0)?.auto_finish()),
        Some(CompressionFormat::Bzip2) => Box::new(bzip2::write::BzEncoder::new(
            file,
            bzip2::Compression::default(),
        )),
        Some(CompressionFormat::Xz) => Box::new(xz2::write::XzEncoder::new(file, 6)),
    };
    write_frame(&mut df, writer, format)?;
    debug!(path = %path.display(), rows = rows.len(), format = format.as_str(), "exported");
    Ok(())
}
