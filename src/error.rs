use thiserror::Error;

/// Failure to turn uploaded bytes into a record set. Parsing is all-or-nothing:
/// when this is returned no partial record set exists.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported format: .{extension} (expected one of: csv, xlsx, xls, json)")]
    UnsupportedFormat { extension: String },
    #[error("unsupported or unparseable format: {0}")]
    Unparseable(String),
    #[error("Excel file is empty")]
    EmptyWorkbook,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub(crate) fn unparseable(err: impl std::fmt::Display) -> Self {
        Self::Unparseable(err.to_string())
    }
}

/// Soft problems found while reading a codebook. These are collected and logged,
/// never returned as errors: the affected entry is left without a coding table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("codebook has no `{0}` column")]
    MissingColumn(String),
    #[error("coding for variable `{variable}` has no `<code> \"<label>\"` pairs")]
    UnmatchedCoding { variable: String },
}
