//! Codebooks: per-variable labels and coded-value tables.
//!
//! A codebook file is itself a tabular file with (at least) the columns
//! `variable`, `question` and `coding`. `coding` holds space separated
//! `<code> "<label>"` pairs such as `1 "Male" 2 "Female"`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ApplyError, ParseError};
use crate::parser::{parse_with_options, ParseOptions};
use crate::record::{Record, RecordSet};
use crate::value::Value;
use crate::FileFormat;

const VARIABLE_COLUMN: &str = "variable";
const QUESTION_COLUMN: &str = "question";
const CODING_COLUMN: &str = "coding";
const MODULE_COLUMN: &str = "module";

fn coding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(\d+)\s+"([^"]+)""#).expect("valid coding regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodebookEntry {
    /// Human readable question; replaces the raw variable name as a header.
    pub label: String,
    /// Questionnaire module; carried along but unused by queries.
    pub module: String,
    /// Raw code -> decoded text. Lookup is an exact string match.
    pub coding: BTreeMap<String, String>,
}

impl CodebookEntry {
    pub fn decode(&self, raw: &str) -> Option<&str> {
        self.coding.get(raw).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Codebook {
    entries: HashMap<String, CodebookEntry>,
    #[serde(skip)]
    issues: Vec<ApplyError>,
    #[serde(skip)]
    skipped_rows: usize,
}

impl Codebook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `variable`.
    pub fn insert(&mut self, variable: impl Into<String>, entry: CodebookEntry) {
        self.entries.insert(variable.into(), entry);
    }

    pub fn get(&self, variable: &str) -> Option<&CodebookEntry> {
        self.entries.get(variable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Soft problems met while parsing (missing columns, unmatched coding text).
    pub fn issues(&self) -> &[ApplyError] {
        &self.issues
    }

    /// Rows ignored because `variable` or `question` was empty.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Variable -> coding table, for variables that have at least one code.
    pub fn reverse_coding(&self) -> BTreeMap<&str, &BTreeMap<String, String>> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.coding.is_empty())
            .map(|(variable, entry)| (variable.as_str(), &entry.coding))
            .collect()
    }
}

/// Extract `<code> "<label>"` pairs. Later duplicates of a code win.
pub fn parse_coding(text: &str) -> BTreeMap<String, String> {
    coding_pattern()
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

pub fn parse_codebook(bytes: &[u8], format: FileFormat) -> Result<Codebook, ParseError> {
    parse_codebook_with_options(bytes, format, &ParseOptions::default())
}

pub fn parse_codebook_with_options(
    bytes: &[u8],
    format: FileFormat,
    options: &ParseOptions,
) -> Result<Codebook, ParseError> {
    let rows = parse_with_options(bytes, format, options)?;
    Ok(codebook_from_records(&rows))
}

/// Build a codebook from an already parsed record set.
pub fn codebook_from_records(rows: &RecordSet) -> Codebook {
    let mut codebook = Codebook::new();

    let variable_col = rows.column_position(VARIABLE_COLUMN);
    let question_col = rows.column_position(QUESTION_COLUMN);
    let coding_col = rows.column_position(CODING_COLUMN);
    let module_col = rows.column_position(MODULE_COLUMN);

    let (variable_col, question_col) = match (variable_col, question_col) {
        (Some(v), Some(q)) => (v, q),
        (v, _) => {
            let missing = if v.is_none() {
                VARIABLE_COLUMN
            } else {
                QUESTION_COLUMN
            };
            let issue = ApplyError::MissingColumn(missing.to_string());
            warn!("{}", issue);
            codebook.issues.push(issue);
            codebook.skipped_rows = rows.len();
            return codebook;
        }
    };

    let cell = |record: &Record, col: Option<usize>| -> String {
        col.map(|c| record.get(c).as_str().into_owned())
            .unwrap_or_default()
    };

    for record in rows.records() {
        let variable = cell(record, Some(variable_col));
        let question = cell(record, Some(question_col));
        if variable.is_empty() || question.is_empty() {
            codebook.skipped_rows += 1;
            continue;
        }
        let coding_text = cell(record, coding_col);
        let coding = parse_coding(&coding_text);
        if coding.is_empty() && !coding_text.trim().is_empty() {
            let issue = ApplyError::UnmatchedCoding {
                variable: variable.clone(),
            };
            warn!("{}", issue);
            codebook.issues.push(issue);
        }
        codebook.insert(
            variable,
            CodebookEntry {
                label: question,
                module: cell(record, module_col),
                coding,
            },
        );
    }

    debug!(
        entries = codebook.len(),
        skipped = codebook.skipped_rows,
        issues = codebook.issues.len(),
        "parsed codebook"
    );
    codebook
}

/// Where a decoded column came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedColumn {
    /// Raw variable name from the data file.
    pub variable: String,
    /// Header shown after decoding.
    pub header: String,
    /// Whether a codebook entry exists for the variable.
    pub has_entry: bool,
}

/// The result of applying a codebook: the decoded records plus a positional
/// reverse index from each header back to its source variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecordSet {
    pub records: RecordSet,
    pub columns: Vec<DecodedColumn>,
}

impl DecodedRecordSet {
    /// Source variable of a decoded header.
    pub fn variable_for(&self, header: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.header == header)
            .map(|c| c.variable.as_str())
    }
}

fn identity_columns(headers: &[String]) -> Vec<DecodedColumn> {
    headers
        .iter()
        .map(|h| DecodedColumn {
            variable: h.clone(),
            header: h.clone(),
            has_entry: false,
        })
        .collect()
}

/// Relabel headers and decode coded values. The input is never modified.
///
/// Without a codebook, or with no records, the result is a copy of the input.
pub fn apply_codebook(set: &RecordSet, codebook: Option<&Codebook>) -> DecodedRecordSet {
    let codebook = match codebook {
        Some(cb) if !set.is_empty() => cb,
        _ => {
            return DecodedRecordSet {
                records: set.clone(),
                columns: identity_columns(set.headers()),
            }
        }
    };

    let entries: Vec<Option<&CodebookEntry>> =
        set.headers().iter().map(|h| codebook.get(h)).collect();

    let mut used: HashSet<String> = HashSet::with_capacity(set.headers().len());
    let mut columns = Vec::with_capacity(set.headers().len());
    for (variable, entry) in set.headers().iter().zip(&entries) {
        let header = match entry {
            Some(entry) => unique_label(&entry.label, variable, &used),
            None => unique_label(variable, variable, &used),
        };
        used.insert(header.clone());
        columns.push(DecodedColumn {
            variable: variable.clone(),
            header,
            has_entry: entry.is_some(),
        });
    }

    let records = set
        .records()
        .iter()
        .map(|record| {
            let values = record
                .values()
                .iter()
                .zip(&entries)
                .map(|(value, entry)| decode_value(value, *entry))
                .collect();
            Record::new(record.id(), values)
        })
        .collect();

    let headers = columns.iter().map(|c| c.header.clone()).collect();
    DecodedRecordSet {
        records: RecordSet::from_records(headers, records),
        columns,
    }
}

fn decode_value(value: &Value, entry: Option<&CodebookEntry>) -> Value {
    match entry {
        Some(entry) if !value.is_empty() => match entry.decode(&value.as_str()) {
            Some(decoded) => Value::text(decoded),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Labels are not guaranteed unique; a clash gets the variable name appended.
fn unique_label(label: &str, variable: &str, used: &HashSet<String>) -> String {
    if !used.contains(label) {
        return label.to_string();
    }
    let base = format!("{} ({})", label, variable);
    let mut candidate = base.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{} {}", base, n);
        n += 1;
    }
    candidate
}
