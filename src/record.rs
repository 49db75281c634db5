//! Parsed rows, their stable ids and the header-aligned record set.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use crate::column_index::ColumnIndex;
use crate::value::Value;

static EMPTY_VALUE: Value = Value::Empty;

/// Stable identity assigned to a record when its file is parsed. Decoding a
/// record set keeps the ids, so they survive codebook application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub usize);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row: a value per header, aligned by position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    id: RecordId,
    values: Vec<Value>,
}

impl Record {
    pub fn new(id: RecordId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Cell at column position `col`; missing cells read as empty.
    pub fn get(&self, col: usize) -> &Value {
        self.values.get(col).unwrap_or(&EMPTY_VALUE)
    }
}

/// An ordered, rectangular set of records sharing one header row.
///
/// The set is immutable once built. Query helpers cache per-column data in it
/// lazily (see [`ColumnIndex`]).
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    headers: Vec<String>,
    records: Vec<Record>,
    columns: Vec<OnceLock<ColumnIndex>>,
}

impl RecordSet {
    /// Build a record set from raw rows, assigning ids in arrival order.
    /// Short rows are padded with empty cells; cells beyond the header are dropped.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| Record::new(RecordId(i), values))
            .collect();
        Self::from_records(headers, records)
    }

    /// Build a record set from records that already carry ids (ids must ascend).
    pub fn from_records(headers: Vec<String>, records: Vec<Record>) -> Self {
        let width = headers.len();
        let records = records
            .into_iter()
            .map(|mut record| {
                record.values.resize(width, Value::Empty);
                record
            })
            .collect();
        let columns = (0..width).map(|_| OnceLock::new()).collect();
        Self {
            headers,
            records,
            columns,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a header, by exact name.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Record at a position in the set (not an id).
    pub fn record(&self, pos: usize) -> Option<&Record> {
        self.records.get(pos)
    }

    pub fn position_of(&self, id: RecordId) -> Option<usize> {
        self.records.binary_search_by_key(&id, |r| r.id).ok()
    }

    pub fn record_by_id(&self, id: RecordId) -> Option<&Record> {
        self.position_of(id).map(|pos| &self.records[pos])
    }

    /// Cell of the record at `pos` in the named column.
    pub fn value(&self, pos: usize, column: &str) -> &Value {
        match (self.record(pos), self.column_position(column)) {
            (Some(record), Some(col)) => record.get(col),
            _ => &EMPTY_VALUE,
        }
    }

    /// Header/value pairs of a record, in header order.
    pub fn pairs<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.headers
            .iter()
            .enumerate()
            .map(move |(col, h)| (h.as_str(), record.get(col)))
    }

    /// Every position in arrival order; the starting point of a query.
    pub fn all_rows(&self) -> Vec<usize> {
        (0..self.records.len()).collect()
    }

    /// A new set holding the records at `rows`, kept in arrival order.
    pub fn subset(&self, rows: &[usize]) -> RecordSet {
        let mut rows = rows.to_vec();
        rows.sort_unstable();
        rows.dedup();
        let records = rows
            .into_iter()
            .filter_map(|pos| self.records.get(pos).cloned())
            .collect();
        Self::from_records(self.headers.clone(), records)
    }

    /// Derived lookup data for column `col`, built on first use.
    pub fn column(&self, col: usize) -> Option<&ColumnIndex> {
        let cell = self.columns.get(col)?;
        Some(cell.get_or_init(|| ColumnIndex::build(self.records.iter().map(|r| r.get(col)))))
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.headers == other.headers && self.records == other.records
    }
}

/// Make header names usable as unique column keys: blank names become
/// `column_<n>` (1-based position) and repeats get a `_<n>` suffix.
pub fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for (i, header) in raw.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("column_{}", i + 1)
        } else {
            header
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
