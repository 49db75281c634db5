//! Lazily built per-column lookup data.
//!
//! Search, filters and sort all need the same derived forms of a cell: its
//! lower-cased text and its numeric reading. They are computed once per column
//! the first time a query touches that column and live inside the owning
//! [`RecordSet`](crate::record::RecordSet), so replacing the record set drops them.

use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ColumnIndex {
    lowered: Vec<String>,
    numbers: Vec<Option<f64>>,
}

impl ColumnIndex {
    pub fn build<'a>(cells: impl Iterator<Item = &'a Value>) -> Self {
        let (lowered, numbers) = cells
            .map(|cell| (cell.as_str().to_lowercase(), cell.as_number()))
            .unzip();
        Self { lowered, numbers }
    }

    /// Lower-cased string form of the cell at `row` (empty when out of range).
    pub fn lowered(&self, row: usize) -> &str {
        self.lowered.get(row).map(String::as_str).unwrap_or("")
    }

    pub fn number(&self, row: usize) -> Option<f64> {
        self.numbers.get(row).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.lowered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lowered.is_empty()
    }
}
