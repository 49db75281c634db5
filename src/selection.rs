//! The set of records picked for detail views and batch questions.

use std::collections::BTreeSet;

use crate::record::{Record, RecordId, RecordSet};

/// Rendered in place of an empty value in identity strings.
pub const NO_DATA: &str = "No data";

/// Records chosen for a batch operation, keyed by [`RecordId`] so rows with
/// identical content remain distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<RecordId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: RecordId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in record order.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.ids.iter().copied()
    }

    /// Identity strings of the selected records still present in `set`.
    pub fn entries(&self, set: &RecordSet) -> Vec<String> {
        self.ids
            .iter()
            .filter_map(|&id| set.record_by_id(id))
            .map(|record| identity_string(set.headers(), record))
            .collect()
    }
}

/// `"header: value; header: value"` in header order.
pub fn identity_string(headers: &[String], record: &Record) -> String {
    headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let value = record.get(col);
            if value.is_empty() {
                format!("{}: {}", header, NO_DATA)
            } else {
                format!("{}: {}", header, value)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
