//! Search, column filters, sort and pagination over a [`RecordSet`].
//!
//! Every stage works on row positions and returns a new list of positions; the
//! record set itself is never copied or modified. The stages always run in the
//! order search -> filter -> sort -> paginate (see [`run`]).

use std::cmp::Ordering;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column_index::ColumnIndex;
use crate::record::{Record, RecordSet};
use crate::value::parse_number;

#[derive(Debug, Clone, PartialEq, Eq, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    Contains,
    Equals,
    Greater,
    Less,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Contains => "contains",
            FilterOperator::Equals => "equals",
            FilterOperator::Greater => "greater",
            FilterOperator::Less => "less",
        }
    }

    pub fn iterator() -> impl Iterator<Item = FilterOperator> {
        [
            FilterOperator::Contains,
            FilterOperator::Equals,
            FilterOperator::Greater,
            FilterOperator::Less,
        ]
        .iter()
        .copied()
    }

    pub fn parse(s: &str) -> Option<FilterOperator> {
        Self::iterator().find(|op| op.as_str().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub operator: FilterOperator,
    pub value: String,
}

impl ColumnFilter {
    pub fn new(operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }

    /// A filter without a value does not constrain anything.
    pub fn is_active(&self) -> bool {
        !self.value.is_empty()
    }
}

/// At most one filter per column, kept in the order columns were first filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilters {
    filters: Vec<(String, ColumnFilter)>,
}

impl ColumnFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the filter for `column`.
    pub fn set(&mut self, column: impl Into<String>, filter: ColumnFilter) {
        let column = column.into();
        match self.filters.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = filter,
            None => self.filters.push((column, filter)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, filter: ColumnFilter) -> Self {
        self.set(column, filter);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<ColumnFilter> {
        let pos = self.filters.iter().position(|(c, _)| c == column)?;
        Some(self.filters.remove(pos).1)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnFilter> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, f)| f)
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnFilter)> {
        self.filters.iter().map(|(c, f)| (c.as_str(), f))
    }

    /// Filters that actually constrain rows.
    pub fn active(&self) -> impl Iterator<Item = (&str, &ColumnFilter)> {
        self.iter().filter(|(_, f)| f.is_active())
    }
}

/// Parse `COLUMN:OP:VALUE`. The column may itself contain `:` (decoded labels
/// often do), so the leftmost `:<operator>:` marker splits the argument.
pub fn parse_filter_arg(arg: &str) -> Result<(String, ColumnFilter), String> {
    let lower = arg.to_ascii_lowercase();
    let found = FilterOperator::iterator()
        .filter_map(|op| {
            let marker = format!(":{}:", op.as_str());
            lower.find(&marker).map(|at| (at, op, marker.len()))
        })
        .min_by_key(|(at, _, _)| *at);
    match found {
        Some((0, _, _)) => Err(format!("Filter '{}' has no column", arg)),
        Some((at, op, len)) => Ok((
            arg[..at].to_string(),
            ColumnFilter::new(op, &arg[at + len..]),
        )),
        None => Err(format!(
            "Filter '{}' must look like COLUMN:OP:VALUE with OP one of: {}",
            arg,
            FilterOperator::iterator()
                .map(|op| op.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Everything that determines a view of the canonical record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub search: String,
    pub filters: ColumnFilters,
    pub sort: Option<SortKey>,
    /// 1-indexed.
    pub page: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            search: String::new(),
            filters: ColumnFilters::default(),
            sort: None,
            page: 1,
        }
    }
}

/// One window of an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// The filtered and sorted row positions plus the requested page of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryView {
    pub rows: Vec<usize>,
    pub page: Page<usize>,
}

impl QueryView {
    pub fn empty(page: usize, page_size: usize) -> Self {
        Self {
            rows: Vec::new(),
            page: paginate(&[], page, page_size),
        }
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn total_pages(&self) -> usize {
        self.page.total_pages
    }

    /// Records on the current page, in view order.
    pub fn page_records<'a>(&'a self, set: &'a RecordSet) -> impl Iterator<Item = &'a Record> {
        self.page.items.iter().filter_map(move |&pos| set.record(pos))
    }

    /// Every record in the view, in view order.
    pub fn records<'a>(&'a self, set: &'a RecordSet) -> impl Iterator<Item = &'a Record> {
        self.rows.iter().filter_map(move |&pos| set.record(pos))
    }
}

fn column_for<'a>(set: &'a RecordSet, name: &str) -> Option<&'a ColumnIndex> {
    set.column_position(name).and_then(|c| set.column(c))
}

/// Keep rows where any column contains `term`, ignoring case. An empty term keeps everything.
pub fn search(set: &RecordSet, rows: &[usize], term: &str) -> Vec<usize> {
    if term.is_empty() {
        return rows.to_vec();
    }
    let needle = term.to_lowercase();
    let columns: Vec<&ColumnIndex> = (0..set.headers().len())
        .filter_map(|c| set.column(c))
        .collect();
    rows.iter()
        .copied()
        .filter(|&row| columns.iter().any(|col| col.lowered(row).contains(&needle)))
        .collect()
}

/// Keep rows passing every active filter.
///
/// Numeric operators exclude rows whose cell (or the filter value) does not parse
/// as a number. A filter on a column the set does not have sees only empty cells.
pub fn filter(set: &RecordSet, rows: &[usize], filters: &ColumnFilters) -> Vec<usize> {
    let mut kept = rows.to_vec();
    for (column, filter) in filters.active() {
        let col = column_for(set, column);
        let lowered = |row: usize| col.map(|c| c.lowered(row)).unwrap_or("");
        let number = |row: usize| col.and_then(|c| c.number(row));
        match filter.operator {
            FilterOperator::Contains => {
                let needle = filter.value.to_lowercase();
                kept.retain(|&row| lowered(row).contains(&needle));
            }
            FilterOperator::Equals => {
                let needle = filter.value.to_lowercase();
                kept.retain(|&row| lowered(row) == needle);
            }
            FilterOperator::Greater | FilterOperator::Less => {
                let Some(target) = parse_number(&filter.value) else {
                    kept.clear();
                    continue;
                };
                let greater = filter.operator == FilterOperator::Greater;
                kept.retain(|&row| match number(row) {
                    Some(n) if greater => n > target,
                    Some(n) => n < target,
                    None => false,
                });
            }
        }
    }
    kept
}

/// Empty cells, then numbers, then other text.
fn cell_rank(col: &ColumnIndex, row: usize) -> u8 {
    if col.lowered(row).is_empty() {
        0
    } else if col.number(row).is_some() {
        1
    } else {
        2
    }
}

/// Two numbers compare numerically, anything else as lower-cased text.
/// Numbers sort ahead of non-numeric text so the ordering stays total.
fn compare_cells(col: &ColumnIndex, a: usize, b: usize) -> Ordering {
    match (col.number(a), col.number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => cell_rank(col, a)
            .cmp(&cell_rank(col, b))
            .then_with(|| col.lowered(a).cmp(col.lowered(b))),
    }
}

/// Stable sort by one column. Empty cells come first, then numbers in numeric
/// order, then remaining text case-insensitively. Without a key, or for an
/// unknown column, the order is unchanged.
pub fn sort(set: &RecordSet, rows: &[usize], key: Option<&SortKey>) -> Vec<usize> {
    let mut ordered = rows.to_vec();
    let Some(key) = key else {
        return ordered;
    };
    let Some(col) = column_for(set, &key.column) else {
        return ordered;
    };
    let direction = key.direction;
    ordered.sort_by(|&a, &b| direction.apply(compare_cells(col, a, b)));
    ordered
}

/// Window `items` to 1-indexed `page`. Out-of-range pages (including 0) are empty;
/// clamping is left to the caller.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let total = items.len();
    let total_pages = if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    };
    let window = if page == 0 || page > total_pages {
        Vec::new()
    } else {
        let start = (page - 1) * page_size;
        let end = (start + page_size).min(total);
        items[start..end].to_vec()
    };
    Page {
        items: window,
        page,
        page_size,
        total,
        total_pages,
    }
}

/// Run the whole pipeline from the full record set.
pub fn run(set: &RecordSet, query: &Query, page_size: usize) -> QueryView {
    let started = Instant::now();
    let all = set.all_rows();
    let searched = search(set, &all, &query.search);
    let filtered = filter(set, &searched, &query.filters);
    let rows = sort(set, &filtered, query.sort.as_ref());
    let page = paginate(&rows, query.page, page_size);
    debug!(
        total = set.len(),
        matched = rows.len(),
        page = query.page,
        elapsed_us = started.elapsed().as_micros() as u64,
        "query evaluated"
    );
    QueryView { rows, page }
}
