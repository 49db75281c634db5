//! Plain-text and JSON renderings of a query view and of the summaries.

use std::fmt::Write as _;

use serde::Serialize;

use crate::config::DisplayConfig;
use crate::query::QueryView;
use crate::record::{RecordId, RecordSet};
use crate::statistics::{CauseSummary, DemographicSummary};
use crate::value::Value;

const ELLIPSIS: &str = "...";
const SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub max_cell_chars: usize,
    pub row_numbers: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_cell_chars: 50,
            row_numbers: false,
        }
    }
}

impl From<&DisplayConfig> for TableOptions {
    fn from(display: &DisplayConfig) -> Self {
        Self {
            max_cell_chars: display.max_cell_chars,
            row_numbers: display.row_numbers,
        }
    }
}

/// Flatten line breaks and cut `text` to at most `max` characters.
pub fn truncate_cell(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max {
        return flat;
    }
    if max <= ELLIPSIS.len() {
        return flat.chars().take(max).collect();
    }
    let mut cut: String = flat.chars().take(max - ELLIPSIS.len()).collect();
    cut.push_str(ELLIPSIS);
    cut
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    out.push_str(line.trim_end());
    out.push('\n');
}

/// The current page as an aligned text table with a page footer.
pub fn render_page(set: &RecordSet, view: &QueryView, options: &TableOptions) -> String {
    let mut header: Vec<String> = Vec::with_capacity(set.headers().len() + 1);
    if options.row_numbers {
        header.push("#".to_string());
    }
    header.extend(
        set.headers()
            .iter()
            .map(|h| truncate_cell(h, options.max_cell_chars)),
    );

    let rows: Vec<Vec<String>> = view
        .page_records(set)
        .map(|record| {
            let mut cells = Vec::with_capacity(header.len());
            if options.row_numbers {
                cells.push(record.id().to_string());
            }
            cells.extend(
                record
                    .values()
                    .iter()
                    .map(|v| truncate_cell(&v.as_str(), options.max_cell_chars)),
            );
            cells
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    if view.total() == 0 {
        out.push_str("No matching records\n");
    } else {
        let _ = writeln!(
            out,
            "Page {} of {} ({} records)",
            view.page.page,
            view.total_pages(),
            view.total()
        );
    }
    out
}

#[derive(Debug, Serialize)]
pub struct RecordJson<'a> {
    pub id: RecordId,
    pub values: &'a [Value],
}

/// JSON shape of one page of a view. Values are aligned with `headers`.
#[derive(Debug, Serialize)]
pub struct PageJson<'a> {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total: usize,
    pub headers: &'a [String],
    pub records: Vec<RecordJson<'a>>,
}

pub fn page_json<'a>(set: &'a RecordSet, view: &'a QueryView) -> PageJson<'a> {
    PageJson {
        page: view.page.page,
        page_size: view.page.page_size,
        total_pages: view.total_pages(),
        total: view.total(),
        headers: set.headers(),
        records: view
            .page_records(set)
            .map(|record| RecordJson {
                id: record.id(),
                values: record.values(),
            })
            .collect(),
    }
}

fn push_counts(out: &mut String, title: &str, counts: &[(String, usize)]) {
    let _ = writeln!(out, "{}:", title);
    if counts.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    let width = counts.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    for (label, count) in counts {
        let _ = writeln!(out, "  {:<width$}  {}", label, count, width = width);
    }
}

fn column_line(out: &mut String, name: &str, column: &Option<String>) {
    let _ = writeln!(
        out,
        "{} column: {}",
        name,
        column.as_deref().unwrap_or("Not found")
    );
}

pub fn render_summary(demographics: &DemographicSummary, causes: &CauseSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Records: {}", demographics.total);
    column_line(&mut out, "Site", &demographics.site_column);
    column_line(&mut out, "Sex", &demographics.sex_column);
    column_line(&mut out, "Age", &demographics.age_column);
    if demographics.site_column.is_some() {
        push_counts(&mut out, "Sites", &demographics.sites);
    }
    if demographics.sex_column.is_some() {
        push_counts(&mut out, "Sex", &demographics.sexes);
    }
    if demographics.age_column.is_some() {
        push_counts(&mut out, "Age groups", &demographics.ages);
    }
    out.push('\n');
    column_line(&mut out, "Cause", &causes.cause_column);
    column_line(&mut out, "Immediate cause", &causes.immediate_column);
    column_line(&mut out, "Underlying cause", &causes.underlying_column);
    let _ = writeln!(
        out,
        "Records with a cause: {} ({} distinct)",
        causes.total_with_cause, causes.distinct_causes
    );
    if causes.cause_column.is_some() {
        push_counts(&mut out, "Top causes", &causes.top_causes);
    }
    out
}
