//! The state of one exploration session: loaded data, codebook, current query
//! and selection.
//!
//! All mutation goes through [`Session`]. Loading data or changing the codebook
//! replaces the canonical record set and resets the query and selection; a
//! failed load leaves everything as it was.

use std::path::Path;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tracing::{info, warn};

use crate::codebook::{apply_codebook, parse_codebook_with_options, Codebook, DecodedRecordSet};
use crate::error::ParseError;
use crate::parser::{format_for_extension, parse_extension, parse_with_options, read_path, ParseOptions};
use crate::payload::{ask_in_chunks, Assistant, AssistantReply, BatchRequest, DetailPayload};
use crate::query::{self, ColumnFilter, FilterOperator, Query, QueryView, SortDirection, SortKey};
use crate::record::{RecordId, RecordSet};
use crate::selection::Selection;
use crate::{CompressionFormat, FileFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub page_size: usize,
    /// Entries per assistant request.
    pub chunk_size: usize,
    pub delimiter: u8,
    pub ignore_errors: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            chunk_size: 100,
            delimiter: b',',
            ignore_errors: true,
        }
    }
}

impl SessionConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            delimiter: self.delimiter,
            ignore_errors: self.ignore_errors,
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    config: SessionConfig,
    raw: Option<RecordSet>,
    codebook: Option<Codebook>,
    decoded: Option<DecodedRecordSet>,
    query: Query,
    selection: Selection,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the loaded data with `bytes` parsed as `format`.
    pub fn load(&mut self, bytes: &[u8], format: FileFormat) -> Result<(), ParseError> {
        let set = parse_with_options(bytes, format, &self.config.parse_options())?;
        self.replace_data(set);
        Ok(())
    }

    /// Like [`Session::load`], with the format given as a file extension.
    pub fn load_extension(&mut self, bytes: &[u8], extension: &str) -> Result<(), ParseError> {
        let set = parse_extension(bytes, extension, &self.config.parse_options())?;
        self.replace_data(set);
        Ok(())
    }

    /// Read, decompress and load a data file. The format comes from the file name.
    pub fn load_path(&mut self, path: &Path, compression: Option<CompressionFormat>) -> Result<()> {
        let source = read_path(path, compression)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let extension = source
            .extension
            .ok_or_else(|| eyre!("Cannot tell the format of {}", path.display()))?;
        self.load_extension(&source.bytes, &extension)
            .wrap_err_with(|| format!("Failed to load {}", path.display()))?;
        info!(path = %path.display(), records = self.len(), "loaded data");
        Ok(())
    }

    /// Parse and apply a codebook. Any existing data is decoded again.
    pub fn load_codebook(&mut self, bytes: &[u8], format: FileFormat) -> Result<(), ParseError> {
        let codebook = parse_codebook_with_options(bytes, format, &self.config.parse_options())?;
        for issue in codebook.issues() {
            warn!(%issue, "codebook issue");
        }
        self.codebook = Some(codebook);
        self.redecode();
        Ok(())
    }

    pub fn load_codebook_path(&mut self, path: &Path) -> Result<()> {
        let source = read_path(path, None)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let extension = source
            .extension
            .ok_or_else(|| eyre!("Cannot tell the format of {}", path.display()))?;
        let format = format_for_extension(&extension)?;
        self.load_codebook(&source.bytes, format)
            .wrap_err_with(|| format!("Failed to load codebook {}", path.display()))?;
        info!(
            path = %path.display(),
            entries = self.codebook.as_ref().map(Codebook::len).unwrap_or(0),
            "loaded codebook"
        );
        Ok(())
    }

    /// Drop the codebook and go back to raw headers and values.
    pub fn clear_codebook(&mut self) {
        if self.codebook.take().is_some() {
            self.redecode();
        }
    }

    fn replace_data(&mut self, set: RecordSet) {
        self.raw = Some(set);
        self.redecode();
    }

    fn redecode(&mut self) {
        self.decoded = self
            .raw
            .as_ref()
            .map(|raw| apply_codebook(raw, self.codebook.as_ref()));
        self.query = Query::default();
        self.selection.clear();
    }

    /// Records as parsed, before decoding.
    pub fn raw(&self) -> Option<&RecordSet> {
        self.raw.as_ref()
    }

    /// The canonical record set every query runs against.
    pub fn records(&self) -> Option<&RecordSet> {
        self.decoded.as_ref().map(|d| &d.records)
    }

    pub fn decoded(&self) -> Option<&DecodedRecordSet> {
        self.decoded.as_ref()
    }

    pub fn codebook(&self) -> Option<&Codebook> {
        self.codebook.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records().map(RecordSet::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.query.search = term.into();
        self.query.page = 1;
    }

    pub fn set_filter(
        &mut self,
        column: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) {
        self.query
            .filters
            .set(column, ColumnFilter::new(operator, value));
        self.query.page = 1;
    }

    pub fn remove_filter(&mut self, column: &str) {
        self.query.filters.remove(column);
        self.query.page = 1;
    }

    /// Clear the search term and every column filter.
    pub fn clear_filters(&mut self) {
        self.query.search.clear();
        self.query.filters.clear();
        self.query.page = 1;
    }

    /// Sort by `column`, flipping the direction if it is already the sort column.
    pub fn toggle_sort(&mut self, column: &str) {
        self.query.sort = Some(match self.query.sort.take() {
            Some(key) if key.column == column => SortKey {
                direction: key.direction.toggled(),
                ..key
            },
            _ => SortKey {
                column: column.to_string(),
                direction: SortDirection::Ascending,
            },
        });
    }

    pub fn set_sort(&mut self, key: Option<SortKey>) {
        self.query.sort = key;
    }

    pub fn page(&self) -> usize {
        self.query.page
    }

    pub fn total_pages(&self) -> usize {
        self.view().total_pages()
    }

    /// Move to page `page`, clamped to the pages the current view has.
    pub fn set_page(&mut self, page: usize) {
        let last = self.total_pages().max(1);
        self.query.page = page.clamp(1, last);
    }

    pub fn first_page(&mut self) {
        self.set_page(1);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.query.page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.query.page.saturating_sub(1));
    }

    pub fn last_page(&mut self) {
        self.set_page(usize::MAX);
    }

    /// Evaluate the current query. Empty when nothing is loaded.
    pub fn view(&self) -> QueryView {
        match self.records() {
            Some(set) => query::run(set, &self.query, self.config.page_size),
            None => QueryView::empty(self.query.page, self.config.page_size),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Toggle `id` in the selection. Ids not present in the loaded data are ignored.
    pub fn toggle_selection(&mut self, id: RecordId) -> bool {
        match self.records() {
            Some(set) if set.position_of(id).is_some() => self.selection.toggle(id),
            _ => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn detail(&self, id: RecordId) -> Option<DetailPayload> {
        DetailPayload::build(self.decoded.as_ref()?, self.codebook.as_ref(), id)
    }

    /// The selected records as identity strings, paired with `question`.
    pub fn batch_request(&self, question: impl Into<String>) -> BatchRequest {
        let entries = self
            .records()
            .map(|set| self.selection.entries(set))
            .unwrap_or_default();
        BatchRequest::new(question, entries)
    }

    /// Ask `assistant` about the selection, in chunks of the configured size.
    pub fn ask<A: Assistant + ?Sized>(
        &self,
        assistant: &A,
        question: impl Into<String>,
    ) -> Result<Vec<AssistantReply>> {
        let request = self.batch_request(question);
        if request.entries.is_empty() {
            return Err(eyre!("No records selected"));
        }
        Ok(ask_in_chunks(assistant, &request, self.config.chunk_size))
    }
}
