//! Data handed to collaborators outside the engine: the per-record detail view
//! and batched questions about a selection.

use std::collections::BTreeMap;

use color_eyre::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::codebook::{Codebook, CodebookEntry, DecodedColumn, DecodedRecordSet};
use crate::record::RecordId;
use crate::value::Value;

/// Everything a detail renderer needs for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPayload {
    pub id: RecordId,
    /// Position of the record in the canonical set.
    pub index: usize,
    pub headers: Vec<String>,
    /// Header/value pairs in header order.
    pub record: Vec<(String, Value)>,
    pub columns: Vec<DecodedColumn>,
    /// Codebook entries for the variables of this record only.
    pub codebook: BTreeMap<String, CodebookEntry>,
}

impl DetailPayload {
    pub fn build(
        decoded: &DecodedRecordSet,
        codebook: Option<&Codebook>,
        id: RecordId,
    ) -> Option<Self> {
        let set = &decoded.records;
        let index = set.position_of(id)?;
        let record = set.record(index)?;
        let pairs = set
            .pairs(record)
            .map(|(header, value)| (header.to_string(), value.clone()))
            .collect();
        let codebook = codebook
            .map(|cb| {
                decoded
                    .columns
                    .iter()
                    .filter_map(|c| {
                        cb.get(&c.variable)
                            .map(|entry| (c.variable.clone(), entry.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            id,
            index,
            headers: set.headers().to_vec(),
            record: pairs,
            columns: decoded.columns.clone(),
            codebook,
        })
    }
}

/// A question about a set of records, each given as its identity string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub question: String,
    pub entries: Vec<String>,
}

impl BatchRequest {
    pub fn new(question: impl Into<String>, entries: Vec<String>) -> Self {
        Self {
            question: question.into(),
            entries,
        }
    }

    /// Split into requests of at most `size` entries, each carrying the question.
    /// A `size` of 0 is treated as 1.
    pub fn chunks(&self, size: usize) -> Vec<BatchRequest> {
        self.entries
            .chunks(size.max(1))
            .map(|chunk| BatchRequest::new(self.question.clone(), chunk.to_vec()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantReply {
    pub answer: String,
    /// Number of entries the answer covers.
    pub entries: usize,
}

/// An external service that answers questions about records.
pub trait Assistant {
    fn ask(&self, request: &BatchRequest) -> Result<AssistantReply>;
}

/// Ask `request` chunk by chunk. Chunks that fail are logged and skipped.
pub fn ask_in_chunks<A: Assistant + ?Sized>(
    assistant: &A,
    request: &BatchRequest,
    chunk_size: usize,
) -> Vec<AssistantReply> {
    let chunks = request.chunks(chunk_size);
    let total = chunks.len();
    let mut replies = Vec::with_capacity(total);
    for (i, chunk) in chunks.iter().enumerate() {
        match assistant.ask(chunk) {
            Ok(reply) => replies.push(reply),
            Err(e) => warn!(chunk = i + 1, total, error = %e, "assistant request failed"),
        }
    }
    debug!(answered = replies.len(), total, "batch finished");
    replies
}
