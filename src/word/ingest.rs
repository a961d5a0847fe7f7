// src/word/ingest.rs
// Validates content batches from the generation collaborator and turns them
// into fresh word records.

use chrono::NaiveDate;
use log::info;
use thiserror::Error;

use super::{WordContent, WordId, WordPool, WordRecord};

/// Rejection of a content batch at the ingestion boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("content batch is empty")]
    EmptyBatch,
    #[error("entry {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
}

/// Ingests a content batch in bulk. The whole batch is validated before any
/// record is created, so a malformed entry never leaves partial records in
/// the pool.
pub fn ingest_batch(
    pool: &mut WordPool,
    entries: Vec<WordContent>,
    today: NaiveDate,
) -> Result<Vec<WordId>, IngestError> {
    if entries.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    for (index, entry) in entries.iter().enumerate() {
        validate(index, entry)?;
    }

    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = pool.allocate_id();
        pool.insert(WordRecord::new(id, entry, today));
        ids.push(id);
    }
    info!("ingested {} new words", ids.len());
    Ok(ids)
}

fn validate(index: usize, entry: &WordContent) -> Result<(), IngestError> {
    if entry.word.trim().is_empty() {
        return Err(IngestError::MissingField { index, field: "word" });
    }
    if entry.definition.trim().is_empty() {
        return Err(IngestError::MissingField { index, field: "definition" });
    }
    Ok(())
}
