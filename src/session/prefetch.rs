// src/session/prefetch.rs
// Background preparation of the next endless-mode batch. A worker thread
// builds the batch and its questions, then reports back over a channel; the
// result only takes effect when the state machine consumes it.

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::batch;
use crate::questions::{QuestionError, QuestionSource, QuizQuestion};
use crate::word::{WordId, WordPool, WordRecord};

/// A fully prepared batch: word ids plus their generated questions.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub ids: Vec<WordId>,
    pub questions: Vec<QuizQuestion>,
    pub recycled: bool,
}

/// Message sent from the prefetch thread back to the session.
pub enum PrefetchMessage {
    Complete(Result<PreparedBatch, QuestionError>),
}

/// Builds a batch and its questions. Shared by the prefetch thread and the
/// synchronous fallback path.
pub fn prepare_batch(
    pool: &WordPool,
    today: NaiveDate,
    n: usize,
    reviewed: &HashSet<WordId>,
    retries: &[WordId],
    allow_recycle: bool,
    source: &dyn QuestionSource,
    rng: &mut StdRng,
) -> Result<PreparedBatch, QuestionError> {
    let selected = batch::select_endless(pool, today, n, reviewed, retries, allow_recycle, rng);
    if selected.ids.is_empty() {
        // No eligible words; an empty batch tells the session to end.
        return Ok(PreparedBatch { ids: Vec::new(), questions: Vec::new(), recycled: false });
    }

    let records: Vec<WordRecord> = selected
        .ids
        .iter()
        .filter_map(|id| pool.get(*id).cloned())
        .collect();
    let questions = source.generate(&records, &pool.word_list())?;
    if questions.is_empty() {
        return Err(QuestionError::EmptyResponse);
    }
    Ok(PreparedBatch { ids: selected.ids, questions, recycled: selected.recycled })
}

/// Spawns the prefetch worker. The pool is snapshotted by clone; the worker
/// never mutates scheduling state. The returned receiver doubles as the
/// in-flight guard: while the session holds one, no second prefetch starts.
#[allow(clippy::too_many_arguments)]
pub fn spawn_prefetch(
    pool: WordPool,
    today: NaiveDate,
    n: usize,
    reviewed: HashSet<WordId>,
    retries: Vec<WordId>,
    allow_recycle: bool,
    source: Arc<dyn QuestionSource>,
    seed: u64,
) -> Receiver<PrefetchMessage> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        let result = prepare_batch(
            &pool,
            today,
            n,
            &reviewed,
            &retries,
            allow_recycle,
            source.as_ref(),
            &mut rng,
        );
        if tx.send(PrefetchMessage::Complete(result)).is_err() {
            // The session ended and dropped its receiver; the prepared
            // batch is discarded, which is exactly what we want.
            warn!("prefetch finished after session end; result discarded");
        }
    });
    rx
}
