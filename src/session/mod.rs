// src/session/mod.rs
// The review session state machine: Study -> Quiz/Recall -> Done, plus the
// endless variant that streams batches with background prefetch.

pub mod clock;
pub mod prefetch;

use std::collections::HashSet;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapt;
use crate::batch;
use crate::questions::{QuestionError, QuestionSource, QuizKind, QuizQuestion};
use crate::rewards::{RewardEvent, RewardSink};
use crate::scheduler::{self, ReviewInput, ReviewOutcome};
use crate::streak::StreakTracker;
use crate::word::ingest::{self, IngestError};
use crate::word::{Difficulty, PoolStats, WordContent, WordId, WordPool, WordRecord};

use clock::{Clock, SystemClock};
use prefetch::{PrefetchMessage, PreparedBatch};

/// Delay before a correct options-based answer advances on its own.
pub const AUTO_ADVANCE_MS: i64 = 2_500;

/// Where the state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Study,
    Quiz,
    Recall,
    Done,
}

/// The flavor of session the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Quiz,
    Recall,
    Endless,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub batch_size: usize,
    /// Whether an exhausted endless session may clear its exclusion set and
    /// resample the whole pool.
    pub allow_recycle: bool,
    pub auto_advance_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            batch_size: batch::BATCH_SIZE,
            allow_recycle: true,
            auto_advance_ms: AUTO_ADVANCE_MS,
        }
    }
}

/// What the UI hands back for one answered question. Correctness arrives
/// pre-graded as a 0..=5 quality score; the quiz type and question kind are
/// taken from the question itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Answer {
    pub quality: u8,
    pub response_time_ms: Option<u32>,
}

/// One entry of the session's result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub word_id: WordId,
    pub correct: bool,
    pub confidence: Option<u8>,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEnd {
    /// The batch was answered to the end (non-endless).
    Completed,
    /// Endless mode ran out of eligible words.
    Exhausted,
    /// The user ended the session early.
    Aborted,
    /// Question generation failed and could not be recovered.
    QuestionServiceFailed,
}

/// Final accuracy report for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub answered: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub batches: u32,
    pub end: SessionEnd,
}

/// What `advance` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next question in the current batch.
    Next,
    /// Swapped in a fresh endless-mode batch.
    NewBatch,
    /// The session is over; see `summary`.
    Finished,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session")]
    NoSession,
    #[error("a session is already active")]
    SessionActive,
    #[error("operation not valid in the {0:?} phase")]
    WrongPhase(Phase),
    #[error("word pool is empty")]
    EmptyPool,
    #[error("no current card")]
    NoCurrentCard,
    #[error("current question was already answered")]
    AlreadyAnswered,
    #[error("word {0} is not in the pool")]
    UnknownWord(WordId),
    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Ephemeral per-session state. Never persisted; dropped on end.
struct Session {
    kind: SessionKind,
    phase: Phase,
    batch: Vec<WordId>,
    questions: Vec<QuizQuestion>,
    position: usize,
    // Guards against grading the same question twice before `advance`.
    answered: bool,
    study_position: usize,
    results: Vec<ReviewResult>,
    reviewed_ids: HashSet<WordId>,
    retry_queue: Vec<WordId>,
    batch_count: u32,
    // `Some` doubles as the single in-flight prefetch guard.
    prefetch: Option<Receiver<PrefetchMessage>>,
    buffer: Option<PreparedBatch>,
    pending_advance: Option<DateTime<Utc>>,
    summary: Option<SessionSummary>,
}

impl Session {
    fn new(kind: SessionKind, batch: Vec<WordId>) -> Self {
        let reviewed_ids = batch.iter().copied().collect();
        Session {
            kind,
            phase: Phase::Study,
            batch,
            questions: Vec::new(),
            position: 0,
            answered: false,
            study_position: 0,
            results: Vec::new(),
            reviewed_ids,
            retry_queue: Vec::new(),
            batch_count: 1,
            prefetch: None,
            buffer: None,
            pending_advance: None,
            summary: None,
        }
    }
}

/// Plain-data snapshot of everything the host app persists for this engine.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub words: Vec<WordRecord>,
    pub level: Difficulty,
    pub streak: StreakTracker,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// The review engine: owns the word pool, the learner's tier and streak, and
/// at most one active session. All scheduling mutation happens synchronously
/// inside its methods; the prefetch worker only ever reads a pool snapshot.
pub struct ReviewEngine<C: Clock> {
    pool: WordPool,
    level: Difficulty,
    streak: StreakTracker,
    clock: C,
    rng: StdRng,
    config: SessionConfig,
    questions: Arc<dyn QuestionSource>,
    rewards: Box<dyn RewardSink>,
    session: Option<Session>,
}

impl ReviewEngine<SystemClock> {
    pub fn new(questions: Arc<dyn QuestionSource>, rewards: Box<dyn RewardSink>) -> Self {
        Self::with_parts(
            SystemClock,
            StdRng::from_entropy(),
            SessionConfig::default(),
            questions,
            rewards,
        )
    }
}

impl<C: Clock> ReviewEngine<C> {
    pub fn with_parts(
        clock: C,
        rng: StdRng,
        config: SessionConfig,
        questions: Arc<dyn QuestionSource>,
        rewards: Box<dyn RewardSink>,
    ) -> Self {
        ReviewEngine {
            pool: WordPool::new(),
            level: Difficulty::Beginner,
            streak: StreakTracker::new(),
            clock,
            rng,
            config,
            questions,
            rewards,
            session: None,
        }
    }

    // ------------------------------------------------------------------
    // Pool and bookkeeping accessors
    // ------------------------------------------------------------------

    pub fn pool(&self) -> &WordPool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn level(&self) -> Difficulty {
        self.level
    }

    pub fn streak(&self) -> &StreakTracker {
        &self.streak
    }

    pub fn phase(&self) -> Phase {
        self.session.as_ref().map_or(Phase::Idle, |s| s.phase)
    }

    pub fn results(&self) -> &[ReviewResult] {
        match &self.session {
            Some(session) => &session.results,
            None => &[],
        }
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.session.as_ref().and_then(|s| s.summary.as_ref())
    }

    /// Ingests a content batch from the generation collaborator.
    pub fn ingest_words(&mut self, entries: Vec<WordContent>) -> Result<Vec<WordId>, IngestError> {
        let today = self.clock.today();
        ingest::ingest_batch(&mut self.pool, entries, today)
    }

    /// Explicit user deletion; the only way a word leaves the pool.
    pub fn remove_word(&mut self, id: WordId) -> Option<WordRecord> {
        self.pool.remove(id)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            words: self.pool.clone().into_records(),
            level: self.level,
            streak: self.streak.clone(),
        }
    }

    /// Replaces all persisted state from a snapshot. Any active session is
    /// discarded.
    pub fn restore(&mut self, snapshot: EngineSnapshot) {
        self.pool = WordPool::from_records(snapshot.words);
        self.level = snapshot.level;
        self.streak = snapshot.streak;
        self.session = None;
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Starts a session: builds the first batch and enters the study pass.
    pub fn start_session(&mut self, kind: SessionKind) -> Result<(), SessionError> {
        if matches!(self.phase(), Phase::Study | Phase::Quiz | Phase::Recall) {
            return Err(SessionError::SessionActive);
        }
        if self.pool.is_empty() {
            return Err(SessionError::EmptyPool);
        }
        let today = self.clock.today();
        let ids = batch::select(&self.pool, today, self.config.batch_size, &mut self.rng);
        if ids.is_empty() {
            return Err(SessionError::EmptyPool);
        }
        info!("starting {:?} session with a batch of {}", kind, ids.len());
        self.session = Some(Session::new(kind, ids));
        Ok(())
    }

    /// The card currently shown in the study pass.
    pub fn study_card(&self) -> Option<&WordRecord> {
        let session = self.session.as_ref()?;
        if session.phase != Phase::Study {
            return None;
        }
        session.batch.get(session.study_position).and_then(|id| self.pool.get(*id))
    }

    /// Stores the learner's self-reported confidence (1..=5) on the current
    /// study card. The quality adjuster reads it at answer time.
    pub fn set_confidence(&mut self, rating: u8) -> Result<(), SessionError> {
        let id = self.current_study_id()?;
        let record = self.pool.get_mut(id).ok_or(SessionError::UnknownWord(id))?;
        record.confidence_rating = Some(rating.clamp(1, 5));
        Ok(())
    }

    /// Stores a personal mnemonic on the current study card.
    pub fn set_mnemonic(&mut self, text: &str) -> Result<(), SessionError> {
        let id = self.current_study_id()?;
        let record = self.pool.get_mut(id).ok_or(SessionError::UnknownWord(id))?;
        record.content.mnemonic = Some(text.to_string());
        Ok(())
    }

    fn current_study_id(&self) -> Result<WordId, SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        if session.phase != Phase::Study {
            return Err(SessionError::WrongPhase(session.phase));
        }
        session
            .batch
            .get(session.study_position)
            .copied()
            .ok_or(SessionError::NoCurrentCard)
    }

    /// Moves to the next study card; returns false once the pass is over.
    pub fn advance_study(&mut self) -> Result<bool, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.phase != Phase::Study {
            return Err(SessionError::WrongPhase(session.phase));
        }
        session.study_position += 1;
        Ok(session.study_position < session.batch.len())
    }

    /// Skips the rest of the study pass; the host follows up with
    /// `begin_questions`.
    pub fn skip_study(&mut self) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.phase != Phase::Study {
            return Err(SessionError::WrongPhase(session.phase));
        }
        session.study_position = session.batch.len();
        Ok(())
    }

    /// Leaves the study pass: asks the question service for this batch's
    /// questions and enters Quiz/Recall. On failure the session stays in
    /// Study so the host can show a loading state and retry.
    pub fn begin_questions(&mut self) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.phase != Phase::Study {
            return Err(SessionError::WrongPhase(session.phase));
        }

        let records: Vec<WordRecord> = session
            .batch
            .iter()
            .filter_map(|id| self.pool.get(*id).cloned())
            .collect();
        match self.questions.generate(&records, &self.pool.word_list()) {
            Ok(questions) if !questions.is_empty() => {
                session.questions = questions;
                session.position = 0;
                session.answered = false;
                session.phase = match session.kind {
                    SessionKind::Recall => Phase::Recall,
                    SessionKind::Quiz | SessionKind::Endless => Phase::Quiz,
                };
                debug!("entered {:?} with {} questions", session.phase, session.questions.len());
                Ok(())
            }
            Ok(_) => {
                warn!("question service returned an empty set; staying in study");
                Err(QuestionError::EmptyResponse.into())
            }
            Err(e) => {
                warn!("question generation failed: {e}; staying in study");
                Err(e.into())
            }
        }
    }

    /// The question awaiting an answer.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        let session = self.session.as_ref()?;
        if !matches!(session.phase, Phase::Quiz | Phase::Recall) {
            return None;
        }
        session.questions.get(session.position)
    }

    /// Grades one answer: quality adjustment, SM-2 update, reward emission,
    /// and (for correct options questions) arming the auto-advance timer.
    pub fn submit_answer(&mut self, answer: Answer) -> Result<ReviewOutcome, SessionError> {
        let today = self.clock.today();
        let now = self.clock.now();
        let auto_advance_ms = self.config.auto_advance_ms;

        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if !matches!(session.phase, Phase::Quiz | Phase::Recall) {
            return Err(SessionError::WrongPhase(session.phase));
        }
        if session.answered {
            return Err(SessionError::AlreadyAnswered);
        }
        let question = session
            .questions
            .get(session.position)
            .ok_or(SessionError::NoCurrentCard)?;
        let word_id = question.word_id;
        let question_kind = question.kind;
        let quiz_type = question.quiz_type.clone();

        let record = self.pool.get_mut(word_id).ok_or(SessionError::UnknownWord(word_id))?;
        let input = ReviewInput {
            quality: answer.quality,
            response_time_ms: answer.response_time_ms,
            quiz_type: Some(quiz_type),
        };
        let outcome = scheduler::review(record, &input, today);
        let confidence = record.confidence_rating;
        session.answered = true;

        if let Some(tier) = outcome.reward {
            self.rewards.reward(RewardEvent::Review { word_id, tier });
        }
        if outcome.mastered_now {
            self.rewards.reward(RewardEvent::MasteryBonus { word_id });
        }

        session.results.push(ReviewResult { word_id, correct: outcome.correct, confidence });
        if session.kind == SessionKind::Endless
            && !outcome.correct
            && !session.retry_queue.contains(&word_id)
        {
            session.retry_queue.push(word_id);
        }

        // Correct options answers advance on their own after a short delay;
        // misses always wait for an explicit continue so the user sees the
        // correction.
        session.pending_advance = if outcome.correct && question_kind == QuizKind::Options {
            Some(now + Duration::milliseconds(auto_advance_ms))
        } else {
            None
        };

        let want_prefetch = session.kind == SessionKind::Endless
            && session.position + 2 == session.questions.len();
        if want_prefetch {
            self.spawn_prefetch_if_idle();
        }
        Ok(outcome)
    }

    /// Manual continue. Always cancels a pending auto-advance, then either
    /// steps to the next question, swaps in the next endless batch, or
    /// finishes the session.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if !matches!(session.phase, Phase::Quiz | Phase::Recall) {
            return Err(SessionError::WrongPhase(session.phase));
        }
        session.pending_advance = None;
        session.position += 1;
        session.answered = false;
        if session.position < session.questions.len() {
            return Ok(Advance::Next);
        }
        self.finish_batch()
    }

    /// Drives the auto-advance timer. Hosts call this from their event loop;
    /// a cancelled or already-consumed timer is a guaranteed no-op.
    pub fn tick(&mut self) -> Option<Advance> {
        self.poll_prefetch();
        let now = self.clock.now();
        let fire = {
            let session = self.session.as_mut()?;
            match session.pending_advance {
                Some(deadline) if now >= deadline => {
                    session.pending_advance = None;
                    true
                }
                _ => false,
            }
        };
        if fire {
            self.advance().ok()
        } else {
            None
        }
    }

    /// User-initiated end. Discards any in-flight or buffered prefetch
    /// without applying it; committed reviews are never rolled back.
    pub fn end_session(&mut self) -> Option<SessionSummary> {
        let phase = self.phase();
        match phase {
            Phase::Idle => None,
            Phase::Done => self.session.take().and_then(|s| s.summary),
            _ => {
                self.complete_session(SessionEnd::Aborted);
                self.session.take().and_then(|s| s.summary)
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// End of the current batch: finish the session, or (endless) run level
    /// adaptation and swap in the next prepared batch.
    fn finish_batch(&mut self) -> Result<Advance, SessionError> {
        let kind = match &self.session {
            Some(s) => s.kind,
            None => return Err(SessionError::NoSession),
        };
        if kind != SessionKind::Endless {
            self.complete_session(SessionEnd::Completed);
            return Ok(Advance::Finished);
        }

        // Endless batch boundary: adaptation runs here, once per batch.
        self.apply_level_adaptation();

        let prepared = match self.next_endless_batch() {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("could not prepare next batch: {e}; ending session");
                self.complete_session(SessionEnd::QuestionServiceFailed);
                return Ok(Advance::Finished);
            }
        };
        if prepared.ids.is_empty() {
            info!("no eligible words left; ending endless session");
            self.complete_session(SessionEnd::Exhausted);
            return Ok(Advance::Finished);
        }
        self.activate_batch(prepared);
        Ok(Advance::NewBatch)
    }

    /// Produces the next endless batch: buffered prefetch if ready, else
    /// wait out an in-flight one, else a synchronous build (loading state).
    fn next_endless_batch(&mut self) -> Result<PreparedBatch, QuestionError> {
        self.poll_prefetch();
        let (buffered, in_flight) = match self.session.as_mut() {
            Some(session) => (session.buffer.take(), session.prefetch.take()),
            None => (None, None),
        };
        if let Some(prepared) = buffered {
            debug!("prefetched batch ready; swapping with zero latency");
            return Ok(prepared);
        }
        if let Some(rx) = in_flight {
            match rx.recv() {
                Ok(PrefetchMessage::Complete(Ok(prepared))) => return Ok(prepared),
                Ok(PrefetchMessage::Complete(Err(e))) => {
                    warn!("prefetch failed: {e}; falling back to synchronous fetch");
                }
                Err(_) => warn!("prefetch worker vanished; falling back to synchronous fetch"),
            }
        }
        self.prepare_sync()
    }

    fn prepare_sync(&mut self) -> Result<PreparedBatch, QuestionError> {
        let today = self.clock.today();
        let (reviewed, retries) = match self.session.as_ref() {
            Some(session) => (session.reviewed_ids.clone(), session.retry_queue.clone()),
            None => (HashSet::new(), Vec::new()),
        };
        prefetch::prepare_batch(
            &self.pool,
            today,
            self.config.batch_size,
            &reviewed,
            &retries,
            self.config.allow_recycle,
            self.questions.as_ref(),
            &mut self.rng,
        )
    }

    fn activate_batch(&mut self, prepared: PreparedBatch) {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return,
        };
        if prepared.recycled {
            info!("recycling pool: exclusion set cleared");
            session.reviewed_ids.clear();
        }
        session.retry_queue.retain(|id| !prepared.ids.contains(id));
        session.reviewed_ids.extend(prepared.ids.iter().copied());
        session.batch = prepared.ids;
        session.questions = prepared.questions;
        session.position = 0;
        session.answered = false;
        session.batch_count += 1;
        session.pending_advance = None;
    }

    fn spawn_prefetch_if_idle(&mut self) {
        let today = self.clock.today();
        let seed = self.rng.gen::<u64>();
        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return,
        };
        if session.prefetch.is_some() || session.buffer.is_some() {
            return;
        }
        debug!("spawning prefetch for the next batch");
        session.prefetch = Some(prefetch::spawn_prefetch(
            self.pool.clone(),
            today,
            self.config.batch_size,
            session.reviewed_ids.clone(),
            session.retry_queue.clone(),
            self.config.allow_recycle,
            Arc::clone(&self.questions),
            seed,
        ));
    }

    /// Moves a completed prefetch into the buffer without blocking.
    fn poll_prefetch(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Some(rx) = &session.prefetch {
                match rx.try_recv() {
                    Ok(PrefetchMessage::Complete(Ok(prepared))) => {
                        session.buffer = Some(prepared);
                        session.prefetch = None;
                    }
                    Ok(PrefetchMessage::Complete(Err(e))) => {
                        warn!("prefetch failed: {e}");
                        session.prefetch = None;
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        session.prefetch = None;
                    }
                }
            }
        }
    }

    fn apply_level_adaptation(&mut self) {
        if let Some(change) = adapt::evaluate(&self.pool, self.level) {
            info!("level adaptation: {:?}", change);
            self.level = change.new_level();
        }
    }

    fn complete_session(&mut self, end: SessionEnd) {
        let today = self.clock.today();
        let (kind, answered) = {
            let session = match self.session.as_mut() {
                Some(s) => s,
                None => return,
            };
            let answered = session.results.len();
            let correct = session.results.iter().filter(|r| r.correct).count();
            let accuracy = if answered > 0 { correct as f64 / answered as f64 } else { 0.0 };
            session.pending_advance = None;
            // Dropping the receiver orphans any in-flight prefetch; its
            // result can never be applied to a later session.
            session.prefetch = None;
            session.buffer = None;
            session.phase = Phase::Done;
            session.summary = Some(SessionSummary {
                answered,
                correct,
                accuracy,
                batches: session.batch_count,
                end,
            });
            info!(
                "session done ({:?}): {}/{} correct over {} batch(es)",
                end, correct, answered, session.batch_count
            );
            (session.kind, answered)
        };
        if answered > 0 {
            self.streak.record_review(today);
        }
        if end == SessionEnd::Completed && kind != SessionKind::Endless {
            self.apply_level_adaptation();
        }
    }
}
