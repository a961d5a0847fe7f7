// src/lib.rs
//! lexideck: a spaced-repetition review engine for vocabulary learning.
//!
//! The engine owns a pool of word records and drives review sessions over
//! them: an SM-2 scheduler with confidence- and latency-aware quality
//! adjustment, batch selection that interleaves solid material among due
//! words, an endless mode with background batch prefetch, level adaptation,
//! and a daily streak. Question generation, persistence, and the reward
//! economy are host concerns behind small traits.

pub mod adapt;
pub mod batch;
pub mod questions;
pub mod rewards;
pub mod scheduler;
pub mod session;
pub mod streak;
pub mod word;

pub use questions::{QuestionError, QuestionSource, QuizKind, QuizQuestion};
pub use rewards::{DiscardRewards, RewardEvent, RewardSink, RewardTier};
pub use session::{
    Advance, Answer, EngineSnapshot, Phase, ReviewEngine, SessionConfig, SessionKind,
    SessionSummary,
};
pub use word::{Difficulty, WordContent, WordId, WordRecord, WordStatus};
