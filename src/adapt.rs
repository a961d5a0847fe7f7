// src/adapt.rs
// Level adaptation: nudges the learner's global difficulty tier up or down
// based on rolling accuracy over the most recently reviewed words.

use log::debug;

use crate::word::{Difficulty, WordPool, WordStatus};

/// Pools smaller than this never trigger adaptation.
pub const MIN_WORDS: usize = 20;
/// How many recently-reviewed words the rolling sample holds.
pub const SAMPLE_SIZE: usize = 25;
/// Minimum reviewed words required for a meaningful sample.
pub const MIN_REVIEWED_IN_SAMPLE: usize = 10;
/// Rolling accuracy above this may promote.
pub const UP_THRESHOLD: f64 = 0.85;
/// Rolling accuracy below this demotes.
pub const DOWN_THRESHOLD: f64 = 0.60;
/// Mastered words required at the current tier before promotion.
pub const MASTERED_MIN: usize = 5;

/// Outcome of one adaptation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Promoted(Difficulty),
    Demoted(Difficulty),
}

impl LevelChange {
    pub fn new_level(self) -> Difficulty {
        match self {
            LevelChange::Promoted(level) | LevelChange::Demoted(level) => level,
        }
    }
}

/// Evaluates the learner's tier. Deterministic; moves at most one step;
/// no-ops whenever the data is too thin to judge.
pub fn evaluate(pool: &WordPool, current: Difficulty) -> Option<LevelChange> {
    if pool.len() < MIN_WORDS {
        return None;
    }

    // Most recently reviewed first; id breaks ties so the sample is stable.
    let mut reviewed: Vec<_> = pool
        .records()
        .filter(|r| r.total_reviews > 0 && r.last_reviewed.is_some())
        .collect();
    reviewed.sort_unstable_by(|a, b| {
        b.last_reviewed.cmp(&a.last_reviewed).then(b.id.cmp(&a.id))
    });
    reviewed.truncate(SAMPLE_SIZE);

    if reviewed.len() < MIN_REVIEWED_IN_SAMPLE {
        return None;
    }

    let total: u32 = reviewed.iter().map(|r| r.total_reviews).sum();
    let correct: u32 = reviewed.iter().map(|r| r.correct_reviews).sum();
    if total == 0 {
        return None;
    }
    let accuracy = correct as f64 / total as f64;
    debug!("level adaptation: accuracy {:.3} over {} words", accuracy, reviewed.len());

    if accuracy > UP_THRESHOLD {
        let mastered_at_tier = pool
            .records()
            .filter(|r| r.content.difficulty == current && r.status == WordStatus::Mastered)
            .count();
        if mastered_at_tier >= MASTERED_MIN {
            return current.promoted().map(LevelChange::Promoted);
        }
    } else if accuracy < DOWN_THRESHOLD {
        return current.demoted().map(LevelChange::Demoted);
    }
    None
}
