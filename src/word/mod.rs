// src/word/mod.rs
// The word pool: vocabulary records and the scheduling state attached to them.

pub mod ingest;

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier for a word record. Assigned by the pool at ingestion time.
pub type WordId = i64;

/// Author-assigned content difficulty, also used as the learner's global tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    /// The next tier up, or `None` at the top.
    pub fn promoted(self) -> Option<Self> {
        match self {
            Difficulty::Beginner => Some(Difficulty::Intermediate),
            Difficulty::Intermediate => Some(Difficulty::Advanced),
            Difficulty::Advanced => Some(Difficulty::Expert),
            Difficulty::Expert => None,
        }
    }

    /// The next tier down, or `None` at the bottom.
    pub fn demoted(self) -> Option<Self> {
        match self {
            Difficulty::Beginner => None,
            Difficulty::Intermediate => Some(Difficulty::Beginner),
            Difficulty::Advanced => Some(Difficulty::Intermediate),
            Difficulty::Expert => Some(Difficulty::Advanced),
        }
    }
}

/// Where a word sits in the learning lifecycle.
///
/// Never stored independently of the scheduling fields: it is recomputed
/// from `(repetitions, interval)` on every review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    New,
    Learning,
    Reviewing,
    Mastered,
}

/// The content half of a word record. Opaque to the scheduler; produced by
/// the content-generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordContent {
    pub word: String,
    pub definition: String,
    pub part_of_speech: String,
    pub examples: Vec<String>,
    pub mnemonic: Option<String>,
    pub pronunciation: Option<String>,
    pub category: String,
    pub etymology: Option<String>,
    pub related_words: Vec<String>,
    pub antonym: Option<String>,
    pub difficulty: Difficulty,
}

/// One vocabulary item: content plus the scheduling fields owned by the
/// review engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordRecord {
    pub id: WordId,
    pub content: WordContent,

    // Scheduling state. Mutated only by a review event.
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub status: WordStatus,
    pub next_review_date: NaiveDate,
    pub last_reviewed: Option<NaiveDate>,
    pub total_reviews: u32,
    pub correct_reviews: u32,

    // Review metadata feeding the quality adjuster and question generator.
    pub confidence_rating: Option<u8>,
    pub last_confidence_correct: bool,
    pub avg_response_time_ms: Option<f64>,
    pub failed_quiz_types: BTreeSet<String>,
    pub consecutive_failures: u32,

    // Set the first time the word reaches Mastered, so the one-time mastery
    // bonus is never paid twice.
    pub mastery_rewarded: bool,
}

impl WordRecord {
    /// A fresh record as created at ingestion: due today, nothing reviewed.
    pub fn new(id: WordId, content: WordContent, today: NaiveDate) -> Self {
        WordRecord {
            id,
            content,
            ease_factor: crate::scheduler::DEFAULT_EASE,
            interval: 0,
            repetitions: 0,
            status: WordStatus::New,
            next_review_date: today,
            last_reviewed: None,
            total_reviews: 0,
            correct_reviews: 0,
            confidence_rating: None,
            last_confidence_correct: false,
            avg_response_time_ms: None,
            failed_quiz_types: BTreeSet::new(),
            consecutive_failures: 0,
            mastery_rewarded: false,
        }
    }

    /// True when the word is due for review on `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }
}

/// Aggregate pool statistics, exposed read-only to the achievement and
/// analytics collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub reviewing: usize,
    pub mastered: usize,
    pub total_reviews: u32,
}

/// The full collection of word records, keyed by id for quick lookup.
/// Cloning snapshots the pool; the prefetch worker reads such a snapshot
/// while the live pool keeps taking reviews.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WordPool {
    words: HashMap<WordId, WordRecord>,
    next_id: WordId,
}

impl WordPool {
    pub fn new() -> Self {
        WordPool { words: HashMap::new(), next_id: 1 }
    }

    /// Rebuilds a pool from persisted records, e.g. an application snapshot.
    pub fn from_records(records: Vec<WordRecord>) -> Self {
        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let words = records.into_iter().map(|r| (r.id, r)).collect();
        WordPool { words, next_id }
    }

    pub(crate) fn allocate_id(&mut self) -> WordId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, record: WordRecord) {
        self.words.insert(record.id, record);
    }

    pub fn get(&self, id: WordId) -> Option<&WordRecord> {
        self.words.get(&id)
    }

    pub fn get_mut(&mut self, id: WordId) -> Option<&mut WordRecord> {
        self.words.get_mut(&id)
    }

    /// Removes a word. Deletion is always an explicit user action, never
    /// time-driven.
    pub fn remove(&mut self, id: WordId) -> Option<WordRecord> {
        self.words.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &WordRecord> {
        self.words.values()
    }

    /// All ids in ascending order. Sampling code sorts first so that a
    /// seeded RNG reproduces the same batches run after run.
    pub fn sorted_ids(&self) -> Vec<WordId> {
        let mut ids: Vec<WordId> = self.words.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every word string in the pool, for distractor generation.
    pub fn word_list(&self) -> Vec<String> {
        let mut ids = self.sorted_ids();
        ids.drain(..)
            .filter_map(|id| self.words.get(&id).map(|r| r.content.word.clone()))
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            total: self.words.len(),
            new: 0,
            learning: 0,
            reviewing: 0,
            mastered: 0,
            total_reviews: 0,
        };
        for record in self.words.values() {
            match record.status {
                WordStatus::New => stats.new += 1,
                WordStatus::Learning => stats.learning += 1,
                WordStatus::Reviewing => stats.reviewing += 1,
                WordStatus::Mastered => stats.mastered += 1,
            }
            stats.total_reviews += record.total_reviews;
        }
        stats
    }

    pub fn into_records(self) -> Vec<WordRecord> {
        let mut records: Vec<WordRecord> = self.words.into_values().collect();
        records.sort_unstable_by_key(|r| r.id);
        records
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn content(word: &str) -> WordContent {
        WordContent {
            word: word.to_string(),
            definition: format!("definition of {}", word),
            part_of_speech: "noun".to_string(),
            examples: vec![format!("An example with {}.", word)],
            mnemonic: None,
            pronunciation: None,
            category: "general".to_string(),
            etymology: None,
            related_words: Vec::new(),
            antonym: None,
            difficulty: Difficulty::Beginner,
        }
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{content, date};
    use super::*;

    #[test]
    fn fresh_record_is_due_today() {
        let today = date(2026, 3, 1);
        let record = WordRecord::new(1, content("ephemeral"), today);
        assert_eq!(record.status, WordStatus::New);
        assert_eq!(record.interval, 0);
        assert_eq!(record.repetitions, 0);
        assert!(record.is_due(today));
        assert!(record.last_reviewed.is_none());
    }

    #[test]
    fn stats_count_by_status() {
        let today = date(2026, 3, 1);
        let mut pool = WordPool::new();
        for i in 0..4 {
            let id = pool.allocate_id();
            let mut record = WordRecord::new(id, content(&format!("w{}", i)), today);
            if i == 0 {
                record.status = WordStatus::Mastered;
            }
            record.total_reviews = i;
            pool.insert(record);
        }
        let stats = pool.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.mastered, 1);
        assert_eq!(stats.new, 3);
        assert_eq!(stats.total_reviews, 6);
    }

    #[test]
    fn from_records_continues_id_sequence() {
        let today = date(2026, 3, 1);
        let records = vec![
            WordRecord::new(3, content("a"), today),
            WordRecord::new(7, content("b"), today),
        ];
        let mut pool = WordPool::from_records(records);
        assert_eq!(pool.allocate_id(), 8);
    }

    #[test]
    fn difficulty_ladder_is_single_step() {
        assert_eq!(Difficulty::Beginner.promoted(), Some(Difficulty::Intermediate));
        assert_eq!(Difficulty::Expert.promoted(), None);
        assert_eq!(Difficulty::Beginner.demoted(), None);
        assert_eq!(Difficulty::Expert.demoted(), Some(Difficulty::Advanced));
    }
}
