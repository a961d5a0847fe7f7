// src/scheduler.rs
// Contains the logic for the spaced repetition system: the quality adjuster
// and the SM-2 update applied to a word record after every answer.

use chrono::{Duration, NaiveDate};

use crate::rewards::RewardTier;
use crate::word::{WordRecord, WordStatus};

/// Ease factor assigned to every freshly ingested word.
pub const DEFAULT_EASE: f64 = 2.5;
/// Lower clamp for the ease factor.
pub const MIN_EASE: f64 = 1.3;
/// Upper clamp for the ease factor.
pub const MAX_EASE: f64 = 3.0;
/// Intervals never grow past this, no matter the ease factor.
pub const MAX_INTERVAL: u32 = 365;
/// Consecutive correct reviews required to leave the learning stage.
pub const REVIEWING_THRESHOLD: u32 = 2;
/// Interval (days) at which a reviewing word counts as mastered.
pub const MASTERY_INTERVAL: u32 = 21;

/// Answers faster than this earn a quality bump.
pub const FAST_ANSWER_MS: u32 = 3_000;
/// Correct answers slower than this lose a point (but stay correct).
pub const SLOW_ANSWER_MS: u32 = 15_000;

// Response-time EMA weights: prev * 0.7 + new * 0.3.
const RESPONSE_EMA_PREV: f64 = 0.7;
const RESPONSE_EMA_NEW: f64 = 0.3;

/// Everything the session hands the scheduler for one answer.
/// `quality` is the raw graded recall signal, 0..=5 (>= 3 is correct).
/// The self-reported confidence is read from the record itself, where the
/// study pass stored it.
#[derive(Debug, Clone, Default)]
pub struct ReviewInput {
    pub quality: u8,
    pub response_time_ms: Option<u32>,
    pub quiz_type: Option<String>,
}

/// What one review did to a record, for the session and the reward economy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub correct: bool,
    pub adjusted_quality: u8,
    pub status: WordStatus,
    pub reward: Option<RewardTier>,
    /// Set only on the word's first arrival at `Mastered`.
    pub mastered_now: bool,
}

/// Folds self-reported confidence and answer latency into the raw quality
/// score. Pure; rules apply in order and each is skipped when its input is
/// absent.
pub fn adjust_quality(quality: u8, confidence: Option<u8>, response_time_ms: Option<u32>) -> u8 {
    let quality = quality.min(5);
    let correct = quality >= 3;
    let mut adjusted = quality;

    if let Some(confidence) = confidence {
        let confidence = confidence.clamp(1, 5);
        // Right but doubtful: a guess is not rewarded as confident recall.
        if correct && confidence <= 2 {
            adjusted = adjusted.min(3);
        }
        // Sure and wrong: overconfidence bites harder than an honest miss.
        if !correct && confidence >= 4 {
            adjusted = 0;
        }
    }

    if let Some(ms) = response_time_ms {
        if correct && ms < FAST_ANSWER_MS {
            adjusted = (adjusted + 1).min(5);
        }
        if correct && ms > SLOW_ANSWER_MS {
            adjusted = adjusted.saturating_sub(1).max(3);
        }
    }

    adjusted
}

/// Status is a pure function of `(repetitions, interval)`. A record pulled
/// from storage must reproduce its stored status through this function.
pub fn derive_status(repetitions: u32, interval: u32) -> WordStatus {
    if repetitions == 0 && interval == 0 {
        WordStatus::New
    } else if repetitions < REVIEWING_THRESHOLD {
        WordStatus::Learning
    } else if interval < MASTERY_INTERVAL {
        WordStatus::Reviewing
    } else {
        WordStatus::Mastered
    }
}

/// Applies one review to a record: SM-2 interval/ease update, status
/// derivation, and all the bookkeeping counters. Never fails; out-of-range
/// inputs are clamped.
pub fn review(record: &mut WordRecord, input: &ReviewInput, today: NaiveDate) -> ReviewOutcome {
    let raw_quality = input.quality.min(5);
    let correct = raw_quality >= 3;
    let adjusted = adjust_quality(raw_quality, record.confidence_rating, input.response_time_ms);

    if adjusted >= 3 {
        // Fixed rungs for the first two successes, ease growth after that. A
        // word that already carries a multi-day interval keeps growing by
        // ease even at low repetition counts.
        record.interval = match (record.repetitions, record.interval) {
            (0, _) => 1,
            (1, 0..=1) => 3,
            _ => {
                let grown = (record.interval as f64 * record.ease_factor).round() as u32;
                grown.min(MAX_INTERVAL)
            }
        };
        record.repetitions += 1;
    } else {
        record.repetitions = record.repetitions.saturating_sub(1);
        record.interval = if record.repetitions == 0 { 0 } else { 1 };
    }

    // Ease update always runs, from the adjusted quality.
    let miss = (5 - adjusted) as f64;
    record.ease_factor =
        (record.ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).clamp(MIN_EASE, MAX_EASE);

    let previous_status = record.status;
    record.status = derive_status(record.repetitions, record.interval);
    record.next_review_date = today + Duration::days(record.interval.max(1) as i64);

    // Counters track ground truth, so they use the raw correctness signal.
    record.total_reviews += 1;
    if correct {
        record.correct_reviews += 1;
    }
    record.last_reviewed = Some(today);

    if let Some(ms) = input.response_time_ms {
        record.avg_response_time_ms = Some(match record.avg_response_time_ms {
            Some(prev) => prev * RESPONSE_EMA_PREV + ms as f64 * RESPONSE_EMA_NEW,
            None => ms as f64,
        });
    }

    if correct {
        if let Some(quiz_type) = &input.quiz_type {
            record.failed_quiz_types.remove(quiz_type);
        }
        record.consecutive_failures = 0;
    } else {
        if let Some(quiz_type) = &input.quiz_type {
            record.failed_quiz_types.insert(quiz_type.clone());
        }
        record.consecutive_failures += 1;
    }

    if record.confidence_rating.is_some() {
        record.last_confidence_correct = correct;
    }

    let mastered_now = record.status == WordStatus::Mastered
        && previous_status != WordStatus::Mastered
        && !record.mastery_rewarded;
    if mastered_now {
        record.mastery_rewarded = true;
    }

    ReviewOutcome {
        correct,
        adjusted_quality: adjusted,
        status: record.status,
        reward: RewardTier::for_quality(adjusted),
        mastered_now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::test_support::{content, date};

    fn fresh(today: NaiveDate) -> WordRecord {
        WordRecord::new(1, content("serendipity"), today)
    }

    fn input(quality: u8) -> ReviewInput {
        ReviewInput { quality, ..Default::default() }
    }

    #[test]
    fn first_correct_review_schedules_tomorrow() {
        // Brand new word, perfect recall.
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        let outcome = review(&mut record, &input(5), today);

        assert_eq!(record.repetitions, 1);
        assert_eq!(record.interval, 1);
        assert_eq!(record.status, WordStatus::Learning);
        assert_eq!(record.next_review_date, today + Duration::days(1));
        assert!(outcome.correct);
        assert!((record.ease_factor - 2.6).abs() < 1e-9);
    }

    #[test]
    fn second_correct_review_takes_the_three_day_rung() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.repetitions = 1;
        record.interval = 1;
        record.status = WordStatus::Learning;

        review(&mut record, &input(5), today);
        assert_eq!(record.repetitions, 2);
        assert_eq!(record.interval, 3);
        assert!(record.ease_factor > 2.5);
        assert_eq!(record.status, WordStatus::Reviewing);
    }

    #[test]
    fn carried_interval_grows_by_ease() {
        // Repetitions=1 but a 3-day interval already on the record grows
        // to round(3 * 2.5) = 8 instead of taking the fixed rung.
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.repetitions = 1;
        record.interval = 3;
        record.status = WordStatus::Learning;

        review(&mut record, &input(5), today);
        assert_eq!(record.repetitions, 2);
        assert_eq!(record.interval, 8);
        assert!(record.ease_factor > 2.5);
        assert_eq!(record.status, WordStatus::Reviewing);
    }

    #[test]
    fn third_correct_review_multiplies_interval() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.repetitions = 2;
        record.interval = 3;
        record.status = WordStatus::Reviewing;

        review(&mut record, &input(5), today);
        assert_eq!(record.repetitions, 3);
        assert_eq!(record.interval, 8); // round(3 * 2.5)
        assert_eq!(record.status, WordStatus::Reviewing);
        assert_eq!(record.next_review_date, today + Duration::days(8));
    }

    #[test]
    fn lapse_decrements_and_resets_interval() {
        // A mastered-track word misses.
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.repetitions = 4;
        record.interval = 30;
        record.status = WordStatus::Mastered;

        review(&mut record, &input(1), today);
        assert_eq!(record.repetitions, 3);
        assert_eq!(record.interval, 1);
        assert_eq!(record.status, WordStatus::Reviewing);
        assert!(record.ease_factor < 2.5);

        // A fully lapsed word bottoms out at zero, never below.
        record.repetitions = 1;
        review(&mut record, &input(0), today);
        assert_eq!(record.repetitions, 0);
        assert_eq!(record.interval, 0);
        assert_eq!(record.status, WordStatus::New);
    }

    #[test]
    fn guessed_correct_is_capped() {
        // Correct with confidence 1 caps the quality at 3.
        assert_eq!(adjust_quality(4, Some(1), None), 3);
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.confidence_rating = Some(1);
        let outcome = review(&mut record, &input(4), today);
        assert_eq!(outcome.adjusted_quality, 3);
        assert!(outcome.correct);
    }

    #[test]
    fn overconfident_miss_is_floored() {
        // Incorrect with confidence 5 drops to quality 0.
        assert_eq!(adjust_quality(1, Some(5), None), 0);
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.confidence_rating = Some(5);
        let outcome = review(&mut record, &input(1), today);
        assert_eq!(outcome.adjusted_quality, 0);
        // Steepest ease reduction: 2.5 - 0.8.
        assert!((record.ease_factor - 1.7).abs() < 1e-9);
        assert!(!record.last_confidence_correct);
    }

    #[test]
    fn latency_bumps_and_dings() {
        assert_eq!(adjust_quality(4, None, Some(1_000)), 5);
        assert_eq!(adjust_quality(5, None, Some(20_000)), 4);
        // A slow correct answer never drops below "correct".
        assert_eq!(adjust_quality(3, None, Some(20_000)), 3);
        // Latency rules ignore incorrect answers.
        assert_eq!(adjust_quality(1, None, Some(1_000)), 1);
        // Missing optionals skip their rules.
        assert_eq!(adjust_quality(4, None, None), 4);
    }

    #[test]
    fn ease_stays_clamped_under_repeated_reviews() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        for _ in 0..20 {
            review(&mut record, &input(0), today);
            assert!(record.ease_factor >= MIN_EASE);
        }
        assert!((record.ease_factor - MIN_EASE).abs() < 1e-9);

        for _ in 0..20 {
            review(&mut record, &input(5), today);
            assert!(record.ease_factor <= MAX_EASE);
        }
        assert!((record.ease_factor - MAX_EASE).abs() < 1e-9);
    }

    #[test]
    fn interval_is_capped() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.repetitions = 10;
        record.interval = 300;
        record.ease_factor = 2.5;
        review(&mut record, &input(5), today);
        assert_eq!(record.interval, MAX_INTERVAL);
    }

    #[test]
    fn scheduler_is_deterministic() {
        let today = date(2026, 3, 1);
        let make = || {
            let mut r = fresh(today);
            r.repetitions = 2;
            r.interval = 8;
            r.confidence_rating = Some(3);
            r
        };
        let review_input = ReviewInput {
            quality: 4,
            response_time_ms: Some(4_200),
            quiz_type: Some("definition".into()),
        };
        let mut a = make();
        let mut b = make();
        let out_a = review(&mut a, &review_input, today);
        let out_b = review(&mut b, &review_input, today);
        assert_eq!(out_a, out_b);
        assert_eq!(a.interval, b.interval);
        assert_eq!(a.ease_factor, b.ease_factor);
        assert_eq!(a.next_review_date, b.next_review_date);
    }

    #[test]
    fn status_matches_derivation_after_any_sequence() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        for quality in [5, 5, 1, 4, 0, 3, 5, 5, 2, 5] {
            review(&mut record, &input(quality), today);
            assert_eq!(record.status, derive_status(record.repetitions, record.interval));
        }
    }

    #[test]
    fn counters_use_raw_correctness() {
        // The adjusted quality drives scheduling, but the accuracy counters
        // reflect ground truth.
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.confidence_rating = Some(1);
        let outcome = review(&mut record, &input(3), today);
        assert_eq!(outcome.adjusted_quality, 3);
        assert_eq!(record.correct_reviews, 1);
        assert_eq!(record.total_reviews, 1);
    }

    #[test]
    fn failed_quiz_types_tracked_and_cleared() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        let miss = ReviewInput {
            quality: 1,
            quiz_type: Some("synonym".into()),
            ..Default::default()
        };
        review(&mut record, &miss, today);
        assert!(record.failed_quiz_types.contains("synonym"));
        assert_eq!(record.consecutive_failures, 1);

        let hit = ReviewInput {
            quality: 4,
            quiz_type: Some("synonym".into()),
            ..Default::default()
        };
        review(&mut record, &hit, today);
        assert!(!record.failed_quiz_types.contains("synonym"));
        assert_eq!(record.consecutive_failures, 0);
    }

    #[test]
    fn response_time_moving_average() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        let first = ReviewInput { quality: 4, response_time_ms: Some(1_000), ..Default::default() };
        review(&mut record, &first, today);
        assert_eq!(record.avg_response_time_ms, Some(1_000.0));

        let second = ReviewInput { quality: 4, response_time_ms: Some(2_000), ..Default::default() };
        review(&mut record, &second, today);
        assert!((record.avg_response_time_ms.unwrap() - 1_300.0).abs() < 1e-9);
    }

    #[test]
    fn mastery_bonus_fires_exactly_once() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        record.repetitions = 2;
        record.interval = 20;
        record.status = WordStatus::Reviewing;

        let outcome = review(&mut record, &input(5), today);
        assert_eq!(record.status, WordStatus::Mastered);
        assert!(outcome.mastered_now);

        // Lapse away and climb back: no second bonus.
        review(&mut record, &input(0), today);
        record.repetitions = 2;
        record.interval = 30;
        record.status = WordStatus::Reviewing;
        let outcome = review(&mut record, &input(5), today);
        assert_eq!(record.status, WordStatus::Mastered);
        assert!(!outcome.mastered_now);
    }

    #[test]
    fn out_of_range_quality_is_clamped() {
        let today = date(2026, 3, 1);
        let mut record = fresh(today);
        let outcome = review(&mut record, &input(99), today);
        assert_eq!(outcome.adjusted_quality, 5);
        assert!(outcome.correct);
    }
}
