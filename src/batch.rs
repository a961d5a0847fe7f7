// src/batch.rs
// Assembles ordered review batches: due words first, deliberately
// interleaved with already-solid material, plus the endless-mode variant
// with session exclusion and recycling.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::word::{WordId, WordPool, WordStatus};

/// Default batch size.
pub const BATCH_SIZE: usize = 10;
/// Share of a batch reserved for due words when any are due.
const DUE_SHARE: f64 = 0.7;

/// A batch built by the endless-mode selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndlessBatch {
    pub ids: Vec<WordId>,
    /// True when the selector ran out of eligible words and resampled the
    /// whole pool. The caller must clear its exclusion set in response.
    pub recycled: bool,
}

fn due_share(n: usize) -> usize {
    (n as f64 * DUE_SHARE).ceil() as usize
}

fn sample(ids: &[WordId], amount: usize, rng: &mut impl Rng) -> Vec<WordId> {
    ids.choose_multiple(rng, amount).copied().collect()
}

/// Builds a standard review batch of at most `n` words.
///
/// Due words fill up to 70% of the batch, the remainder comes from mastered
/// or reviewing words, and the result is shuffled so old and new material
/// interleave instead of arriving in blocks. With nothing due, the batch is
/// a uniform sample of the pool.
pub fn select(pool: &WordPool, today: NaiveDate, n: usize, rng: &mut impl Rng) -> Vec<WordId> {
    // Candidate lists are sorted by id so a seeded rng reproduces batches.
    let all = pool.sorted_ids();
    let due: Vec<WordId> = all
        .iter()
        .copied()
        .filter(|id| pool.get(*id).map_or(false, |r| r.is_due(today)))
        .collect();

    if due.is_empty() {
        return sample(&all, n, rng);
    }

    let interleave: Vec<WordId> = all
        .iter()
        .copied()
        .filter(|id| {
            pool.get(*id).map_or(false, |r| {
                !r.is_due(today)
                    && r.total_reviews > 0
                    && matches!(r.status, WordStatus::Mastered | WordStatus::Reviewing)
            })
        })
        .collect();

    // Exactly min(|due|, ceil(0.7n)) due words; the remainder comes only
    // from the interleave pool, so a thin pool yields a short batch.
    let due_count = due.len().min(due_share(n));
    let mut batch = sample(&due, due_count, rng);
    batch.extend(sample(&interleave, n - due_count, rng));
    batch.shuffle(rng);
    debug!("built batch: {} due / {} total", due_count, batch.len());
    batch
}

/// Endless-mode selection. Words already reviewed this session are excluded,
/// except misses queued for a re-drill, which jump ahead of the interleave
/// pool. When every pool is exhausted the selector recycles only if the
/// caller permits it; an empty batch means the session must end.
pub fn select_endless(
    pool: &WordPool,
    today: NaiveDate,
    n: usize,
    reviewed: &HashSet<WordId>,
    retries: &[WordId],
    allow_recycle: bool,
    rng: &mut impl Rng,
) -> EndlessBatch {
    let all = pool.sorted_ids();
    let eligible: Vec<WordId> =
        all.iter().copied().filter(|id| !reviewed.contains(id)).collect();

    let due: Vec<WordId> = eligible
        .iter()
        .copied()
        .filter(|id| pool.get(*id).map_or(false, |r| r.is_due(today)))
        .collect();
    let interleave: Vec<WordId> = eligible
        .iter()
        .copied()
        .filter(|id| {
            pool.get(*id).map_or(false, |r| {
                !r.is_due(today)
                    && r.total_reviews > 0
                    && matches!(r.status, WordStatus::Mastered | WordStatus::Reviewing)
            })
        })
        .collect();
    let unseen: Vec<WordId> = eligible
        .iter()
        .copied()
        .filter(|id| !due.contains(id) && !interleave.contains(id))
        .collect();

    // The base composition still holds: the due share is capped at 70%.
    // Session misses queued for a re-drill slot in ahead of the interleave
    // pool but never displace due words.
    let due_count = due.len().min(due_share(n)).min(n);
    let mut batch = sample(&due, due_count, rng);
    for id in retries {
        if batch.len() >= n {
            break;
        }
        if pool.get(*id).is_some() && !batch.contains(id) {
            batch.push(*id);
        }
    }
    for group in [&interleave, &unseen] {
        if batch.len() >= n {
            break;
        }
        let picked = sample(
            &group.iter().copied().filter(|id| !batch.contains(id)).collect::<Vec<_>>(),
            n - batch.len(),
            rng,
        );
        batch.extend(picked);
    }

    if batch.is_empty() {
        if !allow_recycle {
            return EndlessBatch { ids: Vec::new(), recycled: false };
        }
        debug!("endless selector recycling: all pools exhausted");
        let ids = select(pool, today, n, rng);
        return EndlessBatch { ids, recycled: true };
    }

    batch.shuffle(rng);
    EndlessBatch { ids: batch, recycled: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::test_support::{content, date};
    use crate::word::{WordPool, WordRecord};
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // Pool with `due` words due today and `solid` reviewed words scheduled
    // for the future.
    fn build_pool(due: usize, solid: usize) -> (WordPool, NaiveDate) {
        let today = date(2026, 3, 1);
        let mut pool = WordPool::new();
        let mut id = 0;
        for _ in 0..due {
            id += 1;
            pool.insert(WordRecord::new(id, content(&format!("due{}", id)), today));
        }
        for _ in 0..solid {
            id += 1;
            let mut record = WordRecord::new(id, content(&format!("solid{}", id)), today);
            record.total_reviews = 4;
            record.correct_reviews = 3;
            record.repetitions = 3;
            record.interval = 10;
            record.status = WordStatus::Reviewing;
            record.next_review_date = today + Duration::days(5);
            pool.insert(record);
        }
        (pool, today)
    }

    #[test]
    fn batch_holds_seven_due_and_three_interleaved() {
        let (pool, today) = build_pool(12, 8);
        let mut rng = StdRng::seed_from_u64(7);
        let batch = select(&pool, today, 10, &mut rng);

        assert_eq!(batch.len(), 10);
        let due_count = batch.iter().filter(|id| **id <= 12).count();
        assert_eq!(due_count, 7);

        let mut unique: Vec<WordId> = batch.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), batch.len());
    }

    #[test]
    fn few_due_words_all_selected() {
        let (pool, today) = build_pool(3, 10);
        let mut rng = StdRng::seed_from_u64(7);
        let batch = select(&pool, today, 10, &mut rng);
        assert_eq!(batch.len(), 10);
        assert_eq!(batch.iter().filter(|id| **id <= 3).count(), 3);
    }

    #[test]
    fn due_words_never_exceed_their_share() {
        // 12 due, nothing to interleave: the batch stays at the 70% share
        // instead of padding with more due words.
        let (pool, today) = build_pool(12, 0);
        let mut rng = StdRng::seed_from_u64(7);
        let batch = select(&pool, today, 10, &mut rng);
        assert_eq!(batch.len(), 7);
        assert!(batch.iter().all(|id| *id <= 12));
    }

    #[test]
    fn no_due_words_samples_whole_pool() {
        let (pool, today) = build_pool(0, 6);
        let mut rng = StdRng::seed_from_u64(7);
        let batch = select(&pool, today, 10, &mut rng);
        assert_eq!(batch.len(), 6);
    }

    #[test]
    fn never_exceeds_requested_size() {
        let (pool, today) = build_pool(30, 30);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(select(&pool, today, 10, &mut rng).len(), 10);
        assert_eq!(select(&pool, today, 4, &mut rng).len(), 4);
    }

    #[test]
    fn seeded_rng_reproduces_batches() {
        let (pool, today) = build_pool(12, 8);
        let a = select(&pool, today, 10, &mut StdRng::seed_from_u64(42));
        let b = select(&pool, today, 10, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn endless_excludes_reviewed_ids() {
        let (pool, today) = build_pool(20, 0);
        let mut rng = StdRng::seed_from_u64(7);
        let mut reviewed = HashSet::new();

        let first = select_endless(&pool, today, 10, &reviewed, &[], false, &mut rng);
        reviewed.extend(first.ids.iter().copied());
        let second = select_endless(&pool, today, 10, &reviewed, &[], false, &mut rng);

        assert!(!first.recycled && !second.recycled);
        for id in &second.ids {
            assert!(!first.ids.contains(id));
        }
    }

    #[test]
    fn endless_puts_retries_back_in_play() {
        let (pool, today) = build_pool(20, 0);
        let mut rng = StdRng::seed_from_u64(7);
        // Words 1 and 2 were reviewed (and missed) earlier this session.
        let reviewed: HashSet<WordId> = (1..=10).collect();
        let retries = vec![1, 2];

        let batch = select_endless(&pool, today, 10, &reviewed, &retries, false, &mut rng);
        assert!(batch.ids.contains(&1));
        assert!(batch.ids.contains(&2));
        // The due share from the unreviewed remainder stays capped at 7.
        assert_eq!(batch.ids.iter().filter(|id| **id > 10).count(), 7);
    }

    #[test]
    fn endless_keeps_the_interleave_share() {
        let (pool, today) = build_pool(20, 10);
        let mut rng = StdRng::seed_from_u64(7);

        let batch = select_endless(&pool, today, 10, &HashSet::new(), &[], false, &mut rng);
        assert_eq!(batch.ids.len(), 10);
        assert_eq!(batch.ids.iter().filter(|id| **id <= 20).count(), 7);
        assert_eq!(batch.ids.iter().filter(|id| **id > 20).count(), 3);
    }

    #[test]
    fn endless_exhaustion_requires_permission_to_recycle() {
        let (pool, today) = build_pool(6, 0);
        let mut rng = StdRng::seed_from_u64(7);
        let reviewed: HashSet<WordId> = (1..=6).collect();

        let stopped = select_endless(&pool, today, 10, &reviewed, &[], false, &mut rng);
        assert!(stopped.ids.is_empty());
        assert!(!stopped.recycled);

        let recycled = select_endless(&pool, today, 10, &reviewed, &[], true, &mut rng);
        assert!(recycled.recycled);
        assert_eq!(recycled.ids.len(), 6);
    }

    #[test]
    fn endless_batch_has_no_duplicates() {
        let (pool, today) = build_pool(15, 5);
        let mut rng = StdRng::seed_from_u64(9);
        let reviewed: HashSet<WordId> = (1..=4).collect();
        let retries = vec![1, 2, 3];

        let batch = select_endless(&pool, today, 10, &reviewed, &retries, false, &mut rng);
        let mut unique = batch.ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), batch.ids.len());
        assert!(batch.ids.len() <= 10);
    }
}
