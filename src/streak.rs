// src/streak.rs
// Daily continuity counter, keyed by calendar date.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Tracks how many consecutive calendar days the learner has reviewed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakTracker {
    pub streak: u32,
    pub last_review_date: Option<NaiveDate>,
}

impl StreakTracker {
    pub fn new() -> Self {
        StreakTracker::default()
    }

    /// Registers a review day. Only the first call per calendar day changes
    /// anything; repeats on the same day are no-ops.
    pub fn record_review(&mut self, today: NaiveDate) {
        if self.last_review_date == Some(today) {
            return;
        }
        let yesterday = today - Duration::days(1);
        if self.last_review_date == Some(yesterday) {
            self.streak += 1;
        } else {
            self.streak = 1;
        }
        self.last_review_date = Some(today);
    }
}
