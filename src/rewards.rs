// src/rewards.rs
// Events emitted toward the external reward economy. The engine never
// touches currency itself; the host app converts these.

use serde::{Deserialize, Serialize};

use crate::word::WordId;

/// Quality tier of a single review, for XP/gold conversion by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardTier {
    High,
    Mid,
    Low,
}

impl RewardTier {
    /// Tier for an adjusted quality score; incorrect answers earn nothing.
    pub fn for_quality(adjusted: u8) -> Option<Self> {
        match adjusted {
            5.. => Some(RewardTier::High),
            4 => Some(RewardTier::Mid),
            3 => Some(RewardTier::Low),
            _ => None,
        }
    }
}

/// One event for the reward collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardEvent {
    Review { word_id: WordId, tier: RewardTier },
    /// Emitted once per word, on its first arrival at mastered.
    MasteryBonus { word_id: WordId },
}

/// Implemented by the host's reward economy.
pub trait RewardSink {
    fn reward(&mut self, event: RewardEvent);
}

/// A sink for hosts without an economy (and for the demo binary).
#[derive(Debug, Default)]
pub struct DiscardRewards;

impl RewardSink for DiscardRewards {
    fn reward(&mut self, _event: RewardEvent) {}
}
