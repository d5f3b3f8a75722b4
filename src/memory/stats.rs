use serde::Serialize;

use crate::memory::scheduler::Scheduler;
use crate::memory::types::{MemoryItem, SyncState};

/// Summary of the active collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub owner: String,
    pub total: usize,
    pub due: usize,
    /// Item count per stage, indexed by stage.
    pub by_stage: Vec<usize>,
    pub unsynced: usize,
    pub pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<i64>,
}

/// Compute stats over `items` at time `now` for a table of `stages` stages.
pub fn collection_stats(items: &[MemoryItem], now: i64, stages: usize) -> CollectionStats {
    let mut by_stage = vec![0; stages];
    let plateau = stages.saturating_sub(1);
    for item in items {
        if let Some(count) = by_stage.get_mut(item.stage.min(plateau)) {
            *count += 1;
        }
    }

    CollectionStats {
        owner: String::new(),
        total: items.len(),
        due: items.iter().filter(|i| i.is_due(now)).count(),
        by_stage,
        unsynced: items
            .iter()
            .filter(|i| matches!(i.sync, SyncState::Failed(_)))
            .count(),
        pending: items.iter().filter(|i| i.sync == SyncState::Pending).count(),
        next_review_at: items
            .iter()
            .filter(|i| !i.is_due(now))
            .map(|i| i.next_review_at)
            .min(),
    }
}

impl Scheduler {
    pub fn stats(&self) -> CollectionStats {
        let items = self.items();
        CollectionStats {
            owner: self.owner().to_string(),
            ..collection_stats(&items, self.now(), self.intervals().len())
        }
    }
}
