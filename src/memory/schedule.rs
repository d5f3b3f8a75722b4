//! Retention interval table and the review transition rule.
//!
//! The transition is a pure function of the current stage and the recall
//! outcome: success climbs one stage up to the last interval and stays there,
//! failure drops back to stage 0.

use crate::error::{Result, SchedulerError};
use crate::memory::types::DAY_MS;

/// Stage intervals in days. Stage `i` waits `days[i]` before the next review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable {
    days: Vec<u32>,
}

/// Outcome of applying a review to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub stage: usize,
    pub next_review_at: i64,
}

impl IntervalTable {
    pub const DEFAULT_DAYS: [u32; 5] = [1, 2, 4, 7, 15];

    pub fn new(days: Vec<u32>) -> Result<Self> {
        if days.is_empty() {
            return Err(SchedulerError::Validation(
                "interval table must have at least one stage".into(),
            ));
        }
        if days.iter().any(|d| *d == 0) {
            return Err(SchedulerError::Validation(
                "intervals must be at least one day".into(),
            ));
        }
        Ok(Self { days })
    }

    /// Number of stages, `S`.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Highest reachable stage, `S - 1`.
    pub fn max_stage(&self) -> usize {
        self.days.len() - 1
    }

    pub fn contains(&self, stage: usize) -> bool {
        stage < self.days.len()
    }

    /// Interval for `stage` in milliseconds. Out-of-range stages clamp to the plateau.
    pub fn interval_ms(&self, stage: usize) -> i64 {
        let days = self.days[stage.min(self.max_stage())];
        i64::from(days) * DAY_MS
    }

    /// Schedule for a freshly captured item.
    pub fn initial(&self, now: i64) -> Transition {
        Transition {
            stage: 0,
            next_review_at: now + self.interval_ms(0),
        }
    }

    /// Apply a review outcome to `stage` at time `now`.
    pub fn review(&self, stage: usize, remembered: bool, now: i64) -> Transition {
        let stage = if remembered {
            (stage + 1).min(self.max_stage())
        } else {
            0
        };
        Transition {
            stage,
            next_review_at: now + self.interval_ms(stage),
        }
    }
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self {
            days: Self::DEFAULT_DAYS.to_vec(),
        }
    }
}
