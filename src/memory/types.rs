//! Core memory type definitions.
//!
//! Defines [`MemoryItem`] (a memorized fragment with its review schedule),
//! [`ItemDraft`] (the owner-independent payload sent to a store on create),
//! [`Owner`] (which collection partition is active) and [`SyncState`].

use serde::{Deserialize, Serialize};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Prefix of ids assigned before a store has confirmed creation.
pub const PROVISIONAL_PREFIX: &str = "tmp-";

/// The holder of a memory collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Owner {
    /// This device, no account signed in.
    Local,
    /// One authenticated cloud account.
    Cloud { account_id: String },
}

impl Owner {
    pub fn cloud(account_id: impl Into<String>) -> Self {
        Self::Cloud {
            account_id: account_id.into(),
        }
    }

    /// Partition key used by stores.
    pub fn owner_key(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Cloud { account_id } => account_id,
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::Cloud { .. })
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Cloud { account_id } => write!(f, "cloud:{account_id}"),
        }
    }
}

/// Durability of an item's latest in-memory change. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    /// Applied in memory, durable write still queued or in flight.
    Pending,
    /// Matches what the store holds.
    #[default]
    Synced,
    /// The durable write failed; the item is unsynced until retried.
    Failed(String),
}

/// A memorized text fragment and its review schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItem {
    /// Store-assigned id, or a `tmp-` id until creation is confirmed.
    pub id: String,
    /// The captured fragment.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Where the fragment was captured (page, document, card deck).
    pub context: String,
    /// Creation time, epoch milliseconds.
    pub added_at: i64,
    /// Due when `now >= next_review_at`, epoch milliseconds.
    pub next_review_at: i64,
    /// Index into the interval table.
    pub stage: usize,
    #[serde(skip)]
    pub sync: SyncState,
}

impl MemoryItem {
    pub fn is_due(&self, now: i64) -> bool {
        now >= self.next_review_at
    }

    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_PREFIX)
    }

    /// The payload a store needs to (re)create this item.
    pub fn to_draft(&self) -> ItemDraft {
        ItemDraft {
            text: self.text.clone(),
            translation: self.translation.clone(),
            context: self.context.clone(),
            stage: self.stage,
            next_review_at: self.next_review_at,
            added_at: Some(self.added_at),
        }
    }
}

/// Item content submitted to a store for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub text: String,
    pub translation: Option<String>,
    pub context: String,
    pub stage: usize,
    pub next_review_at: i64,
    /// Original creation time to preserve; stores stamp their own time when `None`.
    pub added_at: Option<i64>,
}

/// Generate a fresh provisional id.
pub fn provisional_id() -> String {
    format!("{PROVISIONAL_PREFIX}{}", uuid::Uuid::now_v7())
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
