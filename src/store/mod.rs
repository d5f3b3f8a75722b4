//! Durable storage contract for memory collections.
//!
//! A [`Store`] holds one partition per [`Owner`]. The scheduler only ever
//! reads or writes the active owner's partition.

pub mod rest;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::memory::types::{ItemDraft, MemoryItem, Owner};

pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Backend label for logs.
    fn name(&self) -> &'static str;

    /// All items of `owner`, ordered by `next_review_at` ascending.
    async fn list_items(&self, owner: &Owner) -> StoreResult<Vec<MemoryItem>>;

    /// Create one item and return it with its canonical id and creation time.
    async fn create_item(&self, owner: &Owner, draft: &ItemDraft) -> StoreResult<MemoryItem>;

    /// Persist a new schedule for an existing item.
    async fn update_item(&self, id: &str, stage: usize, next_review_at: i64) -> StoreResult<()>;

    /// Create many items at once; all or nothing from the caller's view.
    async fn bulk_create(&self, owner: &Owner, drafts: &[ItemDraft]) -> StoreResult<()>;

    /// Remove every item of `owner`.
    async fn clear(&self, owner: &Owner) -> StoreResult<()>;
}
