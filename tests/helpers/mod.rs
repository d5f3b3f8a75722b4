#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use jiyi::db;
use jiyi::error::StoreError;
use jiyi::memory::{Clock, ItemDraft, MemoryItem, Owner, Scheduler, StoreSet};
use jiyi::store::{SqliteStore, Store, StoreResult};
use rusqlite::Connection;
use tokio::sync::Semaphore;

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000_000;

pub const DAY: i64 = jiyi::memory::types::DAY_MS;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn sqlite_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

/// A clock the test can move.
#[derive(Clone)]
pub struct TestClock(Arc<AtomicI64>);

impl TestClock {
    pub fn at(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn clock(&self) -> Clock {
        let inner = Arc::clone(&self.0);
        Arc::new(move || inner.load(Ordering::SeqCst))
    }
}

/// Scheduler over a fresh in-memory device store, with the clock at [`NOW`].
pub fn local_scheduler() -> (Scheduler, Arc<SqliteStore>, TestClock) {
    let store = sqlite_store();
    let clock = TestClock::at(NOW);
    let scheduler = Scheduler::new(StoreSet::local_only(store.clone())).with_clock(clock.clock());
    (scheduler, store, clock)
}

/// Wraps a store and fails reads or writes on demand.
pub struct FlakyStore {
    inner: Arc<dyn Store>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("network unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn list_items(&self, owner: &Owner) -> StoreResult<Vec<MemoryItem>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network unreachable".into()));
        }
        self.inner.list_items(owner).await
    }

    async fn create_item(&self, owner: &Owner, draft: &ItemDraft) -> StoreResult<MemoryItem> {
        self.check_write()?;
        self.inner.create_item(owner, draft).await
    }

    async fn update_item(&self, id: &str, stage: usize, next_review_at: i64) -> StoreResult<()> {
        self.check_write()?;
        self.inner.update_item(id, stage, next_review_at).await
    }

    async fn bulk_create(&self, owner: &Owner, drafts: &[ItemDraft]) -> StoreResult<()> {
        self.check_write()?;
        self.inner.bulk_create(owner, drafts).await
    }

    async fn clear(&self, owner: &Owner) -> StoreResult<()> {
        self.check_write()?;
        self.inner.clear(owner).await
    }
}

/// Holds every create until the test releases it.
pub struct GatedStore {
    inner: Arc<dyn Store>,
    gate: Semaphore,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
        }
    }

    pub fn release(&self, creates: usize) {
        self.gate.add_permits(creates);
    }
}

#[async_trait]
impl Store for GatedStore {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn list_items(&self, owner: &Owner) -> StoreResult<Vec<MemoryItem>> {
        self.inner.list_items(owner).await
    }

    async fn create_item(&self, owner: &Owner, draft: &ItemDraft) -> StoreResult<MemoryItem> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        permit.forget();
        self.inner.create_item(owner, draft).await
    }

    async fn update_item(&self, id: &str, stage: usize, next_review_at: i64) -> StoreResult<()> {
        self.inner.update_item(id, stage, next_review_at).await
    }

    async fn bulk_create(&self, owner: &Owner, drafts: &[ItemDraft]) -> StoreResult<()> {
        self.inner.bulk_create(owner, drafts).await
    }

    async fn clear(&self, owner: &Owner) -> StoreResult<()> {
        self.inner.clear(owner).await
    }
}

pub fn draft(text: &str, context: &str, stage: usize, next_review_at: i64) -> ItemDraft {
    ItemDraft {
        text: text.into(),
        translation: None,
        context: context.into(),
        stage,
        next_review_at,
        added_at: Some(NOW - DAY),
    }
}
