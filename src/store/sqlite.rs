//! Local device store backed by SQLite.
//!
//! Items live in `memory_items`, partitioned by the `owner` column. Every write
//! lands in `memory_log` within the same transaction. The connection sits
//! behind a mutex and all statements run on the blocking pool.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{Store, StoreResult};
use crate::error::StoreError;
use crate::memory::types::{now_ms, ItemDraft, MemoryItem, Owner, SyncState};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::open_database(path)?))
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(crate::db::open_memory_database()?))
    }

    /// Shared handle to the underlying connection.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Run `f` against the connection on the blocking pool. Lock and join
    /// failures are reported through `fail`.
    async fn with_conn<T, F>(&self, fail: fn(String) -> StoreError, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| fail(format!("db lock poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| fail(format!("db task failed: {e}")))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn list_items(&self, owner: &Owner) -> StoreResult<Vec<MemoryItem>> {
        let owner_key = owner.owner_key().to_string();
        self.with_conn(StoreError::Unavailable, move |conn| {
            list_for_owner(conn, &owner_key).map_err(|e| StoreError::Unavailable(e.to_string()))
        })
        .await
    }

    async fn create_item(&self, owner: &Owner, draft: &ItemDraft) -> StoreResult<MemoryItem> {
        let owner_key = owner.owner_key().to_string();
        let draft = draft.clone();
        self.with_conn(StoreError::Write, move |conn| {
            let tx = conn.transaction()?;
            let item = insert_item(&tx, &owner_key, &draft)?;
            write_audit_log(&tx, "create", Some(&owner_key), Some(&item.id), None)?;
            tx.commit()?;
            Ok(item)
        })
        .await
    }

    async fn update_item(&self, id: &str, stage: usize, next_review_at: i64) -> StoreResult<()> {
        let id = id.to_string();
        self.with_conn(StoreError::Write, move |conn| {
            let tx = conn.transaction()?;
            let rows = tx.execute(
                "UPDATE memory_items SET stage = ?1, next_review_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![stage as i64, next_review_at, now_ms(), id],
            )?;
            if rows == 0 {
                return Err(StoreError::Write(format!("unknown memory item: {id}")));
            }
            let details = serde_json::json!({ "stage": stage, "next_review_at": next_review_at });
            write_audit_log(&tx, "update", None, Some(&id), Some(&details))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn bulk_create(&self, owner: &Owner, drafts: &[ItemDraft]) -> StoreResult<()> {
        let owner_key = owner.owner_key().to_string();
        let drafts = drafts.to_vec();
        self.with_conn(StoreError::Write, move |conn| {
            let tx = conn.transaction()?;
            for draft in &drafts {
                insert_item(&tx, &owner_key, draft)?;
            }
            let details = serde_json::json!({ "count": drafts.len() });
            write_audit_log(&tx, "bulk_create", Some(&owner_key), None, Some(&details))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, owner: &Owner) -> StoreResult<()> {
        let owner_key = owner.owner_key().to_string();
        self.with_conn(StoreError::Write, move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM memory_items WHERE owner = ?1", params![owner_key])?;
            let details = serde_json::json!({ "removed": removed });
            write_audit_log(&tx, "clear", Some(&owner_key), None, Some(&details))?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn list_for_owner(conn: &Connection, owner_key: &str) -> rusqlite::Result<Vec<MemoryItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, translation, context, added_at, next_review_at, stage \
         FROM memory_items WHERE owner = ?1 ORDER BY next_review_at ASC, added_at ASC",
    )?;

    let items = stmt
        .query_map(params![owner_key], |row| {
            let stage: i64 = row.get(6)?;
            Ok(MemoryItem {
                id: row.get(0)?,
                text: row.get(1)?,
                translation: row.get(2)?,
                context: row.get(3)?,
                added_at: row.get(4)?,
                next_review_at: row.get(5)?,
                stage: usize::try_from(stage).unwrap_or(0),
                sync: SyncState::Synced,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Insert one row under a fresh time-ordered id.
fn insert_item(conn: &Connection, owner_key: &str, draft: &ItemDraft) -> rusqlite::Result<MemoryItem> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_ms();
    let added_at = draft.added_at.unwrap_or(now);

    conn.execute(
        "INSERT INTO memory_items (id, owner, text, translation, context, stage, next_review_at, added_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            owner_key,
            draft.text,
            draft.translation,
            draft.context,
            draft.stage as i64,
            draft.next_review_at,
            added_at,
            now,
        ],
    )?;

    Ok(MemoryItem {
        id,
        text: draft.text.clone(),
        translation: draft.translation.clone(),
        context: draft.context.clone(),
        added_at,
        next_review_at: draft.next_review_at,
        stage: draft.stage,
        sync: SyncState::Synced,
    })
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    owner_key: Option<&str>,
    item_id: Option<&str>,
    details: Option<&serde_json::Value>,
) -> rusqlite::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, owner, item_id, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![operation, owner_key, item_id, details_json, now],
    )?;
    Ok(())
}
