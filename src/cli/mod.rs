pub mod add;
pub mod backup;
pub mod list;
pub mod migrate;
pub mod review;
pub mod stats;

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;

use jiyi::config::JiyiConfig;
use jiyi::db::migrations::{get_interval_days, set_interval_days};
use jiyi::memory::{MemoryItem, Owner, Scheduler, StoreSet, SyncState};
use jiyi::store::{RestStore, SqliteStore, Store};

/// Open the device store, attach the cloud store when a session is
/// configured, and load the active owner's collection.
pub async fn open_session(config: &JiyiConfig, force_local: bool) -> Result<Scheduler> {
    let intervals = config.intervals()?;
    let db_path = config.resolved_db_path();
    let local = SqliteStore::open(&db_path)?;
    check_interval_table(&local, &config.schedule.intervals_days)?;
    let local: Arc<dyn Store> = Arc::new(local);

    let (stores, owner) = match (force_local, config.cloud.session(), RestStore::from_config(&config.cloud)) {
        (false, Some((account_id, _)), Some(cloud)) => (
            StoreSet::with_cloud(local, Arc::new(cloud)),
            Owner::cloud(account_id),
        ),
        _ => (StoreSet::local_only(local), Owner::Local),
    };

    let scheduler = Scheduler::new(stores)
        .with_intervals(intervals)
        .with_default_context(config.schedule.default_context.clone());
    scheduler
        .load_owner_collection(owner.clone())
        .await
        .with_context(|| format!("failed to load the {owner} collection"))?;
    Ok(scheduler)
}

/// Warn when stored stages were scheduled with a different interval table.
fn check_interval_table(store: &SqliteStore, configured: &[u32]) -> Result<()> {
    let conn = store.connection();
    let conn = conn
        .lock()
        .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
    match get_interval_days(&conn)? {
        Some(stored) if stored != configured => {
            tracing::warn!(
                ?stored,
                ?configured,
                "interval table changed; existing stages keep their old meaning"
            );
            set_interval_days(&conn, configured)?;
        }
        Some(_) => {}
        None => set_interval_days(&conn, configured)?,
    }
    Ok(())
}

/// Ask a yes/no question on stdin.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes" | "YES"))
}

pub fn format_time(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

pub fn print_item(item: &MemoryItem) {
    let sync = match &item.sync {
        SyncState::Synced => String::new(),
        SyncState::Pending => "  (pending)".into(),
        SyncState::Failed(reason) => format!("  (unsynced: {reason})"),
    };
    println!(
        "{:<38} stage {}  next {}  [{}] {}{}",
        item.id,
        item.stage,
        format_time(item.next_review_at),
        item.context,
        item.text,
        sync
    );
}
