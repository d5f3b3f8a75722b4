//! One-shot transfer of the device collection into the signed-in cloud account.
//!
//! Not idempotent: the local partition is cleared on success so that a second
//! run finds nothing to move. Nothing deduplicates against a previous partial
//! run.

use serde::Serialize;

use crate::error::{Result, SchedulerError};
use crate::memory::scheduler::{lock_state, Scheduler};
use crate::memory::types::{ItemDraft, Owner};

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Cloud account that received the items.
    pub account_id: String,
    /// Number of local items submitted.
    pub migrated: usize,
    /// Size of the cloud collection after reload.
    pub cloud_total: usize,
}

impl Scheduler {
    /// Number of items waiting in the device store. Used to offer a migration.
    pub async fn local_item_count(&self) -> Result<usize> {
        Ok(self.stores.local.list_items(&Owner::Local).await?.len())
    }

    /// Move every device item into the active cloud account.
    ///
    /// Requires a cloud owner to be active. On success the device partition is
    /// cleared and the in-memory collection reloaded from the cloud store, so
    /// server ids replace the old local ones. On failure local data is left
    /// untouched and the error is returned; nothing is retried.
    pub async fn migrate_local_to_cloud(&self) -> Result<MigrationReport> {
        let owner = self.owner();
        let Owner::Cloud { account_id } = owner.clone() else {
            return Err(SchedulerError::NotAuthenticated);
        };
        let cloud = self.stores.for_owner(&owner)?;
        let local = &self.stores.local;

        // Device writes issued before sign-in must land before we read.
        self.flush().await;

        let local_items = local.list_items(&Owner::Local).await?;
        if local_items.is_empty() {
            tracing::info!(%account_id, "no local items to migrate");
            return Ok(MigrationReport {
                account_id,
                migrated: 0,
                cloud_total: lock_state(&self.state).items.len(),
            });
        }

        let drafts: Vec<ItemDraft> = local_items.iter().map(|item| item.to_draft()).collect();
        tracing::info!(%account_id, count = drafts.len(), "migrating local items to cloud");

        if let Err(e) = cloud.bulk_create(&owner, &drafts).await {
            tracing::warn!(%account_id, error = %e, "migration failed, local items kept");
            return Err(e.into());
        }

        // The cloud copy is authoritative from here on. A failed clear would
        // make a later run duplicate items, so report it.
        local.clear(&Owner::Local).await?;

        let cloud_total = self.load_owner_collection(owner).await?;
        tracing::info!(%account_id, migrated = drafts.len(), cloud_total, "migration complete");

        Ok(MigrationReport {
            account_id,
            migrated: drafts.len(),
            cloud_total,
        })
    }
}
