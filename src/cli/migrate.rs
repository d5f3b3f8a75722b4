//! CLI `migrate` command: move device items into the signed-in account.

use anyhow::{bail, Result};

use jiyi::memory::Scheduler;

use super::confirm;

pub async fn migrate(scheduler: &Scheduler, yes: bool) -> Result<()> {
    if !scheduler.owner().is_cloud() {
        bail!("not signed in: set [cloud] account_id and access_token first");
    }

    let local = scheduler.local_item_count().await?;
    if local == 0 {
        println!("No local items to migrate.");
        return Ok(());
    }

    if !yes && !confirm(&format!("Found {local} local item(s). Move them to {}?", scheduler.owner()))? {
        bail!("migration cancelled");
    }

    let report = scheduler.migrate_local_to_cloud().await?;
    println!(
        "Migrated {} item(s) to {}; cloud collection now holds {}. Local storage cleared.",
        report.migrated, scheduler.owner(), report.cloud_total
    );
    Ok(())
}
