//! CLI `export` / `import` commands for JSON backups of the device collection.

use anyhow::{bail, Context, Result};
use std::path::Path;

use jiyi::memory::backup::Backup;
use jiyi::memory::Scheduler;

use super::confirm;

/// Print a backup of the device collection as JSON to stdout.
pub async fn export(scheduler: &Scheduler) -> Result<()> {
    let backup = scheduler.export_backup().await?;
    println!("{}", backup.to_json_pretty()?);
    eprintln!("Exported {} item(s).", backup.items.len());
    Ok(())
}

/// Replace the device collection with the contents of `file`.
pub async fn import(scheduler: &Scheduler, file: &Path, yes: bool) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read backup file: {}", file.display()))?;
    let backup = Backup::from_json(&json).context("failed to parse backup")?;

    if !yes
        && !confirm(&format!(
            "Restore {} item(s)? This overwrites your current local data.",
            backup.items.len()
        ))?
    {
        bail!("import cancelled");
    }

    let restored = scheduler.import_backup(&backup).await?;
    println!("Restored {restored} item(s) from {}.", file.display());
    Ok(())
}
