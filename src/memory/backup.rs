//! JSON backup of the device collection.
//!
//! A backup restores by overwriting: the device partition is cleared and the
//! backed-up items are recreated with their schedules intact.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::memory::scheduler::Scheduler;
use crate::memory::types::{ItemDraft, MemoryItem, Owner};

pub const BACKUP_VERSION: u32 = 1;

/// Export format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    /// RFC 3339 export time.
    pub exported_at: String,
    pub items: Vec<MemoryItem>,
}

impl Backup {
    pub fn new(items: Vec<MemoryItem>) -> Self {
        Self {
            version: BACKUP_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            items,
        }
    }

    /// Parse a backup document. Browser-era exports, which carry the
    /// collection as a JSON string under `memory`, are read as version 0.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("items").is_none() && value.get("memory").is_some() {
            let legacy: LegacyBackup = serde_json::from_value(value)?;
            return legacy.into_backup();
        }

        let backup: Backup = serde_json::from_value(value)?;
        if backup.version > BACKUP_VERSION {
            return Err(SchedulerError::Backup(format!(
                "unsupported backup version {}",
                backup.version
            )));
        }
        Ok(backup)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Export written by the web app's backup panel.
#[derive(Debug, Deserialize)]
struct LegacyBackup {
    /// The `memory-bank` collection, itself JSON-encoded.
    memory: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl LegacyBackup {
    fn into_backup(self) -> Result<Backup> {
        let items = match self.memory.as_deref() {
            Some(memory) if !memory.trim().is_empty() => serde_json::from_str(memory)?,
            _ => Vec::new(),
        };
        Ok(Backup {
            version: 0,
            exported_at: self
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            items,
        })
    }
}

impl Scheduler {
    /// Snapshot the device collection.
    pub async fn export_backup(&self) -> Result<Backup> {
        self.flush().await;
        let items = self.stores.local.list_items(&Owner::Local).await?;
        tracing::info!(count = items.len(), "exported local collection");
        Ok(Backup::new(items))
    }

    /// Replace the device collection with `backup`. Returns the number of
    /// restored items. Invalid items reject the whole backup before anything
    /// is written; stages past the interval table restore on its plateau.
    pub async fn import_backup(&self, backup: &Backup) -> Result<usize> {
        let drafts = backup
            .items
            .iter()
            .map(|item| self.validate(item))
            .collect::<Result<Vec<ItemDraft>>>()?;

        self.flush().await;
        let local = &self.stores.local;
        local.clear(&Owner::Local).await?;
        local.bulk_create(&Owner::Local, &drafts).await?;
        tracing::info!(count = drafts.len(), "restored local collection from backup");

        if self.owner() == Owner::Local {
            self.load_owner_collection(Owner::Local).await?;
        }
        Ok(drafts.len())
    }

    fn validate(&self, item: &MemoryItem) -> Result<ItemDraft> {
        if item.text.trim().is_empty() {
            return Err(SchedulerError::Validation(format!(
                "backup item {} has empty text",
                item.id
            )));
        }
        let mut draft = item.to_draft();
        if !self.intervals.contains(draft.stage) {
            tracing::debug!(id = %item.id, stage = draft.stage, "backup stage clamped to plateau");
            draft.stage = self.intervals.max_stage();
        }
        Ok(draft)
    }
}
