pub mod backup;
pub mod migrate;
pub mod schedule;
pub mod scheduler;
pub mod stats;
pub mod sync;
pub mod types;

pub use scheduler::{Clock, Scheduler, StoreSet};
pub use sync::{SyncEvent, WriteKind};
pub use types::{ItemDraft, MemoryItem, Owner, SyncState};
