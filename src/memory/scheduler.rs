//! The memory scheduler: owns the in-memory collection for the active owner,
//! applies captures and reviews optimistically, and hands durable writes to
//! the sync queue.
//!
//! Mutating operations (`add_item`, `review_item`) are synchronous: they update
//! in-memory state, enqueue the store write and return. Durable confirmation
//! arrives later through [`SyncEvent`]s and the item's [`SyncState`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{Result, SchedulerError};
use crate::memory::schedule::IntervalTable;
use crate::memory::sync::{self, SyncEvent, SyncOp};
use crate::memory::types::{
    now_ms, provisional_id, ItemDraft, MemoryItem, Owner, SyncState, PROVISIONAL_PREFIX,
};
use crate::store::Store;

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

const EVENT_CAPACITY: usize = 256;

/// The stores the scheduler can switch between.
#[derive(Clone)]
pub struct StoreSet {
    /// Device store, always present.
    pub local: Arc<dyn Store>,
    /// Remote store, present once a cloud session exists.
    pub cloud: Option<Arc<dyn Store>>,
}

impl StoreSet {
    pub fn local_only(local: Arc<dyn Store>) -> Self {
        Self { local, cloud: None }
    }

    pub fn with_cloud(local: Arc<dyn Store>, cloud: Arc<dyn Store>) -> Self {
        Self {
            local,
            cloud: Some(cloud),
        }
    }

    /// The store holding `owner`'s partition.
    pub fn for_owner(&self, owner: &Owner) -> Result<Arc<dyn Store>> {
        match owner {
            Owner::Local => Ok(Arc::clone(&self.local)),
            Owner::Cloud { .. } => self
                .cloud
                .as_ref()
                .map(Arc::clone)
                .ok_or(SchedulerError::NotAuthenticated),
        }
    }
}

/// Mutable scheduler state shared with the sync worker.
#[derive(Debug)]
pub(crate) struct SchedulerState {
    pub(crate) owner: Owner,
    /// Bumped on every owner switch; results from older epochs are dropped.
    pub(crate) epoch: u64,
    pub(crate) items: Vec<MemoryItem>,
    /// Outstanding durable writes per item id.
    pending: HashMap<String, usize>,
    /// Queued ops addressed by each provisional id.
    provisional_refs: HashMap<String, usize>,
}

impl SchedulerState {
    pub(crate) fn new() -> Self {
        Self {
            owner: Owner::Local,
            epoch: 0,
            items: Vec::new(),
            pending: HashMap::new(),
            provisional_refs: HashMap::new(),
        }
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut MemoryItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub(crate) fn begin_write(&mut self, id: &str) {
        *self.pending.entry(id.to_string()).or_insert(0) += 1;
        if id.starts_with(PROVISIONAL_PREFIX) {
            *self.provisional_refs.entry(id.to_string()).or_insert(0) += 1;
        }
        if let Some(item) = self.find_mut(id) {
            item.sync = SyncState::Pending;
        }
    }

    /// Record the outcome of one durable write for `id`.
    pub(crate) fn finish_write(&mut self, id: &str, outcome: std::result::Result<(), String>) {
        let remaining = match self.pending.get_mut(id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.pending.remove(id);
        }
        if let Some(item) = self.find_mut(id) {
            match outcome {
                Err(reason) => item.sync = SyncState::Failed(reason),
                Ok(()) if remaining == 0 => item.sync = SyncState::Synced,
                Ok(()) => {}
            }
        }
    }

    /// Drop one reference to provisional `id` once its op has run. Returns
    /// true when no queued op addresses that id any more.
    pub(crate) fn release_provisional(&mut self, id: &str) -> bool {
        match self.provisional_refs.get_mut(id) {
            Some(refs) if *refs > 1 => {
                *refs -= 1;
                false
            }
            _ => {
                self.provisional_refs.remove(id);
                true
            }
        }
    }

    pub(crate) fn provisional_ref_count(&self) -> usize {
        self.provisional_refs.len()
    }

    /// Swap a provisional id for the store's canonical one.
    pub(crate) fn reconcile(&mut self, provisional: &str, canonical: &str, added_at: i64) {
        if let Some(item) = self.find_mut(provisional) {
            item.id = canonical.to_string();
            item.added_at = added_at;
        }
        if let Some(count) = self.pending.remove(provisional) {
            self.pending.insert(canonical.to_string(), count);
        }
    }

    fn replace(&mut self, owner: Owner, items: Vec<MemoryItem>) {
        self.epoch += 1;
        self.owner = owner;
        self.items = items;
        self.pending.clear();
    }
}

pub(crate) fn lock_state(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spaced-repetition scheduler over one owner's collection at a time.
///
/// Must be created inside a Tokio runtime: construction spawns the sync worker.
pub struct Scheduler {
    pub(crate) state: Arc<Mutex<SchedulerState>>,
    pub(crate) stores: StoreSet,
    pub(crate) intervals: IntervalTable,
    default_context: String,
    clock: Clock,
    queue: mpsc::UnboundedSender<SyncOp>,
    events: broadcast::Sender<SyncEvent>,
}

impl Scheduler {
    /// Create a scheduler with an empty local collection. Call
    /// [`load_owner_collection`](Self::load_owner_collection) to populate it.
    pub fn new(stores: StoreSet) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState::new()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let queue = sync::spawn_worker(Arc::clone(&state), events.clone());
        Self {
            state,
            stores,
            intervals: IntervalTable::default(),
            default_context: "General".into(),
            clock: Arc::new(now_ms),
            queue,
            events,
        }
    }

    pub fn with_intervals(mut self, intervals: IntervalTable) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_default_context(mut self, context: impl Into<String>) -> Self {
        self.default_context = context.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn intervals(&self) -> &IntervalTable {
        &self.intervals
    }

    pub fn owner(&self) -> Owner {
        lock_state(&self.state).owner.clone()
    }

    /// Snapshot of the collection in insertion/fetch order.
    pub fn items(&self) -> Vec<MemoryItem> {
        lock_state(&self.state).items.clone()
    }

    pub fn get(&self, id: &str) -> Option<MemoryItem> {
        lock_state(&self.state)
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Receive sync confirmations and failures.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Capture entry point for UI surfaces.
    pub fn capture(&self, text: &str, context: Option<&str>) -> Result<MemoryItem> {
        self.add_item(text, context, None)
    }

    /// Memorize `text`. The item is visible immediately under a provisional id;
    /// the store-assigned id replaces it once creation is confirmed.
    pub fn add_item(
        &self,
        text: &str,
        context: Option<&str>,
        translation: Option<&str>,
    ) -> Result<MemoryItem> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SchedulerError::Validation("text must not be empty".into()));
        }
        let context = context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_context.as_str());

        let now = self.now();
        let schedule = self.intervals.initial(now);
        let item = MemoryItem {
            id: provisional_id(),
            text: text.to_string(),
            translation: translation.map(str::to_string),
            context: context.to_string(),
            added_at: now,
            next_review_at: schedule.next_review_at,
            stage: schedule.stage,
            sync: SyncState::Pending,
        };
        let draft = ItemDraft {
            added_at: None,
            ..item.to_draft()
        };

        let mut state = lock_state(&self.state);
        let store = self.stores.for_owner(&state.owner)?;
        state.items.push(item.clone());
        tracing::info!(id = %item.id, owner = %state.owner, context = %item.context, "memory item captured");
        let op = SyncOp::Create {
            epoch: state.epoch,
            owner: state.owner.clone(),
            provisional_id: item.id.clone(),
            draft,
            store,
        };
        self.enqueue(&mut state, &item.id, op);
        let item = state.items.last().cloned().unwrap_or(item);
        Ok(item)
    }

    /// Apply a recall outcome to item `id` and schedule its next review.
    pub fn review_item(&self, id: &str, remembered: bool) -> Result<MemoryItem> {
        let now = self.now();
        let mut state = lock_state(&self.state);
        let store = self.stores.for_owner(&state.owner)?;
        let epoch = state.epoch;

        let item = state
            .find_mut(id)
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        let transition = self.intervals.review(item.stage, remembered, now);
        tracing::debug!(
            id,
            remembered,
            from = item.stage,
            to = transition.stage,
            "review applied"
        );
        item.stage = transition.stage;
        item.next_review_at = transition.next_review_at;

        self.enqueue(
            &mut state,
            id,
            SyncOp::Update {
                epoch,
                id: id.to_string(),
                stage: transition.stage,
                next_review_at: transition.next_review_at,
                store,
            },
        );
        state
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    /// Items due now, earliest first.
    pub fn due_items(&self) -> Vec<MemoryItem> {
        self.due_items_at(self.now())
    }

    /// Items with `next_review_at <= now`, earliest first; ties keep collection order.
    pub fn due_items_at(&self, now: i64) -> Vec<MemoryItem> {
        let mut due: Vec<MemoryItem> = lock_state(&self.state)
            .items
            .iter()
            .filter(|item| item.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|item| item.next_review_at);
        due
    }

    /// Make `owner` active and replace the in-memory collection with its
    /// stored items. On failure the previous collection stays in place.
    pub async fn load_owner_collection(&self, owner: Owner) -> Result<usize> {
        let store = self.stores.for_owner(&owner)?;
        let mut items = match store.list_items(&owner).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(%owner, store = store.name(), error = %e, "failed to load collection");
                return Err(e.into());
            }
        };
        let count = items.len();

        // Stages scheduled under a longer interval table settle on the plateau.
        let max_stage = self.intervals.max_stage();
        let clamped: Vec<(String, i64)> = items
            .iter_mut()
            .filter(|item| item.stage > max_stage)
            .map(|item| {
                item.stage = max_stage;
                (item.id.clone(), item.next_review_at)
            })
            .collect();

        let mut state = lock_state(&self.state);
        state.replace(owner, items);
        tracing::info!(owner = %state.owner, epoch = state.epoch, count, store = store.name(), "collection loaded");

        if !clamped.is_empty() {
            tracing::warn!(count = clamped.len(), max_stage, "stages beyond the interval table clamped");
        }
        for (id, next_review_at) in clamped {
            let op = SyncOp::Update {
                epoch: state.epoch,
                id: id.clone(),
                stage: max_stage,
                next_review_at,
                store: Arc::clone(&store),
            };
            self.enqueue(&mut state, &id, op);
        }
        Ok(count)
    }

    /// Wait until every write enqueued so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.queue.send(SyncOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Re-enqueue every item whose last durable write failed. Items that were
    /// never confirmed are created again; the rest get a schedule update.
    pub fn retry_unsynced(&self) -> usize {
        let mut state = lock_state(&self.state);
        let Ok(store) = self.stores.for_owner(&state.owner) else {
            return 0;
        };
        let epoch = state.epoch;
        let owner = state.owner.clone();
        let failed: Vec<MemoryItem> = state
            .items
            .iter()
            .filter(|item| matches!(item.sync, SyncState::Failed(_)))
            .cloned()
            .collect();

        for item in &failed {
            let op = if item.is_provisional() {
                SyncOp::Create {
                    epoch,
                    owner: owner.clone(),
                    provisional_id: item.id.clone(),
                    draft: item.to_draft(),
                    store: Arc::clone(&store),
                }
            } else {
                SyncOp::Update {
                    epoch,
                    id: item.id.clone(),
                    stage: item.stage,
                    next_review_at: item.next_review_at,
                    store: Arc::clone(&store),
                }
            };
            self.enqueue(&mut state, &item.id, op);
        }
        if !failed.is_empty() {
            tracing::info!(count = failed.len(), "retrying unsynced items");
        }
        failed.len()
    }

    fn enqueue(&self, state: &mut SchedulerState, id: &str, op: SyncOp) {
        state.begin_write(id);
        if self.queue.send(op).is_err() {
            tracing::error!(id, "sync queue closed, write dropped");
            state.finish_write(id, Err("sync queue closed".into()));
            if id.starts_with(PROVISIONAL_PREFIX) {
                state.release_provisional(id);
            }
        }
    }
}
