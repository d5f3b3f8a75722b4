//! Sync queue: a single worker that applies optimistic changes to their store
//! in submission order.
//!
//! Every write goes through one FIFO channel, so writes for the same item can
//! never overtake each other. A schedule update for an item that still carries
//! a provisional id is redirected to the canonical id its create returned.
//! Results tagged with an epoch older than the scheduler's current one belong
//! to a previous owner and are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::StoreError;
use crate::memory::scheduler::{lock_state, SchedulerState};
use crate::memory::types::{ItemDraft, MemoryItem, Owner, PROVISIONAL_PREFIX};
use crate::store::Store;

/// Which durable write an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Create,
    Update,
}

/// Outcome of a durable write, published to [`Scheduler::subscribe`](crate::memory::Scheduler::subscribe) receivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Created { provisional_id: String, id: String },
    Updated { id: String },
    Failed { id: String, kind: WriteKind, error: String },
}

pub(crate) enum SyncOp {
    Create {
        epoch: u64,
        owner: Owner,
        provisional_id: String,
        draft: ItemDraft,
        store: Arc<dyn Store>,
    },
    Update {
        epoch: u64,
        id: String,
        stage: usize,
        next_review_at: i64,
        store: Arc<dyn Store>,
    },
    Flush(oneshot::Sender<()>),
}

pub(crate) fn spawn_worker(
    state: Arc<Mutex<SchedulerState>>,
    events: broadcast::Sender<SyncEvent>,
) -> mpsc::UnboundedSender<SyncOp> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rx, state, events));
    tx
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<SyncOp>,
    state: Arc<Mutex<SchedulerState>>,
    events: broadcast::Sender<SyncEvent>,
) {
    // provisional id -> canonical id, or the reason its create failed
    let mut created: HashMap<String, Result<String, String>> = HashMap::new();

    while let Some(op) = rx.recv().await {
        let event = match op {
            SyncOp::Flush(done) => {
                let _ = done.send(());
                None
            }
            SyncOp::Create {
                epoch,
                owner,
                provisional_id,
                draft,
                store,
            } => {
                let outcome = store.create_item(&owner, &draft).await;
                created.insert(
                    provisional_id.clone(),
                    outcome
                        .as_ref()
                        .map(|item| item.id.clone())
                        .map_err(|e| e.to_string()),
                );
                let event = apply_create(&state, epoch, &provisional_id, outcome);
                forget_if_unreferenced(&state, &mut created, &provisional_id);
                event
            }
            SyncOp::Update {
                epoch,
                id,
                stage,
                next_review_at,
                store,
            } => {
                let target = resolve(&created, &id);
                let outcome = match &target {
                    Ok(target) => store
                        .update_item(target, stage, next_review_at)
                        .await
                        .map_err(|e| e.to_string()),
                    Err(reason) => Err(reason.clone()),
                };
                let event = apply_update(&state, epoch, &id, target.ok(), outcome);
                if id.starts_with(PROVISIONAL_PREFIX) {
                    forget_if_unreferenced(&state, &mut created, &id);
                }
                event
            }
        };

        if let Some(event) = event {
            let _ = events.send(event);
        }
    }
    tracing::debug!("sync queue closed");
}

/// The store id an update for `id` should target.
fn resolve(created: &HashMap<String, Result<String, String>>, id: &str) -> Result<String, String> {
    if !id.starts_with(PROVISIONAL_PREFIX) {
        return Ok(id.to_string());
    }
    match created.get(id) {
        Some(Ok(canonical)) => Ok(canonical.clone()),
        Some(Err(reason)) => Err(format!("item was never created: {reason}")),
        None => Err("item was never created".into()),
    }
}

/// Drop the id mapping for `provisional_id` once no queued op still uses it.
fn forget_if_unreferenced(
    state: &Mutex<SchedulerState>,
    created: &mut HashMap<String, Result<String, String>>,
    provisional_id: &str,
) {
    if lock_state(state).release_provisional(provisional_id) {
        created.remove(provisional_id);
    }
}

fn apply_create(
    state: &Mutex<SchedulerState>,
    epoch: u64,
    provisional_id: &str,
    outcome: Result<MemoryItem, StoreError>,
) -> Option<SyncEvent> {
    let mut state = lock_state(state);
    if state.epoch != epoch {
        tracing::debug!(provisional_id, "dropping create result from previous owner");
        return None;
    }

    match outcome {
        Ok(stored) => {
            state.reconcile(provisional_id, &stored.id, stored.added_at);
            state.finish_write(&stored.id, Ok(()));
            tracing::debug!(provisional_id, id = %stored.id, "create confirmed");
            Some(SyncEvent::Created {
                provisional_id: provisional_id.to_string(),
                id: stored.id,
            })
        }
        Err(e) => {
            let error = e.to_string();
            tracing::warn!(provisional_id, %error, "create failed, item left unsynced");
            state.finish_write(provisional_id, Err(error.clone()));
            Some(SyncEvent::Failed {
                id: provisional_id.to_string(),
                kind: WriteKind::Create,
                error,
            })
        }
    }
}

fn apply_update(
    state: &Mutex<SchedulerState>,
    epoch: u64,
    queued_id: &str,
    target: Option<String>,
    outcome: Result<(), String>,
) -> Option<SyncEvent> {
    let mut state = lock_state(state);
    if state.epoch != epoch {
        tracing::debug!(id = queued_id, "dropping update result from previous owner");
        return None;
    }

    // The item carries its canonical id by now if its create went through.
    let id = match target {
        Some(target) if state.contains(&target) => target,
        _ => queued_id.to_string(),
    };

    match outcome {
        Ok(()) => {
            state.finish_write(&id, Ok(()));
            Some(SyncEvent::Updated { id })
        }
        Err(error) => {
            tracing::warn!(%id, %error, "update failed, item left unsynced");
            state.finish_write(&id, Err(error.clone()));
            Some(SyncEvent::Failed {
                id,
                kind: WriteKind::Update,
                error,
            })
        }
    }
}
