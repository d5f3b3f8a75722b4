//! CLI `add` command: capture a phrase into the active collection.

use anyhow::{bail, Result};

use jiyi::memory::{Scheduler, SyncEvent};

pub async fn add(
    scheduler: &Scheduler,
    text: &str,
    context: Option<&str>,
    translation: Option<&str>,
) -> Result<()> {
    let mut events = scheduler.subscribe();
    let item = scheduler.add_item(text, context, translation)?;
    scheduler.flush().await;

    while let Ok(event) = events.try_recv() {
        match event {
            SyncEvent::Created { provisional_id, id } if provisional_id == item.id => {
                println!(
                    "Added \"{}\" to {} memory (id {id}), first review {}.",
                    item.text,
                    scheduler.owner(),
                    super::format_time(item.next_review_at)
                );
                return Ok(());
            }
            SyncEvent::Failed { id, error, .. } if id == item.id => {
                bail!("\"{}\" was not saved: {error}", item.text);
            }
            _ => {}
        }
    }
    bail!("\"{}\" was not confirmed by the store", item.text)
}
