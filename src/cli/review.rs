//! CLI `review` and `study` commands.

use anyhow::Result;
use std::io::Write;

use jiyi::memory::{Scheduler, SyncState};

use super::format_time;

/// Record one review result.
pub async fn review(scheduler: &Scheduler, id: &str, remembered: bool) -> Result<()> {
    let item = scheduler.review_item(id, remembered)?;
    scheduler.flush().await;

    if let Some(SyncState::Failed(reason)) = scheduler.get(&item.id).map(|i| i.sync) {
        eprintln!("Warning: review of \"{}\" was not saved: {reason}", item.text);
    }
    println!(
        "\"{}\" is now at stage {}, next review {}.",
        item.text,
        item.stage,
        format_time(item.next_review_at)
    );
    Ok(())
}

/// Show each due item, reveal its translation on Enter and record y/n.
pub async fn study(scheduler: &Scheduler) -> Result<()> {
    let due = scheduler.due_items();
    if due.is_empty() {
        println!("Nothing to review right now.");
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut remembered_count = 0usize;
    let mut reviewed = 0usize;

    for (n, item) in due.iter().enumerate() {
        println!("\n[{}/{}] {}   ({})", n + 1, due.len(), item.text, item.context);
        if let Some(translation) = &item.translation {
            print!("  press Enter to reveal ");
            std::io::stdout().flush()?;
            let mut skip = String::new();
            stdin.read_line(&mut skip)?;
            println!("  {translation}");
        }
        print!("  Remembered? [y/n/q]: ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        if stdin.read_line(&mut answer)? == 0 {
            break;
        }
        let remembered = match answer.trim() {
            "q" | "Q" => break,
            "y" | "Y" => true,
            _ => false,
        };

        let updated = scheduler.review_item(&item.id, remembered)?;
        reviewed += 1;
        if remembered {
            remembered_count += 1;
        }
        println!("  → stage {}, next review {}", updated.stage, format_time(updated.next_review_at));
    }

    scheduler.flush().await;
    if scheduler.stats().unsynced > 0 {
        let retried = scheduler.retry_unsynced();
        scheduler.flush().await;
        tracing::info!(retried, "retried unsynced reviews");
    }

    let unsynced = scheduler.stats().unsynced;
    println!("\nReviewed {reviewed} item(s), remembered {remembered_count}.");
    if unsynced > 0 {
        eprintln!("Warning: {unsynced} review(s) could not be saved.");
    }
    Ok(())
}
