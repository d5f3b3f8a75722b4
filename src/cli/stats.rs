use jiyi::memory::Scheduler;

use super::format_time;

/// Display collection statistics in the terminal.
pub fn stats(scheduler: &Scheduler) {
    let stats = scheduler.stats();
    let intervals = scheduler.intervals();

    println!("Memory Statistics ({})", stats.owner);
    println!("{}", "=".repeat(40));
    println!("  Total items:         {}", stats.total);
    println!("  Due now:             {}", stats.due);
    println!();

    println!("By Stage:");
    for (stage, count) in stats.by_stage.iter().enumerate() {
        let days = intervals.interval_ms(stage) / jiyi::memory::types::DAY_MS;
        println!("  {stage} ({days:>2} d)       {count}");
    }
    println!();

    if let Some(next) = stats.next_review_at {
        println!("Next review:           {}", format_time(next));
    }
}
