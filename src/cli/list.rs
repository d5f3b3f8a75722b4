use jiyi::memory::Scheduler;

use super::print_item;

/// Print items due now, earliest first.
pub fn due(scheduler: &Scheduler) {
    let due = scheduler.due_items();
    if due.is_empty() {
        println!("Nothing to review right now.");
        return;
    }
    println!("{} item(s) due:", due.len());
    for item in &due {
        print_item(item);
    }
}

/// Print the whole collection in store order.
pub fn list(scheduler: &Scheduler) {
    let items = scheduler.items();
    println!("{} item(s) in {} memory:", items.len(), scheduler.owner());
    for item in &items {
        print_item(item);
    }
}
