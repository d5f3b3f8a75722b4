mod helpers;

use helpers::{local_scheduler, NOW, DAY};
use jiyi::error::SchedulerError;
use jiyi::memory::schedule::IntervalTable;
use jiyi::memory::{Owner, SyncState};
use jiyi::store::Store;

#[tokio::test]
async fn capture_creates_stage_zero_item_due_tomorrow() {
    let (scheduler, _, _) = local_scheduler();

    let item = scheduler.capture("加油", Some("Chat")).unwrap();

    assert_eq!(item.stage, 0);
    assert_eq!(item.added_at, NOW);
    assert_eq!(item.next_review_at, NOW + DAY);
    assert_eq!(item.context, "Chat");
    assert!(item.is_provisional());
    assert_eq!(item.sync, SyncState::Pending);
    assert_eq!(scheduler.items().len(), 1);
}

#[tokio::test]
async fn remembered_reviews_climb_and_plateau() {
    let (scheduler, _, clock) = local_scheduler();
    let id = scheduler.add_item("马马虎虎", None, None).unwrap().id;
    let days = IntervalTable::DEFAULT_DAYS;

    for expected in 1..=6usize {
        clock.advance(DAY);
        let reviewed_at = scheduler.now();
        let item = scheduler.review_item(&id, true).unwrap();
        let stage = expected.min(4);
        assert_eq!(item.stage, stage, "review #{expected}");
        assert_eq!(
            item.next_review_at - reviewed_at,
            i64::from(days[stage]) * DAY,
            "interval after review #{expected}"
        );
    }
}

#[tokio::test]
async fn forgetting_resets_to_stage_zero() {
    let (scheduler, _, clock) = local_scheduler();
    let id = scheduler.add_item("一举两得", Some("Culture"), None).unwrap().id;
    for _ in 0..3 {
        scheduler.review_item(&id, true).unwrap();
    }
    assert_eq!(scheduler.get(&id).unwrap().stage, 3);

    clock.advance(3 * DAY);
    let item = scheduler.review_item(&id, false).unwrap();
    assert_eq!(item.stage, 0);
    assert_eq!(item.next_review_at, NOW + 3 * DAY + DAY);
}

#[tokio::test]
async fn due_items_include_boundary_and_exclude_future() {
    let (scheduler, store, _) = local_scheduler();
    store
        .bulk_create(
            &Owner::Local,
            &[
                helpers::draft("早", "General", 0, NOW - 1000),
                helpers::draft("现在", "General", 1, NOW),
                helpers::draft("以后", "General", 2, NOW + 1000),
            ],
        )
        .await
        .unwrap();
    scheduler.load_owner_collection(Owner::Local).await.unwrap();

    let due: Vec<String> = scheduler.due_items().into_iter().map(|i| i.text).collect();
    assert_eq!(due, vec!["早", "现在"]);
}

#[tokio::test]
async fn due_query_is_idempotent() {
    let (scheduler, _, clock) = local_scheduler();
    scheduler.add_item("谢谢", None, None).unwrap();
    scheduler.add_item("不客气", None, None).unwrap();
    clock.advance(2 * DAY);

    let first = scheduler.due_items();
    let second = scheduler.due_items();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(scheduler.items().len(), 2);
}

#[tokio::test]
async fn due_items_are_sorted_earliest_first() {
    let (scheduler, _, clock) = local_scheduler();
    let a = scheduler.add_item("甲", None, None).unwrap().id;
    clock.advance(1000);
    let b = scheduler.add_item("乙", None, None).unwrap().id;
    // Push `a` a stage up so it comes due after `b`.
    scheduler.review_item(&a, true).unwrap();

    let due = scheduler.due_items_at(NOW + 10 * DAY);
    assert_eq!(due[0].id, b);
    assert_eq!(due[1].id, a);
}

#[tokio::test]
async fn unknown_id_is_not_found_and_state_is_untouched() {
    let (scheduler, _, _) = local_scheduler();
    scheduler.add_item("你好", None, None).unwrap();
    let before = scheduler.items();

    let err = scheduler.review_item("missing", true).unwrap_err();
    assert_eq!(err, SchedulerError::NotFound("missing".into()));
    assert_eq!(scheduler.items(), before);
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let (scheduler, _, _) = local_scheduler();
    assert!(matches!(
        scheduler.add_item("\n\t ", None, None),
        Err(SchedulerError::Validation(_))
    ));
    assert!(scheduler.items().is_empty());
}

#[tokio::test]
async fn custom_interval_table_is_used() {
    let (scheduler, _, _) = local_scheduler();
    let scheduler = scheduler.with_intervals(IntervalTable::new(vec![3, 10]).unwrap());
    let id = scheduler.add_item("茶", None, None).unwrap().id;
    assert_eq!(scheduler.get(&id).unwrap().next_review_at, NOW + 3 * DAY);

    let item = scheduler.review_item(&id, true).unwrap();
    assert_eq!(item.stage, 1);
    let item = scheduler.review_item(&id, true).unwrap();
    assert_eq!(item.stage, 1);
    assert_eq!(item.next_review_at, NOW + 10 * DAY);
}

#[tokio::test]
async fn stats_reflect_collection() {
    let (scheduler, _, clock) = local_scheduler();
    let id = scheduler.add_item("朋友", None, None).unwrap().id;
    scheduler.add_item("老师", None, None).unwrap();
    scheduler.review_item(&id, true).unwrap();
    scheduler.flush().await;
    clock.advance(DAY);

    let stats = scheduler.stats();
    assert_eq!(stats.owner, "local");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.due, 1);
    assert_eq!(stats.by_stage, vec![1, 1, 0, 0, 0]);
    assert_eq!(stats.unsynced, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.next_review_at, Some(NOW + 2 * DAY));
}

#[tokio::test]
async fn loading_under_a_shorter_table_clamps_stages() {
    let (scheduler, store, clock) = local_scheduler();
    let scheduler = scheduler.with_intervals(IntervalTable::new(vec![1, 2]).unwrap());
    store
        .bulk_create(&Owner::Local, &[helpers::draft("老", "Chat", 4, NOW)])
        .await
        .unwrap();

    scheduler.load_owner_collection(Owner::Local).await.unwrap();
    let item = scheduler.items().remove(0);
    assert_eq!(item.stage, 1);
    assert_eq!(item.next_review_at, NOW);

    scheduler.flush().await;
    assert_eq!(scheduler.get(&item.id).unwrap().sync, SyncState::Synced);
    assert_eq!(store.list_items(&Owner::Local).await.unwrap()[0].stage, 1);

    let stats = scheduler.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_stage, vec![0, 1]);

    clock.advance(1);
    let reviewed = scheduler.review_item(&item.id, true).unwrap();
    assert_eq!(reviewed.stage, 1);
    assert_eq!(reviewed.next_review_at, NOW + 1 + 2 * DAY);
}
