use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use plumbline_core::backend::StaticIdentity;
use plumbline_core::backend::memory::MemoryBackend;
use plumbline_core::filter::{GroupBy, PriorityFilter, TaskQuery};
use plumbline_core::paging::Pagination;
use plumbline_core::store::{StoreError, TaskStore};
use plumbline_core::task::{Category, NewTask, Priority, TaskId, TaskPatch, UserId};
use uuid::Uuid;

type Store = TaskStore<Arc<MemoryBackend>, StaticIdentity>;

fn user() -> UserId {
    UserId(Uuid::from_u128(0x0b6a_3f6e_1111_4c2b_9d9d_1234_5678_9abc))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
}

fn signed_in(backend: &Arc<MemoryBackend>) -> Store {
    TaskStore::new(Arc::clone(backend), StaticIdentity::signed_in(user()))
}

async fn seed(store: &mut Store, texts: &[&str]) -> Vec<TaskId> {
    let mut ids = Vec::new();
    for text in texts {
        ids.push(store.add_task(NewTask::new(*text)).await.unwrap());
    }
    ids
}

fn orders(store: &Store) -> Vec<(String, i64)> {
    store
        .tasks()
        .iter()
        .map(|task| (task.text.clone(), task.order))
        .collect()
}

#[tokio::test]
async fn add_appends_after_highest_order() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);

    seed(&mut store, &["Snake kitchen drain", "Order PEX fittings"]).await;

    assert_eq!(
        orders(&store),
        vec![
            ("Snake kitchen drain".to_string(), 0),
            ("Order PEX fittings".to_string(), 1),
        ]
    );
    assert_eq!(store.next_order(), 2);
}

#[tokio::test]
async fn add_trims_text_and_rejects_blank() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);

    store.add_task(NewTask::new("  Call supplier  ")).await.unwrap();
    assert_eq!(store.tasks()[0].text, "Call supplier");

    let calls = backend.call_count();
    let err = store.add_task(NewTask::new("   ")).await.unwrap_err();
    assert!(matches!(err, StoreError::EmptyText));
    assert_eq!(backend.call_count(), calls);
}

#[tokio::test]
async fn anonymous_user_never_reaches_backend() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = TaskStore::new(Arc::clone(&backend), StaticIdentity::anonymous());

    let err = store.add_task(NewTask::new("Water heater swap")).await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthenticated));

    let err = store.delete_task(TaskId::random()).await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthenticated));

    let err = store.reload().await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthenticated));
    assert!(store.tasks().is_empty());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn backend_failure_leaves_list_untouched() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    seed(&mut store, &["Quote bathroom remodel"]).await;
    let generation = store.generation();

    backend.set_offline(true);
    let err = store.add_task(NewTask::new("Never stored")).await.unwrap_err();

    assert!(matches!(err, StoreError::Backend(_)));
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.generation(), generation);
}

#[tokio::test]
async fn toggle_twice_restores_state() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["Replace shutoff valve"]).await;
    let now = Utc.with_ymd_and_hms(2026, 3, 9, 15, 0, 0).unwrap();

    assert!(store.toggle_task(ids[0], now).await.unwrap());
    let task = store.get(ids[0]).unwrap();
    assert!(task.completed);
    assert_eq!(task.completed_at, Some(now));

    assert!(!store.toggle_task(ids[0], now).await.unwrap());
    let task = store.get(ids[0]).unwrap();
    assert!(!task.completed);
    assert_eq!(task.completed_at, None);
}

#[tokio::test]
async fn toggle_of_unknown_task_is_not_found() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let missing = TaskId::random();

    let err = store.toggle_task(missing, Utc::now()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == missing));
}

#[tokio::test]
async fn update_sends_only_present_fields() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["Warranty claim"]).await;
    let due = NaiveDate::from_ymd_opt(2026, 3, 12).unwrap();

    store
        .update_task(
            ids[0],
            TaskPatch {
                priority: Some(Priority::High),
                category: Some(Category::Custom("Warranty".to_string())),
                due_date: Some(Some(due)),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    let task = store.get(ids[0]).unwrap();
    assert_eq!(task.text, "Warranty claim");
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.category.label(), "Warranty");
    assert_eq!(task.due_date, Some(due));

    store
        .update_task(
            ids[0],
            TaskPatch {
                due_date: Some(None),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(store.get(ids[0]).unwrap().due_date, None);
}

#[tokio::test]
async fn empty_patch_makes_no_call() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["Inspect sump pump"]).await;
    let calls = backend.call_count();

    store.update_task(ids[0], TaskPatch::default()).await.unwrap();
    assert_eq!(backend.call_count(), calls);

    let err = store
        .update_task(
            ids[0],
            TaskPatch {
                text: Some(" ".to_string()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::EmptyText));
    assert_eq!(backend.call_count(), calls);
}

#[tokio::test]
async fn edit_cannot_change_completion() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["Flush water heater"]).await;
    let calls = backend.call_count();

    for patch in [
        TaskPatch {
            completed: Some(true),
            ..TaskPatch::default()
        },
        TaskPatch {
            completed_at: Some(Some(Utc::now())),
            text: Some("Flush tank".to_string()),
            ..TaskPatch::default()
        },
    ] {
        let err = store.update_task(ids[0], patch).await.unwrap_err();
        assert!(matches!(err, StoreError::CompletionNotEditable));
    }
    assert_eq!(backend.call_count(), calls);

    let stored = backend.snapshot();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "Flush water heater");
    assert_eq!(stored[0].completed, stored[0].completed_at.is_some());
    assert!(!stored[0].completed);
}

#[tokio::test]
async fn completion_and_timestamp_always_agree() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["A", "B"]).await;

    store.toggle_task(ids[1], Utc::now()).await.unwrap();
    store
        .update_task(
            ids[1],
            TaskPatch {
                priority: Some(Priority::Low),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    for task in store.tasks() {
        assert_eq!(task.completed, task.completed_at.is_some(), "{}", task.text);
    }
    assert!(store.get(ids[1]).unwrap().completed);
}

#[tokio::test]
async fn delete_removes_and_reloads() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["A", "B"]).await;

    store.delete_task(ids[0]).await.unwrap();
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.tasks()[0].id, ids[1]);

    let err = store.delete_task(ids[0]).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
}

#[tokio::test]
async fn reorder_persists_new_positions() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["A", "B", "C"]).await;

    store.reorder_tasks(&[ids[2], ids[0], ids[1]]).await.unwrap();

    assert_eq!(
        orders(&store),
        vec![
            ("C".to_string(), 0),
            ("A".to_string(), 1),
            ("B".to_string(), 2),
        ]
    );
}

#[tokio::test]
async fn partial_reorder_failure_still_reloads() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["A", "B", "C"]).await;
    backend.fail_updates_for(ids[0]);
    let generation = store.generation();

    let err = store
        .reorder_tasks(&[ids[2], ids[0], ids[1]])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::ReorderIncomplete {
            failed: 1,
            total: 3
        }
    ));
    assert!(store.generation() > generation);
    assert_eq!(store.get(ids[2]).unwrap().order, 0);
    assert_eq!(store.get(ids[0]).unwrap().order, 0);
    assert_eq!(store.get(ids[1]).unwrap().order, 2);
}

#[tokio::test]
async fn stats_follow_reloads() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    let ids = seed(&mut store, &["A", "B", "C", "D", "E"]).await;

    let before = store.stats(today());
    assert_eq!(before.total, 5);
    assert_eq!(before.completion_rate, 0);
    assert_eq!(store.stats(today()), before);

    store.toggle_task(ids[0], Utc::now()).await.unwrap();
    store.toggle_task(ids[1], Utc::now()).await.unwrap();

    let after = store.stats(today());
    assert_eq!(after.completed, 2);
    assert_eq!(after.pending, 3);
    assert_eq!(after.completion_rate, 40);
}

#[tokio::test]
async fn view_filters_the_loaded_list() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = signed_in(&backend);
    store
        .add_task(NewTask::new("Burst pipe on 5th").with_priority(Priority::High))
        .await
        .unwrap();
    store
        .add_task(NewTask::new("File invoices").with_priority(Priority::Low))
        .await
        .unwrap();

    let query = TaskQuery {
        priority: PriorityFilter::Only(Priority::High),
        ..TaskQuery::default()
    };
    let view = store.view(&query, GroupBy::None, Pagination::default(), today());

    let texts: Vec<&str> = view.page_tasks().map(|task| task.text.as_str()).collect();
    assert_eq!(texts, vec!["Burst pipe on 5th"]);
}

#[tokio::test]
async fn other_users_tasks_are_not_listed() {
    let stranger = UserId(Uuid::from_u128(7));
    let backend = Arc::new(MemoryBackend::new());
    let mut theirs = TaskStore::new(Arc::clone(&backend), StaticIdentity::signed_in(stranger));
    theirs.add_task(NewTask::new("Not yours")).await.unwrap();

    let mut store = signed_in(&backend);
    store.reload().await.unwrap();
    assert!(store.tasks().is_empty());
}
