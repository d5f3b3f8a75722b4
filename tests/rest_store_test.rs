//! RestStore against an in-process PostgREST stand-in.

mod helpers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use helpers::{draft, TestClock, NOW};
use jiyi::error::StoreError;
use jiyi::memory::{Owner, Scheduler, StoreSet, SyncState};
use jiyi::store::{RestStore, Store};

const API_KEY: &str = "anon-key";
const TOKEN: &str = "user-token";

#[derive(Clone, Default)]
struct Db {
    rows: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<Mutex<i64>>,
}

type Params = Query<HashMap<String, String>>;

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {TOKEN}");
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(API_KEY)
        && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(bearer.as_str())
}

fn eq_filter<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.strip_prefix("eq."))
}

fn field_eq(row: &Value, key: &str, expected: &str) -> bool {
    match &row[key] {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

async fn list(State(db): State<Db>, headers: HeaderMap, Query(params): Params) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT invalid"})));
    }
    let user = eq_filter(&params, "user_id").unwrap_or_default();
    let mut rows: Vec<Value> = db
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|row| field_eq(row, "user_id", user))
        .cloned()
        .collect();
    rows.sort_by_key(|row| row["next_review_at"].as_i64());
    (StatusCode::OK, Json(Value::Array(rows)))
}

async fn insert(State(db): State<Db>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT invalid"})));
    }
    let incoming = match body {
        Value::Array(rows) => rows,
        row => vec![row],
    };
    let mut inserted = Vec::new();
    for mut row in incoming {
        if row["text"].as_str().map_or(true, str::is_empty) {
            return (StatusCode::BAD_REQUEST, Json(json!({"message": "text required"})));
        }
        let mut next_id = db.next_id.lock().unwrap();
        *next_id += 1;
        row["id"] = json!(*next_id);
        if row.get("created_at").is_none() {
            row["created_at"] = json!("2024-05-01T00:00:00+00:00");
        }
        inserted.push(row);
    }
    db.rows.lock().unwrap().extend(inserted.clone());

    let wants_rows = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"));
    if wants_rows {
        (StatusCode::CREATED, Json(Value::Array(inserted)))
    } else {
        (StatusCode::CREATED, Json(Value::Null))
    }
}

async fn patch(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT invalid"})));
    }
    let id = eq_filter(&params, "id").unwrap_or_default();
    let mut rows = db.rows.lock().unwrap();
    let mut updated = Vec::new();
    for row in rows.iter_mut().filter(|row| field_eq(row, "id", id)) {
        if let (Some(target), Some(fields)) = (row.as_object_mut(), body.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        updated.push(row.clone());
    }
    (StatusCode::OK, Json(Value::Array(updated)))
}

async fn delete(State(db): State<Db>, headers: HeaderMap, Query(params): Params) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let user = eq_filter(&params, "user_id").unwrap_or_default().to_string();
    db.rows.lock().unwrap().retain(|row| !field_eq(row, "user_id", &user));
    StatusCode::NO_CONTENT
}

async fn serve() -> (String, Db) {
    let db = Db::default();
    let app = Router::new()
        .route("/rest/v1/memory_items", get(list).post(insert).patch(patch).delete(delete))
        .with_state(db.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), db)
}

#[tokio::test]
async fn create_list_and_update_round_trip() {
    let (url, _) = serve().await;
    let store = RestStore::new(&url, API_KEY, TOKEN);
    let owner = Owner::cloud("acct-1");

    let created = store
        .create_item(&owner, &draft("电脑", "Chat", 0, 500))
        .await
        .unwrap();
    assert_eq!(created.id, "1");
    assert_eq!(created.added_at, NOW - helpers::DAY);

    store.update_item(&created.id, 3, 900).await.unwrap();

    let items = store.list_items(&owner).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "电脑");
    assert_eq!(items[0].stage, 3);
    assert_eq!(items[0].next_review_at, 900);
    assert_eq!(items[0].sync, SyncState::Synced);
}

#[tokio::test]
async fn update_of_unknown_item_fails() {
    let (url, _) = serve().await;
    let store = RestStore::new(&url, API_KEY, TOKEN);
    let err = store.update_item("404", 1, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::Write(msg) if msg.contains("404")));
}

#[tokio::test]
async fn bulk_create_and_clear_are_scoped_to_the_account() {
    let (url, db) = serve().await;
    let store = RestStore::new(&url, API_KEY, TOKEN);
    let alice = Owner::cloud("alice");
    let bob = Owner::cloud("bob");

    store
        .bulk_create(&alice, &[draft("一", "PDF", 0, 3), draft("二", "PDF", 1, 1)])
        .await
        .unwrap();
    store.bulk_create(&bob, &[draft("三", "PDF", 0, 2)]).await.unwrap();
    assert_eq!(db.rows.lock().unwrap().len(), 3);

    let texts: Vec<String> = store
        .list_items(&alice)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.text)
        .collect();
    assert_eq!(texts, vec!["二", "一"]);

    store.clear(&alice).await.unwrap();
    assert!(store.list_items(&alice).await.unwrap().is_empty());
    assert_eq!(store.list_items(&bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_credentials_surface_as_store_errors() {
    let (url, _) = serve().await;
    let store = RestStore::new(&url, API_KEY, "expired");

    let err = store.list_items(&Owner::cloud("acct")).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(msg) if msg.contains("401")));
    let err = store
        .create_item(&Owner::cloud("acct"), &draft("字", "Chat", 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Write(_)));
}

#[tokio::test]
async fn scheduler_syncs_through_remote_store() {
    let (url, db) = serve().await;
    let cloud = Arc::new(RestStore::new(&url, API_KEY, TOKEN));
    let scheduler = Scheduler::new(StoreSet::with_cloud(helpers::sqlite_store(), cloud))
        .with_clock(TestClock::at(NOW).clock());
    scheduler.load_owner_collection(Owner::cloud("acct-9")).await.unwrap();

    let item = scheduler.add_item("熊猫", Some("Culture"), None).unwrap();
    scheduler.review_item(&item.id, true).unwrap();
    scheduler.flush().await;

    let items = scheduler.items();
    assert_eq!(items[0].id, "1");
    assert_eq!(items[0].sync, SyncState::Synced);
    let rows = db.rows.lock().unwrap();
    assert_eq!(rows[0]["user_id"], "acct-9");
    assert_eq!(rows[0]["stage"], 1);
}
