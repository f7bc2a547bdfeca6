//! Integration tests for the hosted persistence client against a mock REST API

mod helpers;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use helpers::{session_for, spawn_server};
use retiscan_common::{ConfidenceScores, DrClass, NewPrediction, PredictionId};
use retiscan_ui::hosted::HostedClient;
use retiscan_ui::persistence::{HostedStore, PredictionStore, StoreError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ANON_KEY: &str = "anon-test-key";

#[derive(Default)]
struct Table {
    rows: Vec<Value>,
    next_id: u32,
    queries: Vec<HashMap<String, String>>,
}

type Db = Arc<Mutex<Table>>;

/// Token `tok-<user>` belongs to `<user>`; anything else is rejected
fn caller(headers: &HeaderMap) -> Option<String> {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY) {
        return None;
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer tok-"))
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT expired"}))).into_response()
}

fn eq_filter<'a>(params: &'a HashMap<String, String>, column: &str) -> Option<&'a str> {
    params.get(column).and_then(|v| v.strip_prefix("eq."))
}

/// The `id` column is a uuid; filtering on anything else is a cast error
fn invalid_id(params: &HashMap<String, String>) -> Option<Response> {
    let id = eq_filter(params, "id")?;
    if uuid::Uuid::parse_str(id).is_ok() {
        return None;
    }
    let body = json!({
        "code": "22P02",
        "details": null,
        "hint": null,
        "message": format!("invalid input syntax for type uuid: \"{}\"", id),
    });
    Some((StatusCode::BAD_REQUEST, Json(body)).into_response())
}

/// Row-level security: callers only ever see their own rows
fn visible(row: &Value, user: &str) -> bool {
    row["user_id"] == user
}

async fn select(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(user) = caller(&headers) else { return unauthorized() };
    if let Some(rejected) = invalid_id(&params) {
        return rejected;
    }
    let mut table = db.lock().unwrap();
    table.queries.push(params.clone());

    let mut rows: Vec<Value> = table
        .rows
        .iter()
        .filter(|r| visible(r, &user))
        .filter(|r| eq_filter(&params, "id").map_or(true, |id| r["id"] == id))
        .filter(|r| eq_filter(&params, "user_id").map_or(true, |u| r["user_id"] == u))
        .cloned()
        .collect();
    if params.get("order").map(String::as_str) == Some("created_at.desc") {
        rows.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
    }
    Json(rows).into_response()
}

async fn insert(State(db): State<Db>, headers: HeaderMap, Json(mut row): Json<Value>) -> Response {
    let Some(user) = caller(&headers) else { return unauthorized() };
    if row["user_id"] != user.as_str() {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "new row violates row-level security policy"})))
            .into_response();
    }

    let mut table = db.lock().unwrap();
    table.next_id += 1;
    let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
        + ChronoDuration::minutes(i64::from(table.next_id));
    row["id"] = json!(format!("00000000-0000-4000-8000-{:012}", table.next_id));
    row["created_at"] = json!(created_at.to_rfc3339());
    table.rows.push(row.clone());

    (StatusCode::CREATED, Json(json!([row]))).into_response()
}

async fn remove(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(user) = caller(&headers) else { return unauthorized() };
    let Some(id) = eq_filter(&params, "id") else {
        return (StatusCode::BAD_REQUEST, "missing filter").into_response();
    };
    if let Some(rejected) = invalid_id(&params) {
        return rejected;
    }

    let mut table = db.lock().unwrap();
    let (removed, kept): (Vec<Value>, Vec<Value>) =
        table.rows.drain(..).partition(|r| visible(r, &user) && r["id"] == id);
    table.rows = kept;
    Json(removed).into_response()
}

async fn setup() -> (HostedStore, Db) {
    let db: Db = Arc::default();
    let router = Router::new()
        .route("/rest/v1/predictions", get(select).post(insert).delete(remove))
        .with_state(db.clone());
    let url = spawn_server(router).await;

    let client = HostedClient::new(&url, ANON_KEY, Duration::from_secs(5)).unwrap();
    (HostedStore::new(client), db)
}

fn record(owner: &str, class: u8) -> NewPrediction {
    NewPrediction {
        owner: owner.to_string(),
        class: DrClass::from_index(class.into()).unwrap(),
        confidence_scores: ConfidenceScores::from_pairs([(0, 0.05), (1, 0.15), (2, 0.65), (3, 0.12), (4, 0.03)])
            .unwrap(),
        source_image: "data:image/png;base64,iVBORw0KGgo=".to_string(),
        attention_map_image: "data:image/png;base64,R0lGOD==".to_string(),
        explanation: "Moderate NPDR".to_string(),
    }
}

#[tokio::test]
async fn test_insert_then_get_returns_equal_record() {
    let (store, _) = setup().await;
    let session = session_for("u1", "tok-u1");

    let new = record("u1", 2);
    let stored = store.insert(&session, &new).await.unwrap();
    assert!(!stored.id.as_str().is_empty());
    assert_eq!(stored.content(), new);

    let fetched = store.get_by_id(&session, &stored.id).await.unwrap();
    assert_eq!(fetched, stored);
}

#[tokio::test]
async fn test_list_is_owner_scoped_and_newest_first() {
    let (store, db) = setup().await;
    let alice = session_for("u1", "tok-u1");
    let bob = session_for("u2", "tok-u2");

    let first = store.insert(&alice, &record("u1", 0)).await.unwrap();
    store.insert(&bob, &record("u2", 4)).await.unwrap();
    let second = store.insert(&alice, &record("u1", 3)).await.unwrap();

    let listed = store.list_by_owner(&alice).await.unwrap();
    let ids: Vec<&PredictionId> = listed.iter().map(|p| &p.id).collect();
    assert_eq!(ids, vec![&second.id, &first.id]);

    let query = db.lock().unwrap().queries.last().cloned().unwrap();
    assert_eq!(query.get("user_id").map(String::as_str), Some("eq.u1"));
    assert_eq!(query.get("order").map(String::as_str), Some("created_at.desc"));
    assert_eq!(query.get("select").map(String::as_str), Some("*"));
}

#[tokio::test]
async fn test_delete_removes_from_listing() {
    let (store, _) = setup().await;
    let session = session_for("u1", "tok-u1");
    let stored = store.insert(&session, &record("u1", 1)).await.unwrap();

    store.delete_by_id(&session, &stored.id).await.unwrap();

    assert!(store.list_by_owner(&session).await.unwrap().is_empty());
    assert!(matches!(
        store.get_by_id(&session, &stored.id).await,
        Err(StoreError::NotFound(id)) if id == stored.id
    ));
}

#[tokio::test]
async fn test_delete_unknown_or_foreign_id() {
    let (store, db) = setup().await;
    let alice = session_for("u1", "tok-u1");
    let bob = session_for("u2", "tok-u2");
    let stored = store.insert(&alice, &record("u1", 1)).await.unwrap();

    let missing = store.delete_by_id(&alice, &PredictionId::new("no-such-id")).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    let foreign = store.delete_by_id(&bob, &stored.id).await;
    assert!(matches!(foreign, Err(StoreError::NotFound(_))));
    assert_eq!(db.lock().unwrap().rows.len(), 1);
}

#[tokio::test]
async fn test_malformed_id_is_not_found() {
    let (store, _) = setup().await;
    let session = session_for("u1", "tok-u1");
    store.insert(&session, &record("u1", 2)).await.unwrap();

    let id = PredictionId::new("42");
    assert!(matches!(
        store.get_by_id(&session, &id).await,
        Err(StoreError::NotFound(missing)) if missing == id
    ));

    let unused = PredictionId::new("00000000-0000-4000-8000-999999999999");
    assert!(matches!(store.get_by_id(&session, &unused).await, Err(StoreError::NotFound(_))));
    assert_eq!(store.list_by_owner(&session).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_token() {
    let (store, _) = setup().await;
    let expired = session_for("u1", "stale");

    let result = store.list_by_owner(&expired).await;
    assert!(matches!(result, Err(StoreError::Unauthorized(msg)) if msg == "JWT expired"));
}

#[tokio::test]
async fn test_insert_for_other_user_refused_locally() {
    let (store, db) = setup().await;
    let session = session_for("u1", "tok-u1");

    let result = store.insert(&session, &record("u2", 1)).await;
    assert!(matches!(result, Err(StoreError::OwnerMismatch)));
    assert!(db.lock().unwrap().rows.is_empty());
}
