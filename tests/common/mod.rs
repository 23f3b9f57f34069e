//! In-process stand-in for the hosted realtime database.
//!
//! Speaks enough of the service's client protocol for the tests: JSON
//! reads and writes on `/{path}.json`, push keys on POST, and a
//! `text/event-stream` channel with `put` frames, all guarded by the
//! `auth` query parameter.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, RwLock};

use rolodex::ServiceConfig;

pub const API_KEY: &str = "test-secret";

#[derive(Clone)]
struct ServiceState {
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
    changes: broadcast::Sender<(String, Value)>,
    next_key: Arc<AtomicU64>,
}

pub struct TestService {
    pub url: String,
}

impl TestService {
    /// Configuration pointing at this stand-in.
    pub fn config(&self) -> ServiceConfig {
        ServiceConfig {
            api_key: API_KEY.to_string(),
            auth_domain: "stand-in.firebaseapp.com".to_string(),
            database_url: self.url.clone(),
            project_id: "stand-in".to_string(),
            storage_bucket: "stand-in.appspot.com".to_string(),
            messaging_sender_id: "0".to_string(),
        }
    }

    /// Same service, wrong credentials.
    pub fn bad_config(&self) -> ServiceConfig {
        ServiceConfig {
            api_key: "wrong-secret".to_string(),
            ..self.config()
        }
    }
}

/// Starts the stand-in on an ephemeral port.
pub async fn spawn() -> TestService {
    let (changes, _) = broadcast::channel(1024);
    let state = ServiceState {
        entries: Arc::new(RwLock::new(BTreeMap::new())),
        changes,
        next_key: Arc::new(AtomicU64::new(0)),
    };

    let app = Router::new()
        .route(
            "/{*path}",
            get(handle_get)
                .post(handle_post)
                .put(handle_put)
                .delete(handle_delete),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestService {
        url: format!("http://{}", addr),
    }
}

fn authorized(params: &HashMap<String, String>) -> bool {
    params.get("auth").map(|a| a == API_KEY).unwrap_or(false)
}

fn denied() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Permission denied"})),
    )
        .into_response()
}

/// Splits "customers/X1.json" into its path segments, or None when the
/// ".json" suffix is missing.
fn segments(path: &str) -> Option<Vec<&str>> {
    let path = path.strip_suffix(".json")?;
    Some(path.split('/').filter(|s| !s.is_empty()).collect())
}

async fn handle_get(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&params) {
        return denied();
    }
    let Some(segments) = segments(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let wants_stream = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);

    match segments.as_slice() {
        ["customers"] if wants_stream => stream_response(&state).await,
        ["customers"] => {
            let entries = state.entries.read().await;
            Json(collection_value(&entries)).into_response()
        }
        ["customers", id] => {
            let entries = state.entries.read().await;
            Json(entries.get(*id).cloned().unwrap_or(Value::Null)).into_response()
        }
        _ => Json(Value::Null).into_response(),
    }
}

async fn handle_post(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&params) {
        return denied();
    }
    if !matches!(segments(&path).as_deref(), Some(["customers"])) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let n = state.next_key.fetch_add(1, Ordering::SeqCst) + 1;
    let id = format!("-K{:06}", n);
    state.entries.write().await.insert(id.clone(), body.clone());
    let _ = state.changes.send((format!("/{}", id), body));

    Json(json!({ "name": id })).into_response()
}

async fn handle_put(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&params) {
        return denied();
    }
    let Some(segments) = segments(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let ["customers", id] = segments.as_slice() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    state
        .entries
        .write()
        .await
        .insert(id.to_string(), body.clone());
    let _ = state.changes.send((format!("/{}", id), body.clone()));

    Json(body).into_response()
}

async fn handle_delete(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&params) {
        return denied();
    }
    let Some(segments) = segments(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let ["customers", id] = segments.as_slice() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let removed = state.entries.write().await.remove(*id);
    if removed.is_some() {
        let _ = state.changes.send((format!("/{}", id), Value::Null));
    }

    Json(Value::Null).into_response()
}

/// Absent data is `null`, never an empty object.
fn collection_value(entries: &BTreeMap<String, Value>) -> Value {
    if entries.is_empty() {
        Value::Null
    } else {
        Value::Object(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>())
    }
}

async fn stream_response(state: &ServiceState) -> Response {
    // subscribe before snapshotting so no write lands between the two
    let rx = state.changes.subscribe();
    let snapshot = {
        let entries = state.entries.read().await;
        collection_value(&entries)
    };

    let initial = Event::default()
        .event("put")
        .data(json!({"path": "/", "data": snapshot}).to_string());

    let live = futures::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok((path, data)) => {
                let event = Event::default()
                    .event("put")
                    .data(json!({"path": path, "data": data}).to_string());
                Some((Ok::<_, Infallible>(event), rx))
            }
            Err(_) => None,
        }
    });

    let stream = futures::stream::once(async move { Ok(initial) }).chain(live);
    Sse::new(stream).into_response()
}
