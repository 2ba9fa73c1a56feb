//! In-process fake of the media storage REST API.
//!
//! Routes mirror the real service under `/v1/media`:
//! - `GET    /v1/media`                      list (`limit`, `after`)
//! - `POST   /v1/media`                      upload (`image/jpeg` body)
//! - `POST   /v1/media/search`               search by user meta value
//! - `GET    /v1/media/{id}`                 info (`DELETE` removes)
//! - `GET    /v1/media/{id}/content`         raw bytes
//! - `GET    /v1/media/{id}/meta`            all namespaces
//! - `GET    /v1/media/{id}/meta/{ns}`       one namespace (`DELETE` for `user`)
//! - `GET    /v1/media/{id}/meta/{ns}/{key}` one user key as text (`PUT`, `DELETE`)
//!
//! Every request must carry `Authorization: Bearer test-token`.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

pub const TOKEN: &str = "test-token";

/// Id whose info endpoint answers 200 with a body that is not JSON.
pub const CORRUPT_ID: &str = "corrupt-info";

struct StoredMedia {
    content_type: String,
    data: Bytes,
    created_at: String,
    user: BTreeMap<String, String>,
}

#[derive(Default)]
struct Store {
    order: Vec<String>,
    media: HashMap<String, StoredMedia>,
    last_search: Option<Value>,
    last_query: Option<HashMap<String, String>>,
}

#[derive(Clone, Default)]
pub struct FakeMediaService {
    store: Arc<Mutex<Store>>,
    hits: Arc<AtomicUsize>,
}

impl FakeMediaService {
    /// Requests received so far, authorized or not.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_search(&self) -> Option<Value> {
        self.store.lock().unwrap().last_search.clone()
    }

    pub fn last_query(&self) -> Option<HashMap<String, String>> {
        self.store.lock().unwrap().last_query.clone()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let expected = format!("Bearer {}", TOKEN);
        match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => Ok(()),
            _ => Err(error(StatusCode::UNAUTHORIZED, "invalid access token")),
        }
    }
}

/// Start the fake on an ephemeral port and return its media endpoint.
pub async fn spawn() -> (String, FakeMediaService) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let service = FakeMediaService::default();
    let app = routes().with_state(service.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1/media", addr), service)
}

fn routes() -> Router<FakeMediaService> {
    Router::new()
        .route("/v1/media", get(list_media).post(upload_media))
        .route("/v1/media/search", post(search_media))
        .route("/v1/media/{id}", get(media_info).delete(delete_media))
        .route("/v1/media/{id}/content", get(media_content))
        .route("/v1/media/{id}/meta", get(media_meta))
        .route(
            "/v1/media/{id}/meta/{ns}",
            get(meta_namespace).delete(delete_user_namespace),
        )
        .route(
            "/v1/media/{id}/meta/{ns}/{key}",
            get(user_meta_value)
                .put(put_user_meta_value)
                .delete(delete_user_meta_value),
        )
}

fn error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg, "status": status.as_u16() }))).into_response()
}

fn not_found(id: &str) -> Response {
    error(StatusCode::NOT_FOUND, &format!("media `{}` not found", id))
}

fn info_json(id: &str, media: &StoredMedia) -> Value {
    json!({
        "id": id,
        "content_type": media.content_type,
        "bytes": media.data.len(),
        "created_at": media.created_at,
    })
}

fn user_json(media: &StoredMedia) -> Value {
    let user: BTreeMap<String, String> = media
        .user
        .iter()
        .map(|(k, v)| (format!("user.{}", k), v.clone()))
        .collect();
    json!(user)
}

fn exif_json() -> Value {
    json!({ "Make": "RICOH", "Model": "RICOH THETA S" })
}

fn gpano_json() -> Value {
    json!({ "ProjectionType": "equirectangular" })
}

fn page(ids: Vec<String>, limit: usize) -> Value {
    let next = if ids.len() > limit {
        ids.get(limit - 1).cloned()
    } else {
        None
    };
    let media: Vec<Value> = ids.into_iter().take(limit).map(|id| json!({ "id": id })).collect();
    json!({ "media": media, "paging": { "next": next, "previous": null } })
}

fn limit_of(params: &HashMap<String, String>) -> usize {
    params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(50)
        .clamp(1, 100)
}

/// Ids after the `after` cursor, in upload order.
fn ids_after(store: &Store, after: Option<&String>) -> Vec<String> {
    match after {
        None => store.order.clone(),
        Some(cursor) => match store.order.iter().position(|id| id == cursor) {
            Some(pos) => store.order[pos + 1..].to_vec(),
            None => Vec::new(),
        },
    }
}

async fn list_media(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let mut store = svc.store.lock().unwrap();
    store.last_query = Some(params.clone());
    let ids = ids_after(&store, params.get("after"));
    Ok(Json(page(ids, limit_of(&params))).into_response())
}

async fn upload_media(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if content_type != "image/jpeg" {
        return Err(error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "only image/jpeg is accepted"));
    }
    if body.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "empty body"));
    }

    let id = Uuid::new_v4().to_string();
    let media = StoredMedia {
        content_type,
        data: body,
        created_at: chrono::Utc::now().to_rfc3339(),
        user: BTreeMap::new(),
    };
    let info = info_json(&id, &media);

    let mut store = svc.store.lock().unwrap();
    store.order.push(id.clone());
    store.media.insert(id, media);
    Ok((StatusCode::CREATED, Json(info)).into_response())
}

async fn search_media(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let request: Value = serde_json::from_slice(&body)
        .map_err(|_| error(StatusCode::BAD_REQUEST, "search body is not JSON"))?;
    if request["search_version"] != "2016-07-08" {
        return Err(error(StatusCode::BAD_REQUEST, "unsupported search_version"));
    }
    let query = request["query"].as_str().unwrap_or_default().to_string();
    let paging: HashMap<String, String> =
        serde_json::from_value(request["paging"].clone()).unwrap_or_default();

    let mut store = svc.store.lock().unwrap();
    store.last_search = Some(request);
    let matches: Vec<String> = ids_after(&store, paging.get("after"))
        .into_iter()
        .filter(|id| store.media[id].user.values().any(|v| *v == query))
        .collect();
    Ok(Json(page(matches, limit_of(&paging))).into_response())
}

async fn media_info(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    if id == CORRUPT_ID {
        return Ok((StatusCode::OK, "<<not json>>").into_response());
    }
    let store = svc.store.lock().unwrap();
    let media = store.media.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(info_json(&id, media)).into_response())
}

async fn delete_media(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let mut store = svc.store.lock().unwrap();
    store.media.remove(&id).ok_or_else(|| not_found(&id))?;
    store.order.retain(|other| *other != id);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn media_content(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let store = svc.store.lock().unwrap();
    let media = store.media.get(&id).ok_or_else(|| not_found(&id))?;
    Ok((
        [(header::CONTENT_TYPE, media.content_type.clone())],
        media.data.clone(),
    )
        .into_response())
}

async fn media_meta(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let store = svc.store.lock().unwrap();
    let media = store.media.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(json!({
        "exif": exif_json(),
        "gpano": gpano_json(),
        "user": user_json(media),
    }))
    .into_response())
}

async fn meta_namespace(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path((id, ns)): Path<(String, String)>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    let store = svc.store.lock().unwrap();
    let media = store.media.get(&id).ok_or_else(|| not_found(&id))?;
    let body = match ns.as_str() {
        "exif" => exif_json(),
        "gpano" => gpano_json(),
        "user" => user_json(media),
        _ => return Err(error(StatusCode::NOT_FOUND, "unknown namespace")),
    };
    Ok(Json(body).into_response())
}

async fn delete_user_namespace(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path((id, ns)): Path<(String, String)>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    if ns != "user" {
        return Err(error(StatusCode::METHOD_NOT_ALLOWED, "only user meta can be removed"));
    }
    let mut store = svc.store.lock().unwrap();
    let media = store.media.get_mut(&id).ok_or_else(|| not_found(&id))?;
    media.user.clear();
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn user_meta_value(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path((id, ns, key)): Path<(String, String, String)>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    if ns != "user" {
        return Err(error(StatusCode::NOT_FOUND, "unknown namespace"));
    }
    let store = svc.store.lock().unwrap();
    let media = store.media.get(&id).ok_or_else(|| not_found(&id))?;
    let value = media
        .user
        .get(&key)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "user meta not found"))?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], value.clone()).into_response())
}

async fn put_user_meta_value(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path((id, ns, key)): Path<(String, String, String)>,
    body: String,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    if ns != "user" {
        return Err(error(StatusCode::NOT_FOUND, "unknown namespace"));
    }
    let mut store = svc.store.lock().unwrap();
    let media = store.media.get_mut(&id).ok_or_else(|| not_found(&id))?;
    media.user.insert(key, body);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_user_meta_value(
    State(svc): State<FakeMediaService>,
    headers: HeaderMap,
    Path((id, ns, key)): Path<(String, String, String)>,
) -> Result<Response, Response> {
    svc.authorize(&headers)?;
    if ns != "user" {
        return Err(error(StatusCode::NOT_FOUND, "unknown namespace"));
    }
    let mut store = svc.store.lock().unwrap();
    let media = store.media.get_mut(&id).ok_or_else(|| not_found(&id))?;
    media
        .user
        .remove(&key)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "user meta not found"))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
