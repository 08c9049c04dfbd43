// SPDX-License-Identifier: AGPL-3.0
// Artify Core - In-process mock of the image-editing API for integration tests

#![allow(dead_code)]

use artify_core::{
    ClientSettings, ImageGateway, MemorySecretStore, SecretStore, SessionManager, TOKEN_KEY,
};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GOOD_TOKEN: &str = "tok-123";

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    hits: Mutex<Vec<Hit>>,
    images: Mutex<Vec<Value>>,
    uploads_seen: Mutex<usize>,
    processes_created: Mutex<usize>,
    /// Zero-based upload attempt that answers 500
    pub fail_upload_at: Mutex<Option<usize>>,
    /// Hold `GET /images` answers; the list is captured before the wait
    pub list_delay: Mutex<Option<Duration>>,
}

impl MockState {
    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for(&self, method: &str, path: &str) -> Vec<Hit> {
        self.hits()
            .into_iter()
            .filter(|h| h.method == method && h.path == path)
            .collect()
    }

    pub fn seed(&self, images: Vec<Value>) {
        *self.images.lock().unwrap() = images;
    }

    pub fn images(&self) -> Vec<Value> {
        self.images.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, path: String, headers: &HeaderMap, body: Value) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.hits.lock().unwrap().push(Hit {
            method,
            path,
            authorization,
            body,
        });
    }
}

type Shared = Arc<MockState>;

pub struct MockServer {
    pub base_url: String,
    pub state: Shared,
}

impl MockServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(MockState::default());

        let app = Router::new()
            .route("/user", post(register).get(profile).put(update_profile))
            .route("/user/login", post(login))
            .route("/auth", axum::routing::patch(reset_request).put(reset))
            .route(
                "/images",
                get(list_images).post(upload).put(set_favorite),
            )
            .route("/images/{id}", delete(delete_upload))
            .route("/processes/defined/{endpoint}", post(apply))
            .route("/processes/recent", get(recent_processes))
            .route("/processes/favorite", get(favorite_processes))
            .route("/processes/{id}", get(get_process).delete(delete_process))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn settings(&self) -> ClientSettings {
        ClientSettings::with_base_url(self.base_url.clone())
    }

    /// Session manager, gateway and secret store wired against this mock
    pub fn client(&self) -> (SessionManager, Arc<ImageGateway>, Arc<MemorySecretStore>) {
        let secrets = Arc::new(MemorySecretStore::new());
        let session = SessionManager::new(secrets.clone());
        let gateway = Arc::new(ImageGateway::new(&self.settings(), session.view()).unwrap());
        (session, gateway, secrets)
    }

    /// Same as `client`, already holding a valid token
    pub fn signed_in_client(&self) -> (SessionManager, Arc<ImageGateway>, Arc<MemorySecretStore>) {
        let (session, gateway, secrets) = self.client();
        secrets.set(TOKEN_KEY, GOOD_TOKEN).unwrap();
        session.load_persisted_session().unwrap();
        (session, gateway, secrets)
    }
}

pub fn image(id: &str, date: &str, favorite: bool, kind: i64) -> Value {
    json!({
        "id": id,
        "public_url": format!("/uploads/{}.png", id),
        "filename": format!("{}.png", id),
        "date": date,
        "favorite": favorite,
        "type": kind,
    })
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len())
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    reply(StatusCode::UNAUTHORIZED, json!({ "msg": "Token inválido" }))
}

async fn register(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/user".into(), &headers, body.clone());
    match body["Email"].as_str() {
        Some("taken@x.com") => reply(StatusCode::CONFLICT, json!({ "msg": "Usuário já existe" })),
        Some("boom@x.com") => reply(StatusCode::INTERNAL_SERVER_ERROR, json!({})),
        _ => reply(
            StatusCode::CREATED,
            json!({ "token": "tok-new", "User": body["userName"] }),
        ),
    }
}

async fn login(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST", "/user/login".into(), &headers, body.clone());
    match body["Email"].as_str() {
        Some("bad@x.com") => reply(
            StatusCode::NOT_FOUND,
            json!({ "msg": "Usuário não encontrado" }),
        ),
        Some("boom@x.com") => reply(StatusCode::INTERNAL_SERVER_ERROR, json!({})),
        Some("legacy@x.com") => reply(StatusCode::OK, json!({ "userId": 77 })),
        _ => reply(StatusCode::OK, json!({ "token": GOOD_TOKEN })),
    }
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.record("GET", "/user".into(), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    reply(
        StatusCode::OK,
        json!({ "user": { "name": "Ana", "email": "ana@x.com" } }),
    )
}

async fn update_profile(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("PUT", "/user".into(), &headers, body);
    if !authorized(&headers) {
        return unauthorized();
    }
    reply(StatusCode::OK, json!({ "msg": "ok" }))
}

async fn reset_request(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("PATCH", "/auth".into(), &headers, body);
    reply(StatusCode::OK, json!({ "msg": "sent" }))
}

async fn reset(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("PUT", "/auth".into(), &headers, body.clone());
    if body["passport"] == "000000" {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "Description": "Código inválido" }),
        );
    }
    reply(StatusCode::OK, json!({ "msg": "changed" }))
}

async fn list_images(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.record("GET", "/images".into(), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    let images = state.images();
    let delay = *state.list_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    reply(StatusCode::OK, json!({ "simplified": images }))
}

async fn upload(State(state): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        fields.push(json!({
            "name": name,
            "file_name": file_name,
            "content_type": content_type,
            "size": size,
        }));
    }
    state.record("POST", "/images".into(), &headers, json!(fields));
    if !authorized(&headers) {
        return unauthorized();
    }

    let attempt = {
        let mut seen = state.uploads_seen.lock().unwrap();
        let attempt = *seen;
        *seen += 1;
        attempt
    };
    if *state.fail_upload_at.lock().unwrap() == Some(attempt) {
        return reply(StatusCode::INTERNAL_SERVER_ERROR, json!({ "msg": "disk full" }));
    }

    let id = format!("up-{}", attempt);
    state
        .images
        .lock()
        .unwrap()
        .push(image(&id, "2024-06-01T10:00:00Z", false, 0));
    reply(StatusCode::CREATED, json!({ "image": { "Id": id } }))
}

async fn set_favorite(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("PUT", "/images".into(), &headers, body.clone());
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut images = state.images.lock().unwrap();
    match images.iter_mut().find(|i| i["id"] == body["imageId"]) {
        Some(entry) => {
            entry["favorite"] = body["user_favorite"].clone();
            reply(StatusCode::OK, json!({ "msg": "updated" }))
        }
        None => reply(StatusCode::NOT_FOUND, json!({ "msg": "missing" })),
    }
}

fn remove(state: &MockState, id: &str) -> Response {
    let mut images = state.images.lock().unwrap();
    let before = images.len();
    images.retain(|i| i["id"] != id);
    if images.len() == before {
        reply(StatusCode::NOT_FOUND, json!({ "msg": "Imagem não encontrada" }))
    } else {
        reply(StatusCode::OK, json!({ "msg": "deleted" }))
    }
}

async fn delete_upload(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.record("DELETE", format!("/images/{}", id), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    remove(&state, &id)
}

async fn delete_process(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.record("DELETE", format!("/processes/{}", id), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    remove(&state, &id)
}

async fn apply(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(endpoint): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.record(
        "POST",
        format!("/processes/defined/{}", endpoint),
        &headers,
        body.clone(),
    );
    if !authorized(&headers) {
        return unauthorized();
    }
    let source = body["image_id"].as_str().unwrap_or_default().to_string();
    if !state.images().iter().any(|i| i["id"] == source) {
        return reply(StatusCode::NOT_FOUND, json!({ "msg": "Imagem não encontrada" }));
    }

    let id = {
        let mut created = state.processes_created.lock().unwrap();
        *created += 1;
        format!("proc-{}", *created)
    };
    state
        .images
        .lock()
        .unwrap()
        .push(image(&id, "2024-07-01T10:00:00Z", false, 1));
    reply(StatusCode::CREATED, json!({ "id": id }))
}

fn processed(state: &MockState) -> Vec<Value> {
    state
        .images()
        .into_iter()
        .filter(|i| i["type"] == 1)
        .map(|mut i| {
            // The process collections drop the type column
            if let Some(obj) = i.as_object_mut() {
                obj.remove("type");
            }
            i
        })
        .collect()
}

async fn recent_processes(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.record("GET", "/processes/recent".into(), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    reply(StatusCode::OK, json!({ "images": processed(&state) }))
}

async fn favorite_processes(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.record("GET", "/processes/favorite".into(), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    let favorites: Vec<Value> = processed(&state)
        .into_iter()
        .filter(|i| i["favorite"] == true)
        .collect();
    reply(StatusCode::OK, json!({ "simplified": favorites }))
}

async fn get_process(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.record("GET", format!("/processes/{}", id), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized();
    }
    match processed(&state).into_iter().find(|i| i["id"] == id) {
        Some(entry) => reply(StatusCode::OK, json!({ "image": entry })),
        None => reply(StatusCode::NOT_FOUND, json!({ "msg": "missing" })),
    }
}
