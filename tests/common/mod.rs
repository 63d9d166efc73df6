//! Mock backend for integration tests
//!
//! An axum router imitating the feed backend's auth, user and post routes,
//! served on an ephemeral localhost port. Every request is counted by
//! route so tests can assert how often the client hit the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower_http::trace::TraceLayer;

use feed_client::{Config, FeedClient};

pub const PASSWORD: &str = "secret";

// == Mock State ==
#[derive(Default)]
struct Inner {
    valid_access: String,
    refresh_token: String,
    issued: usize,
    posts: Vec<Value>,
    next_post: usize,
    hits: HashMap<String, usize>,
    bearers: Vec<Option<String>>,
}

/// Shared state of the mock backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<Inner>>,
    refreshes: Arc<AtomicUsize>,
    reject_refresh: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut inner = backend.inner.lock().unwrap();
            inner.valid_access = "access-1".to_string();
            inner.refresh_token = "refresh-1".to_string();
            inner.issued = 1;
        }
        backend
    }

    /// Adds a post authored by `u1` and returns its id.
    pub fn seed_post(&self, text: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_post += 1;
        let id = format!("p{}", inner.next_post);
        inner.posts.push(post_json(&id, text, 1));
        id
    }

    /// Invalidates the access token the client holds, as if it expired.
    pub fn expire_access_token(&self) {
        self.inner.lock().unwrap().valid_access = "expired-elsewhere".to_string();
    }

    pub fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Number of requests seen for `route`, e.g. `"GET /posts"`.
    pub fn hits(&self, route: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .hits
            .get(route)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.inner.lock().unwrap().hits.values().sum()
    }

    /// Bearer tokens seen on authorized routes, in arrival order.
    pub fn bearers(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().bearers.clone()
    }

    fn record(&self, route: &str) {
        *self
            .inner
            .lock()
            .unwrap()
            .hits
            .entry(route.to_string())
            .or_default() += 1;
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        let mut inner = self.inner.lock().unwrap();
        inner.bearers.push(bearer.clone());
        if bearer.as_deref() == Some(inner.valid_access.as_str()) {
            Ok(())
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "jwt expired"})),
            )
                .into_response())
        }
    }
}

fn post_json(id: &str, text: &str, images: usize) -> Value {
    json!({
        "_id": id,
        "userId": {"_id": "u1", "username": "alice"},
        "text": text,
        "images": (0..images).map(|i| format!("/uploads/{}-{}.png", id, i)).collect::<Vec<_>>(),
        "likes": [],
        "createdAt": "2024-03-01T10:00:00Z"
    })
}

fn user_json(picture: Option<&str>) -> Value {
    json!({
        "_id": "u1",
        "username": "alice",
        "email": "alice@example.com",
        "profilePicture": picture
    })
}

// == Handlers ==
async fn login(State(state): State<MockBackend>, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/login");
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials"})),
        )
            .into_response();
    }
    let inner = state.inner.lock().unwrap();
    Json(json!({
        "token": inner.valid_access,
        "refreshToken": inner.refresh_token,
        "user": user_json(None)
    }))
    .into_response()
}

async fn refresh(State(state): State<MockBackend>, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/refresh-token");
    state.refreshes.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut inner = state.inner.lock().unwrap();
    if state.reject_refresh.load(Ordering::SeqCst) || body["refreshToken"] != inner.refresh_token
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid refresh token"})),
        )
            .into_response();
    }
    inner.issued += 1;
    inner.valid_access = format!("access-{}", inner.issued);
    Json(json!({"token": inner.valid_access})).into_response()
}

async fn logout(State(state): State<MockBackend>) -> Response {
    state.record("POST /auth/logout");
    Json(json!({"message": "Logged out"})).into_response()
}

async fn my_profile(State(state): State<MockBackend>, headers: HeaderMap) -> Response {
    state.record("GET /users/me");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(user_json(None)).into_response()
}

async fn profile_picture(
    State(state): State<MockBackend>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.record("PUT /users/me/profile-picture");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut file_name = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("image") {
            file_name = field.file_name().map(str::to_string);
        }
    }
    match file_name {
        Some(name) => Json(user_json(Some(&format!("/uploads/{}", name)))).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "No image uploaded"})),
        )
            .into_response(),
    }
}

async fn list_posts(State(state): State<MockBackend>, headers: HeaderMap) -> Response {
    state.record("GET /posts");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let inner = state.inner.lock().unwrap();
    let posts: Vec<Value> = inner.posts.iter().rev().cloned().collect();
    Json(json!({"posts": posts, "hasMore": false})).into_response()
}

async fn get_post(
    State(state): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.record("GET /posts/:id");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let inner = state.inner.lock().unwrap();
    match inner.posts.iter().find(|p| p["_id"] == id.as_str()) {
        Some(post) => Json(post.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Post not found"})),
        )
            .into_response(),
    }
}

/// Reads `text`, `images` and `keepImages` parts.
async fn read_post_form(mut multipart: Multipart) -> (String, usize, usize) {
    let mut text = String::new();
    let mut images = 0;
    let mut kept = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => text = field.text().await.unwrap_or_default(),
            Some("images") => {
                let _ = field.bytes().await;
                images += 1;
            }
            Some("keepImages") => kept += 1,
            _ => {}
        }
    }
    (text, images, kept)
}

async fn create_post(
    State(state): State<MockBackend>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    state.record("POST /posts");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let (text, images, _) = read_post_form(multipart).await;
    let mut inner = state.inner.lock().unwrap();
    inner.next_post += 1;
    let post = post_json(&format!("p{}", inner.next_post), &text, images);
    inner.posts.push(post.clone());
    (StatusCode::CREATED, Json(post)).into_response()
}

async fn update_post(
    State(state): State<MockBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    state.record("PUT /posts/:id");
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let (text, images, kept) = read_post_form(multipart).await;
    let mut inner = state.inner.lock().unwrap();
    match inner.posts.iter_mut().find(|p| p["_id"] == id.as_str()) {
        Some(post) => {
            *post = post_json(&id, &text, images + kept);
            Json(post.clone()).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Post not found"})),
        )
            .into_response(),
    }
}

// == Router ==
pub fn router(state: MockBackend) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh-token", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/users/me", get(my_profile))
        .route("/api/users/me/profile-picture", put(profile_picture))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id", get(get_post).put(update_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the mock backend on an ephemeral port.
pub async fn spawn_backend() -> (MockBackend, SocketAddr) {
    let backend = MockBackend::new();
    let app = router(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (backend, addr)
}

/// Client configuration pointing at `addr` with credentials under `dir`.
pub fn config_for(addr: SocketAddr, dir: &TempDir) -> Config {
    Config {
        api_url: format!("http://{}/api", addr),
        credentials_path: dir.path().join("credentials.json"),
        ..Config::default()
    }
}

/// A running backend plus a client that is already logged in.
pub async fn logged_in_client() -> (MockBackend, FeedClient, TempDir) {
    let (backend, addr) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let client = FeedClient::new(&config_for(addr, &dir)).await.unwrap();
    client.auth().login("alice", PASSWORD).await.unwrap();
    (backend, client, dir)
}
