//! In-process WebDAV server for the orchestrator tests. Integration test
//! crates cannot share modules, so this keeps only what the engine uses.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

/// Minimal in-memory WebDAV server: PROPFIND, MKCOL, PUT, GET with Basic auth.
#[derive(Default)]
pub struct DavState {
    pub auth: String,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub collections: Mutex<HashSet<String>>,
    pub requests: Mutex<Vec<String>>,
}

impl DavState {
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn put_file(&self, path: &str, body: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), body.to_vec());
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| *m == method)
            .count()
    }
}

fn parent_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => format!("{}/", &trimmed[..i]),
    }
}

async fn dav(
    State(state): State<Arc<DavState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    state
        .requests
        .lock()
        .unwrap()
        .push(method.as_str().to_string());

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.auth);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let collection_exists = |p: &str| p == "/" || state.collections.lock().unwrap().contains(p);

    match method.as_str() {
        "PROPFIND" => (
            StatusCode::MULTI_STATUS,
            "<?xml version=\"1.0\"?><d:multistatus xmlns:d=\"DAV:\"/>",
        )
            .into_response(),
        "MKCOL" => {
            let dir = if path.ends_with('/') {
                path.clone()
            } else {
                format!("{path}/")
            };
            if collection_exists(&dir) {
                StatusCode::METHOD_NOT_ALLOWED.into_response()
            } else if !collection_exists(&parent_of(&dir)) {
                StatusCode::CONFLICT.into_response()
            } else {
                state.collections.lock().unwrap().insert(dir);
                StatusCode::CREATED.into_response()
            }
        }
        "PUT" => {
            if !collection_exists(&parent_of(&path)) {
                return StatusCode::CONFLICT.into_response();
            }
            let existed = state
                .files
                .lock()
                .unwrap()
                .insert(path, body.to_vec())
                .is_some();
            if existed {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::CREATED.into_response()
            }
        }
        "GET" => match state.file(&path) {
            Some(bytes) => (StatusCode::OK, bytes).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Start the server with `auth` as the only accepted Authorization header.
pub async fn start_dav_server(auth: &str) -> (SocketAddr, Arc<DavState>) {
    let state = Arc::new(DavState {
        auth: auth.to_string(),
        ..DavState::default()
    });
    let app = Router::new().fallback(dav).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

/// `Authorization` value for `user:secret`.
pub const USER_SECRET_AUTH: &str = "Basic dXNlcjpzZWNyZXQ=";

/// Memory store with `user:secret` credentials for `addr` already saved.
pub fn configured_store(
    addr: SocketAddr,
) -> Arc<promptsync_persistence::MemoryKeyValueStore> {
    let store = Arc::new(promptsync_persistence::MemoryKeyValueStore::new());
    promptsync_engine::LocalData::new(store.clone())
        .save_settings(&promptsync_core::WebDavSettings {
            server_url: Some(format!("http://{addr}")),
            username: Some("user".into()),
            password: Some("secret".into()),
            ..promptsync_core::WebDavSettings::default()
        })
        .unwrap();
    store
}
