#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
}

/// Minimal in-memory WebDAV server: PROPFIND, MKCOL, PUT, GET with Basic auth.
#[derive(Default)]
pub struct DavState {
    pub auth: String,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub collections: Mutex<HashSet<String>>,
    pub requests: Mutex<Vec<Recorded>>,
    pub forced_status: Mutex<Option<u16>>,
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
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// `name` header of the last `method` request, if both exist.
    pub fn header(&self, method: &str, name: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method)
            .and_then(|r| r.headers.get(name))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn force_status(&self, status: Option<u16>) {
        *self.forced_status.lock().unwrap() = status;
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
        .push(Recorded {
            method: method.as_str().to_string(),
            path: path.clone(),
            headers: headers.clone(),
        });

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.auth);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(code) = *state.forced_status.lock().unwrap() {
        return StatusCode::from_u16(code).unwrap().into_response();
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
