use std::sync::LazyLock;

use promptsync_core::{Credentials, SyncDocument};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, warn};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

static PROPFIND: LazyLock<Method> = LazyLock::new(|| dav_verb(b"PROPFIND"));
static MKCOL: LazyLock<Method> = LazyLock::new(|| dav_verb(b"MKCOL"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebDavError {
    #[error("invalid WebDAV url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("authentication failed (HTTP 401)")]
    AuthFailed,
    #[error("remote file does not exist (HTTP 404)")]
    NotFound,
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("invalid data format: {0}")]
    Malformed(String),
    #[error("server unreachable: {0}")]
    Unreachable(String),
}

impl WebDavError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, WebDavError::Unreachable(_))
    }
}

/// Stateless WebDAV transport. Every call authenticates on its own; the
/// only thing shared between calls is the underlying connection pool.
#[derive(Debug, Clone)]
pub struct WebDavClient {
    client: Client,
}

impl WebDavClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// PROPFIND `Depth: 0` against the server root.
    pub async fn test_connection(&self, creds: &Credentials) -> Result<(), WebDavError> {
        let url = parse_url(&format!("{}/", creds.base_url()))?;
        let resp = self
            .request(creds, PROPFIND.clone(), url)
            .header("Depth", "0")
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(&resp)
    }

    /// MKCOL every ancestor collection of `path`, outermost first.
    ///
    /// Failures are logged and swallowed: an existing collection answers 405,
    /// and a real problem resurfaces on the following PUT.
    pub async fn ensure_collection(&self, creds: &Credentials, path: &str) {
        for dir in ancestor_collections(path) {
            let url = match document_url(creds, &dir) {
                Ok(url) => url,
                Err(e) => {
                    warn!("skipping MKCOL for {dir}: {e}");
                    return;
                }
            };
            match self.request(creds, MKCOL.clone(), url).send().await {
                Ok(resp) => debug!("MKCOL {dir} -> {}", resp.status()),
                Err(e) => warn!("MKCOL {dir} failed: {}", describe(&e)),
            }
        }
    }

    /// PUT the pretty-printed document. Returns the number of bytes sent.
    pub async fn upload(
        &self,
        creds: &Credentials,
        path: &str,
        document: &SyncDocument,
    ) -> Result<usize, WebDavError> {
        let url = document_url(creds, path)?;
        let body = document
            .to_pretty_json()
            .map_err(|e| WebDavError::Malformed(e.to_string()))?;
        let len = body.len();
        let resp = self
            .request(creds, Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(&resp)?;
        Ok(len)
    }

    /// GET and parse the document stored at `path`.
    pub async fn download(
        &self,
        creds: &Credentials,
        path: &str,
    ) -> Result<SyncDocument, WebDavError> {
        let url = document_url(creds, path)?;
        let resp = self
            .request(creds, Method::GET, url)
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(WebDavError::NotFound);
        }
        check_status(&resp)?;
        let bytes = resp.bytes().await.map_err(transport_error)?;
        SyncDocument::from_slice(&bytes).map_err(|e| WebDavError::Malformed(e.to_string()))
    }

    fn request(&self, creds: &Credentials, method: Method, url: Url) -> RequestBuilder {
        debug!("{method} {url}");
        self.client
            .request(method, url)
            .basic_auth(&creds.username, Some(&creds.password))
    }
}

/// Extension verb from an upper-case ASCII token; such tokens always parse.
fn dav_verb(token: &'static [u8]) -> Method {
    Method::from_bytes(token).unwrap_or_default()
}

fn parse_url(raw: &str) -> Result<Url, WebDavError> {
    Url::parse(raw).map_err(|e| WebDavError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Server base joined with `path`; the base's own path prefix is kept.
pub(crate) fn document_url(creds: &Credentials, path: &str) -> Result<Url, WebDavError> {
    let path = path.trim();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    parse_url(&format!("{}{}", creds.base_url(), path))
}

/// Collection paths above `path`, outermost first, each with a trailing slash.
pub(crate) fn ancestor_collections(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((_, dirs)) = segments.split_last() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(dirs.len());
    let mut current = String::new();
    for dir in dirs {
        current.push('/');
        current.push_str(dir);
        out.push(format!("{current}/"));
    }
    out
}

fn check_status(resp: &Response) -> Result<(), WebDavError> {
    let status = resp.status();
    debug!("{} -> {status}", resp.url());
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED {
        Err(WebDavError::AuthFailed)
    } else {
        Err(WebDavError::Status(status.as_u16()))
    }
}

fn transport_error(err: reqwest::Error) -> WebDavError {
    WebDavError::Unreachable(describe(&err))
}

/// The error and its whole source chain, since reqwest's top-level message
/// alone rarely names the DNS or TLS cause.
fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
