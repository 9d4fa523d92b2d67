use std::time::Duration;

use reqwest::Client;

/// HTTP client tunables. `None` disables the corresponding timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(
                promptsync_config::DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Some(Duration::from_secs(
                promptsync_config::DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
        }
    }
}

impl HttpOptions {
    /// No timeouts at all; a stalled server blocks until the caller gives up.
    pub fn unbounded() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

pub fn build_http_client(options: &HttpOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = options.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    builder.build()
}

pub fn default_http_client() -> Result<Client, reqwest::Error> {
    build_http_client(&HttpOptions::default())
}
