pub mod net;
pub mod webdav;

// Re-exports for convenience
pub use net::{build_http_client, default_http_client, HttpOptions};
pub use webdav::{WebDavClient, WebDavError};
