use promptsync_core::{Credentials, SyncDocument};
use promptsync_infra::WebDavClient;

use crate::sync::SyncError;

/// Where the sync document lives. The document path comes from
/// `Credentials::sync_path`.
#[async_trait::async_trait]
pub trait RemoteDocumentStore: Send + Sync {
    async fn test_connection(&self, creds: &Credentials) -> Result<(), SyncError>;
    /// Best-effort; never fails the caller.
    async fn ensure_collection(&self, creds: &Credentials);
    /// Returns the number of bytes written.
    async fn upload(&self, creds: &Credentials, document: &SyncDocument)
        -> Result<usize, SyncError>;
    async fn download(&self, creds: &Credentials) -> Result<SyncDocument, SyncError>;
}

/// WebDAV-backed remote store.
pub struct WebDavRemote {
    client: WebDavClient,
}

impl WebDavRemote {
    pub fn new(client: WebDavClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RemoteDocumentStore for WebDavRemote {
    async fn test_connection(&self, creds: &Credentials) -> Result<(), SyncError> {
        Ok(self.client.test_connection(creds).await?)
    }

    async fn ensure_collection(&self, creds: &Credentials) {
        self.client
            .ensure_collection(creds, &creds.document_path())
            .await
    }

    async fn upload(
        &self,
        creds: &Credentials,
        document: &SyncDocument,
    ) -> Result<usize, SyncError> {
        Ok(self
            .client
            .upload(creds, &creds.document_path(), document)
            .await?)
    }

    async fn download(&self, creds: &Credentials) -> Result<SyncDocument, SyncError> {
        Ok(self.client.download(creds, &creds.document_path()).await?)
    }
}
