//! Blob store backends.
//!
//! The restore pipeline only ever needs one operation from the object store:
//! open `{prefix}/{key}` as a byte stream. Transport, auth and retry belong to
//! the backend.

pub mod cloud;
pub mod local;

use crate::config::{Provider, StorageConfig};
use crate::utils::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::sync::Arc;

pub use cloud::ObjectStoreBlobStore;
pub use local::LocalBlobStore;

/// Body of a fetched blob.
pub type BlobStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Key-addressed, read-only access to backup blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open the object named `key` under `prefix`.
    ///
    /// Returns [`RestoreError::BlobNotFound`](crate::RestoreError::BlobNotFound)
    /// when the object does not exist.
    async fn fetch(&self, prefix: &str, key: &str) -> Result<BlobStream>;

    /// Backend identifier for logs.
    fn describe(&self) -> String;
}

/// Join an environment prefix and a key the way backups are laid out.
pub fn object_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Build the blob store selected by `config.provider`.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.provider {
        Provider::Aws => Arc::new(ObjectStoreBlobStore::aws(config)?),
        Provider::Azure => Arc::new(ObjectStoreBlobStore::azure(config)?),
        Provider::Local => Arc::new(LocalBlobStore::new(&config.bucket)),
    };
    Ok(store)
}
