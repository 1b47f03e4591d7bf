//! Directory-backed blob store.
//!
//! Mirrors the bucket layout on a local or mounted filesystem:
//! `{root}/{prefix}/{key}`.

use super::{object_key, BlobStore, BlobStream};
use crate::utils::errors::{RestoreError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn fetch(&self, prefix: &str, key: &str) -> Result<BlobStream> {
        let object = object_key(prefix, key);
        let path = self.root.join(&object);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RestoreError::BlobNotFound(object));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ReaderStream::new(file).boxed())
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}
