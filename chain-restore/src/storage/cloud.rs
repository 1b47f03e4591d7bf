//! S3 and Azure Blob Storage through `object_store`.

use super::{object_key, BlobStore, BlobStream};
use crate::config::StorageConfig;
use crate::utils::errors::{RestoreError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore};
use std::sync::Arc;

pub struct ObjectStoreBlobStore {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStoreBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// S3 bucket. Unset credentials and region fall back to the standard
    /// `AWS_*` environment variables.
    pub fn aws(config: &StorageConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(credentials) = &config.credentials {
            builder = builder
                .with_access_key_id(&credentials.key_id)
                .with_secret_access_key(&credentials.secret);
            if let Some(token) = &credentials.session_token {
                builder = builder.with_token(token);
            }
        }
        let store = builder
            .build()
            .map_err(|e| RestoreError::Storage(format!("S3 bucket {}: {}", config.bucket, e)))?;
        Ok(Self::new(Arc::new(store), format!("s3://{}", config.bucket)))
    }

    /// Azure container. The credentials' `key_id` is the storage account name.
    pub fn azure(config: &StorageConfig) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env().with_container_name(&config.bucket);
        if let Some(credentials) = &config.credentials {
            builder = builder
                .with_account(&credentials.key_id)
                .with_access_key(&credentials.secret);
        }
        let store = builder.build().map_err(|e| {
            RestoreError::Storage(format!("Azure container {}: {}", config.bucket, e))
        })?;
        let account = config
            .credentials
            .as_ref()
            .map(|c| c.key_id.as_str())
            .unwrap_or("env");
        Ok(Self::new(
            Arc::new(store),
            format!("azure://{}/{}", account, config.bucket),
        ))
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn fetch(&self, prefix: &str, key: &str) -> Result<BlobStream> {
        let object = object_key(prefix, key);
        let location = ObjectPath::from(object.as_str());
        match self.store.get(&location).await {
            Ok(result) => Ok(result
                .into_stream()
                .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
                .boxed()),
            Err(ObjectStoreError::NotFound { .. }) => Err(RestoreError::BlobNotFound(object)),
            Err(e) => Err(RestoreError::Fetch {
                key: object,
                reason: e.to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, Provider};
    use bytes::Bytes;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_fetch_from_object_store() {
        let memory = Arc::new(InMemory::new());
        memory
            .put(&ObjectPath::from("env/chain_0_99.rlp"), Bytes::from_static(b"rlp"))
            .await
            .unwrap();

        let store = ObjectStoreBlobStore::new(memory, "memory");
        let mut stream = store.fetch("env", "chain_0_99.rlp").await.unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"rlp");
    }

    #[tokio::test]
    async fn test_missing_object_maps_to_not_found() {
        let store = ObjectStoreBlobStore::new(Arc::new(InMemory::new()), "memory");
        assert!(matches!(
            store.fetch("env", "nope.rlp").await,
            Err(RestoreError::BlobNotFound(key)) if key == "env/nope.rlp"
        ));
    }

    #[test]
    fn test_build_aws_store() {
        let config = StorageConfig {
            provider: Provider::Aws,
            env_prefix: "environment_id".to_string(),
            bucket: "chain-backups".to_string(),
            region: Some("us-west-2".to_string()),
            credentials: Some(Credentials {
                key_id: "AKIDEXAMPLE".to_string(),
                secret: "secret".to_string(),
                session_token: None,
            }),
        };
        let store = ObjectStoreBlobStore::aws(&config).unwrap();
        assert_eq!(store.describe(), "s3://chain-backups");
    }

    #[test]
    fn test_build_azure_store() {
        let config = StorageConfig {
            provider: Provider::Azure,
            env_prefix: "environment_id".to_string(),
            bucket: "container".to_string(),
            region: None,
            credentials: Some(Credentials {
                key_id: "storageaccount".to_string(),
                secret: "c2VjcmV0LWtleQ==".to_string(),
                session_token: None,
            }),
        };
        let store = ObjectStoreBlobStore::azure(&config).unwrap();
        assert_eq!(store.describe(), "azure://storageaccount/container");
    }
}
