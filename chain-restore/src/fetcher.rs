//! Segment fetcher - downloads the manifest and selected segments.
//!
//! Downloads run one at a time in chain order. Existing files with the same
//! name are truncated and rewritten, so re-running after a crash is safe.

use crate::chain::CanonicalChain;
use crate::manifest::Manifest;
use crate::storage::{object_key, BlobStore};
use crate::utils::errors::{RestoreError, Result};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// A blob written to the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSegment {
    pub file: String,
    pub path: PathBuf,
    pub bytes: u64,
}

pub struct SegmentFetcher {
    store: Arc<dyn BlobStore>,
    prefix: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl SegmentFetcher {
    pub fn new(
        store: Arc<dyn BlobStore>,
        prefix: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Download and parse the manifest.
    pub async fn fetch_manifest(&self, key: &str) -> Result<Manifest> {
        info!("Creating working directory {}", self.work_dir.display());
        tokio::fs::create_dir_all(&self.work_dir).await?;

        info!("Downloading manifest {} from {}", key, self.store.describe());
        let fetched = self
            .download(key)
            .await
            .map_err(|e| RestoreError::ManifestUnavailable {
                key: object_key(&self.prefix, key),
                reason: e.to_string(),
            })?;

        match Manifest::from_file(&fetched.path).await {
            Err(RestoreError::Io(e)) => Err(RestoreError::ManifestUnavailable {
                key: object_key(&self.prefix, key),
                reason: e.to_string(),
            }),
            other => other,
        }
    }

    /// Download every segment of `chain`, in order. Stops at the first failure.
    pub async fn fetch_chain(&self, chain: &CanonicalChain) -> Result<Vec<FetchedSegment>> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut fetched = Vec::with_capacity(chain.len());
        for (index, segment) in chain.iter().enumerate() {
            info!(
                "Downloading {} ({}/{}, blocks {}-{})",
                segment.file,
                index + 1,
                chain.len(),
                segment.start_block.height,
                segment.end_block.height
            );
            match self.download(&segment.file).await {
                Ok(result) => {
                    info!("Finished downloading {} ({} bytes)", result.file, result.bytes);
                    fetched.push(result);
                }
                Err(e) => {
                    error!("Downloading {} failed: {}", segment.file, e);
                    return Err(e);
                }
            }
        }
        Ok(fetched)
    }

    async fn download(&self, key: &str) -> Result<FetchedSegment> {
        let dest = self.work_dir.join(key);
        let started = Instant::now();

        let bytes = match tokio::time::timeout(self.timeout, self.copy_blob(key, &dest)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e @ RestoreError::Fetch { .. })) => return Err(e),
            Ok(Err(e)) => {
                return Err(RestoreError::Fetch {
                    key: object_key(&self.prefix, key),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(RestoreError::Fetch {
                    key: object_key(&self.prefix, key),
                    reason: format!("timed out after {}s", self.timeout.as_secs_f64()),
                })
            }
        };

        debug!(
            "Wrote {} bytes to {} in {:.1}s",
            bytes,
            dest.display(),
            started.elapsed().as_secs_f64()
        );

        Ok(FetchedSegment {
            file: key.to_string(),
            path: dest,
            bytes,
        })
    }

    async fn copy_blob(&self, key: &str, dest: &Path) -> Result<u64> {
        let mut stream = self.store.fetch(&self.prefix, key).await?;
        let mut file = tokio::fs::File::create(dest).await?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RestoreError::Fetch {
                key: object_key(&self.prefix, key),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}
