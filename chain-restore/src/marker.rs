//! Restore-mode marker.
//!
//! While the marker file exists the bootstrap process must not start the node
//! service. It is advisory only: it does not stop two restores running at once.

use crate::utils::errors::{RestoreError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RestoreMarker {
    path: PathBuf,
}

impl RestoreMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn is_present(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    /// Put the node into restore mode.
    pub async fn arm(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, b"").await?;
        info!("Restore marker set at {}", self.path.display());
        Ok(())
    }

    /// Remove the marker once a restore has completed.
    ///
    /// An already-absent marker is not an error. Anything else is: a marker
    /// that cannot be removed keeps the node in restore mode forever.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Removed restore marker {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Restore marker {} was already absent", self.path.display());
                Ok(())
            }
            Err(source) => {
                error!(
                    "Failed to remove restore marker {}: {}",
                    self.path.display(),
                    source
                );
                Err(RestoreError::MarkerRemoval {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}
