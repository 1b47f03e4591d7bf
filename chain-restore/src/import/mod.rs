//! Import runner capability.
//!
//! `init` lays down the node's base state, `import` ingests one downloaded
//! segment. Both report the exit status and captured output rather than
//! failing on a non-zero status; deciding what a failure means is the replay
//! engine's job.

pub mod geth;

use crate::utils::errors::Result;
use async_trait::async_trait;
use std::path::Path;

pub use geth::GethImportRunner;

/// Exit status plus captured output of one runner invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutput {
    /// `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ImportOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Status for logs: the exit code, or `signal` when there was none.
    pub fn status_label(&self) -> String {
        self.status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }
}

#[async_trait]
pub trait ImportRunner: Send + Sync {
    /// Initialise base node state. Expected to be idempotent.
    async fn init(&self, working_dir: &Path) -> Result<ImportOutput>;

    /// Import the segment at `file`.
    async fn import(&self, working_dir: &Path, file: &Path) -> Result<ImportOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_success() {
        let ok = ImportOutput {
            status: Some(0),
            ..Default::default()
        };
        assert!(ok.success());
        assert_eq!(ok.status_label(), "0");

        let failed = ImportOutput {
            status: Some(1),
            ..Default::default()
        };
        assert!(!failed.success());

        let killed = ImportOutput::default();
        assert!(!killed.success());
        assert_eq!(killed.status_label(), "signal");
    }
}
