//! Replay engine - feeds downloaded segments to the import runner.

use crate::fetcher::FetchedSegment;
use crate::import::{ImportOutput, ImportRunner};
use crate::utils::errors::{RestoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What to do when an import reports failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFailurePolicy {
    /// Log it and import the remaining segments anyway. The marker is still
    /// cleared afterwards, so a failed import leaves an incomplete chain store
    /// that looks restored.
    #[default]
    Continue,
    /// Stop at the first failed import and leave the marker in place.
    Abort,
}

/// Result of one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Exited(ImportOutput),
    /// The runner could not be started at all
    SpawnFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// `init`, or the imported segment's file name
    pub target: String,
    pub result: StepResult,
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, StepResult::Exited(output) if output.success())
    }

    fn status_label(&self) -> String {
        match &self.result {
            StepResult::Exited(output) => output.status_label(),
            StepResult::SpawnFailed(reason) => format!("spawn failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub init: StepRecord,
    pub imports: Vec<StepRecord>,
}

impl ReplayReport {
    pub fn failed_imports(&self) -> impl Iterator<Item = &StepRecord> {
        self.imports.iter().filter(|record| !record.succeeded())
    }
}

pub struct ReplayEngine {
    runner: Arc<dyn ImportRunner>,
    init_dir: PathBuf,
    import_dir: PathBuf,
    policy: ImportFailurePolicy,
}

impl ReplayEngine {
    pub fn new(
        runner: Arc<dyn ImportRunner>,
        init_dir: impl Into<PathBuf>,
        import_dir: impl Into<PathBuf>,
        policy: ImportFailurePolicy,
    ) -> Self {
        Self {
            runner,
            init_dir: init_dir.into(),
            import_dir: import_dir.into(),
            policy,
        }
    }

    /// Run `init` once, then import `segments` in order.
    pub async fn replay(&self, segments: &[FetchedSegment]) -> Result<ReplayReport> {
        info!("Initialising node state in {}", self.init_dir.display());
        let init = record("init", self.runner.init(&self.init_dir).await);
        if !init.succeeded() {
            warn!(
                "Node init did not succeed (status {}), continuing with imports",
                init.status_label()
            );
        }

        let mut imports = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            info!("Importing {} ({}/{})", segment.file, index + 1, segments.len());
            let step = record(
                &segment.file,
                self.runner.import(&self.import_dir, &segment.path).await,
            );

            if step.succeeded() {
                info!("Finished importing {}", segment.file);
            } else {
                error!("Import of {} failed (status {})", segment.file, step.status_label());
                if self.policy == ImportFailurePolicy::Abort {
                    return Err(RestoreError::Import {
                        file: segment.file.clone(),
                        status: step.status_label(),
                    });
                }
            }
            imports.push(step);
        }

        Ok(ReplayReport { init, imports })
    }
}

fn record(target: &str, outcome: Result<ImportOutput>) -> StepRecord {
    let result = match outcome {
        Ok(output) => {
            debug!("{} status: {}", target, output.status_label());
            if !output.stdout.is_empty() {
                debug!("{} stdout: {}", target, output.stdout.trim_end());
            }
            if !output.stderr.is_empty() {
                if output.success() {
                    debug!("{} stderr: {}", target, output.stderr.trim_end());
                } else {
                    warn!("{} stderr: {}", target, output.stderr.trim_end());
                }
            }
            StepResult::Exited(output)
        }
        Err(e) => StepResult::SpawnFailed(e.to_string()),
    };
    StepRecord {
        target: target.to_string(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records every call; imports of files listed in `failing` exit with 1.
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
        init_fails: bool,
    }

    impl RecordingRunner {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImportRunner for RecordingRunner {
        async fn init(&self, _working_dir: &Path) -> Result<ImportOutput> {
            self.calls.lock().unwrap().push("init".to_string());
            if self.init_fails {
                return Err(RestoreError::Spawn {
                    binary: "geth".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            Ok(ImportOutput {
                status: Some(0),
                ..Default::default()
            })
        }

        async fn import(&self, _working_dir: &Path, file: &Path) -> Result<ImportOutput> {
            let name = file.file_name().unwrap().to_string_lossy().to_string();
            self.calls.lock().unwrap().push(format!("import:{}", name));
            let status = if self.failing.contains(&name) { 1 } else { 0 };
            Ok(ImportOutput {
                status: Some(status),
                stdout: String::new(),
                stderr: if status == 0 { String::new() } else { "bad block".to_string() },
            })
        }
    }

    fn segments(names: &[&str]) -> Vec<FetchedSegment> {
        names
            .iter()
            .map(|name| FetchedSegment {
                file: name.to_string(),
                path: PathBuf::from("/work").join(name),
                bytes: 1,
            })
            .collect()
    }

    fn engine(runner: Arc<RecordingRunner>, policy: ImportFailurePolicy) -> ReplayEngine {
        ReplayEngine::new(runner, "/chain", "/work", policy)
    }

    #[tokio::test]
    async fn test_init_then_imports_in_order() {
        let runner = Arc::new(RecordingRunner::default());
        let report = engine(runner.clone(), ImportFailurePolicy::Continue)
            .replay(&segments(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(runner.calls(), vec!["init", "import:a", "import:b", "import:c"]);
        assert!(report.init.succeeded());
        assert_eq!(report.failed_imports().count(), 0);
    }

    #[tokio::test]
    async fn test_continue_past_failed_import() {
        let runner = Arc::new(RecordingRunner {
            failing: vec!["b".to_string()],
            ..Default::default()
        });
        let report = engine(runner.clone(), ImportFailurePolicy::Continue)
            .replay(&segments(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(runner.calls(), vec!["init", "import:a", "import:b", "import:c"]);
        let failed: Vec<_> = report.failed_imports().map(|r| r.target.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
    }

    #[tokio::test]
    async fn test_abort_on_failed_import() {
        let runner = Arc::new(RecordingRunner {
            failing: vec!["b".to_string()],
            ..Default::default()
        });
        let result = engine(runner.clone(), ImportFailurePolicy::Abort)
            .replay(&segments(&["a", "b", "c"]))
            .await;

        assert!(matches!(
            result,
            Err(RestoreError::Import { ref file, ref status }) if file == "b" && status == "1"
        ));
        assert_eq!(runner.calls(), vec!["init", "import:a", "import:b"]);
    }

    #[tokio::test]
    async fn test_init_failure_is_recorded_not_fatal() {
        let runner = Arc::new(RecordingRunner {
            init_fails: true,
            ..Default::default()
        });
        let report = engine(runner.clone(), ImportFailurePolicy::Abort)
            .replay(&segments(&["a"]))
            .await
            .unwrap();

        assert!(!report.init.succeeded());
        assert!(matches!(report.init.result, StepResult::SpawnFailed(_)));
        assert_eq!(runner.calls(), vec!["init", "import:a"]);
    }

    #[tokio::test]
    async fn test_empty_segment_list_still_inits() {
        let runner = Arc::new(RecordingRunner::default());
        let report = engine(runner.clone(), ImportFailurePolicy::Continue)
            .replay(&[])
            .await
            .unwrap();
        assert_eq!(runner.calls(), vec!["init"]);
        assert!(report.imports.is_empty());
    }
}
