//! Restore pipeline - ties manifest, selection, download and replay together.
//!
//! Order is fixed: fetch the manifest, select the canonical chain, download
//! every selected segment, run `init` and the imports, then clear the marker.
//! A fatal error anywhere before the marker is cleared leaves it in place so
//! the supervisor re-runs the whole pipeline.

use crate::chain::{select_canonical_chain, CanonicalChain, LinkFailurePolicy};
use crate::config::Config;
use crate::fetcher::SegmentFetcher;
use crate::import::ImportRunner;
use crate::manifest::Manifest;
use crate::marker::RestoreMarker;
use crate::replay::{ReplayEngine, ReplayReport};
use crate::storage::BlobStore;
use crate::utils::errors::{RestoreError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Everything one pipeline execution produced.
#[derive(Debug)]
pub struct RestoreRun {
    pub run_id: Uuid,
    pub manifest: Manifest,
    pub chain: CanonicalChain,
    /// Files downloaded to the working directory
    pub fetched: BTreeSet<String>,
    /// Files whose import exited successfully
    pub imported: BTreeSet<String>,
    pub replay: ReplayReport,
}

impl RestoreRun {
    /// Files whose import failed, in chain order.
    pub fn failed_imports(&self) -> Vec<&str> {
        self.replay
            .failed_imports()
            .map(|record| record.target.as_str())
            .collect()
    }
}

pub struct RestorePipeline {
    fetcher: SegmentFetcher,
    replay: ReplayEngine,
    marker: RestoreMarker,
    manifest_key: String,
    link_policy: LinkFailurePolicy,
}

impl RestorePipeline {
    pub fn new(
        fetcher: SegmentFetcher,
        replay: ReplayEngine,
        marker: RestoreMarker,
        manifest_key: impl Into<String>,
        link_policy: LinkFailurePolicy,
    ) -> Self {
        Self {
            fetcher,
            replay,
            marker,
            manifest_key: manifest_key.into(),
            link_policy,
        }
    }

    /// Wire the pipeline from configuration around the given capabilities.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn BlobStore>,
        runner: Arc<dyn ImportRunner>,
    ) -> Result<Self> {
        let restore = &config.restore;
        let fetcher = SegmentFetcher::new(
            store,
            config.storage()?.env_prefix.clone(),
            restore.work_dir.clone(),
            restore.fetch_timeout(),
        );
        let replay = ReplayEngine::new(
            runner,
            config.import.chain_dir.clone(),
            restore.work_dir.clone(),
            restore.import_failure_policy,
        );
        Ok(Self::new(
            fetcher,
            replay,
            RestoreMarker::new(restore.marker_path.clone()),
            restore.manifest_key.clone(),
            restore.link_failure_policy,
        ))
    }

    pub fn marker(&self) -> &RestoreMarker {
        &self.marker
    }

    /// Fetch the manifest and select the chain without downloading segments.
    pub async fn plan(&self) -> Result<(Manifest, CanonicalChain)> {
        let manifest = self.fetcher.fetch_manifest(&self.manifest_key).await?;
        let chain = select_canonical_chain(&manifest.history, self.link_policy);
        info!(
            "Selected {} of {} manifest segments (tip: {})",
            chain.len(),
            manifest.len(),
            chain
                .tip()
                .map(|tip| tip.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Ok((manifest, chain))
    }

    /// Execute one full restore.
    pub async fn run(&self) -> Result<RestoreRun> {
        let run_id = Uuid::new_v4();
        self.execute(run_id)
            .instrument(info_span!("restore", %run_id))
            .await
    }

    async fn execute(&self, run_id: Uuid) -> Result<RestoreRun> {
        let started = Instant::now();
        info!("Starting restore run");

        let (manifest, chain) = self.plan().await?;
        if chain.is_empty() {
            return Err(RestoreError::NoCanonicalSegment);
        }

        let fetched = self.fetcher.fetch_chain(&chain).await?;
        let replay = self.replay.replay(&fetched).await?;

        let imported: BTreeSet<String> = replay
            .imports
            .iter()
            .filter(|record| record.succeeded())
            .map(|record| record.target.clone())
            .collect();
        let failed = replay.failed_imports().count();
        if failed > 0 {
            warn!(
                "{} of {} imports failed; the chain store may be incomplete",
                failed,
                replay.imports.len()
            );
        }

        self.marker.clear().await?;

        info!(
            "Restore run finished in {:.1}s: {} segments imported, {} failed",
            started.elapsed().as_secs_f64(),
            imported.len(),
            failed
        );

        Ok(RestoreRun {
            run_id,
            manifest,
            fetched: fetched.into_iter().map(|segment| segment.file).collect(),
            chain,
            imported,
            replay,
        })
    }
}
