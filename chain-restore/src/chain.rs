//! Canonical chain selection.
//!
//! Walks the manifest from block 0 upward, picking at each frontier height the
//! segment to replay next. Repeated backup runs leave several segments starting
//! at the same height; the most recently captured one wins.

use crate::manifest::BackupSegment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What to do when the only segment at the frontier does not hash-link to the
/// last accepted one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkFailurePolicy {
    /// Drop the segment but still advance the frontier past its end block.
    /// Matches the behaviour of existing deployments; can leave a hole in the
    /// replayed history.
    #[default]
    Skip,
    /// Stop selection at the unlinked segment.
    Halt,
}

/// Replay-ordered segments. Starts at block 0 when non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalChain {
    segments: Vec<BackupSegment>,
}

impl CanonicalChain {
    pub fn segments(&self) -> &[BackupSegment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackupSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Highest block covered, if any.
    pub fn tip(&self) -> Option<u64> {
        self.segments.last().map(|s| s.end_block.height)
    }
}

/// Select the canonical chain from a manifest's candidate segments.
///
/// The frontier strictly increases every round (`end >= start`), so selection
/// always terminates. Identical input yields identical output: ties on
/// `captured_at` go to the candidate listed last.
pub fn select_canonical_chain(
    candidates: &[BackupSegment],
    policy: LinkFailurePolicy,
) -> CanonicalChain {
    let mut by_start: BTreeMap<u64, Vec<&BackupSegment>> = BTreeMap::new();
    for segment in candidates {
        by_start
            .entry(segment.start_block.height)
            .or_default()
            .push(segment);
    }

    let mut chain: Vec<BackupSegment> = Vec::new();
    let mut frontier = 0u64;

    while let Some(at_frontier) = by_start.get(&frontier) {
        let chosen = match at_frontier.as_slice() {
            [single] => {
                let linked = match chain.last() {
                    None => true,
                    Some(previous) => previous.links_to(single),
                };
                if linked {
                    chain.push((*single).clone());
                } else {
                    warn!(
                        "Segment {} (blocks {}-{}) does not link to {}",
                        single.file,
                        single.start_block.height,
                        single.end_block.height,
                        chain.last().map(|s| s.file.as_str()).unwrap_or_default()
                    );
                    if policy == LinkFailurePolicy::Halt {
                        break;
                    }
                }
                *single
            }
            [first, rest @ ..] => {
                let latest = rest.iter().copied().fold(*first, |best, next| {
                    if best.captured_at > next.captured_at {
                        best
                    } else {
                        next
                    }
                });
                debug!(
                    "{} segments start at block {}, taking {} captured {}",
                    rest.len() + 1,
                    frontier,
                    latest.file,
                    latest.captured_at
                );
                chain.push(latest.clone());
                latest
            }
            [] => break,
        };

        match chosen.end_block.height.checked_add(1) {
            Some(next) => frontier = next,
            None => break,
        }
    }

    CanonicalChain { segments: chain }
}
