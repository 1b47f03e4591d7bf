//! Backup snapshot manifest.
//!
//! Each backup run appends the segments it exported to `history`, so the
//! manifest accumulates overlapping and duplicate ranges over time. Choosing
//! among them is the selector's job; this module only parses and validates.

use crate::utils::errors::{RestoreError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed snapshot manifest (`backup_snapshot.json`).
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub history: Vec<BackupSegment>,
}

/// One exported block range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSegment {
    /// Object key under the environment prefix; also the local file name
    pub file: String,
    pub start_block: StartBlock,
    pub end_block: EndBlock,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartBlock {
    pub height: u64,
    pub hash: Option<String>,
    pub parent_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndBlock {
    pub height: u64,
    pub hash: String,
}

// Wire shapes, validated into the public types above.

#[derive(Deserialize)]
struct RawManifest {
    history: Vec<RawSegment>,
}

#[derive(Deserialize)]
struct RawSegment {
    file: String,
    start_block: RawStartBlock,
    end_block: RawEndBlock,
    date: String,
}

#[derive(Deserialize)]
struct RawStartBlock {
    block: u64,
    #[serde(default)]
    hash: Option<String>,
    parent_hash: String,
}

#[derive(Deserialize)]
struct RawEndBlock {
    block: u64,
    hash: String,
}

impl Manifest {
    /// Parse and validate manifest JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)?;
        let history = raw
            .history
            .into_iter()
            .enumerate()
            .map(|(index, segment)| BackupSegment::from_raw(index, segment))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { history })
    }

    /// Read a manifest previously downloaded to disk.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(&bytes)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl BackupSegment {
    fn from_raw(index: usize, raw: RawSegment) -> Result<Self> {
        let invalid = |reason: String| RestoreError::ManifestInvalid { index, reason };

        if !is_bare_file_name(&raw.file) {
            return Err(invalid(format!("file {:?} is not a plain file name", raw.file)));
        }
        if raw.end_block.block < raw.start_block.block {
            return Err(invalid(format!(
                "end block {} precedes start block {}",
                raw.end_block.block, raw.start_block.block
            )));
        }
        let captured_at = parse_captured_at(&raw.date)
            .ok_or_else(|| invalid(format!("unrecognised date {:?}", raw.date)))?;

        Ok(Self {
            file: raw.file,
            start_block: StartBlock {
                height: raw.start_block.block,
                hash: raw.start_block.hash,
                parent_hash: raw.start_block.parent_hash,
            },
            end_block: EndBlock {
                height: raw.end_block.block,
                hash: raw.end_block.hash,
            },
            captured_at,
        })
    }

    /// Whether `next` continues this segment: contiguous heights and matching
    /// boundary hashes.
    pub fn links_to(&self, next: &BackupSegment) -> bool {
        self.end_block.height.checked_add(1) == Some(next.start_block.height)
            && self.end_block.hash == next.start_block.parent_hash
    }
}

/// Non-empty, not `.` or `..`, and free of path separators.
pub(crate) fn is_bare_file_name(file: &str) -> bool {
    !file.is_empty() && file != "." && file != ".." && !file.contains(['/', '\\'])
}

// Seconds are optional in ISO 8601 date-times.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"];

/// Accepts RFC 3339 and ISO-8601 date-times with or without seconds, with a
/// `Z` or numeric offset or none at all (taken as UTC), and bare dates (UTC
/// midnight).
pub fn parse_captured_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(naive) = value.strip_suffix(['Z', 'z']).and_then(parse_naive) {
        return Some(naive.and_utc());
    }
    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
    {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(naive) = parse_naive(value) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
