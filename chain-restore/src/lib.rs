//! Chain Restore Library
//!
//! Rebuilds a node's chain store from segment backups kept in object storage:
//! selects one hash-linked chain of segments from the backup manifest,
//! downloads them, and replays them through the node's import command.

pub mod chain;
pub mod config;
pub mod fetcher;
pub mod import;
pub mod manifest;
pub mod marker;
pub mod pipeline;
pub mod replay;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use chain::{select_canonical_chain, CanonicalChain, LinkFailurePolicy};
pub use config::Config;
pub use manifest::{BackupSegment, Manifest};
pub use pipeline::{RestorePipeline, RestoreRun};
pub use replay::ImportFailurePolicy;
pub use utils::errors::RestoreError;
pub type Result<T> = std::result::Result<T, RestoreError>;
