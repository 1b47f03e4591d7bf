//! Configuration management for the restore tool.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! (`CHAIN_RESTORE__<SECTION>__<KEY>`, e.g. `CHAIN_RESTORE__STORAGE__BUCKET`).

use crate::chain::LinkFailurePolicy;
use crate::manifest::is_bare_file_name;
use crate::replay::ImportFailurePolicy;
use crate::utils::errors::{RestoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CHAIN_RESTORE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub restore: RestoreConfig,
    /// Only needed by commands that read the bucket (`run`, `plan`)
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Where the manifest and segment blobs are downloaded
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Restore-mode sentinel consumed by the bootstrap process
    #[serde(default = "default_marker_path")]
    pub marker_path: PathBuf,

    /// Object key of the manifest under the environment prefix
    #[serde(default = "default_manifest_key")]
    pub manifest_key: String,

    /// Upper bound on a single blob download, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub link_failure_policy: LinkFailurePolicy,

    #[serde(default)]
    pub import_failure_policy: ImportFailurePolicy,
}

/// Object store connection. One immutable value handed to the blob store
/// constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub provider: Provider,

    /// Environment folder every key lives under
    #[serde(default)]
    pub env_prefix: String,

    /// S3 bucket, Azure container, or root directory for `local`
    pub bucket: String,

    /// S3 region (ignored by other providers)
    #[serde(default)]
    pub region: Option<String>,

    /// Falls back to the provider's standard environment variables when unset
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Local,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// AWS access key id, or Azure storage account name
    pub key_id: String,

    /// AWS secret access key, or Azure account key
    pub secret: String,

    #[serde(default)]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Node binary providing `init` and `import`
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// Genesis file passed to `init`, relative to `chain_dir`
    #[serde(default = "default_genesis_file")]
    pub genesis_file: String,

    /// Working directory for `init`
    #[serde(default = "default_chain_dir")]
    pub chain_dir: PathBuf,

    /// Extra arguments appended after the subcommand, before its operand
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output (stdout, stderr)
    #[serde(default = "default_log_output")]
    pub output: String,
}

// Default values
fn default_work_dir() -> PathBuf {
    PathBuf::from("/qdata/backups")
}

fn default_marker_path() -> PathBuf {
    PathBuf::from("/qdata/ethereum/.restore_mode")
}

fn default_manifest_key() -> String {
    "backup_snapshot.json".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    30 * 60
}

fn default_binary() -> PathBuf {
    PathBuf::from("/usr/local/bin/geth")
}

fn default_genesis_file() -> String {
    "genesis.json".to_string()
}

fn default_chain_dir() -> PathBuf {
    PathBuf::from("/qdata/ethereum")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            marker_path: default_marker_path(),
            manifest_key: default_manifest_key(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            link_failure_policy: LinkFailurePolicy::default(),
            import_failure_policy: ImportFailurePolicy::default(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            genesis_file: default_genesis_file(),
            chain_dir: default_chain_dir(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

impl RestoreConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Config {
    /// Storage settings, or a config error when the section is missing.
    pub fn storage(&self) -> Result<&StorageConfig> {
        self.storage
            .as_ref()
            .ok_or_else(|| RestoreError::Config("missing [storage] section".to_string()))
    }

    /// Load configuration from an optional TOML file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
        Self::build(builder)
    }

    /// Parse configuration from TOML text, without environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: ::config::ConfigBuilder<::config::builder::DefaultState>) -> Result<Self> {
        let config: Config = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| RestoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(storage) = &self.storage {
            if storage.bucket.trim().is_empty() {
                return Err(RestoreError::Config(
                    "storage.bucket must name a bucket, container or directory".to_string(),
                ));
            }
        }
        if self.restore.fetch_timeout_secs == 0 {
            return Err(RestoreError::Config(
                "restore.fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !is_bare_file_name(&self.restore.manifest_key) {
            return Err(RestoreError::Config(format!(
                "restore.manifest_key {:?} must be a plain file name",
                self.restore.manifest_key
            )));
        }
        Ok(())
    }
}
