//! Runs `init` and `import` through the node binary.

use super::{ImportOutput, ImportRunner};
use crate::config::ImportConfig;
use crate::utils::errors::{RestoreError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

pub struct GethImportRunner {
    binary: PathBuf,
    genesis_file: String,
    extra_args: Vec<String>,
}

impl GethImportRunner {
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            genesis_file: config.genesis_file.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    fn args(&self, subcommand: &str, operand: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.extra_args.len() + 2);
        args.push(subcommand.to_string());
        args.extend(self.extra_args.iter().cloned());
        args.push(operand.to_string());
        args
    }

    async fn run(&self, args: Vec<String>, cwd: &Path) -> Result<ImportOutput> {
        info!(
            "Running {} {} in {}",
            self.binary.display(),
            args.join(" "),
            cwd.display()
        );

        let output = Command::new(&self.binary)
            .args(&args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|source| RestoreError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        Ok(ImportOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl ImportRunner for GethImportRunner {
    async fn init(&self, working_dir: &Path) -> Result<ImportOutput> {
        let args = self.args("init", &self.genesis_file);
        self.run(args, working_dir).await
    }

    async fn import(&self, working_dir: &Path, file: &Path) -> Result<ImportOutput> {
        let args = self.args("import", &file.to_string_lossy());
        self.run(args, working_dir).await
    }
}
