//! Persisting rendered task output.
//!
//! A [`Provisioner`] receives the bytes of every changed render. The
//! [`TfvarsWriter`] stores them as `<working_dir>/<task>/terraform.tfvars`;
//! running Terraform on the result is left to the operator.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::constants::TFVARS_FILE_NAME;
use crate::utils::path_validation::validate_file_name;
use crate::utils::write_if_changed;

/// Consumer of rendered task output.
pub trait Provisioner: Send + Sync {
    /// Apply `contents` rendered for `task`.
    fn apply(&self, task: &str, contents: &[u8]) -> impl Future<Output = Result<()>> + Send;
}

/// Writes each task's output to its own directory.
#[derive(Debug, Clone)]
pub struct TfvarsWriter {
    working_dir: PathBuf,
}

impl TfvarsWriter {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Location of `task`'s tfvars file.
    pub fn path_for(&self, task: &str) -> PathBuf {
        self.working_dir.join(task).join(TFVARS_FILE_NAME)
    }
}

impl Provisioner for TfvarsWriter {
    async fn apply(&self, task: &str, contents: &[u8]) -> Result<()> {
        validate_file_name(task)
            .with_context(|| format!("Refusing to write output for task '{task}'"))?;
        let path = self.path_for(task);
        let contents = contents.to_vec();
        let target = path.clone();

        let written = tokio::task::spawn_blocking(move || write_if_changed(&target, &contents))
            .await
            .context("tfvars write task panicked")?
            .with_context(|| format!("Failed to write output for task '{task}'"))?;

        if written {
            tracing::info!(target: "controller", "Wrote {}", path.display());
        } else {
            tracing::debug!(target: "controller", "{} already up to date", path.display());
        }
        Ok(())
    }
}
