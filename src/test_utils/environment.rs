//! A temporary directory with a config file, a catalog file and an output
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use super::fixtures::{CatalogFixture, ConfigFixture};
use crate::constants::TFVARS_FILE_NAME;

/// Isolated files for one test. Removed on drop.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new().context("Failed to create temp dir")?,
        })
    }

    /// `basic` catalog plus the `web-lb` config writing into [`output_dir`](Self::output_dir).
    pub fn web_lb() -> Result<Self> {
        let env = Self::new()?;
        let output = env.output_dir();
        env.write_config(&ConfigFixture::web_lb(&output.to_string_lossy()))?;
        env.write_catalog(&CatalogFixture::basic())?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("sync.toml")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.path().join("catalog.json")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    /// Rendered tfvars path of `task`.
    pub fn tfvars_path(&self, task: &str) -> PathBuf {
        self.output_dir().join(task).join(TFVARS_FILE_NAME)
    }

    pub fn write_config(&self, fixture: &ConfigFixture) -> Result<()> {
        fs::write(self.config_path(), &fixture.content).context("Failed to write config")
    }

    pub fn write_catalog(&self, fixture: &CatalogFixture) -> Result<()> {
        fs::write(self.catalog_path(), &fixture.content).context("Failed to write catalog")
    }

    pub fn read_tfvars(&self, task: &str) -> Result<String> {
        let path = self.tfvars_path(task);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}
