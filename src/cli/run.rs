//! `render` and `watch` - drive tasks against a catalog file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::task::JoinHandle;

use super::ConfigArgs;
use crate::config::Config;
use crate::controller::Controller;
use crate::provision::TfvarsWriter;
use crate::registry::{FileRegistry, Poller};
use crate::watcher::Watcher;

#[derive(Args, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Catalog snapshot (JSON) to read services and nodes from.
    #[arg(long, value_name = "FILE")]
    pub catalog: PathBuf,

    /// Seconds to wait for missing data. Overrides `wait_timeout_secs`; 0 waits forever.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl RenderCommand {
    pub async fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let (mut controller, poller) = start(&config, &self.catalog)?;
        if let Some(secs) = self.timeout {
            controller.set_wait_timeout(Duration::from_secs(secs));
        }

        let result = controller.run_once().await;
        controller.watcher().stop();
        poller.await.context("Catalog poller failed")?;
        result?;

        for driver in controller.drivers() {
            println!(
                "{} {} -> {}",
                "✓".green(),
                driver.name(),
                controller.provisioner().path_for(driver.name()).display()
            );
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Catalog snapshot (JSON), re-read every poll interval.
    #[arg(long, value_name = "FILE")]
    pub catalog: PathBuf,
}

impl WatchCommand {
    pub async fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let (mut controller, poller) = start(&config, &self.catalog)?;

        let watcher = controller.watcher().clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: "controller", "Interrupted, stopping");
                watcher.stop();
            }
        });

        tracing::info!(
            target: "controller",
            "Watching {} for {} task(s)",
            self.catalog.display(),
            controller.drivers().len()
        );
        let result = controller.run_watch().await;

        interrupt.abort();
        controller.watcher().stop();
        poller.await.context("Catalog poller failed")?;
        result
    }
}

/// Build the controller and spawn the poller feeding its watcher.
fn start(config: &Config, catalog: &Path) -> Result<(Controller<TfvarsWriter>, JoinHandle<()>)> {
    let (watcher, fetches) = Watcher::with_fetch_channel();
    let controller =
        Controller::new(config, watcher.clone(), TfvarsWriter::new(config.working_dir()))?;

    let registry = Arc::new(FileRegistry::new(catalog));
    let poller = Poller::spawn(registry, watcher, fetches, config.poll_interval());
    Ok((controller, poller))
}
