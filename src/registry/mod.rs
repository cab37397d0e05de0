//! Service registry access.
//!
//! The registry is the source of catalog data. This module defines the
//! [`Registry`] seam, the records and queries flowing through it, a
//! file-backed implementation, and the [`Poller`] that keeps the
//! [`Watcher`](crate::watcher::Watcher) supplied with fresh data.
//!
//! # Modules
//!
//! - `model` - nodes, service instances and [`Dependency`] queries
//! - `snapshot` - [`CatalogSnapshot`] and query evaluation
//! - `poller` - one background fetch loop per tracked dependency

mod model;
mod poller;
mod snapshot;

pub use model::{
    CatalogServiceEntry, CatalogServicesQuery, Dependency, DependencyData, HealthServiceQuery,
    Node, NodesQuery, ServiceInstance,
};
pub use poller::Poller;
pub use snapshot::{CatalogSnapshot, ServiceRegistration};

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// A source of catalog data.
pub trait Registry: Send + Sync + 'static {
    /// Fetch the current data for `dependency`.
    fn fetch(&self, dependency: &Dependency) -> impl Future<Output = Result<DependencyData>> + Send;
}

/// Registry backed by a JSON [`CatalogSnapshot`] file.
///
/// The file is read again on every fetch, so edits show up on the next poll.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the snapshot file.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read catalog file: {}", self.path.display()))?;
        CatalogSnapshot::from_json(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", self.path.display()))
    }
}

impl Registry for FileRegistry {
    async fn fetch(&self, dependency: &Dependency) -> Result<DependencyData> {
        let data = self.snapshot().await?.resolve(dependency)?;
        tracing::trace!(
            target: "registry",
            "Fetched {} record(s) for {}",
            data.len(),
            dependency
        );
        Ok(data)
    }
}
