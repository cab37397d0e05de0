//! Configuration management for catalog-sync.
//!
//! Configuration is read from one or more TOML files. Each file is parsed into a
//! partial [`Config`]; the partials are merged in the order given (later files
//! take precedence), then finalized with defaults and validated before any
//! watch starts.
//!
//! # Modules
//!
//! - `condition` - task conditions and their merge/finalize/validate lifecycle
//! - `task` - task definitions
//! - `parser` - generic TOML parsing with file context
//! - `error` - [`ConfigError`]
//!
//! # Example
//!
//! ```toml
//! working_dir = "sync-tasks"
//! wait_timeout_secs = 60
//! poll_interval_secs = 5
//!
//! [[task]]
//! name = "web-lb"
//! description = "load balancer pool"
//! services = ["api", "web"]
//!
//! [task.condition]
//! type = "catalog-services"
//! regexp = "^api"
//! source_includes_var = true
//!
//! [task.services_meta.api]
//! owner = "team-a"
//! ```
//!
//! ## Merging
//!
//! Tasks are matched by name across files. A second file can therefore tweak a
//! single field of a task, for instance pin its datacenter:
//!
//! ```toml
//! [[task]]
//! name = "web-lb"
//!
//! [task.condition]
//! type = "catalog-services"
//! datacenter = "dc2"
//! ```

mod condition;
mod error;
mod parser;
mod task;

pub use condition::{
    CatalogServicesCondition, ConditionConfig, finalize_condition, merge_conditions,
    validate_condition,
};
pub use error::ConfigError;
pub use parser::parse_config;
pub use task::{ServicesMeta, TaskConfig};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, DEFAULT_WORKING_DIR};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory receiving one sub-directory per task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Seconds the driver loop waits for new data before reporting a timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,

    /// Seconds between two fetches of the same dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

impl Config {
    /// Load, merge, finalize and validate the given files.
    ///
    /// # Errors
    ///
    /// Returns the first read, parse or validation error encountered.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for path in paths {
            let partial: Self = parse_config(path)?;
            partial.check_unique_names()?;
            tracing::debug!("Loaded {} task(s) from {}", partial.tasks.len(), path.display());
            config = config.merge(&partial);
        }

        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Combine with `other`, values in `other` taking precedence.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();

        if let Some(dir) = &other.working_dir {
            merged.working_dir = Some(dir.clone());
        }
        if let Some(secs) = other.wait_timeout_secs {
            merged.wait_timeout_secs = Some(secs);
        }
        if let Some(secs) = other.poll_interval_secs {
            merged.poll_interval_secs = Some(secs);
        }

        for task in &other.tasks {
            match merged.tasks.iter_mut().find(|t| t.name == task.name) {
                Some(existing) => *existing = existing.merge(task),
                None => merged.tasks.push(task.clone()),
            }
        }

        merged
    }

    /// Apply defaults to every task.
    pub fn finalize(&mut self) {
        self.working_dir.get_or_insert_with(|| PathBuf::from(DEFAULT_WORKING_DIR));
        self.wait_timeout_secs.get_or_insert(DEFAULT_WAIT_TIMEOUT.as_secs());
        self.poll_interval_secs.get_or_insert(DEFAULT_POLL_INTERVAL.as_secs());

        for task in &mut self.tasks {
            task.finalize();
        }
    }

    /// Validate every task. Intended to run after [`finalize`](Self::finalize).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_unique_names()?;
        self.tasks.iter().try_for_each(TaskConfig::validate)
    }

    /// Look up a task by name.
    pub fn task(&self, name: &str) -> Result<&TaskConfig, ConfigError> {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTask(name.to_string()))
    }

    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_deref().unwrap_or_else(|| Path::new(DEFAULT_WORKING_DIR))
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout_secs.map_or(DEFAULT_WAIT_TIMEOUT, Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs.map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs)
    }

    fn check_unique_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(ConfigError::DuplicateTask(task.name.clone()));
            }
        }
        Ok(())
    }
}
