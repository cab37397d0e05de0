//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, finalizing or validating configuration.
///
/// These are reported before any watch starts. They are fatal for the task
/// they concern but carry enough context (file, task, pattern) to fix the input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an explicit regexp nor any service names to infer one from.
    #[error("task.services and catalog-services regexp cannot both be unset")]
    MissingRegexp,

    /// The configured regexp does not compile.
    #[error("unable to compile catalog-services regexp '{pattern}': {error}")]
    InvalidRegexp {
        pattern: String,
        error: regex::Error,
    },

    /// A configuration file could not be read.
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML or has unknown keys.
    #[error("failed to parse config file {}: {error}", path.display())]
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },

    /// A task without a name.
    #[error("task name cannot be empty")]
    EmptyTaskName,

    /// A task name that cannot be used as a directory under the working directory.
    #[error("task name '{name}' {reason}")]
    InvalidTaskName { name: String, reason: String },

    /// Two tasks with the same name in one file.
    #[error("task '{0}' is defined more than once in the same file")]
    DuplicateTask(String),

    /// A task was requested by name but is not configured.
    #[error("task '{0}' is not defined")]
    UnknownTask(String),

    /// A task that would never watch anything.
    #[error("task '{0}' has neither services nor a condition")]
    NothingToWatch(String),

    /// A task's condition failed validation.
    #[error("task '{task}': {reason}")]
    InvalidTask {
        task: String,
        reason: Box<ConfigError>,
    },

    /// A custom template file could not be read.
    #[error("failed to read template for task '{task}' from {}", path.display())]
    TemplateRead {
        task: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Attach the task name to a condition error.
    pub fn for_task(self, task: &str) -> Self {
        Self::InvalidTask {
            task: task.to_string(),
            reason: Box::new(self),
        }
    }
}
