//! Global constants used throughout catalog-sync.
//!
//! Timeouts, polling intervals and retry parameters live here so the numbers
//! shared between the watcher, the fetch loop and the CLI stay in one place.

use std::time::Duration;

/// Default time the driver loop waits for new dependency data (60 seconds).
///
/// When the deadline passes without data the watcher reports a timeout. Watch
/// mode simply waits again; once mode treats it as a failure.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between two fetches of the same dependency (5 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum backoff delay for exponential backoff (500ms).
///
/// Exponential backoff delays are capped at this value to prevent
/// excessive wait times during retry operations.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
///
/// This is the initial delay used in exponential backoff calculations,
/// which doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Directory that receives one sub-directory per task when none is configured.
pub const DEFAULT_WORKING_DIR: &str = "sync-tasks";

/// File name of the rendered artifact inside a task directory.
pub const TFVARS_FILE_NAME: &str = "terraform.tfvars";

/// Condition type tag accepted in configuration files.
pub const CATALOG_SERVICES_CONDITION_TYPE: &str = "catalog-services";
