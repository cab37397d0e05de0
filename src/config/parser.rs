//! Generic configuration parsing utilities.
//!
//! Reads a TOML file and deserializes it into any `DeserializeOwned` type,
//! keeping the file path in the error so the user knows which file to fix.
//!
//! ```rust,no_run
//! use catalog_sync::config::{Config, parse_config};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), catalog_sync::config::ConfigError> {
//! let config: Config = parse_config(Path::new("sync.toml"))?;
//! println!("{} task(s)", config.tasks.len());
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use std::path::Path;

use super::error::ConfigError;

/// Parse a TOML configuration file into the specified type.
///
/// # Errors
///
/// - [`ConfigError::Read`] if the file cannot be read
/// - [`ConfigError::Parse`] if the content is not valid TOML for `T`
pub fn parse_config<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        error,
    })
}
