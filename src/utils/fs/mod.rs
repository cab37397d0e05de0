//! File system helpers for writing rendered output.

mod atomic;

pub use atomic::{atomic_write, write_if_changed};

use anyhow::{Context, Result};
use std::path::Path;

/// Create `path` and its parents if missing.
///
/// # Errors
///
/// Fails if the directory cannot be created or `path` exists as a file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}
