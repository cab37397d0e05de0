//! Shared helpers
//!
//! # Modules
//!
//! - [`fs`] - directory creation and atomic file writes
//! - [`backoff`] - exponential delays for retried fetches
//! - [`path_validation`] - checks for names used as directories

pub mod backoff;
pub mod fs;
pub mod path_validation;

pub use fs::{atomic_write, ensure_dir, write_if_changed};
