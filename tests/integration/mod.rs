//! Integration test suite for catalog-sync
//!
//! End-to-end runs of the controller against a file-backed catalog, plus the
//! command-line binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: `validate`, `template` and `render` through the binary
//! - **render**: once mode writing tfvars files
//! - **watch**: re-rendering after the catalog file changes

mod cli;
mod render;
mod watch;
