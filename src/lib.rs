//! catalog-sync - keep generated HCL in sync with a service catalog
//!
//! catalog-sync watches a service registry for changes that match a task's
//! condition and re-renders a `terraform.tfvars` style artifact describing the
//! matched services and nodes whenever a relevant change lands.
//!
//! # Architecture Overview
//!
//! The pipeline is made of four cooperating pieces:
//!
//! - A **condition** ([`config::ConditionConfig`]) describes which services are
//!   relevant to a task (regular expression, datacenter, namespace, node metadata).
//! - The **watcher** ([`watcher::Watcher`]) tracks every dependency a template
//!   references, caches the latest value delivered by the fetch loop, and knows
//!   which templates have unseen data.
//! - The **resolver** ([`resolver::Resolver`]) runs one rendering pass and
//!   reports whether the output is complete, unchanged, or still waiting on data.
//! - The **function registry** ([`templating::FunctionRegistry`]) turns service
//!   and node records into deterministic HCL fragments inside Tera templates.
//!
//! The [`controller::Controller`] drives these pieces as a small state machine
//! and hands complete renders to a [`provision::Provisioner`].
//!
//! # Configuration Format
//!
//! ```toml
//! working_dir = "sync-tasks"
//!
//! [[task]]
//! name = "web-lb"
//! services = ["api", "web"]
//!
//! [task.condition]
//! type = "catalog-services"
//! regexp = "^api"
//! source_includes_var = true
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Check a configuration without touching the catalog
//! catalog-sync validate --config sync.toml
//!
//! # Render every task once and exit
//! catalog-sync render --config sync.toml --catalog catalog.json
//!
//! # Keep rendering until interrupted
//! catalog-sync watch --config sync.toml --catalog catalog.json
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod core;
pub mod provision;
pub mod registry;
pub mod resolver;
pub mod templating;
pub mod utils;
pub mod watcher;

// test_utils is available for integration tests through the test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
