//! Error presentation for the command line.
//!
//! Module errors stay typed ([`ConfigError`](crate::config::ConfigError),
//! [`TemplateError`](crate::templating::TemplateError),
//! [`WatchError`](crate::watcher::WatchError)) and travel through `anyhow`.
//! At the top of the binary [`user_friendly_error`] turns whatever arrived
//! into an [`ErrorContext`] with details and a suggestion.

pub mod error;

pub use error::{ErrorContext, user_friendly_error};
