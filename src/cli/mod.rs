//! Command-line interface for catalog-sync.
//!
//! # Commands
//!
//! - `validate` - load, merge and validate configuration files
//! - `template` - print a task's template body and variables
//! - `render` - render every task once from a catalog file and exit
//! - `watch` - keep tasks in sync with a catalog file until interrupted
//!
//! # Global Options
//!
//! - `--verbose` - debug logging
//! - `--quiet` - errors only
//!
//! Without either flag `RUST_LOG` is honoured, defaulting to `info`. Logs go
//! to stderr so command output on stdout stays clean.
//!
//! # Examples
//!
//! ```bash
//! catalog-sync validate --config base.toml --config prod.toml
//! catalog-sync template --config sync.toml --task web-lb
//! catalog-sync render --config sync.toml --catalog catalog.json --timeout 10
//! catalog-sync --verbose watch --config sync.toml --catalog catalog.json
//! ```

mod run;
mod template;
mod validate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Keep generated HCL variable files in sync with a service catalog.
#[derive(Parser, Debug)]
#[command(
    name = "catalog-sync",
    about = "Keep generated HCL variable files in sync with a service catalog",
    version,
    long_about = "catalog-sync renders one terraform.tfvars file per task from the services \
                  and nodes in a service catalog, and re-renders it whenever a relevant \
                  registration changes."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration files and print each task's condition.
    Validate(validate::ValidateCommand),

    /// Print the template body and variables of one task.
    Template(template::TemplateCommand),

    /// Render every task once and exit.
    Render(run::RenderCommand),

    /// Re-render tasks on every relevant catalog change until interrupted.
    Watch(run::WatchCommand),
}

/// Configuration files shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file. Repeat to merge several; later files take precedence.
    #[arg(short, long = "config", value_name = "FILE", required = true)]
    pub config: Vec<PathBuf>,
}

impl ConfigArgs {
    /// Load, merge, finalize and validate the configured files.
    pub fn load(&self) -> Result<Config> {
        Ok(Config::load(&self.config)?)
    }
}

impl Cli {
    /// Initialize logging and run the selected command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        match self.command {
            Commands::Validate(cmd) => cmd.execute(),
            Commands::Template(cmd) => cmd.execute(),
            Commands::Render(cmd) => cmd.execute().await,
            Commands::Watch(cmd) => cmd.execute().await,
        }
    }

    /// Log filter for the global flags.
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "catalog-sync",
            "render",
            "--config",
            "a.toml",
            "--config",
            "b.toml",
            "--catalog",
            "catalog.json",
            "--timeout",
            "5",
        ]);

        match cli.command {
            Commands::Render(cmd) => {
                assert_eq!(cmd.config.config, vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]);
                assert_eq!(cmd.timeout, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_config_is_required() {
        assert!(Cli::try_parse_from(["catalog-sync", "validate"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(
            Cli::try_parse_from(["catalog-sync", "-v", "-q", "validate", "--config", "a.toml"])
                .is_err()
        );
    }

    #[test]
    fn test_log_filter_from_flags() {
        let cli = Cli::parse_from(["catalog-sync", "--verbose", "validate", "--config", "a.toml"]);
        assert_eq!(cli.log_filter().to_string(), "debug");

        let cli = Cli::parse_from(["catalog-sync", "validate", "--quiet", "--config", "a.toml"]);
        assert_eq!(cli.log_filter().to_string(), "error");
    }
}
