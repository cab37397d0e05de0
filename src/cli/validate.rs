//! `validate` - check configuration without touching the catalog.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::ConfigArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ValidateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        print!("{}", report(&config));
        Ok(())
    }
}

/// One line per task with its services and finalized condition.
fn report(config: &Config) -> String {
    let mut out = String::new();

    for task in &config.tasks {
        let condition = task
            .condition
            .as_ref()
            .map_or_else(|| "no condition".to_string(), |c| c.describe());
        out.push_str(&format!(
            "{} {} services=[{}] {}\n",
            "✓".green(),
            task.name.bold(),
            task.services().join(", "),
            condition
        ));
    }

    out.push_str(&format!(
        "{} task(s) valid, writing to {}\n",
        config.tasks.len(),
        config.working_dir().display()
    ));
    out
}
