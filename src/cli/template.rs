//! `template` - show what a task renders with.

use anyhow::Result;
use clap::Args;

use super::ConfigArgs;
use crate::templating::task_template;

#[derive(Args, Debug)]
pub struct TemplateCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Name of the task to show.
    #[arg(short, long)]
    pub task: String,
}

impl TemplateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.config.load()?;
        let template = task_template(config.task(&self.task)?)?;

        println!("# template {}", template.id());
        println!("{}", template.body().trim_end());
        println!("# vars");
        println!("{}", serde_json::to_string_pretty(template.vars())?);
        Ok(())
    }
}
