//! `jci template`: print one stack's template.

use anyhow::Result;
use clap::Args;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct TemplateCommand {
    /// Stack name.
    stack: String,

    /// Print YAML instead of JSON.
    #[arg(long)]
    yaml: bool,
}

impl TemplateCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let assembly = ctx.synthesize()?;
        let artifact = ctx.require_stack(&assembly, &self.stack)?;
        let text = if self.yaml {
            artifact.template.to_yaml()?
        } else {
            artifact.template.to_json_pretty()?
        };
        println!("{}", text.trim_end());
        Ok(())
    }
}
