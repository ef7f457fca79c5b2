//! `jci synth`: write the cloud assembly.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use crate::output::{
    display_list, print_output, print_single, print_success, print_warning, OutputFormat,
};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct SynthCommand {
    /// Only print the summary, do not write files.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct StackSummary {
    #[tabled(rename = "Stack")]
    stack: String,

    #[tabled(rename = "Environment")]
    environment: String,

    #[tabled(rename = "Resources")]
    resources: usize,

    #[tabled(rename = "Outputs")]
    outputs: usize,

    #[tabled(rename = "Depends on")]
    depends_on: String,

    #[tabled(rename = "Template")]
    template: String,
}

impl SynthCommand {
    pub fn run(self, ctx: CommandContext) -> Result<()> {
        let assembly = ctx.synthesize()?;

        for missing in assembly.missing() {
            print_warning(&format!(
                "context value {} is missing; add it to {} for stable zone names",
                missing.key,
                ctx.config.context_file.display()
            ));
        }

        let rows: Vec<StackSummary> = assembly
            .stacks()
            .iter()
            .map(|s| StackSummary {
                stack: s.name.to_string(),
                environment: s.environment.to_string(),
                resources: s.template.resources().len(),
                outputs: s.template.outputs().len(),
                depends_on: display_list(&s.dependencies),
                template: s.template_file(),
            })
            .collect();

        if self.dry_run {
            print_output(&rows, ctx.format);
            return Ok(());
        }

        let outdir = &ctx.config.outdir;
        let manifest = assembly
            .write(outdir)
            .with_context(|| format!("Failed to write assembly to {}", outdir.display()))?;
        info!(outdir = %outdir.display(), stacks = rows.len(), "assembly written");

        match ctx.format {
            OutputFormat::Json => print_single(&manifest),
            OutputFormat::Table => {
                print_output(&rows, ctx.format);
                print_success(&format!("Assembly written to {}", outdir.display()));
            }
        }
        Ok(())
    }
}
