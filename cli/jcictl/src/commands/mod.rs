//! CLI commands.

mod list;
mod outputs;
mod synth;
mod template;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jci_stacks::{build_app, AppSettings, StacksError};
use jci_synth::{CloudAssembly, Context};
use tracing::debug;

use crate::config::Config;
use crate::error::CliError;
use crate::output::OutputFormat;

/// jci - synthesize the Jenkins deployment into a cloud assembly.
#[derive(Debug, Parser)]
#[command(name = "jci")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Assembly directory (overrides JCI_OUTDIR).
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Context file (overrides JCI_CONTEXT_FILE).
    #[arg(long, global = true)]
    context: Option<PathBuf>,

    /// Settings file (overrides JCI_SETTINGS_FILE).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the cloud assembly.
    Synth(synth::SynthCommand),

    /// List stacks, their environments and dependencies.
    List,

    /// Print one stack's template.
    Template(template::TemplateCommand),

    /// List stack outputs and export names.
    Outputs,

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub fn run(self, mut config: Config) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        if let Some(out) = self.out {
            config.outdir = out;
        }
        if let Some(context) = self.context {
            config.context_file = context;
        }
        if let Some(settings) = self.settings {
            config.settings_file = settings;
        }

        let ctx = CommandContext { config, format };

        match self.command {
            Commands::Synth(cmd) => cmd.run(ctx),
            Commands::List => list::run(ctx),
            Commands::Template(cmd) => cmd.run(ctx),
            Commands::Outputs => outputs::run(ctx),
            Commands::Version => {
                println!("jci {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Build the app from settings and context, then synthesize it.
    pub fn synthesize(&self) -> Result<CloudAssembly> {
        let settings = AppSettings::load(&self.config.settings_file).map_err(CliError::from)?;
        let context = Context::load(&self.config.context_file)
            .map_err(|e| CliError::from(StacksError::from(e)))?;
        debug!(
            settings = %self.config.settings_file.display(),
            context_entries = context.len(),
            "inputs loaded"
        );

        let built = build_app(&settings, self.config.env.clone(), context).map_err(CliError::from)?;
        let assembly = built
            .app
            .synth()
            .map_err(|e| CliError::from(StacksError::from(e)))?;
        Ok(assembly)
    }

    /// Look up a stack by name.
    pub fn require_stack<'a>(
        &self,
        assembly: &'a CloudAssembly,
        name: &str,
    ) -> Result<&'a jci_synth::StackArtifact> {
        assembly.stack(name).ok_or_else(|| {
            CliError::UnknownStack {
                name: name.to_string(),
                available: assembly.stacks().iter().map(|s| s.name.to_string()).collect(),
            }
            .into()
        })
    }
}
