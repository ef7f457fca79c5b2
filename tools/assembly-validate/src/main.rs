use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// Check a cloud assembly written by `jci synth`.
#[derive(Debug, Parser)]
#[command(name = "jci-assembly-validate", version, about)]
struct Args {
    /// Assembly directory.
    #[arg(default_value = "cdk.out", env = "JCI_OUTDIR")]
    dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let report = jci_assembly_validate::validate(&args.dir)?;
    println!(
        "OK: {} templates match the manifest; {} imports resolve to exports",
        report.templates, report.imports
    );
    Ok(())
}
