//! `jci outputs`: declared outputs and their export names.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{display_option, print_output};

use super::CommandContext;

#[derive(Debug, Serialize, Tabled)]
struct OutputRow {
    #[tabled(rename = "Stack")]
    stack: String,

    #[tabled(rename = "Output")]
    output: String,

    #[tabled(rename = "Export")]
    export: String,

    #[tabled(rename = "Description")]
    description: String,
}

pub fn run(ctx: CommandContext) -> Result<()> {
    let assembly = ctx.synthesize()?;
    let rows: Vec<OutputRow> = assembly
        .stacks()
        .iter()
        .flat_map(|s| {
            s.template.outputs().iter().map(move |(id, output)| OutputRow {
                stack: s.name.to_string(),
                output: id.clone(),
                export: display_option(&output.export_name().map(|e| e.to_string())),
                description: display_option(&output.description),
            })
        })
        .collect();
    print_output(&rows, ctx.format);
    Ok(())
}
