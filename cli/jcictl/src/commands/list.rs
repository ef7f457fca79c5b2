//! `jci list`: stacks in deployment order.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{display_list, print_output};

use super::CommandContext;

#[derive(Debug, Serialize, Tabled)]
struct StackRow {
    #[tabled(rename = "Stack")]
    stack: String,

    #[tabled(rename = "Environment")]
    environment: String,

    #[tabled(rename = "Depends on")]
    depends_on: String,

    #[tabled(rename = "Termination protection")]
    termination_protection: bool,
}

pub fn run(ctx: CommandContext) -> Result<()> {
    let assembly = ctx.synthesize()?;
    let rows: Vec<StackRow> = assembly
        .stacks()
        .iter()
        .map(|s| StackRow {
            stack: s.name.to_string(),
            environment: s.environment.to_string(),
            depends_on: display_list(&s.dependencies),
            termination_protection: s.termination_protection,
        })
        .collect();
    print_output(&rows, ctx.format);
    Ok(())
}
