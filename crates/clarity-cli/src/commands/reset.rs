use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use super::Context;

pub fn run(ctx: &Context) -> Result<ExitCode> {
    let importer = ctx.importer()?;
    importer.reset();
    println!("{} Model state cleared", "✓".green());
    Ok(ExitCode::SUCCESS)
}
