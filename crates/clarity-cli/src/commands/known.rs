use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use super::Context;

pub fn run(ctx: &Context) -> Result<ExitCode> {
    let registry = ctx.registry()?;

    if registry.is_empty() {
        println!("{} No known models registered.", "ℹ".blue());
        println!("  Pass a digest table with: --registry <models.json>");
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<32} {:<10} {:<24} {}",
        "NAME".bold(),
        "SIZE".bold(),
        "SOURCE".bold(),
        "SHA256".bold()
    );
    for (digest, known) in registry.entries() {
        println!(
            "{:<32} {:<10} {:<24} {}",
            known.name, known.size, known.source, digest
        );
    }
    Ok(ExitCode::SUCCESS)
}
