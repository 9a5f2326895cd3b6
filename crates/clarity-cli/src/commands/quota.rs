use std::process::ExitCode;

use anyhow::Result;
use clarity_core::limits::human_bytes;
use colored::Colorize;

use super::Context;

pub fn run(ctx: &Context, json: bool) -> Result<ExitCode> {
    let importer = ctx.importer()?;
    let report = importer.check_quota();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<10} {}", "USAGE".bold(), human_bytes(report.usage_bytes));
    println!("{:<10} {}", "QUOTA".bold(), human_bytes(report.quota_bytes));
    println!("{:<10} {} GB", "FREE".bold(), report.available_gib());
    let margin = human_bytes(importer.config().quota_margin);
    if report.has_sufficient_quota {
        println!("{} more than {} free, imports allowed", "✓".green(), margin);
    } else {
        println!("{} {} or less free, imports will be refused", "✗".red(), margin);
    }
    Ok(ExitCode::SUCCESS)
}
