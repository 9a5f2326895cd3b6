use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clarity_core::importer::verify_file;
use clarity_core::limits::human_bytes;
use clarity_core::VerificationStatus;
use colored::Colorize;

use super::Context;

pub fn run(ctx: &Context, file: &Path, expect: Option<&str>, json: bool) -> Result<ExitCode> {
    let registry = ctx.registry()?;
    let report = verify_file(file, &registry, expect)
        .with_context(|| format!("hashing {}", file.display()))?;

    let code = if report.status == VerificationStatus::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(code);
    }

    println!("{} ({})", report.file_name.cyan(), human_bytes(report.size));
    println!("  sha256: {}", report.digest);
    match report.status {
        VerificationStatus::Verified => match &report.known {
            Some(known) => println!(
                "  {} {} ({}, {})",
                "✓ verified:".green(),
                known.name,
                known.size,
                known.source
            ),
            None => println!("  {} matches expected digest", "✓ verified:".green()),
        },
        VerificationStatus::Unverified => {
            println!("  {} digest not in registry", "? unverified:".yellow())
        }
        VerificationStatus::Failed => {
            println!("  {} digest does not match expected value", "✗ failed:".red())
        }
    }
    Ok(code)
}
