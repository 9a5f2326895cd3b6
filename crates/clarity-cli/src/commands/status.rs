use std::process::ExitCode;

use anyhow::Result;
use clarity_core::limits::human_bytes;
use clarity_core::VerificationStatus;
use colored::Colorize;

use super::Context;

pub fn run(ctx: &Context, json: bool) -> Result<ExitCode> {
    let importer = ctx.importer()?;
    let record = importer.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(record) = record else {
        println!("{} No model installed.", "ℹ".blue());
        println!("  Import one with: clarity-models import <FILE>.gguf");
        return Ok(ExitCode::SUCCESS);
    };

    let stats = importer.chunk_stats()?;
    let status = match record.verification_status {
        VerificationStatus::Verified => record.verification_status.to_string().green(),
        VerificationStatus::Unverified => record.verification_status.to_string().yellow(),
        VerificationStatus::Failed => record.verification_status.to_string().red(),
    };

    println!("{:<10} {}", "FILE".bold(), record.file_name);
    println!("{:<10} {}", "SIZE".bold(), human_bytes(record.file_size));
    println!("{:<10} {}", "DIGEST".bold(), record.digest);
    println!("{:<10} {}", "STATUS".bold(), status);
    if let Some(name) = &record.known_name {
        println!("{:<10} {}", "KNOWN AS".bold(), name);
    }
    if let Some(source) = &record.known_source {
        println!("{:<10} {}", "SOURCE".bold(), source);
    }
    if let Some(at) = &record.imported_at {
        println!("{:<10} {}", "IMPORTED".bold(), at);
    }
    println!(
        "{:<10} {} chunks, {}",
        "STORED".bold(),
        stats.chunk_count,
        human_bytes(stats.total_bytes)
    );
    Ok(ExitCode::SUCCESS)
}
