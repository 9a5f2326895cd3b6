use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clarity_core::importer::{ByteSource, FileSource};
use clarity_core::limits::human_bytes;
use clarity_core::{ImportEvent, ImportOptions, ImportOutcome, VerificationStatus};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::Context;

pub fn run(ctx: &Context, file: &Path, force: bool) -> Result<ExitCode> {
    let importer = ctx.importer()?;
    let source =
        FileSource::open(file).with_context(|| format!("opening {}", file.display()))?;

    println!(
        "{} Importing {} ({})...",
        "▶".green(),
        file.display().to_string().cyan(),
        human_bytes(source.len())
    );

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );

    let options = ImportOptions {
        force,
        ..Default::default()
    };
    let outcome = importer.run(source, options, |event| {
        if let ImportEvent::Progress(progress) = event {
            pb.set_position(progress.percent.floor() as u64);
            pb.set_message(progress.phase.label());
        }
    })?;
    pb.finish_and_clear();

    match outcome {
        ImportOutcome::Completed(record) => {
            println!("{} Imported {}", "✓".green(), record.file_name.cyan());
            println!("  digest: {}", record.digest);
            match record.verification_status {
                VerificationStatus::Verified => println!(
                    "  {} matches {}",
                    "verified".green().bold(),
                    record.known_name.as_deref().unwrap_or("a known model")
                ),
                status => println!("  {}", status.to_string().yellow().bold()),
            }
            Ok(ExitCode::SUCCESS)
        }
        ImportOutcome::AlreadyImported(record) => {
            println!(
                "{} {} is already installed (use --force to re-import)",
                "ℹ".blue(),
                record.file_name.cyan()
            );
            Ok(ExitCode::SUCCESS)
        }
        ImportOutcome::Failed(failure) => {
            println!("{} {}", "✗".red(), failure);
            Ok(ExitCode::FAILURE)
        }
    }
}
