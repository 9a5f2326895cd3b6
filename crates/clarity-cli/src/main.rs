use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Context;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();

    let ctx = Context::new(cli.db, cli.registry);

    match cli.command {
        Commands::Import { file, force } => commands::import::run(&ctx, &file, force),
        Commands::Status { json } => commands::status::run(&ctx, json),
        Commands::Verify { file, expect, json } => {
            commands::verify::run(&ctx, &file, expect.as_deref(), json)
        }
        Commands::Reset => commands::reset::run(&ctx),
        Commands::Quota { json } => commands::quota::run(&ctx, json),
        Commands::Known => commands::known::run(&ctx),
    }
}
