use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clarity-models")]
#[command(author, version, about = "Import and verify local GGUF model files")]
#[command(propagate_version = true)]
pub struct Cli {
    /// SQLite database holding imported chunks and the model record
    #[arg(long, global = true, env = "CLARITY_DB")]
    pub db: Option<PathBuf>,

    /// JSON file mapping SHA-256 digests to known models
    #[arg(long, global = true, env = "CLARITY_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a model file into the local store
    Import {
        /// Path to a .gguf model file
        file: PathBuf,

        /// Re-import even if the same file is already installed
        #[arg(long, short)]
        force: bool,
    },

    /// Show the currently installed model
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hash a model file in place and check it against the registry
    Verify {
        /// Path to the model file
        file: PathBuf,

        /// Expected SHA-256 digest; overrides the registry
        #[arg(long)]
        expect: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget the installed model and delete stored chunks
    Reset,

    /// Show free space on the volume holding the database
    Quota {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List models in the verification registry
    #[command(alias = "ls")]
    Known,
}
