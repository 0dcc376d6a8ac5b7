//! toc CLI - Generate video assets from a scene manifest

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{generate, providers, segments, validate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toc")]
#[command(about = "Manifest-driven image, video and narration generation", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images, videos and narration for a manifest
    Generate(generate::GenerateArgs),

    /// Parse and check a manifest without calling any provider
    Validate(validate::ValidateArgs),

    /// Show how a scene length splits into provider clip lengths
    PlanSegments {
        /// Desired clip length in seconds
        #[arg(allow_negative_numbers = true)]
        seconds: i64,

        /// Comma-separated clip lengths the provider accepts
        #[arg(long, default_value = "4,6,8")]
        allowed: String,
    },

    /// List manifest tool names and whether their credentials are configured
    Providers,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Generate(args) => generate::run(args),
        Commands::Validate(args) => validate::run(args),
        Commands::PlanSegments { seconds, allowed } => segments::run(seconds, &allowed),
        Commands::Providers => providers::run(),
    }
}
