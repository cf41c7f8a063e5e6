use clap::{Args, Parser, Subcommand};
use pf_core::TargetFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixforge")]
#[command(author, version, about = "Convert images to AVIF or WEBP with ffmpeg")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert images and save them to the output destination
    Convert(ConvertArgs),

    /// Check that required external tools are available
    CheckTools,

    /// Set the persisted output destination
    SetOutput {
        /// `tree:<dir>` for a document tree, otherwise a directory path or file:// URI
        token: String,
    },

    /// Print the effective configuration
    ShowConfig,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Args, Debug, Default)]
pub struct ConvertArgs {
    /// Images or directories to convert; `-` reads locators from stdin
    pub inputs: Vec<String>,

    /// Output format (avif or webp)
    #[arg(short, long)]
    pub format: Option<TargetFormat>,

    /// AVIF constant rate factor, 0-63 (lower is better)
    #[arg(long, conflicts_with = "slider")]
    pub crf: Option<u32>,

    /// WEBP quality, 0-100 (higher is better)
    #[arg(long, conflicts_with = "slider")]
    pub webp_quality: Option<u32>,

    /// Single quality control, 0-100, mapped onto the format's own scale
    #[arg(long)]
    pub slider: Option<f64>,

    /// Output destination for this run, overriding the configured one
    #[arg(short, long)]
    pub output: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Number of images encoded at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Do not run the configured share command
    #[arg(long)]
    pub no_share: bool,

    /// Print the encoder commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}
