pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "garage-share")]
#[command(about = "Mint and serve read-only share links for Garage/S3 buckets")]
pub struct Args {
    /// Address of a running daemon (defaults to the configured listen port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the config file (defaults to ~/.garage-share/config.toml)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
