use std::path::PathBuf;

use clap::Parser;

/// Unified routing gateway for LLM APIs
#[derive(Debug, Parser)]
#[command(name = "switchboard", version, about)]
pub struct Args {
    /// Path to the gateway configuration file
    #[arg(short, long, default_value = "switchboard.toml")]
    pub config: PathBuf,

    /// Log filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}
