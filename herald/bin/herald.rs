#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;

/// Bulk email campaign dispatcher
#[derive(Debug, Parser)]
#[command(name = "herald", version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = herald::config::find_config_file(args.config)?;
    let herald = herald::config::load(&config_path)?;

    if args.check {
        herald.check()?;
        println!("{}: configuration OK", config_path.display());
        return Ok(());
    }

    herald.run().await
}
