//! CLI for the powerloader downloader.

mod commands;
mod targets;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use powerloader_core::config::{self, PowerloaderConfig};
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_completions, run_download, run_man};

/// Top-level CLI for powerloader.
#[derive(Debug, Parser)]
#[command(name = "powerloader", version)]
#[command(about = "powerloader: resumable, checksum-verified downloads", long_about = None)]
pub struct Cli {
    /// Debug-level logs for powerloader (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read configuration from FILE instead of the XDG config dir.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs, one after another.
    Download(DownloadArgs),

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page to stdout.
    Man,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Direct HTTP/HTTPS URLs to download.
    #[arg(value_name = "URL", required_unless_present = "file")]
    pub urls: Vec<String>,

    /// YAML file with a `targets:` list of URLs, downloaded after any given on the command line.
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Continue from an existing <name>.pdpart instead of starting over.
    #[arg(short, long)]
    pub resume: bool,

    /// Expected SHA-256 (hex) of the downloaded file.
    #[arg(long, value_name = "HEX")]
    pub sha: Option<String>,

    /// Expected size of the downloaded file in bytes.
    #[arg(short = 'i', long = "size", value_name = "BYTES")]
    pub expected_size: Option<u64>,

    /// Output file name (default: last URL path segment). Single URL only.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Directory to download into (default: current directory).
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Print one JSON report per finished download instead of progress.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli {
            config, command, ..
        } = self;
        match command {
            CliCommand::Download(args) => {
                let cfg = load_config(config.as_deref())?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_download(cfg, args).await?;
            }
            CliCommand::Checksum { path } => run_checksum(&path)?,
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<PowerloaderConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

#[cfg(test)]
mod tests;
