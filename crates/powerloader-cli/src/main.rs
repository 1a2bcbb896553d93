use clap::Parser;
use powerloader_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Fall back to stderr so an unwritable state dir never stops a download.
    if let Err(e) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr(cli.verbose);
        tracing::debug!("file logging unavailable: {:#}", e);
    }

    if let Err(err) = cli.run().await {
        eprintln!("powerloader error: {:#}", err);
        std::process::exit(1);
    }
}
