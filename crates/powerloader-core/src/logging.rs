//! Logging init: file under XDG state dir, or graceful fallback to stderr.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,powerloader=debug"
    } else {
        "warn,powerloader=info"
    }
}

/// `RUST_LOG` wins; otherwise verbosity picks the default directives.
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

fn subscriber<W>(writer: W, verbose: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(false)
        .finish()
}

/// Initialize structured logging to `~/.local/state/powerloader/powerloader.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall back to stderr.
pub fn init_logging(verbose: bool) -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("powerloader")?;
    let log_dir = xdg_dirs.get_state_home();

    fs::create_dir_all(&log_dir)?;
    let log_file_path: PathBuf = log_dir.join("powerloader.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    subscriber(Mutex::new(file), verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!("powerloader logging initialized at {}", log_file_path.display());

    Ok(log_file_path)
}

/// Initialize logging to stderr only (no file). Use when init_logging() fails so the CLI doesn't crash.
pub fn init_logging_stderr(verbose: bool) {
    let _ = subscriber(std::io::stderr, verbose).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_selects_directives() {
        assert_eq!(default_directives(true), "info,powerloader=debug");
        assert_eq!(default_directives(false), "warn,powerloader=info");
    }

    #[test]
    fn file_writer_receives_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("powerloader.log");
        let file = fs::File::create(&path).unwrap();

        tracing::subscriber::with_default(subscriber(Mutex::new(file), false), || {
            tracing::warn!("partial file kept for resume");
        });

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("partial file kept for resume"), "{text}");
    }
}
