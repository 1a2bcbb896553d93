//! `powerloader download` – fetch URLs one after another.

use anyhow::{Context, Result};
use powerloader_core::checksum;
use powerloader_core::config::PowerloaderConfig;
use powerloader_core::{
    AbortToken, DownloadError, DownloadReport, DownloadRequest, Downloader, ProgressStats,
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::cli::targets::load_targets;
use crate::cli::DownloadArgs;

const PROGRESS_INTERVAL_MS: u128 = 500;

pub async fn run_download(cfg: PowerloaderConfig, args: DownloadArgs) -> Result<()> {
    let urls = collect_urls(&args)?;
    if urls.is_empty() {
        anyhow::bail!("no URLs to download");
    }
    if urls.len() > 1
        && (args.output.is_some() || args.sha.is_some() || args.expected_size.is_some())
    {
        anyhow::bail!("--output, --sha and --size need exactly one URL");
    }
    if let Some(sha) = args.sha.as_deref() {
        if !checksum::is_sha256_hex(sha) {
            tracing::warn!("--sha {} is not a SHA-256 hex digest; verification will fail", sha);
        }
    }
    let dir = match &args.dir {
        Some(d) => d.clone(),
        None => std::env::current_dir().context("current directory")?,
    };

    let token = AbortToken::new();
    spawn_interrupt_handler(token.clone());
    let downloader = Downloader::new(cfg).with_abort(token.clone());

    let mut failed = 0usize;
    let mut resumable = 0usize;
    for url in &urls {
        let result = match build_request(url, &dir, &args) {
            Ok(req) => download_one(&downloader, req, !args.json).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(report) => print_report(&report, args.json)?,
            Err(e) => {
                failed += 1;
                if e.downcast_ref::<DownloadError>().is_some_and(DownloadError::is_resumable) {
                    resumable += 1;
                }
                tracing::error!(url = %url, "download failed: {:#}", e);
                eprintln!("{}: {:#}", url, e);
            }
        }
        if token.is_aborted() {
            break;
        }
    }

    if token.is_aborted() {
        anyhow::bail!("interrupted; rerun with --resume to continue");
    }
    if failed > 0 {
        if resumable > 0 {
            eprintln!(
                "{} partial download(s) kept; rerun with --resume to continue",
                resumable
            );
        }
        anyhow::bail!("{} of {} download(s) failed", failed, urls.len());
    }
    Ok(())
}

/// Command-line URLs first, then those from `--file`.
fn collect_urls(args: &DownloadArgs) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(path) = args.file.as_deref() {
        urls.extend(load_targets(path)?);
    }
    Ok(urls)
}

fn build_request(url: &str, dir: &Path, args: &DownloadArgs) -> Result<DownloadRequest> {
    let mut req = DownloadRequest::into_dir(url, dir).resume(args.resume);
    if let Some(name) = args.output.as_deref() {
        req = req.with_output_name(name)?;
    }
    if let Some(sha) = args.sha.as_deref() {
        req = req.with_sha256(sha);
    }
    if let Some(size) = args.expected_size {
        req = req.with_expected_size(size);
    }
    Ok(req)
}

/// Runs the blocking download on the blocking pool while a task prints progress.
async fn download_one(
    downloader: &Downloader,
    req: DownloadRequest,
    show_progress: bool,
) -> Result<DownloadReport> {
    let (progress_tx, progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    let printer = show_progress.then(|| tokio::spawn(print_progress(progress_rx)));

    let dl = downloader.clone();
    let result = tokio::task::spawn_blocking(move || dl.download(&req, Some(&progress_tx)))
        .await
        .context("download task failed")?;

    if let Some(handle) = printer {
        let _ = handle.await;
    }
    Ok(result?)
}

async fn print_progress(mut rx: tokio::sync::mpsc::Receiver<ProgressStats>) {
    let mut last_print: Option<Instant> = None;
    let mut printed = false;
    while let Some(stats) = rx.recv().await {
        let now = Instant::now();
        let due = last_print
            .map(|t| now.duration_since(t).as_millis() >= PROGRESS_INTERVAL_MS)
            .unwrap_or(true);
        if due || stats.fraction() == Some(1.0) {
            eprint!("\r{}", progress_line(&stats));
            let _ = std::io::stderr().flush();
            last_print = Some(now);
            printed = true;
        }
    }
    if printed {
        eprintln!();
    }
}

fn progress_line(stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / 1_048_576.0;
    let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    match (stats.total_bytes, stats.fraction()) {
        (Some(total), Some(fraction)) => format!(
            "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}  ",
            done_mib,
            total as f64 / 1_048_576.0,
            fraction * 100.0,
            rate_mib,
            eta
        ),
        _ => format!("  {:.1} MiB  {:.2} MiB/s  ", done_mib, rate_mib),
    }
}

fn print_report(report: &DownloadReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    if report.already_present {
        println!("{}: already present", report.path.display());
    } else {
        println!("{} ({} bytes)", report.path.display(), report.size);
    }
    Ok(())
}

/// Ctrl-C stops the running download after its current chunk; the partial file is kept.
fn spawn_interrupt_handler(token: AbortToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current chunk");
            token.abort();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(urls: &[&str]) -> DownloadArgs {
        DownloadArgs {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            file: None,
            resume: false,
            sha: None,
            expected_size: None,
            output: None,
            dir: None,
            json: false,
        }
    }

    #[test]
    fn request_uses_url_name_and_flags() {
        let mut a = args(&["http://localhost:5555/static/packages/xtensor.tar.bz2"]);
        a.resume = true;
        a.sha = Some("abc".into());
        a.expected_size = Some(185929);
        let req = build_request(&a.urls[0], Path::new("/tmp/dl"), &a).unwrap();
        assert_eq!(req.destination, PathBuf::from("/tmp/dl/xtensor.tar.bz2"));
        assert!(req.resume);
        assert_eq!(req.expected_sha256.as_deref(), Some("abc"));
        assert_eq!(req.expected_size, Some(185929));
    }

    #[test]
    fn request_output_overrides_name() {
        let mut a = args(&["http://h/a.bin"]);
        a.output = Some("b.bin".into());
        let req = build_request(&a.urls[0], Path::new("out"), &a).unwrap();
        assert_eq!(req.destination, PathBuf::from("out/b.bin"));
    }

    #[test]
    fn request_output_is_kept_verbatim_but_must_be_a_file_name() {
        let mut a = args(&["http://h/a.bin"]);
        a.output = Some("my file?.bin".into());
        let req = build_request(&a.urls[0], Path::new("out"), &a).unwrap();
        assert_eq!(req.destination, PathBuf::from("out/my file?.bin"));

        a.output = Some("sub/x.bin".into());
        let err = build_request(&a.urls[0], Path::new("out"), &a).unwrap_err();
        assert!(err.to_string().contains("plain file name"), "{err}");
    }

    #[test]
    fn file_targets_follow_command_line_urls() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("targets.yaml");
        std::fs::write(&list, "targets:\n  - http://h/b\n  - http://h/c\n").unwrap();
        let mut a = args(&["http://h/a"]);
        a.file = Some(list);
        assert_eq!(
            collect_urls(&a).unwrap(),
            vec!["http://h/a", "http://h/b", "http://h/c"]
        );
    }

    #[tokio::test]
    async fn empty_targets_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("targets.yaml");
        std::fs::write(&list, "targets: []\n").unwrap();
        let mut a = args(&[]);
        a.file = Some(list);
        let err = run_download(PowerloaderConfig::default(), a)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no URLs"), "{err}");
    }

    #[test]
    fn progress_line_with_and_without_total() {
        let known = ProgressStats {
            bytes_done: 1_048_576,
            total_bytes: Some(2_097_152),
            resumed_from: 0,
            elapsed_secs: 1.0,
        };
        let line = progress_line(&known);
        assert!(line.contains("1.0 / 2.0 MiB (50.0%)"), "{line}");
        assert!(line.contains("1.00 MiB/s"), "{line}");
        let unknown = ProgressStats {
            total_bytes: None,
            ..known
        };
        assert!(!progress_line(&unknown).contains('%'));
    }

    #[tokio::test]
    async fn sha_and_output_need_a_single_url() {
        let mut a = args(&["http://h/a", "http://h/b"]);
        a.sha = Some("00".into());
        let err = run_download(PowerloaderConfig::default(), a)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exactly one URL"));
    }
}
