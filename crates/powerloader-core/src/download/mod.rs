//! Download orchestrator.
//!
//! Owns every create/keep/delete decision for the partial file and the final
//! file. The final file only ever appears through an atomic rename of a fully
//! received (and, when requested, verified) partial file.

mod error;
mod request;

pub use error::DownloadError;
pub use request::{DownloadReport, DownloadRequest};

use std::path::Path;
use std::sync::Arc;

use crate::checksum::{self, Verification};
use crate::config::PowerloaderConfig;
use crate::control::{AbortToken, DestinationLocks};
use crate::progress::{ProgressReporter, ProgressSender};
use crate::retry::{RetryController, RetryOutcome, TransferError};
use crate::storage::{self, LockFile, PartialFile};
use crate::transfer::TransferExecutor;

/// Runs downloads with one configuration. Cloning shares the abort token, so
/// clones can run on other threads; destination locks are process-wide.
#[derive(Debug, Clone)]
pub struct Downloader {
    cfg: Arc<PowerloaderConfig>,
    locks: Arc<DestinationLocks>,
    abort: Option<AbortToken>,
}

impl Downloader {
    pub fn new(cfg: PowerloaderConfig) -> Self {
        Self {
            cfg: Arc::new(cfg),
            locks: DestinationLocks::global(),
            abort: None,
        }
    }

    /// Stop downloads when `token` is set.
    pub fn with_abort(mut self, token: AbortToken) -> Self {
        self.abort = Some(token);
        self
    }

    /// Run one download to a terminal state.
    ///
    /// Blocking; call from a worker thread (or `spawn_blocking`) in async code.
    /// Fails with `DestinationBusy` while any other download, in this process
    /// or another, owns the same destination.
    pub fn download(
        &self,
        req: &DownloadRequest,
        progress: Option<&ProgressSender>,
    ) -> Result<DownloadReport, DownloadError> {
        validate(req)?;
        let _guard = self
            .locks
            .try_acquire(&req.destination)
            .ok_or_else(|| DownloadError::DestinationBusy(req.destination.clone()))?;

        let temp = req.temp_path();
        if let Some(report) = already_present(req, &temp)? {
            tracing::info!(path = %req.destination.display(), "already present, skipping download");
            return Ok(report);
        }

        create_parent_dir(&req.destination)?;
        let lock_path = storage::lock_path(&temp);
        let mut lock_file =
            LockFile::open(&lock_path).map_err(|e| DownloadError::fs(&lock_path, e))?;
        let _held = lock_file
            .try_hold()
            .map_err(|e| DownloadError::fs(&lock_path, e))?
            .ok_or_else(|| DownloadError::DestinationBusy(req.destination.clone()))?;

        let (mut store, resumed_from) = open_store(req, &temp)?;
        store.set_sync_each_chunk(self.cfg.sync_each_chunk);

        let opts = self.cfg.transfer_options();
        let reporter = ProgressReporter::new(progress, resumed_from);
        let executor = TransferExecutor::new(&req.url, &opts)
            .expected_size(req.expected_size)
            .abort_token(self.abort.as_ref())
            .progress(Some(&reporter));
        let mut controller = RetryController::new(self.cfg.retry_policy(), self.abort.as_ref());

        let outcome = controller.run(&mut store, |store, offset| executor.execute(store, offset));
        let state = controller.state();
        tracing::debug!(
            phase = ?controller.phase(),
            attempts = state.attempt,
            last_offset = state.last_offset,
            "retry loop finished"
        );
        let (attempts, total_len) = match outcome {
            RetryOutcome::Succeeded {
                attempts,
                total_len,
            } => (attempts, total_len),
            RetryOutcome::Aborted {
                error,
                attempts,
                exhausted,
            } => {
                keep_for_resume(store);
                return Err(failure(error, attempts, exhausted, &temp));
            }
        };

        store.sync().map_err(|e| DownloadError::fs(&temp, e))?;

        if let Some(expected) = req.expected_size {
            if total_len != expected {
                tracing::warn!(expected, actual = total_len, "size mismatch, discarding");
                reject(store, &req.destination);
                return Err(DownloadError::SizeMismatch {
                    expected,
                    actual: total_len,
                });
            }
        }

        let verification = checksum::verify(store.path(), req.expected_sha256.as_deref())
            .map_err(|e| DownloadError::fs(&temp, e))?;
        let sha256 = match verification {
            Verification::Skipped => None,
            Verification::Matched(digest) => Some(digest),
            Verification::Mismatched(actual) => {
                let expected = req.expected_sha256.clone().unwrap_or_default();
                tracing::warn!(%expected, %actual, "checksum mismatch, discarding");
                reject(store, &req.destination);
                return Err(DownloadError::ChecksumMismatch { expected, actual });
            }
        };

        store
            .finalize(&req.destination)
            .map_err(|e| DownloadError::fs(&req.destination, e))?;
        tracing::info!(
            url = %req.url,
            path = %req.destination.display(),
            size = total_len,
            attempts,
            resumed_from,
            "download complete"
        );

        Ok(DownloadReport {
            url: req.url.clone(),
            path: req.destination.clone(),
            size: total_len,
            sha256,
            attempts,
            resumed_from,
            already_present: false,
        })
    }
}

fn validate(req: &DownloadRequest) -> Result<(), DownloadError> {
    if req.url.trim().is_empty() {
        return Err(DownloadError::InvalidRequest("empty URL".into()));
    }
    url::Url::parse(&req.url)
        .map_err(|e| DownloadError::InvalidRequest(format!("invalid URL {}: {}", req.url, e)))?;
    if req.destination.file_name().is_none() {
        return Err(DownloadError::InvalidRequest(format!(
            "destination {} has no file name",
            req.destination.display()
        )));
    }
    Ok(())
}

/// Report the existing destination when it already matches the expected digest.
fn already_present(
    req: &DownloadRequest,
    temp: &Path,
) -> Result<Option<DownloadReport>, DownloadError> {
    let expected = match req.expected_sha256.as_deref() {
        Some(e) => e,
        None => return Ok(None),
    };
    if temp.exists() {
        return Ok(None);
    }
    let meta = match std::fs::metadata(&req.destination) {
        Ok(m) if m.is_file() => m,
        _ => return Ok(None),
    };
    if req.expected_size.is_some_and(|s| s != meta.len()) {
        return Ok(None);
    }
    match checksum::verify(&req.destination, Some(expected))
        .map_err(|e| DownloadError::fs(&req.destination, e))?
    {
        Verification::Matched(digest) => Ok(Some(DownloadReport {
            url: req.url.clone(),
            path: req.destination.clone(),
            size: meta.len(),
            sha256: Some(digest),
            attempts: 0,
            resumed_from: 0,
            already_present: true,
        })),
        _ => Ok(None),
    }
}

fn create_parent_dir(destination: &Path) -> Result<(), DownloadError> {
    if let Some(dir) = destination.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| DownloadError::fs(dir, e))?;
    }
    Ok(())
}

/// Open the partial file: reuse it when resuming, otherwise start empty.
fn open_store(req: &DownloadRequest, temp: &Path) -> Result<(PartialFile, u64), DownloadError> {
    if req.resume {
        let (store, len) =
            PartialFile::open_for_resume(temp).map_err(|e| DownloadError::fs(temp, e))?;
        if len > 0 {
            tracing::info!(path = %temp.display(), offset = len, "resuming partial download");
        }
        return Ok((store, len));
    }
    if temp.exists() {
        tracing::debug!(path = %temp.display(), "discarding stale partial file");
    }
    let store = PartialFile::create_fresh(temp).map_err(|e| DownloadError::fs(temp, e))?;
    Ok((store, 0))
}

/// Leave a non-empty partial file for a later resume; drop an empty one.
fn keep_for_resume(store: PartialFile) {
    if let Err(e) = store.sync() {
        tracing::warn!(path = %store.path().display(), "sync partial file: {}", e);
    }
    match store.is_empty() {
        Ok(false) => {
            tracing::warn!(path = %store.path().display(), "partial file kept for resume");
        }
        _ => {
            let path = store.path().to_path_buf();
            if let Err(e) = store.discard() {
                tracing::warn!(path = %path.display(), "remove empty partial file: {}", e);
            }
        }
    }
}

/// Remove the partial file and any stale destination: neither is trusted.
fn reject(store: PartialFile, destination: &Path) {
    let temp = store.path().to_path_buf();
    if let Err(e) = store.discard() {
        tracing::warn!(path = %temp.display(), "remove partial file: {}", e);
    }
    if let Err(e) = storage::discard(destination) {
        tracing::warn!(path = %destination.display(), "remove stale destination: {}", e);
    }
}

fn failure(error: TransferError, attempts: u32, exhausted: bool, temp: &Path) -> DownloadError {
    match error {
        TransferError::Aborted => DownloadError::Aborted,
        TransferError::Storage(source) => DownloadError::fs(temp, source),
        last if exhausted => DownloadError::RetriesExhausted { attempts, last },
        other => DownloadError::FatalNetwork(other),
    }
}
