use std::io;
use std::path::PathBuf;

use crate::retry::TransferError;

/// Terminal failure of one download. Only the orchestrator produces these.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid download request: {0}")]
    InvalidRequest(String),

    #[error("{} is already being downloaded", .0.display())]
    DestinationBusy(PathBuf),

    /// Not found, unsupported range response, and other failures a retry cannot fix.
    #[error("download failed: {0}")]
    FatalNetwork(#[source] TransferError),

    /// The partial file is kept so a later run can resume it.
    #[error("download failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: TransferError,
    },

    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("download aborted")]
    Aborted,
}

impl DownloadError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DownloadError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True when a partial file may have been left behind for `--resume`.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            DownloadError::RetriesExhausted { .. }
                | DownloadError::FatalNetwork(_)
                | DownloadError::Aborted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = DownloadError::ChecksumMismatch {
            expected: "broken_checksum".into(),
            actual: "abc".into(),
        };
        assert_eq!(
            e.to_string(),
            "checksum mismatch: expected broken_checksum, got abc"
        );
        let e = DownloadError::RetriesExhausted {
            attempts: 5,
            last: TransferError::Http(503),
        };
        assert_eq!(e.to_string(), "download failed after 5 attempt(s): HTTP 503");
        assert!(e.is_resumable());
        let e = DownloadError::SizeMismatch {
            expected: 10,
            actual: 9,
        };
        assert!(!e.is_resumable());
    }

    #[test]
    fn source_chain_reaches_transfer_error() {
        use std::error::Error;
        let e = DownloadError::FatalNetwork(TransferError::Http(404));
        let src = e.source().map(|s| s.to_string());
        assert_eq!(src.as_deref(), Some("HTTP 404"));
    }
}
