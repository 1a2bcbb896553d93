//! What to download and what came out of it.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::DownloadError;
use crate::storage;
use crate::url_model::derive_filename;

/// One download: source URL, final destination and what the result must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Final artifact path; the partial file lives next to it.
    pub destination: PathBuf,
    /// Hex SHA-256 the completed file must hash to.
    pub expected_sha256: Option<String>,
    /// Exact byte length the completed file must have.
    pub expected_size: Option<u64>,
    /// Continue from an existing partial file instead of starting over.
    pub resume: bool,
}

impl DownloadRequest {
    /// Download `url` to an explicit destination path.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            expected_sha256: None,
            expected_size: None,
            resume: false,
        }
    }

    /// Download `url` into `dir`, naming the file after the URL path.
    pub fn into_dir(url: impl Into<String>, dir: &Path) -> Self {
        let url = url.into();
        let name = derive_filename(&url);
        Self::new(url, dir.join(name))
    }

    /// Replace the derived file name with `name`, kept as given. Only a plain
    /// file name is accepted; the directory stays where it was.
    pub fn with_output_name(mut self, name: &str) -> Result<Self, DownloadError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !plain {
            return Err(DownloadError::InvalidRequest(format!(
                "output name {:?} must be a plain file name",
                name
            )));
        }
        let dir = self
            .destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.destination = dir.join(name);
        Ok(self)
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.expected_sha256 = Some(sha256.into().trim().to_string());
        self
    }

    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Path of the partial file for this request.
    pub fn temp_path(&self) -> PathBuf {
        storage::temp_path(&self.destination)
    }
}

/// Result of a successful download (or of finding it already present).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DownloadReport {
    pub url: String,
    pub path: PathBuf,
    pub size: u64,
    /// Computed digest, when verification ran.
    pub sha256: Option<String>,
    /// Transfer attempts made; 0 when the file was already present.
    pub attempts: u32,
    /// Bytes that were already in the partial file when this run started.
    pub resumed_from: u64,
    pub already_present: bool,
}
