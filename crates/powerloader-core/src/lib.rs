//! Resumable, checksum-verified HTTP downloads.
//!
//! [`download::Downloader`] is the entry point; everything else is the
//! machinery it drives.

pub mod checksum;
pub mod config;
pub mod control;
pub mod download;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod transfer;
pub mod url_model;

pub use config::PowerloaderConfig;
pub use control::AbortToken;
pub use download::{DownloadError, DownloadReport, DownloadRequest, Downloader};
pub use progress::{ProgressSender, ProgressStats};
