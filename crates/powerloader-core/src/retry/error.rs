//! Transfer error type for retry classification.

use std::fmt;

/// Error from a single transfer attempt (curl failure, HTTP error, bad range
/// response, short body, or storage failure).
/// Kept concrete so the retry controller can classify it before it is widened.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// The server did not honour the requested range: a 200 for a ranged
    /// request, a 206 starting at the wrong offset, or an unsatisfiable range.
    RangeNotHonored { status: u32, requested: u64 },
    /// The advertised total size disagrees with the size the caller expects.
    UnexpectedSize { expected: u64, advertised: u64 },
    /// Transfer ended cleanly but fewer bytes arrived than the response declared.
    PartialTransfer { expected: u64, received: u64 },
    /// Writing to the partial file failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// Stopped by the caller's abort token.
    Aborted,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::RangeNotHonored { status, requested } => write!(
                f,
                "server did not honour range starting at byte {} (HTTP {})",
                requested, status
            ),
            TransferError::UnexpectedSize {
                expected,
                advertised,
            } => write!(
                f,
                "server advertises {} bytes, expected {}",
                advertised, expected
            ),
            TransferError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            TransferError::Storage(e) => write!(f, "storage: {}", e),
            TransferError::Aborted => write!(f, "transfer aborted"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
