//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures, short bodies) and the retry controller that re-runs
//! transfer attempts from the partial file's persisted length.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::TransferError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{RetryController, RetryOutcome, RetryPhase, RetryState};
