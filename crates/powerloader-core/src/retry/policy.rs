use std::time::Duration;

/// High-level classification of an error for retry purposes.
///
/// Callers map HTTP status codes, curl errors and storage failures into these
/// kinds; only the policy decides what they mean for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read/low-speed).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Body ended before the declared length. Bytes already written are kept.
    PartialTransfer,
    /// Local filesystem failure. Never retried.
    Storage,
    /// Caller requested cancellation. Never retried.
    Aborted,
    /// Any other error (not found, malformed range response, ...). Not retried.
    Other,
}

impl ErrorKind {
    /// True if another attempt could plausibly succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Throttled
                | ErrorKind::Connection
                | ErrorKind::Http5xx(_)
                | ErrorKind::PartialTransfer
        )
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
///
/// Built from `[retry]` in the config file (see `PowerloaderConfig::retry_policy`).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        // base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let raw = self.base_delay.saturating_mul(exp);
        RetryDecision::RetryAfter(raw.min(self.max_delay))
    }
}
