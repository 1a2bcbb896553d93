//! Single HTTP transfer attempt into the partial file.
//!
//! Issues one GET (with `Range: bytes=<offset>-` when resuming), validates the
//! final response before keeping any of its body, and appends each received
//! chunk to the partial file as it arrives. Memory use is bounded by curl's
//! receive buffer (`chunk_size`), independent of file size.

mod headers;

pub use headers::{parse_content_range, parse_headers, ContentRange, ResponseHeaders};

use std::cell::{Cell, RefCell};
use std::str;
use std::time::Duration;

use crate::control::AbortToken;
use crate::progress::ProgressReporter;
use crate::retry::{classify, TransferError};
use crate::storage::PartialFile;

/// Tagged result of one attempt.
#[derive(Debug)]
pub enum TransferOutcome {
    /// The response body was fully received; carries bytes appended by this attempt.
    Completed(u64),
    RetryableFailure(TransferError),
    FatalFailure(TransferError),
}

impl TransferOutcome {
    /// Classify a raw attempt result.
    pub fn from_result(result: Result<u64, TransferError>) -> Self {
        match result {
            Ok(n) => TransferOutcome::Completed(n),
            Err(e) if classify(&e).is_retryable() => TransferOutcome::RetryableFailure(e),
            Err(e) => TransferOutcome::FatalFailure(e),
        }
    }
}

/// Curl tuning applied to every attempt.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Receive buffer size; upper bound on bytes handed to one write.
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    /// Abort if throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard wall-clock cap for one attempt.
    pub timeout: Duration,
    pub max_bytes_per_sec: Option<u64>,
    pub user_agent: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
            max_bytes_per_sec: None,
            user_agent: format!("powerloader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// What the write callback does with the body of the current response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    /// First chunk not seen yet; the response has not been validated.
    Unchecked,
    /// Validated; append to the partial file.
    Keep,
    /// Error page or 416 body; read and drop.
    Discard,
}

/// Runs transfer attempts for one URL.
pub struct TransferExecutor<'a> {
    url: &'a str,
    opts: &'a TransferOptions,
    expected_size: Option<u64>,
    abort: Option<&'a AbortToken>,
    progress: Option<&'a ProgressReporter<'a>>,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(url: &'a str, opts: &'a TransferOptions) -> Self {
        Self {
            url,
            opts,
            expected_size: None,
            abort: None,
            progress: None,
        }
    }

    /// Reject responses whose advertised total differs from `size`.
    pub fn expected_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    pub fn abort_token(mut self, abort: Option<&'a AbortToken>) -> Self {
        self.abort = abort;
        self
    }

    pub fn progress(mut self, progress: Option<&'a ProgressReporter<'a>>) -> Self {
        self.progress = progress;
        self
    }

    /// One attempt: request from `start_offset`, append the body to `store`.
    pub fn execute(&self, store: &mut PartialFile, start_offset: u64) -> TransferOutcome {
        TransferOutcome::from_result(self.try_execute(store, start_offset))
    }

    fn aborted(&self) -> bool {
        self.abort.is_some_and(|a| a.is_aborted())
    }

    fn try_execute(&self, store: &mut PartialFile, start_offset: u64) -> Result<u64, TransferError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(self.url).map_err(TransferError::Curl)?;
        easy.follow_location(true).map_err(TransferError::Curl)?;
        easy.max_redirections(10).map_err(TransferError::Curl)?;
        easy.useragent(&self.opts.user_agent)
            .map_err(TransferError::Curl)?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(TransferError::Curl)?;
        // Low-speed timeout keeps slow but live transfers going while still
        // catching stalled ones.
        easy.low_speed_limit(self.opts.low_speed_limit)
            .map_err(TransferError::Curl)?;
        easy.low_speed_time(self.opts.low_speed_time)
            .map_err(TransferError::Curl)?;
        easy.timeout(self.opts.timeout).map_err(TransferError::Curl)?;
        easy.buffer_size(self.opts.chunk_size)
            .map_err(TransferError::Curl)?;
        if let Some(speed) = self.opts.max_bytes_per_sec {
            easy.max_recv_speed(speed).map_err(TransferError::Curl)?;
        }
        easy.progress(true).map_err(TransferError::Curl)?;

        if start_offset > 0 {
            // curl turns "N-" into "Range: bytes=N-".
            easy.range(&format!("{}-", start_offset))
                .map_err(TransferError::Curl)?;
            tracing::debug!(url = self.url, start_offset, "requesting range");
        } else {
            tracing::debug!(url = self.url, "requesting full body");
        }

        let headers = RefCell::new(ResponseHeaders::default());
        let mode = Cell::new(BodyMode::Unchecked);
        let total = Cell::new(None::<u64>);
        let received = Cell::new(0u64);
        let rejected: RefCell<Option<TransferError>> = RefCell::new(None);

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        headers.borrow_mut().push_line(line);
                    }
                    true
                })
                .map_err(TransferError::Curl)?;
            transfer
                .progress_function(|_, _, _, _| !self.aborted())
                .map_err(TransferError::Curl)?;
            transfer
                .write_function(|data| {
                    if self.aborted() {
                        rejected.borrow_mut().replace(TransferError::Aborted);
                        return Ok(0);
                    }
                    if mode.get() == BodyMode::Unchecked {
                        let h = headers.borrow();
                        match self.body_mode(&h, start_offset) {
                            Ok(m) => {
                                mode.set(m);
                                total.set(h.total_size(start_offset));
                            }
                            Err(e) => {
                                rejected.borrow_mut().replace(e);
                                return Ok(0);
                            }
                        }
                    }
                    if mode.get() == BodyMode::Discard {
                        return Ok(data.len());
                    }
                    // Returning short makes curl fail with a write error.
                    if let Err(e) = store.append(data) {
                        rejected.borrow_mut().replace(TransferError::Storage(e));
                        return Ok(0);
                    }
                    let got = received.get() + data.len() as u64;
                    received.set(got);
                    if let Some(p) = self.progress {
                        p.report(start_offset + got, total.get());
                    }
                    Ok(data.len())
                })
                .map_err(TransferError::Curl)?;
            transfer.perform()
        };

        if let Some(e) = rejected.into_inner() {
            return Err(e);
        }
        if let Err(e) = perform_result {
            if self.aborted() {
                return Err(TransferError::Aborted);
            }
            tracing::debug!(received = received.get(), "transfer error: {}", e);
            return Err(TransferError::Curl(e));
        }

        let headers = headers.into_inner();
        let code = easy.response_code().map_err(TransferError::Curl)?;
        if code == 416 {
            return self.unsatisfiable_range(&headers, start_offset);
        }
        if !(200..300).contains(&code) {
            return Err(TransferError::Http(code));
        }
        if mode.get() == BodyMode::Unchecked {
            // Empty body: the write callback never ran.
            self.body_mode(&headers, start_offset)?;
        }

        let received = received.get();
        if let Some(expected) = headers.content_length {
            if received != expected {
                return Err(TransferError::PartialTransfer { expected, received });
            }
        }
        tracing::debug!(code, received, "transfer attempt finished");
        Ok(received)
    }

    /// Decide what to do with the body of the final response.
    fn body_mode(&self, h: &ResponseHeaders, start_offset: u64) -> Result<BodyMode, TransferError> {
        let status = h.status.unwrap_or(0);
        if !(200..300).contains(&status) {
            return Ok(BodyMode::Discard);
        }
        let range_ok = match (status, h.content_range) {
            (206, Some(ContentRange::Bytes { start, .. })) => start == start_offset,
            (206, _) => false,
            // A full body is only acceptable when no range was asked for.
            _ => start_offset == 0,
        };
        if !range_ok {
            return Err(TransferError::RangeNotHonored {
                status,
                requested: start_offset,
            });
        }
        if let (Some(expected), Some(advertised)) = (self.expected_size, h.total_size(start_offset)) {
            if expected != advertised {
                return Err(TransferError::UnexpectedSize {
                    expected,
                    advertised,
                });
            }
        }
        Ok(BodyMode::Keep)
    }

    /// 416 means "nothing left" only if the server's total equals what we hold.
    fn unsatisfiable_range(&self, h: &ResponseHeaders, start_offset: u64) -> Result<u64, TransferError> {
        match h.content_range {
            Some(ContentRange::Unsatisfied { total }) if start_offset > 0 && total == start_offset => {
                tracing::debug!(start_offset, "partial file already holds the whole resource");
                Ok(0)
            }
            _ => Err(TransferError::RangeNotHonored {
                status: 416,
                requested: start_offset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec_opts() -> TransferOptions {
        TransferOptions::default()
    }

    fn headers(lines: &[&str]) -> ResponseHeaders {
        parse_headers(lines)
    }

    #[test]
    fn outcome_classification() {
        assert!(matches!(
            TransferOutcome::from_result(Ok(10)),
            TransferOutcome::Completed(10)
        ));
        assert!(matches!(
            TransferOutcome::from_result(Err(TransferError::Http(503))),
            TransferOutcome::RetryableFailure(_)
        ));
        assert!(matches!(
            TransferOutcome::from_result(Err(TransferError::Http(404))),
            TransferOutcome::FatalFailure(_)
        ));
        assert!(matches!(
            TransferOutcome::from_result(Err(TransferError::PartialTransfer {
                expected: 10,
                received: 3
            })),
            TransferOutcome::RetryableFailure(_)
        ));
    }

    #[test]
    fn full_body_accepted_without_range() {
        let opts = exec_opts();
        let ex = TransferExecutor::new("http://x/", &opts);
        let h = headers(&["HTTP/1.1 200 OK", "Content-Length: 10"]);
        assert_eq!(ex.body_mode(&h, 0).unwrap(), BodyMode::Keep);
    }

    #[test]
    fn full_body_rejected_for_range_request() {
        let opts = exec_opts();
        let ex = TransferExecutor::new("http://x/", &opts);
        let h = headers(&["HTTP/1.1 200 OK", "Content-Length: 10"]);
        assert!(matches!(
            ex.body_mode(&h, 4),
            Err(TransferError::RangeNotHonored {
                status: 200,
                requested: 4
            })
        ));
    }

    #[test]
    fn partial_content_must_start_at_offset() {
        let opts = exec_opts();
        let ex = TransferExecutor::new("http://x/", &opts);
        let good = headers(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 400-999/1000"]);
        assert_eq!(ex.body_mode(&good, 400).unwrap(), BodyMode::Keep);
        let wrong = headers(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 0-999/1000"]);
        assert!(ex.body_mode(&wrong, 400).is_err());
        let missing = headers(&["HTTP/1.1 206 Partial Content"]);
        assert!(ex.body_mode(&missing, 400).is_err());
    }

    #[test]
    fn error_pages_are_discarded() {
        let opts = exec_opts();
        let ex = TransferExecutor::new("http://x/", &opts);
        let h = headers(&["HTTP/1.1 404 Not Found", "Content-Length: 9"]);
        assert_eq!(ex.body_mode(&h, 0).unwrap(), BodyMode::Discard);
    }

    #[test]
    fn advertised_size_must_match_expected() {
        let opts = exec_opts();
        let ex = TransferExecutor::new("http://x/", &opts).expected_size(Some(999));
        let h = headers(&["HTTP/1.1 200 OK", "Content-Length: 1000"]);
        assert!(matches!(
            ex.body_mode(&h, 0),
            Err(TransferError::UnexpectedSize {
                expected: 999,
                advertised: 1000
            })
        ));
    }

    #[test]
    fn unsatisfiable_range_at_end_means_complete() {
        let opts = exec_opts();
        let ex = TransferExecutor::new("http://x/", &opts);
        let h = headers(&["HTTP/1.1 416 Range Not Satisfiable", "Content-Range: bytes */1000"]);
        assert_eq!(ex.unsatisfiable_range(&h, 1000).unwrap(), 0);
        assert!(ex.unsatisfiable_range(&h, 1200).is_err());
    }
}
