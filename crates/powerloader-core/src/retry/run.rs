//! Retry loop: drive transfer attempts until success or the policy says stop.
//!
//! Each attempt starts from the partial file's length as reported by the
//! filesystem, never from an offset remembered in memory, so bytes written by
//! a failed attempt are kept and never requested twice.

use std::time::Duration;

use crate::control::AbortToken;
use crate::storage::PartialFile;
use crate::transfer::TransferOutcome;

use super::error::TransferError;
use super::policy::{RetryDecision, RetryPolicy};

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Idle,
    Attempting,
    Retrying,
    Succeeded,
    Aborted,
}

/// Attempt counter and the offset the latest attempt started from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_offset: u64,
}

/// Terminal result of a retry run.
#[derive(Debug)]
pub enum RetryOutcome {
    /// The last attempt completed; `total_len` is the partial file's final length.
    Succeeded { attempts: u32, total_len: u64 },
    /// Gave up. `exhausted` is true when the error was retryable but the bound was hit.
    Aborted {
        error: TransferError,
        attempts: u32,
        exhausted: bool,
    },
}

/// Slice used while sleeping so an abort request is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

pub struct RetryController<'a> {
    policy: RetryPolicy,
    abort: Option<&'a AbortToken>,
    state: RetryState,
    phase: RetryPhase,
}

impl<'a> RetryController<'a> {
    pub fn new(policy: RetryPolicy, abort: Option<&'a AbortToken>) -> Self {
        Self {
            policy,
            abort,
            state: RetryState::default(),
            phase: RetryPhase::Idle,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Run `attempt` until it completes, fails fatally, or the retry bound is
    /// reached. `attempt` receives the store and the offset to resume from.
    pub fn run<F>(&mut self, store: &mut PartialFile, mut attempt: F) -> RetryOutcome
    where
        F: FnMut(&mut PartialFile, u64) -> TransferOutcome,
    {
        self.state = RetryState::default();
        loop {
            if self.aborted() {
                return self.abort_with(TransferError::Aborted, false);
            }
            let offset = match store.len() {
                Ok(n) => n,
                Err(e) => return self.abort_with(TransferError::Storage(e), false),
            };
            self.state.attempt += 1;
            self.state.last_offset = offset;
            self.phase = RetryPhase::Attempting;
            tracing::debug!(attempt = self.state.attempt, offset, "starting transfer attempt");

            match attempt(store, offset) {
                TransferOutcome::Completed(received) => {
                    let total_len = match store.len() {
                        Ok(n) => n,
                        Err(e) => return self.abort_with(TransferError::Storage(e), false),
                    };
                    tracing::debug!(
                        attempt = self.state.attempt,
                        received,
                        total_len,
                        "transfer completed"
                    );
                    self.phase = RetryPhase::Succeeded;
                    return RetryOutcome::Succeeded {
                        attempts: self.state.attempt,
                        total_len,
                    };
                }
                TransferOutcome::FatalFailure(e) => return self.abort_with(e, false),
                TransferOutcome::RetryableFailure(e) => {
                    let kind = super::classify(&e);
                    match self.policy.decide(self.state.attempt, kind) {
                        RetryDecision::NoRetry => return self.abort_with(e, true),
                        RetryDecision::RetryAfter(delay) => {
                            tracing::warn!(
                                attempt = self.state.attempt,
                                max_attempts = self.policy.max_attempts,
                                ?delay,
                                "transfer failed, retrying: {}",
                                e
                            );
                            self.phase = RetryPhase::Retrying;
                            self.sleep(delay);
                        }
                    }
                }
            }
        }
    }

    fn aborted(&self) -> bool {
        self.abort.is_some_and(|a| a.is_aborted())
    }

    fn sleep(&self, delay: Duration) {
        let mut left = delay;
        while !left.is_zero() && !self.aborted() {
            let step = left.min(SLEEP_SLICE);
            std::thread::sleep(step);
            left -= step;
        }
    }

    fn abort_with(&mut self, error: TransferError, exhausted: bool) -> RetryOutcome {
        self.phase = RetryPhase::Aborted;
        RetryOutcome::Aborted {
            error,
            attempts: self.state.attempt,
            exhausted,
        }
    }
}
