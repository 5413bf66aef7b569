//! Retry policy for chunk uploads.
//!
//! An explicit state machine: the caller counts attempts, looks up the
//! backoff table between attempts, and classifies each failure as
//! fatal or transient. Fatal failures stop immediately; transient ones
//! consume an attempt and wait out the backoff.

use std::time::Duration;

use reqwest::StatusCode;

use crate::{MAX_ATTEMPTS, RETRY_DELAYS};

/// Outcome of one failed chunk upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChunkFailure {
    /// Server rejection that will not change on retry.
    Fatal(String),
    /// Network error, timeout, or unexpected status; consumes an attempt.
    Transient(String),
}

/// Attempt budget and backoff schedule for one chunk.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: &'static [u64],
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delays: &RETRY_DELAYS,
        }
    }
}

impl RetryPolicy {
    /// Total attempts allowed, counting the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `n` (1-indexed).
    ///
    /// The first attempt and anything past the budget get `None`; a
    /// delay is only ever applied between attempts.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 || attempt > self.max_attempts {
            return None;
        }
        self.delays
            .get(attempt as usize - 2)
            .map(|&s| Duration::from_secs(s))
    }

    /// Zero-delay policy for tests.
    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        const ZERO: [u64; 10] = [0; 10];
        Self {
            max_attempts: MAX_ATTEMPTS,
            delays: &ZERO,
        }
    }
}

/// Returns `true` for status codes the server sends when retrying is
/// pointless: forbidden, payload-too-large, unprocessable, rate-limited,
/// insufficient-storage.
///
/// 429 being non-retryable mirrors the server's documented contract;
/// if that ever needs to change, this is the only place to touch.
pub fn is_fatal_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 403 | 413 | 422 | 429 | 507)
}
