//! 재시도 정책 모듈
//! Pure retry decisions for manifest and link fetches: given the attempt
//! number and what the attempt produced, decide whether to stop or wait.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::config::FetchConfig;
use super::http_client::TransportError;

/// Statuses worth another try
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Statuses that mean "nothing published for this URL"
pub const ABSENT_STATUSES: [u16; 2] = [403, 404];

/// HTTP status classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusClass {
    Success,
    Retryable,
    Absent,
    Unexpected,
}

impl StatusClass {
    #[must_use]
    pub fn of(status: u16) -> Self {
        if status == 200 {
            Self::Success
        } else if RETRYABLE_STATUSES.contains(&status) {
            Self::Retryable
        } else if ABSENT_STATUSES.contains(&status) {
            Self::Absent
        } else {
            Self::Unexpected
        }
    }
}

/// What one GET attempt produced, as far as the policy cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult<'a> {
    Status(u16),
    Transport(&'a TransportError),
}

/// 재시도 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop,
    RetryAfter(Duration),
}

/// 재시도 정책 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Exponential base; the delay after attempt `n` (1-based) is `base^(n-1)` units
    pub backoff_base: f64,
    /// One backoff unit
    pub backoff_unit_ms: u64,
    /// Uniform jitter range `[0, jitter_max_ms]`
    pub jitter_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: config.backoff_base,
            backoff_unit_ms: config.backoff_unit_ms,
            jitter_max_ms: config.jitter_max_ms,
        }
    }
}

impl RetryPolicy {
    /// `attempt` is the 1-based number of the attempt that just finished.
    #[must_use]
    pub fn decide(&self, attempt: u32, result: AttemptResult<'_>) -> RetryDecision {
        let retryable = match result {
            AttemptResult::Status(status) => StatusClass::of(status) == StatusClass::Retryable,
            AttemptResult::Transport(_) => true,
        };
        if !retryable || attempt >= self.max_attempts {
            return RetryDecision::Stop;
        }
        RetryDecision::RetryAfter(self.backoff(attempt) + self.jitter())
    }

    /// Deterministic part of the delay after attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let unit = self.backoff_unit_ms as f64;
        let millis = (unit * self.backoff_base.powi(exponent)).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = millis as u64;
        Duration::from_millis(millis)
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=self.jitter_max_ms))
        }
    }
}
