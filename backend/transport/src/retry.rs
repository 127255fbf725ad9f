//! Transport-level retry: exponential backoff for idempotent requests that
//! failed before reaching the backend.

use std::time::Duration;

use portalchat_core::{Method, PortalError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before attempt `attempt_number` (1-indexed retry count).
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        if attempt_number == 0 {
            return Duration::ZERO;
        }
        let delay_ms =
            self.base_delay_ms as f64 * self.backoff_factor.powi((attempt_number - 1) as i32);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether a failed attempt may be repeated.
    ///
    /// POSTs are never resent: a login or completion may already have been
    /// processed when the connection dropped.
    pub fn should_retry(&self, method: Method, error: &PortalError, attempts_made: u32) -> bool {
        if attempts_made >= self.max_attempts || !method.is_idempotent() {
            return false;
        }
        matches!(
            error,
            PortalError::ConnectTimeout | PortalError::ConnectRefused(_) | PortalError::Io(_)
        )
    }
}
