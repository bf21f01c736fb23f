//! Tuning for store calls made by the domain services.

use std::time::Duration;

/// Timeout and retry settings shared by [`crate::CatalogService`] and
/// [`crate::ReservationCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Upper bound for one operation, retries included.
    pub operation_timeout: Duration,
    /// How many times a conflicting transaction is retried.
    pub max_conflict_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub conflict_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(3),
            max_conflict_retries: 3,
            conflict_backoff: Duration::from_millis(10),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn conflict_backoff(mut self, backoff: Duration) -> Self {
        self.conflict_backoff = backoff;
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.conflict_backoff.saturating_mul(factor)
    }
}
