//! Pacing between messages of a batch.
//!
//! Keeps successive sends at least a fixed interval apart, measured from
//! the acknowledgement of the previous message, so a batch stays well below
//! Telegram's per-chat rate limit.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Fixed pause between two messages of a batch.
pub const PACING_INTERVAL: Duration = Duration::from_secs(3);

/// Rate limiter that enforces minimum intervals between operations.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed operations.
    min_interval: Duration,

    /// Last time an operation completed.
    last_operation: Option<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(PACING_INTERVAL)
    }
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_operation: None,
        }
    }

    /// Creates a rate limiter from seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Waits until the next operation is allowed.
    ///
    /// Returns the duration waited (0 for the first operation).
    pub async fn wait_turn(&self) -> Duration {
        let wait_duration = self.time_until_allowed();

        if !wait_duration.is_zero() {
            debug!("Pacing: waiting {:?} before next message", wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        wait_duration
    }

    /// Marks an operation as just completed.
    pub fn mark_used(&mut self) {
        self.last_operation = Some(Instant::now());
    }

    /// Returns the time remaining until the next operation is allowed.
    #[must_use]
    pub fn time_until_allowed(&self) -> Duration {
        self.last_operation.map_or(Duration::ZERO, |last_time| {
            self.min_interval.saturating_sub(last_time.elapsed())
        })
    }
}
