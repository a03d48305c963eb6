//! Process-wide request pacing.
//!
//! One [`RateLimiter`] is shared by every fetch in the process, so
//! concurrent feed requests together stay under the upstream limit.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Fixed-interval gate: at most one request per `interval`.
///
/// Slots are handed out in arrival order. Idle time does not accumulate
/// into bursts.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_second` requests; zero is
    /// treated as one.
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::with_interval(Duration::from_secs(1) / requests_per_second.max(1))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the caller may issue one request.
    ///
    /// The slot is reserved under the lock and the wait happens after it is
    /// released, so waiting callers do not block each other's reservations.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |reserved| reserved.max(now));
            *next = Some(slot + self.interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "waiting for rate limit slot");
            tokio::time::sleep_until(slot).await;
        }
    }
}
