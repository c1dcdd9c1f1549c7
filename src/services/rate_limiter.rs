//! Process-wide outbound request limiter.
//!
//! A smooth token bucket: permits are handed out at a fixed rate and a
//! caller asking for `n` permits pushes every later caller back by `n`
//! intervals. One instance is shared by every fetch of every resource.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    /// Earliest instant the next permit may be granted
    next_free: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Limiter granting `per_second` permits per second.
    pub fn new(per_second: f64) -> Self {
        let per_second = if per_second > 0.0 { per_second } else { 1.0 };
        Self {
            interval: Duration::from_secs_f64(1.0 / per_second),
            bucket: Mutex::new(Bucket {
                next_free: Instant::now(),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for one permit.
    pub async fn acquire(&self) {
        self.acquire_many(1).await;
    }

    /// Reserve `permits` permits, waiting until the reservation starts.
    ///
    /// Returns how long the caller waited.
    pub async fn acquire_many(&self, permits: u32) -> Duration {
        let start = {
            let mut bucket = self.bucket.lock().await;
            let now = Instant::now();
            let start = bucket.next_free.max(now);
            bucket.next_free = start + self.interval * permits;
            start
        };

        let waited = start.saturating_duration_since(Instant::now());
        if !waited.is_zero() {
            tokio::time::sleep_until(start).await;
        }
        waited
    }
}
