//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use octave_core::FileSystemSchemas;
use octave_storage::FsStore;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        }
    }

    #[cfg(test)]
    fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Ok(()) if allowed, Err(retry_after_secs) if rate limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        // expired windows start over, so their entries can go
        let window = self.window;
        tracker.retain(|_, (_, start)| now.duration_since(*start) < window);

        let entry = tracker.entry(ip).or_insert((0, now));
        entry.0 += 1;
        if entry.0 > self.max_requests {
            let left = window.saturating_sub(now.duration_since(entry.1));
            Err(left.as_secs().max(1))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.tracker.lock().await.len()
    }
}

/// Shared across request handlers. The store and schema source are
/// synchronous and only touched from blocking tasks.
pub(crate) struct AppState {
    pub(crate) schemas: FileSystemSchemas,
    pub(crate) store: FsStore,
    pub(crate) rate_limiter: RateLimiter,
    /// None = no auth required.
    pub(crate) api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_counts_per_ip() {
        let limiter = RateLimiter::new(2);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(limiter.check(a).await.is_ok());
        assert!(limiter.check(a).await.is_ok());
        let retry = limiter.check(a).await.unwrap_err();
        assert!(retry <= RATE_LIMIT_WINDOW_SECS);
        assert!(limiter.check(b).await.is_ok());
    }

    #[tokio::test]
    async fn expired_windows_are_forgotten() {
        let limiter = RateLimiter::new(1).with_window(Duration::from_millis(50));
        for i in 1..=20u8 {
            let ip: IpAddr = format!("10.0.0.{}", i).parse().unwrap();
            assert!(limiter.check(ip).await.is_ok());
        }
        assert_eq!(limiter.tracked().await, 20);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(a).await.is_err());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.check(a).await.is_ok());
        assert_eq!(limiter.tracked().await, 1);
    }
}
