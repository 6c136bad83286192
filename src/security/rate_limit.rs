use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Fixed-window admission limiter, one bucket per caller key.
///
/// Buckets live in a sharded map so increments for one key never contend
/// with unrelated keys. A bucket whose window has elapsed is reset in place
/// on the next access; there is no background sweep.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    buckets: Arc<DashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn per_window_secs(limit: u32, window_secs: u64) -> Self {
        Self::new(limit, Duration::from_secs(window_secs))
    }

    /// Counts one request for `key` and reports whether it is admitted.
    ///
    /// The increment-and-compare runs under the entry lock, so concurrent
    /// callers on the same key are serialized and the ceiling is never
    /// overshot. Rejection has no side effect beyond the count itself.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                window_start: now,
                count: 0,
            });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count = bucket.count.saturating_add(1);
        bucket.count <= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn new_window_admits_again() {
        let limiter = RateLimiter::new(2, Duration::from_millis(40));
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[test]
    fn concurrent_increments_respect_the_ceiling() {
        let limiter = RateLimiter::new(100, Duration::from_secs(60));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                (0..25).filter(|_| limiter.allow("shared")).count()
            }));
        }
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
        assert!(!limiter.allow("shared"));
    }
}
