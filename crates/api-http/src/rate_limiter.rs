//! Rate Limiter (Token Bucket Algorithm)
//!
//! Guards the unauthenticated endpoints (register, login) against
//! credential stuffing. One bucket per client address.

use crate::error::ApiError;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;

/// Buckets kept before the table is reset
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Lock-free token bucket
///
/// Upper 32 bits: tokens. Lower 32 bits: last refill (ms since creation).
pub struct TokenBucket {
    packed: AtomicU64,
    creation_time: Instant,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
}

impl TokenBucket {
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            packed: AtomicU64::new((max_tokens as u64) << 32),
            creation_time: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Consume one token; false when the bucket is empty
    pub fn try_acquire(&self) -> bool {
        // Truncated to the 32-bit stamp; wraps every ~49.7 days
        let elapsed_ms = self.creation_time.elapsed().as_millis() as u32;
        self.acquire_at(elapsed_ms)
    }

    fn acquire_at(&self, elapsed_ms: u32) -> bool {
        loop {
            let packed = self.packed.load(Ordering::Acquire);
            let tokens = (packed >> 32) as u32;
            let last_refill_ms = (packed & 0xFFFF_FFFF) as u32;

            // Clock wrapped past the stamp: the bucket has been idle long enough to be full
            let refilled = if elapsed_ms < last_refill_ms {
                self.max_tokens as u64
            } else {
                ((elapsed_ms - last_refill_ms) as u64 * self.refill_rate as u64) / 1000
            };
            let available = (tokens as u64 + refilled).min(self.max_tokens as u64) as u32;

            // Keep the old timestamp until at least one token accrued
            let stamp = if refilled > 0 { elapsed_ms } else { last_refill_ms };

            if available == 0 {
                return false;
            }

            let next = (((available - 1) as u64) << 32) | stamp as u64;
            if self
                .packed
                .compare_exchange(packed, next, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        (self.packed.load(Ordering::Acquire) >> 32) as u32
    }
}

/// Per-client token buckets keyed by peer address
pub struct RateLimiter {
    buckets: Mutex<HashMap<Option<IpAddr>, Arc<TokenBucket>>>,
    burst: u32,
    per_second: u32,
}

impl RateLimiter {
    /// `RateLimiter::new(10, 1)`: bursts of 10, then one request per second
    pub fn new(burst: u32, per_second: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            burst,
            per_second,
        }
    }

    pub fn check(&self, client: Option<IpAddr>) -> bool {
        let bucket = {
            let mut buckets = match self.buckets.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(&client) {
                buckets.clear();
            }
            buckets
                .entry(client)
                .or_insert_with(|| Arc::new(TokenBucket::new(self.burst, self.per_second)))
                .clone()
        };
        bucket.try_acquire()
    }
}

/// Middleware: reject with 429 once the caller's bucket is empty
pub async fn throttle(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !limiter.check(client) {
        warn!(
            client = ?client,
            path = %request.uri().path(),
            "Request throttled"
        );
        return Err(ApiError::Throttled);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::time::{sleep, Duration};

    #[test]
    fn test_bucket_allows_within_limit() {
        let bucket = TokenBucket::new(10, 10);

        for _ in 0..10 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
        assert_eq!(bucket.remaining(), 0);
    }

    #[tokio::test]
    async fn test_bucket_refills() {
        let bucket = TokenBucket::new(5, 10);

        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());

        sleep(Duration::from_millis(300)).await;
        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_bucket_survives_clock_wrap() {
        let bucket = TokenBucket::new(3, 1);

        // Drained just before the 32-bit millisecond counter rolls over
        let stamp = u32::MAX - 10;
        bucket.packed.store(stamp as u64, Ordering::Release);
        assert!(!bucket.acquire_at(stamp));

        assert!(bucket.acquire_at(5));
        assert_eq!(bucket.remaining(), 2);

        // Counting resumes from the post-wrap stamp
        assert!(bucket.acquire_at(6));
        assert!(bucket.acquire_at(7));
        assert!(!bucket.acquire_at(8));
        assert!(bucket.acquire_at(1_010));
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let limiter = RateLimiter::new(2, 1);
        let alice = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        let bob = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));

        assert!(limiter.check(alice));
        assert!(limiter.check(alice));
        assert!(!limiter.check(alice));

        assert!(limiter.check(bob));
    }

    #[tokio::test]
    async fn test_bucket_concurrent() {
        let bucket = Arc::new(TokenBucket::new(100, 1));

        let mut handles = vec![];
        for _ in 0..10 {
            let bucket = Arc::clone(&bucket);
            handles.push(tokio::spawn(async move {
                let mut allowed = 0;
                for _ in 0..20 {
                    if bucket.try_acquire() {
                        allowed += 1;
                    }
                }
                allowed
            }));
        }

        let mut total_allowed = 0;
        for handle in handles {
            total_allowed += handle.await.unwrap();
        }

        assert!(
            (100..=101).contains(&total_allowed),
            "Expected about 100 allowed, got {}",
            total_allowed
        );
    }
}
