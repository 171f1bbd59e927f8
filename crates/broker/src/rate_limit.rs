//! Global request-rate token bucket.
//!
//! Every REST call acquires one token before hitting the wire. Tokens refill
//! continuously at `per_minute / 60` per second up to a burst of
//! `per_minute`. When the bucket is dry the caller sleeps until the next
//! token accrues, so upstream callers only ever observe added latency.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Token bucket limiting calls per minute.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket allowing `per_minute` requests per minute.
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = f64::from(per_minute.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / 60.0,
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    /// Try to take one token without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_up_to_capacity() {
        let bucket = TokenBucket::per_minute(5);
        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let bucket = TokenBucket::per_minute(6000); // 100 tokens/sec
        while bucket.try_acquire() {}
        std::thread::sleep(Duration::from_millis(50));
        assert!(bucket.try_acquire());
    }

    #[tokio::test]
    async fn acquire_waits_rather_than_fails() {
        let bucket = TokenBucket::per_minute(60_000); // 1000 tokens/sec
        while bucket.try_acquire() {}
        // Should come back within a few milliseconds once a token accrues.
        tokio::time::timeout(Duration::from_secs(1), bucket.acquire())
            .await
            .expect("acquire should complete after refill");
    }
}
